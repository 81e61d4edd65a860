use chrono::Utc;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::config::Configuration;
use crate::jobs::JobStatusStore;
use crate::ledger::{
    CreateOutcome, LedgerClient, Posting, SubmissionOptions, TransactionGroup, ValidationErrors,
};

/// What happened to one posting. The send stage always returns one outcome
/// per posting, in order; a failure never stops the remaining sends.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Created(TransactionGroup),
    Invalid(ValidationErrors),
    Failed(String),
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Created(_))
    }
}

/// Submits postings to the ledger one at a time.
///
/// Sends are strictly sequential: each call can mutate server-side
/// duplicate-detection state that the next call's check depends on.
pub struct TransactionSender<'a> {
    pub ledger: &'a dyn LedgerClient,
    pub jobs: &'a JobStatusStore,
    pub identifier: &'a str,
    pub configuration: &'a Configuration,
}

impl TransactionSender<'_> {
    pub async fn send(&self, postings: &[Posting]) -> Vec<SendOutcome> {
        let now = Utc::now();
        let tag = format!("Bank import on {}", now.format("%Y-%m-%d @ %H:%M"));
        self.create_tag(&tag).await;

        let options = SubmissionOptions::from_configuration(self.configuration);
        let total = postings.len();
        let mut outcomes = Vec::with_capacity(total);
        for (index, posting) in postings.iter().enumerate() {
            let line = index as u32 + 1;
            log::debug!("[{line}/{total}] Trying to send transaction.");
            let outcome = match self.ledger.create_transaction(posting, &options).await {
                Ok(CreateOutcome::Created(group)) => {
                    self.record_created(line, &group).await;
                    if self.configuration.add_import_tag {
                        self.attach_tag(line, &group, &tag).await;
                    }
                    SendOutcome::Created(group)
                }
                Ok(CreateOutcome::Invalid(errors)) => {
                    for message in errors.messages() {
                        log::error!("Could not create transaction: {message}");
                        self.jobs.add_error(self.identifier, line, message).await;
                    }
                    SendOutcome::Invalid(errors)
                }
                Err(err) => {
                    log::error!("{err}");
                    self.jobs
                        .add_error(self.identifier, line, err.to_string())
                        .await;
                    SendOutcome::Failed(err.to_string())
                }
            };
            outcomes.push(outcome);
            log::debug!("[{line}/{total}] Done sending transaction.");
        }
        outcomes
    }

    /// One shared tag for the whole run. Creation failure is logged and
    /// non-fatal; attaching is only skipped when the flag is off.
    async fn create_tag(&self, tag: &str) {
        if !self.configuration.add_import_tag {
            log::debug!("Not instructed to add a tag, so will not create one.");
            return;
        }
        match self.ledger.create_tag(tag, Utc::now().date_naive()).await {
            Ok(()) => log::info!("Created tag \"{tag}\""),
            Err(err) => log::error!("Could not create tag. {err}"),
        }
    }

    async fn record_created(&self, line: u32, group: &TransactionGroup) {
        let url = self.ledger.show_url(group.id);
        for transaction in &group.transactions {
            let amount = Decimal::from_str(&transaction.amount)
                .map(|amount| amount.round_dp(2).to_string())
                .unwrap_or_else(|_| transaction.amount.clone());
            self.jobs
                .add_message(
                    self.identifier,
                    line,
                    format!(
                        "Created transaction #{}: <a href=\"{}\">{}</a> ({} {})",
                        group.id, url, transaction.description, transaction.currency_code, amount
                    ),
                )
                .await;
        }
    }

    async fn attach_tag(&self, line: u32, group: &TransactionGroup, tag: &str) {
        log::debug!("Going to add import tag to transaction group #{}", group.id);
        if let Err(err) = self.ledger.add_tag_to_group(group, tag).await {
            log::warn!("Could not attach import tag to group #{}: {err}", group.id);
            self.jobs
                .add_warning(
                    self.identifier,
                    line,
                    format!("Could not attach import tag: {err}"),
                )
                .await;
        }
    }
}
