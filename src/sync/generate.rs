use chrono::NaiveTime;
use rust_decimal::Decimal;

use crate::aggregator::RawTransaction;
use crate::config::Configuration;
use crate::download::DownloadArtifact;
use crate::jobs::JobStatusStore;
use crate::ledger::{Posting, PostingKind};

/// Turns downloaded transactions into ledger-shaped postings.
///
/// Line indices are 1-based and run across the whole artifact in account
/// order; a dropped transaction still consumes its index so later warnings
/// and errors line up with what the user downloaded.
pub async fn generate(
    artifact: &DownloadArtifact,
    configuration: &Configuration,
    jobs: &JobStatusStore,
    identifier: &str,
) -> Vec<Posting> {
    let mut postings = Vec::new();
    let mut line: u32 = 0;
    for (account_id, transactions) in artifact {
        for transaction in transactions {
            line += 1;
            match generate_posting(transaction, account_id, configuration) {
                Ok(posting) => postings.push(posting),
                Err(reason) => {
                    log::warn!("{reason}");
                    jobs.add_warning(identifier, line, reason).await;
                }
            }
        }
    }
    log::debug!("Generated {} ledger transaction(s).", postings.len());
    postings
}

fn generate_posting(
    transaction: &RawTransaction,
    account_id: &str,
    configuration: &Configuration,
) -> Result<Posting, String> {
    let Some(ledger_account) = configuration.accounts.get(account_id).copied() else {
        return Err(format!(
            "Transaction \"{}\" belongs to account \"{}\" that has no ledger counterpart, skipped.",
            transaction.transaction_id, account_id
        ));
    };
    let Some(amount) = transaction.amount() else {
        return Err(format!(
            "Transaction \"{}\" has an unparseable amount \"{}\", skipped.",
            transaction.transaction_id, transaction.transaction_amount.amount
        ));
    };

    let mut posting = Posting {
        kind: PostingKind::Deposit,
        date: transaction.value_date,
        datetime: Some(transaction.value_date.and_time(NaiveTime::MIN).and_utc()),
        amount: transaction
            .transaction_amount
            .amount
            .trim_start_matches('-')
            .to_string(),
        currency_code: transaction.transaction_amount.currency.clone(),
        description: transaction.description().to_string(),
        source_id: None,
        source_name: None,
        destination_id: None,
        destination_name: None,
        category_id: None,
    };

    // A positive amount means money arrived on the configured ledger
    // account, so that account is the destination and the counterparty is
    // the source. Negative is the mirror image.
    if amount >= Decimal::ZERO {
        posting.kind = PostingKind::Deposit;
        posting.destination_id = Some(ledger_account);
        (posting.source_id, posting.source_name) =
            resolve_counterparty(transaction.source_name(), configuration);
    } else {
        posting.kind = PostingKind::Withdrawal;
        posting.source_id = Some(ledger_account);
        (posting.destination_id, posting.destination_name) =
            resolve_counterparty(transaction.destination_name(), configuration);
    }
    Ok(posting)
}

/// The counterparty side: mapped to a ledger account id when mapping is
/// enabled and knows the name, otherwise sent as a name for the ledger's own
/// auto-matching. A missing name leaves the side blank.
fn resolve_counterparty(
    name: Option<&str>,
    configuration: &Configuration,
) -> (Option<u64>, Option<String>) {
    let Some(name) = name else {
        return (None, None);
    };
    if configuration.do_mapping {
        if let Some(mapped) = configuration.mapping.get(name) {
            return (Some(*mapped), None);
        }
    }
    (None, Some(name.to_string()))
}
