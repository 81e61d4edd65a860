use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::aggregator::{AggregatorClient, RawTransaction};
use crate::config::Configuration;
use crate::error::{ImportError, Result};
use crate::jobs::{allocate_identifier, JobState, JobStatusStore};
use crate::store::ContentStore;

/// The persisted shape of one download run: aggregator account id → the
/// filtered transactions downloaded for it, in download order.
pub type DownloadArtifact = BTreeMap<String, Vec<RawTransaction>>;

/// The date window a download keeps: `not_before < value_date < not_after`,
/// strict on both ends, each bound optional.
#[derive(Debug, Clone, Copy)]
pub struct DateWindow {
    pub not_before: Option<NaiveDate>,
    pub not_after: Option<NaiveDate>,
}

impl DateWindow {
    pub fn from_configuration(configuration: &Configuration) -> Self {
        Self {
            not_before: configuration.date_not_before(),
            not_after: configuration.date_not_after(),
        }
    }

    pub fn contains(&self, value_date: NaiveDate) -> bool {
        if let Some(not_before) = self.not_before {
            if value_date <= not_before {
                log::info!("Skip transaction because \"{value_date}\" is before \"{not_before}\".");
                return false;
            }
        }
        if let Some(not_after) = self.not_after {
            if value_date >= not_after {
                log::info!("Skip transaction because \"{value_date}\" is after \"{not_after}\".");
                return false;
            }
        }
        true
    }

    fn filter(&self, transactions: Vec<RawTransaction>) -> Vec<RawTransaction> {
        log::debug!(
            "Going to filter downloaded transactions. Original set length is {}",
            transactions.len()
        );
        let filtered: Vec<RawTransaction> = transactions
            .into_iter()
            .filter(|transaction| self.contains(transaction.value_date))
            .collect();
        log::debug!("After filtering, set is {} transaction(s)", filtered.len());
        filtered
    }
}

/// Downloads transactions for every configured account and persists them as
/// one artifact blob, tracking progress in the job store.
pub struct DownloadRoutine {
    aggregator: Arc<dyn AggregatorClient>,
    jobs: JobStatusStore,
    downloads: Arc<dyn ContentStore>,
}

impl DownloadRoutine {
    pub fn new(
        aggregator: Arc<dyn AggregatorClient>,
        jobs: JobStatusStore,
        downloads: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            aggregator,
            jobs,
            downloads,
        }
    }

    /// Runs the download and returns the identifier the artifact was stored
    /// under. A fetch failure on any account aborts the whole run without
    /// persisting a partial artifact.
    pub async fn run(
        &self,
        configuration: &Configuration,
        identifier: Option<String>,
    ) -> Result<String> {
        if configuration.accounts.is_empty() {
            return Err(ImportError::Config(
                "no accounts are selected for import".to_string(),
            ));
        }
        // Fail before touching the job store if no token can be obtained.
        self.aggregator.access_token().await?;

        let identifier = match identifier {
            Some(identifier) => {
                log::debug!("Was given download identifier \"{identifier}\", will use it.");
                identifier
            }
            None => allocate_identifier(self.jobs.content_store()).await?,
        };
        self.jobs.start_or_find(&identifier).await?;
        self.jobs.set_status(&identifier, JobState::Running).await?;

        let window = DateWindow::from_configuration(configuration);
        match self.execute(configuration, &window, &identifier).await {
            Ok(()) => {
                self.jobs.set_status(&identifier, JobState::Done).await?;
                log::debug!("Done with download");
                Ok(identifier)
            }
            Err(err) => {
                let _ = self.jobs.set_status(&identifier, JobState::Errored).await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        configuration: &Configuration,
        window: &DateWindow,
        identifier: &str,
    ) -> Result<()> {
        let mut artifact = DownloadArtifact::new();
        for account_id in configuration.accounts.keys() {
            log::debug!("Going to download transactions for account \"{account_id}\"");
            let transactions = self.aggregator.transactions(account_id).await?;
            let filtered: Vec<RawTransaction> = window
                .filter(transactions)
                .into_iter()
                .map(|mut transaction| {
                    transaction.account_identifier = account_id.clone();
                    transaction
                })
                .collect();
            artifact.insert(account_id.clone(), filtered);
            log::debug!("Done downloading transactions for account \"{account_id}\"");
        }
        let bytes = serde_json::to_vec(&artifact)?;
        self.downloads.put(identifier, &bytes).await
    }
}
