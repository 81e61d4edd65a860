mod artifact;
mod filter;
mod generate;
mod send;

pub use send::{SendOutcome, TransactionSender};

use std::sync::Arc;

use crate::config::Configuration;
use crate::error::Result;
use crate::jobs::{allocate_identifier, JobState, JobStatusStore};
use crate::ledger::LedgerClient;
use crate::store::ContentStore;

/// Result of one sync run: the job identifier and one outcome per posting.
#[derive(Debug)]
pub struct SyncReport {
    pub sync_identifier: String,
    pub outcomes: Vec<SendOutcome>,
}

impl SyncReport {
    pub fn sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.is_success())
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.sent()
    }
}

/// Loads a prior download, generates and filters ledger postings, and sends
/// them, tracking the whole run in the job store.
pub struct SyncRoutine {
    ledger: Arc<dyn LedgerClient>,
    jobs: JobStatusStore,
    downloads: Arc<dyn ContentStore>,
}

impl SyncRoutine {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        jobs: JobStatusStore,
        downloads: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            ledger,
            jobs,
            downloads,
        }
    }

    /// Runs the sync against the artifact stored under
    /// `download_identifier`. Per-posting failures do not fail the run;
    /// they are reported through the returned [`SyncReport`].
    pub async fn run(
        &self,
        configuration: &Configuration,
        download_identifier: &str,
        sync_identifier: Option<String>,
    ) -> Result<SyncReport> {
        let sync_identifier = match sync_identifier {
            Some(identifier) => identifier,
            None => allocate_identifier(self.jobs.content_store()).await?,
        };
        self.jobs.start_or_find(&sync_identifier).await?;
        self.jobs
            .set_status(&sync_identifier, JobState::Running)
            .await?;

        match self
            .execute(configuration, download_identifier, &sync_identifier)
            .await
        {
            Ok(outcomes) => {
                self.jobs
                    .set_status(&sync_identifier, JobState::Done)
                    .await?;
                Ok(SyncReport {
                    sync_identifier,
                    outcomes,
                })
            }
            Err(err) => {
                let _ = self
                    .jobs
                    .set_status(&sync_identifier, JobState::Errored)
                    .await;
                Err(err)
            }
        }
    }

    async fn execute(
        &self,
        configuration: &Configuration,
        download_identifier: &str,
        sync_identifier: &str,
    ) -> Result<Vec<SendOutcome>> {
        log::debug!("Going to get downloaded transactions.");
        let artifact = artifact::load_download(
            &*self.downloads,
            download_identifier,
            &self.jobs,
            sync_identifier,
        )
        .await?;

        log::debug!("Generating ledger transactions.");
        let postings =
            generate::generate(&artifact, configuration, &self.jobs, sync_identifier).await;

        let filtered = filter::filter(postings, &self.jobs, sync_identifier).await;
        log::debug!("Filtered down to {} ledger transaction(s).", filtered.len());

        log::debug!("Going to send them to the ledger.");
        let sender = TransactionSender {
            ledger: &*self.ledger,
            jobs: &self.jobs,
            identifier: sync_identifier,
            configuration,
        };
        Ok(sender.send(&filtered).await)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    use super::*;
    use crate::aggregator::test_transaction;
    use crate::download::DownloadArtifact;
    use crate::error::ImportError;
    use crate::ledger::{
        Category, CreateOutcome, GroupTransaction, LedgerAccount, Posting, SubmissionOptions,
        TransactionGroup,
    };
    use crate::store::MemoryStore;

    struct CountingLedger {
        sent: Mutex<Vec<Posting>>,
    }

    #[async_trait]
    impl LedgerClient for CountingLedger {
        async fn list_accounts(&self, _kind: Option<&str>) -> Result<Vec<LedgerAccount>> {
            Ok(vec![])
        }

        async fn list_categories(&self) -> Result<Vec<Category>> {
            Ok(vec![])
        }

        async fn create_transaction(
            &self,
            posting: &Posting,
            _options: &SubmissionOptions,
        ) -> Result<CreateOutcome> {
            let mut sent = self.sent.lock().unwrap();
            sent.push(posting.clone());
            let id = sent.len() as u64;
            Ok(CreateOutcome::Created(TransactionGroup {
                id,
                transactions: vec![GroupTransaction {
                    journal_id: id,
                    description: posting.description.clone(),
                    currency_code: posting.currency_code.clone(),
                    amount: posting.amount.clone(),
                    tags: vec![],
                }],
            }))
        }

        async fn create_tag(&self, _name: &str, _date: NaiveDate) -> Result<()> {
            Ok(())
        }

        async fn add_tag_to_group(&self, _group: &TransactionGroup, _tag: &str) -> Result<()> {
            Ok(())
        }
    }

    fn routine(ledger: Arc<CountingLedger>) -> (SyncRoutine, JobStatusStore, Arc<MemoryStore>) {
        let jobs = JobStatusStore::new(Arc::new(MemoryStore::new()));
        let downloads = Arc::new(MemoryStore::new());
        (
            SyncRoutine::new(ledger, jobs.clone(), downloads.clone()),
            jobs,
            downloads,
        )
    }

    #[tokio::test]
    async fn full_sync_sends_every_generated_posting() {
        let ledger = Arc::new(CountingLedger {
            sent: Mutex::new(vec![]),
        });
        let (routine, jobs, downloads) = routine(ledger.clone());

        let mut artifact = DownloadArtifact::new();
        let mut incoming = test_transaction("t1", "2024-01-10", "25.00");
        incoming.creditor_name = "Employer BV".to_string();
        let mut outgoing = test_transaction("t2", "2024-01-11", "-12.34");
        outgoing.debtor_name = "Some Shop".to_string();
        artifact.insert("acct-1".to_string(), vec![incoming, outgoing]);
        downloads
            .put("dl-1", &serde_json::to_vec(&artifact).unwrap())
            .await
            .unwrap();

        let mut configuration = Configuration::default();
        configuration.accounts.insert("acct-1".to_string(), 7);

        let report = routine.run(&configuration, "dl-1", None).await.unwrap();
        assert_eq!(2, report.sent());
        assert_eq!(0, report.failed());

        let sent = ledger.sent.lock().unwrap();
        assert_eq!(2, sent.len());
        // The filter stage ran: no precise timestamps go out.
        assert!(sent.iter().all(|posting| posting.datetime.is_none()));

        let status = jobs.find(&report.sync_identifier).await.unwrap().unwrap();
        assert_eq!(JobState::Done, status.status);
    }

    #[tokio::test]
    async fn malformed_artifact_marks_the_job_errored() {
        let ledger = Arc::new(CountingLedger {
            sent: Mutex::new(vec![]),
        });
        let (routine, jobs, downloads) = routine(ledger);
        downloads.put("dl-1", b"{broken").await.unwrap();

        let err = routine
            .run(
                &Configuration::default(),
                "dl-1",
                Some("sync-1".to_string()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Serialization(_)));
        let status = jobs.find("sync-1").await.unwrap().unwrap();
        assert_eq!(JobState::Errored, status.status);
    }

    #[tokio::test]
    async fn missing_download_completes_with_nothing_to_send() {
        let ledger = Arc::new(CountingLedger {
            sent: Mutex::new(vec![]),
        });
        let (routine, jobs, _downloads) = routine(ledger.clone());

        let report = routine
            .run(&Configuration::default(), "gone", None)
            .await
            .unwrap();
        assert!(report.outcomes.is_empty());
        assert!(ledger.sent.lock().unwrap().is_empty());
        let status = jobs.find(&report.sync_identifier).await.unwrap().unwrap();
        assert_eq!(JobState::Done, status.status);
    }
}
