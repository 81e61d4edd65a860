use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::store::ContentStore;

const IDENTIFIER_LENGTH: usize = 16;
const MAX_IDENTIFIER_ATTEMPTS: u32 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    NotStarted,
    Running,
    Done,
    Errored,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::NotStarted => write!(f, "not_started"),
            JobState::Running => write!(f, "running"),
            JobState::Done => write!(f, "done"),
            JobState::Errored => write!(f, "errored"),
        }
    }
}

/// Persisted state of one download or sync run.
///
/// The three logs map a line index to the list of texts recorded for that
/// line. Index 0 carries run-level lines; transaction lines are 1-based so
/// they match the line numbers a user sees.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct JobStatus {
    pub status: JobState,
    pub messages: BTreeMap<u32, Vec<String>>,
    pub warnings: BTreeMap<u32, Vec<String>>,
    pub errors: BTreeMap<u32, Vec<String>>,
}

impl JobStatus {
    pub fn new() -> Self {
        Self {
            status: JobState::NotStarted,
            messages: BTreeMap::new(),
            warnings: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Persists job status blobs through a [`ContentStore`], one JSON blob per
/// identifier.
///
/// All writes are read-modify-write without locking: concurrent runs sharing
/// an identifier can lose updates (last write wins). Callers must ensure one
/// active run per identifier.
#[derive(Clone)]
pub struct JobStatusStore {
    store: Arc<dyn ContentStore>,
}

impl JobStatusStore {
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub fn content_store(&self) -> &dyn ContentStore {
        &*self.store
    }

    /// Loads the status for `identifier`, creating and persisting a fresh
    /// `not_started` record if none exists yet. Idempotent.
    pub async fn start_or_find(&self, identifier: &str) -> Result<JobStatus> {
        if self.store.exists(identifier).await? {
            match self.load(identifier).await {
                Ok(status) => return Ok(status),
                Err(err) => {
                    log::error!("Could not read job file for \"{identifier}\", writing a new one: {err}");
                }
            }
        }
        log::debug!("Job file for \"{identifier}\" does not exist, creating a new one.");
        let status = JobStatus::new();
        self.persist(identifier, &status).await?;
        Ok(status)
    }

    /// Loads the status for `identifier` without creating anything.
    pub async fn find(&self, identifier: &str) -> Result<Option<JobStatus>> {
        if !self.store.exists(identifier).await? {
            return Ok(None);
        }
        Ok(Some(self.load(identifier).await?))
    }

    pub async fn set_status(&self, identifier: &str, state: JobState) -> Result<JobStatus> {
        log::debug!("Setting job \"{identifier}\" to status \"{state}\"");
        let mut status = self.start_or_find(identifier).await?;
        status.status = state;
        self.persist(identifier, &status).await?;
        Ok(status)
    }

    pub async fn add_message(&self, identifier: &str, index: u32, message: impl Into<String>) {
        self.append(identifier, index, message.into(), LogKind::Message)
            .await;
    }

    pub async fn add_warning(&self, identifier: &str, index: u32, warning: impl Into<String>) {
        self.append(identifier, index, warning.into(), LogKind::Warning)
            .await;
    }

    pub async fn add_error(&self, identifier: &str, index: u32, error: impl Into<String>) {
        self.append(identifier, index, error.into(), LogKind::Error)
            .await;
    }

    async fn append(&self, identifier: &str, index: u32, text: String, kind: LogKind) {
        match self.store.exists(identifier).await {
            Ok(true) => {}
            Ok(false) => {
                log::warn!("Job \"{identifier}\" does not exist, dropping {kind:?} line: {text}");
                return;
            }
            Err(err) => {
                log::error!("Could not check job \"{identifier}\": {err}");
                return;
            }
        }
        let result = async {
            let mut status = self.load(identifier).await?;
            let log = match kind {
                LogKind::Message => &mut status.messages,
                LogKind::Warning => &mut status.warnings,
                LogKind::Error => &mut status.errors,
            };
            log.entry(index).or_default().push(text);
            self.persist(identifier, &status).await
        }
        .await;
        if let Err(err) = result {
            log::error!("Could not update job \"{identifier}\": {err}");
        }
    }

    async fn load(&self, identifier: &str) -> Result<JobStatus> {
        let bytes = self.store.get(identifier).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn persist(&self, identifier: &str, status: &JobStatus) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(status)?;
        self.store.put(identifier, &bytes).await
    }
}

#[derive(Debug, Clone, Copy)]
enum LogKind {
    Message,
    Warning,
    Error,
}

/// Allocates a run identifier that is not yet present in `store`.
///
/// Generates random alphanumeric identifiers and checks each against the
/// store, capped at 30 attempts. If all attempts collide the last candidate
/// is used anyway (best effort, not a hard failure).
pub async fn allocate_identifier(store: &dyn ContentStore) -> Result<String> {
    let mut count = 0;
    loop {
        let identifier: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(IDENTIFIER_LENGTH)
            .map(char::from)
            .collect();
        count += 1;
        log::debug!("Attempt #{count} results in \"{identifier}\"");
        if count >= MAX_IDENTIFIER_ATTEMPTS || !store.exists(&identifier).await? {
            log::info!("Job identifier is \"{identifier}\"");
            return Ok(identifier);
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::store::MemoryStore;

    fn store() -> JobStatusStore {
        JobStatusStore::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn start_or_find_creates_fresh_status() {
        let jobs = store();
        let status = jobs.start_or_find("job-1").await.unwrap();
        assert_eq!(JobState::NotStarted, status.status);
        assert!(status.messages.is_empty());
        assert!(jobs.content_store().exists("job-1").await.unwrap());
    }

    #[tokio::test]
    async fn start_or_find_is_idempotent() {
        let jobs = store();
        jobs.start_or_find("job-1").await.unwrap();
        jobs.set_status("job-1", JobState::Running).await.unwrap();
        let status = jobs.start_or_find("job-1").await.unwrap();
        assert_eq!(JobState::Running, status.status);
    }

    #[tokio::test]
    async fn logs_accumulate_per_index() {
        let jobs = store();
        jobs.start_or_find("job-1").await.unwrap();
        jobs.add_message("job-1", 1, "first").await;
        jobs.add_message("job-1", 1, "second").await;
        jobs.add_warning("job-1", 2, "careful").await;
        jobs.add_error("job-1", 3, "broken").await;

        let status = jobs.find("job-1").await.unwrap().unwrap();
        assert_eq!(
            vec!["first".to_string(), "second".to_string()],
            status.messages[&1]
        );
        assert_eq!(vec!["careful".to_string()], status.warnings[&2]);
        assert_eq!(vec!["broken".to_string()], status.errors[&3]);
        assert!(status.has_errors());
    }

    #[tokio::test]
    async fn add_to_unknown_identifier_is_a_noop() {
        let jobs = store();
        jobs.add_message("missing", 1, "dropped").await;
        assert_eq!(None, jobs.find("missing").await.unwrap());
    }

    #[tokio::test]
    async fn status_round_trips_through_json() {
        let jobs = store();
        jobs.start_or_find("job-1").await.unwrap();
        jobs.set_status("job-1", JobState::Done).await.unwrap();
        jobs.add_message("job-1", 0, "all done").await;

        let bytes = jobs.content_store().get("job-1").await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!("done", parsed["status"]);
        assert_eq!("all done", parsed["messages"]["0"][0]);

        let reloaded = jobs.find("job-1").await.unwrap().unwrap();
        assert_eq!(JobState::Done, reloaded.status);
    }

    #[tokio::test]
    async fn allocated_identifier_is_fresh() {
        let store = MemoryStore::new();
        let identifier = allocate_identifier(&store).await.unwrap();
        assert_eq!(16, identifier.len());
        assert!(!store.exists(&identifier).await.unwrap());
    }

    struct EverythingExists;

    #[async_trait]
    impl ContentStore for EverythingExists {
        async fn put(&self, _key: &str, _bytes: &[u8]) -> crate::error::Result<()> {
            Ok(())
        }
        async fn get(&self, _key: &str) -> crate::error::Result<Vec<u8>> {
            Ok(vec![])
        }
        async fn exists(&self, _key: &str) -> crate::error::Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn allocation_gives_up_after_bounded_attempts() {
        // Every candidate collides; the allocator must still hand one out.
        let identifier = allocate_identifier(&EverythingExists).await.unwrap();
        assert_eq!(16, identifier.len());
    }
}
