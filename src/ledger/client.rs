use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;

use super::{Category, CreateOutcome, LedgerAccount, Posting, SubmissionOptions, TransactionGroup};

/// The ledger API as the pipelines consume it.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Accounts, optionally restricted to one type (e.g. `asset`).
    async fn list_accounts(&self, kind: Option<&str>) -> Result<Vec<LedgerAccount>>;

    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Submits one posting. Validation rejection is a regular outcome;
    /// transport failures are errors.
    async fn create_transaction(
        &self,
        posting: &Posting,
        options: &SubmissionOptions,
    ) -> Result<CreateOutcome>;

    async fn create_tag(&self, name: &str, date: NaiveDate) -> Result<()>;

    /// Attaches `tag` to every journal line of a created group.
    async fn add_tag_to_group(&self, group: &TransactionGroup, tag: &str) -> Result<()>;

    /// Link to the created group, for user-facing messages.
    fn show_url(&self, group_id: u64) -> String {
        format!("/transactions/show/{group_id}")
    }
}
