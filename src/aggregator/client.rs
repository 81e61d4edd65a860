use async_trait::async_trait;

use crate::error::Result;

use super::{AggregatorAccount, Bank, RawTransaction};

/// The aggregator API as the pipelines consume it.
#[async_trait]
pub trait AggregatorClient: Send + Sync {
    /// Banks available in a country.
    async fn list_banks(&self, country: &str) -> Result<Vec<Bank>>;

    /// Accounts behind a bank-connection (requisition) reference.
    async fn list_accounts(&self, requisition_reference: &str)
        -> Result<Vec<AggregatorAccount>>;

    /// Booked transactions for one account.
    async fn transactions(&self, account_id: &str) -> Result<Vec<RawTransaction>>;

    /// A currently valid bearer token. Fails with an auth error when no
    /// token can be obtained.
    async fn access_token(&self) -> Result<String>;
}
