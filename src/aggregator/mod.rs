mod account;
mod client;
mod http;
mod token;
mod transaction;

pub use account::{AggregatorAccount, Bank};
pub use client::AggregatorClient;
pub use http::HttpAggregatorClient;
pub use token::{TokenManager, TokenSet, TokenSource};
pub use transaction::{DebtorAccount, RawTransaction, TransactionAmount};

#[cfg(test)]
pub(crate) use transaction::test_transaction;
