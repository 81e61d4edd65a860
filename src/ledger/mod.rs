mod client;
mod http;
mod model;

pub use client::LedgerClient;
pub use http::HttpLedgerClient;
pub use model::{
    Category, CreateOutcome, GroupTransaction, LedgerAccount, Posting, PostingKind,
    SubmissionOptions, TransactionGroup, ValidationErrors,
};
