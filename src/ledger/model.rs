use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::Configuration;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PostingKind {
    Withdrawal,
    Deposit,
}

/// A ledger-shaped transaction ready to submit, derived from one raw
/// transaction. The serde shape is the ledger API's create-transaction body.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    #[serde(rename = "type")]
    pub kind: PostingKind,
    pub date: NaiveDate,
    /// Precise timestamp. Stripped before sending so it cannot defeat the
    /// ledger's duplicate detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<DateTime<Utc>>,
    /// Absolute amount as a string; the posting kind carries the sign.
    pub amount: String,
    pub currency_code: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
}

/// An asset account on the ledger side, as far as matching needs it.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct LedgerAccount {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub iban: String,
    #[serde(default)]
    pub currency_code: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Category {
    pub id: u64,
    pub name: String,
}

/// One journal line of a created transaction group.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct GroupTransaction {
    pub journal_id: u64,
    pub description: String,
    pub currency_code: String,
    pub amount: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A transaction group created on the ledger.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct TransactionGroup {
    pub id: u64,
    pub transactions: Vec<GroupTransaction>,
}

/// Field name → the ledger's validation messages for that field.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct ValidationErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.errors
            .values()
            .flat_map(|messages| messages.iter().map(|message| message.as_str()))
    }
}

/// Outcome of submitting one posting: created, or rejected by validation.
/// Transport failures are errors, validation rejection is not.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(TransactionGroup),
    Invalid(ValidationErrors),
}

/// Per-run submission switches forwarded to the ledger.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionOptions {
    /// Let the ledger reject postings it considers duplicates.
    pub error_if_duplicate: bool,
    /// Run the ledger's own rules on each created transaction.
    pub apply_rules: bool,
}

impl SubmissionOptions {
    pub fn from_configuration(configuration: &Configuration) -> Self {
        Self {
            error_if_duplicate: configuration.ignore_duplicate_transactions,
            apply_rules: configuration.rules,
        }
    }
}
