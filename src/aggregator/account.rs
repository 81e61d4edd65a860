use serde::{Deserialize, Serialize};

/// One account behind a bank connection, with the details needed for
/// matching against ledger accounts.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct AggregatorAccount {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub iban: String,
    #[serde(default)]
    pub currency: String,
}

#[derive(Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Bank {
    pub id: String,
    pub name: String,
}
