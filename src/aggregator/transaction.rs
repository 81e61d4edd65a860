use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One transaction as downloaded from the aggregator.
///
/// This is also the serde shape of the persisted download artifact, so the
/// field names below are a storage contract. Immutable once downloaded.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct RawTransaction {
    #[serde(default)]
    pub additional_information: String,
    #[serde(default)]
    pub additional_information_structured: String,
    #[serde(default)]
    pub balance_after_transaction: String,
    #[serde(default)]
    pub bank_transaction_code: String,
    pub booking_date: NaiveDate,
    #[serde(default)]
    pub check_id: String,
    #[serde(default)]
    pub creditor_account: String,
    #[serde(default)]
    pub creditor_agent: String,
    #[serde(default)]
    pub creditor_id: String,
    #[serde(default)]
    pub creditor_name: String,
    #[serde(default)]
    pub currency_exchange: String,
    #[serde(default)]
    pub debtor_agent: String,
    #[serde(default)]
    pub debtor_name: String,
    #[serde(default)]
    pub entry_reference: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub mandate_id: String,
    #[serde(default)]
    pub proprietary_bank: String,
    #[serde(default)]
    pub purpose_code: String,
    #[serde(default)]
    pub remittance_information_structured: String,
    #[serde(default)]
    pub remittance_information_structured_array: String,
    #[serde(default)]
    pub remittance_information_unstructured: String,
    #[serde(default)]
    pub remittance_information_unstructured_array: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub ultimate_creditor: String,
    #[serde(default)]
    pub ultimate_debtor: String,
    pub value_date: NaiveDate,
    /// The aggregator account this transaction belongs to, stamped at
    /// download time.
    #[serde(default)]
    pub account_identifier: String,
    #[serde(default)]
    pub debtor_account: DebtorAccount,
    pub transaction_amount: TransactionAmount,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct DebtorAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iban: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct TransactionAmount {
    pub amount: String,
    pub currency: String,
}

impl RawTransaction {
    /// Transaction description: the unstructured remittance text, or empty.
    pub fn description(&self) -> &str {
        &self.remittance_information_unstructured
    }

    /// Name of the destination counterparty, if the bank provided one.
    pub fn destination_name(&self) -> Option<&str> {
        if !self.debtor_name.is_empty() {
            return Some(&self.debtor_name);
        }
        log::warn!(
            "Transaction \"{}\" has no destination account information.",
            self.transaction_id
        );
        None
    }

    /// Name of the source counterparty, if the bank provided one.
    pub fn source_name(&self) -> Option<&str> {
        if !self.creditor_name.is_empty() {
            return Some(&self.creditor_name);
        }
        log::warn!(
            "Transaction \"{}\" has no source account information.",
            self.transaction_id
        );
        None
    }

    /// Signed amount, or None when the bank sent something unparseable.
    pub fn amount(&self) -> Option<Decimal> {
        Decimal::from_str(&self.transaction_amount.amount).ok()
    }
}

#[cfg(test)]
pub(crate) fn test_transaction(id: &str, value_date: &str, amount: &str) -> RawTransaction {
    let date = NaiveDate::parse_from_str(value_date, "%Y-%m-%d").unwrap();
    RawTransaction {
        additional_information: String::new(),
        additional_information_structured: String::new(),
        balance_after_transaction: String::new(),
        bank_transaction_code: String::new(),
        booking_date: date,
        check_id: String::new(),
        creditor_account: String::new(),
        creditor_agent: String::new(),
        creditor_id: String::new(),
        creditor_name: String::new(),
        currency_exchange: String::new(),
        debtor_agent: String::new(),
        debtor_name: String::new(),
        entry_reference: String::new(),
        key: String::new(),
        mandate_id: String::new(),
        proprietary_bank: String::new(),
        purpose_code: String::new(),
        remittance_information_structured: String::new(),
        remittance_information_structured_array: String::new(),
        remittance_information_unstructured: String::new(),
        remittance_information_unstructured_array: String::new(),
        transaction_id: id.to_string(),
        ultimate_creditor: String::new(),
        ultimate_debtor: String::new(),
        value_date: date,
        account_identifier: String::new(),
        debtor_account: DebtorAccount::default(),
        transaction_amount: TransactionAmount {
            amount: amount.to_string(),
            currency: "EUR".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_round_trip_is_field_for_field_identical() {
        let mut transaction = test_transaction("tx-1", "2024-01-10", "-12.34");
        transaction.debtor_name = "Some Shop".to_string();
        transaction.remittance_information_unstructured = "Groceries".to_string();
        transaction.debtor_account = DebtorAccount {
            iban: Some("NL00BANK0123456789".to_string()),
        };
        transaction.account_identifier = "acct-1".to_string();

        let json = serde_json::to_vec(&transaction).unwrap();
        let reloaded: RawTransaction = serde_json::from_slice(&json).unwrap();
        assert_eq!(transaction, reloaded);
    }

    #[test]
    fn missing_optional_fields_default_to_empty() {
        let json = r#"{
            "booking_date": "2024-01-09",
            "value_date": "2024-01-10",
            "transaction_amount": {"amount": "5.00", "currency": "EUR"}
        }"#;
        let transaction: RawTransaction = serde_json::from_str(json).unwrap();
        assert_eq!("", transaction.creditor_name);
        assert_eq!(None, transaction.debtor_account.iban);
        assert_eq!("", transaction.account_identifier);
    }

    #[test]
    fn description_falls_back_to_empty() {
        let mut transaction = test_transaction("tx-1", "2024-01-10", "1.00");
        assert_eq!("", transaction.description());
        transaction.remittance_information_unstructured = "Rent".to_string();
        assert_eq!("Rent", transaction.description());
    }

    #[test]
    fn counterparty_names_require_non_empty_values() {
        let mut transaction = test_transaction("tx-1", "2024-01-10", "1.00");
        assert_eq!(None, transaction.destination_name());
        assert_eq!(None, transaction.source_name());

        transaction.debtor_name = "Debtor".to_string();
        transaction.creditor_name = "Creditor".to_string();
        assert_eq!(Some("Debtor"), transaction.destination_name());
        assert_eq!(Some("Creditor"), transaction.source_name());
    }

    #[test]
    fn amount_parses_signed_decimals() {
        let transaction = test_transaction("tx-1", "2024-01-10", "-12.34");
        assert_eq!(Decimal::from_str("-12.34").ok(), transaction.amount());
        let transaction = test_transaction("tx-2", "2024-01-10", "not a number");
        assert_eq!(None, transaction.amount());
    }
}
