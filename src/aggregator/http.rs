use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::Result;

use super::transaction::{DebtorAccount, TransactionAmount};
use super::{
    AggregatorAccount, AggregatorClient, Bank, RawTransaction, TokenManager, TokenSet, TokenSource,
};

/// The aggregator's token endpoints, used by the token manager.
struct TokenEndpoint {
    http: reqwest::Client,
    base_url: String,
    secret_id: String,
    secret_key: String,
}

#[async_trait]
impl TokenSource for TokenEndpoint {
    async fn new_token_set(&self) -> Result<TokenSet> {
        log::info!("Requesting new token set...");
        let response: TokenResponse = self
            .http
            .post(format!("{}/token/new/", self.base_url))
            .json(&serde_json::json!({
                "secret_id": self.secret_id,
                "secret_key": self.secret_key,
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let now = Utc::now();
        Ok(TokenSet {
            access: response.access,
            refresh: response.refresh,
            access_expires_at: now + Duration::seconds(response.access_expires),
            refresh_expires_at: now + Duration::seconds(response.refresh_expires),
        })
    }

    async fn refreshed_token_set(&self, previous: &TokenSet) -> Result<TokenSet> {
        log::info!("Refreshing access token...");
        let response: RefreshResponse = self
            .http
            .post(format!("{}/token/refresh/", self.base_url))
            .json(&serde_json::json!({"refresh": previous.refresh}))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(TokenSet {
            access: response.access,
            refresh: previous.refresh.clone(),
            access_expires_at: Utc::now() + Duration::seconds(response.access_expires),
            refresh_expires_at: previous.refresh_expires_at,
        })
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access: String,
    access_expires: i64,
    refresh: String,
    refresh_expires: i64,
}

#[derive(Deserialize)]
struct RefreshResponse {
    access: String,
    access_expires: i64,
}

/// Aggregator API over HTTP with bearer-token auth.
pub struct HttpAggregatorClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenManager,
}

impl HttpAggregatorClient {
    pub fn new(base_url: &str, secret_id: String, secret_key: String) -> Self {
        let http = reqwest::Client::new();
        let base_url = base_url.trim_end_matches('/').to_string();
        let tokens = TokenManager::new(Box::new(TokenEndpoint {
            http: http.clone(),
            base_url: base_url.clone(),
            secret_id,
            secret_key,
        }));
        Self {
            http,
            base_url,
            tokens,
        }
    }

    async fn account_details(&self, token: &str, account_id: &str) -> Result<AggregatorAccount> {
        let response: AccountDetailsResponse = self
            .http
            .get(format!("{}/accounts/{}/details/", self.base_url, account_id))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(AggregatorAccount {
            id: account_id.to_string(),
            name: response.account.name.unwrap_or_default(),
            iban: response.account.iban.unwrap_or_default(),
            currency: response.account.currency.unwrap_or_default(),
        })
    }
}

#[async_trait]
impl AggregatorClient for HttpAggregatorClient {
    async fn list_banks(&self, country: &str) -> Result<Vec<Bank>> {
        log::info!("Requesting banks for country \"{country}\"...");
        let token = self.access_token().await?;
        let banks: Vec<Bank> = self
            .http
            .get(format!("{}/institutions/", self.base_url))
            .query(&[("country", country)])
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        log::info!("Requesting banks...done, found {}", banks.len());
        Ok(banks)
    }

    async fn list_accounts(
        &self,
        requisition_reference: &str,
    ) -> Result<Vec<AggregatorAccount>> {
        log::info!("Requesting accounts for requisition \"{requisition_reference}\"...");
        let token = self.access_token().await?;
        let requisition: RequisitionResponse = self
            .http
            .get(format!(
                "{}/requisitions/{}/",
                self.base_url, requisition_reference
            ))
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let mut accounts = Vec::with_capacity(requisition.accounts.len());
        for account_id in &requisition.accounts {
            accounts.push(self.account_details(&token, account_id).await?);
        }
        log::info!("Requesting accounts...done, found {}", accounts.len());
        Ok(accounts)
    }

    async fn transactions(&self, account_id: &str) -> Result<Vec<RawTransaction>> {
        log::info!("Requesting transactions for account \"{account_id}\"...");
        let token = self.access_token().await?;
        let response: TransactionsResponse = self
            .http
            .get(format!(
                "{}/accounts/{}/transactions/",
                self.base_url, account_id
            ))
            .bearer_auth(&token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let transactions: Vec<RawTransaction> = response
            .transactions
            .booked
            .into_iter()
            .map(WireTransaction::into_raw)
            .collect();
        log::info!(
            "Requesting transactions...done, found {}",
            transactions.len()
        );
        Ok(transactions)
    }

    async fn access_token(&self) -> Result<String> {
        self.tokens.access_token().await
    }
}

#[derive(Deserialize)]
struct RequisitionResponse {
    accounts: Vec<String>,
}

#[derive(Deserialize)]
struct AccountDetailsResponse {
    account: AccountDetails,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct AccountDetails {
    name: Option<String>,
    iban: Option<String>,
    currency: Option<String>,
}

#[derive(Deserialize)]
struct TransactionsResponse {
    transactions: BookedTransactions,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct BookedTransactions {
    booked: Vec<WireTransaction>,
}

/// The aggregator's own transaction shape (camelCase, everything optional).
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireTransaction {
    additional_information: String,
    additional_information_structured: String,
    balance_after_transaction: String,
    bank_transaction_code: String,
    booking_date: Option<NaiveDate>,
    check_id: String,
    creditor_account: String,
    creditor_agent: String,
    creditor_id: String,
    creditor_name: String,
    currency_exchange: String,
    debtor_agent: String,
    debtor_name: String,
    entry_reference: String,
    key: String,
    mandate_id: String,
    proprietary_bank: String,
    purpose_code: String,
    remittance_information_structured: String,
    remittance_information_structured_array: String,
    remittance_information_unstructured: String,
    remittance_information_unstructured_array: String,
    transaction_id: String,
    ultimate_creditor: String,
    ultimate_debtor: String,
    value_date: Option<NaiveDate>,
    debtor_account: WireDebtorAccount,
    transaction_amount: WireAmount,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireDebtorAccount {
    iban: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct WireAmount {
    amount: String,
    currency: String,
}

impl WireTransaction {
    fn into_raw(self) -> RawTransaction {
        // Some banks omit one of the two dates; fall back to the other.
        let booking_date = self
            .booking_date
            .or(self.value_date)
            .unwrap_or_else(|| Utc::now().date_naive());
        let value_date = self.value_date.unwrap_or(booking_date);
        RawTransaction {
            additional_information: self.additional_information,
            additional_information_structured: self.additional_information_structured,
            balance_after_transaction: self.balance_after_transaction,
            bank_transaction_code: self.bank_transaction_code,
            booking_date,
            check_id: self.check_id,
            creditor_account: self.creditor_account,
            creditor_agent: self.creditor_agent,
            creditor_id: self.creditor_id,
            creditor_name: self.creditor_name,
            currency_exchange: self.currency_exchange,
            debtor_agent: self.debtor_agent,
            debtor_name: self.debtor_name,
            entry_reference: self.entry_reference,
            key: self.key,
            mandate_id: self.mandate_id,
            proprietary_bank: self.proprietary_bank,
            purpose_code: self.purpose_code,
            remittance_information_structured: self.remittance_information_structured,
            remittance_information_structured_array: self.remittance_information_structured_array,
            remittance_information_unstructured: self.remittance_information_unstructured,
            remittance_information_unstructured_array: self
                .remittance_information_unstructured_array,
            transaction_id: self.transaction_id,
            ultimate_creditor: self.ultimate_creditor,
            ultimate_debtor: self.ultimate_debtor,
            value_date,
            account_identifier: String::new(),
            debtor_account: DebtorAccount {
                iban: self.debtor_account.iban,
            },
            transaction_amount: TransactionAmount {
                amount: self.transaction_amount.amount,
                currency: self.transaction_amount.currency,
            },
        }
    }
}
