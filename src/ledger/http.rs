use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::{ImportError, Result};

use super::{
    Category, CreateOutcome, GroupTransaction, LedgerAccount, LedgerClient, Posting,
    SubmissionOptions, TransactionGroup, ValidationErrors,
};

/// Ledger API over HTTP with a personal access token.
pub struct HttpLedgerClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpLedgerClient {
    pub fn new(base_url: &str, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn list_accounts(&self, kind: Option<&str>) -> Result<Vec<LedgerAccount>> {
        log::info!("Requesting ledger accounts...");
        let mut accounts = Vec::new();
        let mut page = 1;
        loop {
            let mut request = self
                .http
                .get(self.api_url("accounts"))
                .bearer_auth(&self.token)
                .query(&[("page", page.to_string())]);
            if let Some(kind) = kind {
                request = request.query(&[("type", kind)]);
            }
            let response: Page<AccountData> =
                request.send().await?.error_for_status()?.json().await?;
            accounts.extend(response.data.into_iter().map(|account| LedgerAccount {
                id: account.id,
                name: account.attributes.name,
                iban: account.attributes.iban.unwrap_or_default(),
                currency_code: account.attributes.currency_code.unwrap_or_default(),
            }));
            if page >= response.meta.pagination.total_pages {
                break;
            }
            page += 1;
        }
        log::info!("Requesting ledger accounts...done, found {}", accounts.len());
        Ok(accounts)
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        log::info!("Requesting ledger categories...");
        let mut categories = Vec::new();
        let mut page = 1;
        loop {
            let response: Page<CategoryData> = self
                .http
                .get(self.api_url("categories"))
                .bearer_auth(&self.token)
                .query(&[("page", page.to_string())])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            categories.extend(response.data.into_iter().map(|category| Category {
                id: category.id,
                name: category.attributes.name,
            }));
            if page >= response.meta.pagination.total_pages {
                break;
            }
            page += 1;
        }
        log::info!(
            "Requesting ledger categories...done, found {}",
            categories.len()
        );
        Ok(categories)
    }

    async fn create_transaction(
        &self,
        posting: &Posting,
        options: &SubmissionOptions,
    ) -> Result<CreateOutcome> {
        let response = self
            .http
            .post(self.api_url("transactions"))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "error_if_duplicate_hash": options.error_if_duplicate,
                "apply_rules": options.apply_rules,
                "transactions": [posting],
            }))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let rejection: RejectionResponse = response.json().await?;
            return Ok(CreateOutcome::Invalid(ValidationErrors {
                errors: rejection.errors,
            }));
        }
        let created: GroupResponse = response.error_for_status()?.json().await?;
        Ok(CreateOutcome::Created(TransactionGroup {
            id: created.data.id,
            transactions: created
                .data
                .attributes
                .transactions
                .into_iter()
                .map(|line| GroupTransaction {
                    journal_id: line.transaction_journal_id,
                    description: line.description,
                    currency_code: line.currency_code,
                    amount: line.amount,
                    tags: line.tags,
                })
                .collect(),
        }))
    }

    async fn create_tag(&self, name: &str, date: NaiveDate) -> Result<()> {
        let response = self
            .http
            .post(self.api_url("tags"))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "tag": name,
                "date": date.format("%Y-%m-%d").to_string(),
            }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ImportError::Transport(format!(
                "could not create tag \"{name}\": HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn add_tag_to_group(&self, group: &TransactionGroup, tag: &str) -> Result<()> {
        let transactions: Vec<serde_json::Value> = group
            .transactions
            .iter()
            .map(|line| {
                let mut tags = line.tags.clone();
                tags.push(tag.to_string());
                serde_json::json!({
                    "transaction_journal_id": line.journal_id,
                    "tags": tags,
                })
            })
            .collect();
        self.http
            .put(self.api_url(&format!("transactions/{}", group.id)))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({"transactions": transactions}))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn show_url(&self, group_id: u64) -> String {
        format!("{}/transactions/show/{}", self.base_url, group_id)
    }
}

/// The ledger sends numeric ids as JSON strings in some places and as
/// numbers in others.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdRepr {
        Number(u64),
        Text(String),
    }
    match IdRepr::deserialize(deserializer)? {
        IdRepr::Number(id) => Ok(id),
        IdRepr::Text(text) => text
            .parse()
            .map_err(|_| D::Error::custom(format!("invalid id \"{text}\""))),
    }
}

#[derive(Deserialize)]
struct Page<T> {
    data: Vec<T>,
    #[serde(default)]
    meta: Meta,
}

#[derive(Deserialize, Default)]
struct Meta {
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Deserialize)]
struct Pagination {
    #[serde(default = "one")]
    total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { total_pages: 1 }
    }
}

fn one() -> u32 {
    1
}

#[derive(Deserialize)]
struct AccountData {
    #[serde(deserialize_with = "lenient_id")]
    id: u64,
    attributes: AccountAttributes,
}

#[derive(Deserialize)]
struct AccountAttributes {
    name: String,
    #[serde(default)]
    iban: Option<String>,
    #[serde(default)]
    currency_code: Option<String>,
}

#[derive(Deserialize)]
struct CategoryData {
    #[serde(deserialize_with = "lenient_id")]
    id: u64,
    attributes: CategoryAttributes,
}

#[derive(Deserialize)]
struct CategoryAttributes {
    name: String,
}

#[derive(Deserialize)]
struct GroupResponse {
    data: GroupData,
}

#[derive(Deserialize)]
struct GroupData {
    #[serde(deserialize_with = "lenient_id")]
    id: u64,
    attributes: GroupAttributes,
}

#[derive(Deserialize)]
struct GroupAttributes {
    transactions: Vec<GroupLine>,
}

#[derive(Deserialize)]
struct GroupLine {
    #[serde(deserialize_with = "lenient_id")]
    transaction_journal_id: u64,
    description: String,
    currency_code: String,
    amount: String,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
struct RejectionResponse {
    #[serde(default)]
    errors: std::collections::BTreeMap<String, Vec<String>>,
}
