use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{ImportError, Result};

/// A bearer token pair with its expiry instants. Cached in memory only.
#[derive(Debug, Clone)]
pub struct TokenSet {
    pub access: String,
    pub refresh: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenSet {
    fn access_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.access_expires_at
    }

    fn refresh_valid(&self, now: DateTime<Utc>) -> bool {
        now < self.refresh_expires_at
    }
}

/// Where token sets come from: the aggregator's token endpoints.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn new_token_set(&self) -> Result<TokenSet>;
    async fn refreshed_token_set(&self, previous: &TokenSet) -> Result<TokenSet>;
}

/// Caches the aggregator bearer token and refreshes it when it expires.
///
/// The cached access token is reused while valid; an expired access token is
/// refreshed while the refresh token is still valid, and a full new set is
/// requested otherwise. All failures surface as auth errors.
pub struct TokenManager {
    source: Box<dyn TokenSource>,
    cached: Mutex<Option<TokenSet>>,
}

impl TokenManager {
    pub fn new(source: Box<dyn TokenSource>) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    pub async fn access_token(&self) -> Result<String> {
        let now = Utc::now();
        let mut cached = self.cached.lock().await;
        if let Some(set) = cached.as_ref() {
            if set.access_valid(now) {
                log::debug!("Access token is still valid.");
                return Ok(set.access.clone());
            }
        }
        let renewed = match cached.as_ref() {
            Some(set) if set.refresh_valid(now) => {
                log::debug!("Access token expired, refreshing.");
                self.source.refreshed_token_set(set).await
            }
            _ => {
                log::debug!("No usable token, requesting a new token set.");
                self.source.new_token_set().await
            }
        };
        let set = renewed.map_err(|err| ImportError::Auth(err.to_string()))?;
        let access = set.access.clone();
        *cached = Some(set);
        Ok(access)
    }
}
