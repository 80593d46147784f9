use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::cookie::Jar;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use tracing::debug;

use crate::fetch::{Fetch, FetchError};
use crate::models::RawRecord;

/// HTTP client for the portal's transaction endpoint.
///
/// Authentication itself happens outside this crate; whatever performs the
/// login hands its session cookies over via [`HopApiClient::set_session_cookies`].
pub struct HopApiClient {
    http: Client,
    cookies: Arc<Jar>,
    base_url: Url,
}

impl HopApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let http = Client::builder()
            .cookie_provider(cookies.clone())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            cookies,
            base_url: Url::parse(base_url)?,
        })
    }

    /// Installs session cookies obtained by the external login flow.
    pub fn set_session_cookies(&self, cookies: &[(String, String)]) {
        for (name, value) in cookies {
            self.cookies
                .add_cookie_str(&format!("{name}={value}"), &self.base_url);
        }
    }

    /// Probes a card's transaction endpoint to check whether the current
    /// session is still accepted. Any failure counts as invalid.
    pub async fn session_is_valid(&self, card_id: &str) -> bool {
        let Ok(url) = self.transactions_url(card_id) else {
            return false;
        };

        match self.http.get(url).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(error) => {
                debug!("Session probe failed for card [{card_id}]: {error}");
                false
            }
        }
    }

    fn transactions_url(&self, card_id: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(&format!("hop/cards/{card_id}/transactions"))
            .map_err(|error| FetchError::new(card_id, error))
    }
}

impl Fetch for HopApiClient {
    async fn fetch_raw_records(&self, card_id: &str) -> Result<Vec<RawRecord>, FetchError> {
        let url = self.transactions_url(card_id)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| FetchError::new(card_id, error))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(card_id, format!("unexpected status {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|error| FetchError::new(card_id, format!("invalid JSON response: {error}")))?;

        let records = body
            .get("Transactions")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::new(card_id, "response has no Transactions array"))?;

        records
            .iter()
            .map(|entry| {
                entry
                    .as_object()
                    .cloned()
                    .ok_or_else(|| FetchError::new(card_id, "Transactions entry is not an object"))
            })
            .collect()
    }
}
