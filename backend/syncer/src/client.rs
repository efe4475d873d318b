//! Kanemane backend client.
//!
//! ## Resilience
//!
//! * Reads ([`Delivery::Retry`]) are retried on transport errors and
//!   `429 Too Many Requests` with exponential back-off, at most
//!   [`MAX_ATTEMPTS`] times in total.
//! * Mutations ([`Delivery::Once`]) go out exactly once. A timed-out POST may
//!   still have been handled, so repeating it could record an expense twice.
//! * Any other non-2xx response is returned as [`SyncError::Api`] straight
//!   away. What to do about a failure is the caller's decision.

use std::time::Duration;

use kanemane_core::{Currency, ItemKind, LineItem, SubscriptionStatus, Tier};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{Result, SyncError};
use crate::models::{
    self, AssetsResponse, CheckoutRequest, DashboardSummary, Envelope, ExportParams,
    NewTransaction, RawSubscription, ReportFile, TransactionsResponse,
};

const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF_SECS: u64 = 2;
const MAX_BACKOFF_SECS: u64 = 60;

/// Whether a request may be sent again after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Retry,
    Once,
}

#[derive(Clone)]
pub struct BackendClient {
    http: Client,
    base_url: String,
    token: String,
    initial_backoff: Duration,
}

impl BackendClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            initial_backoff: Duration::from_secs(INITIAL_BACKOFF_SECS),
        }
    }

    /// Override the first retry delay. Later delays still double.
    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ─────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────

    /// `GET /subscription`
    pub async fn subscription_status(&self) -> Result<SubscriptionStatus> {
        let url = self.url("/subscription");
        let body: Envelope<RawSubscription> = self.get_json(|c| c.get(&url)).await?;
        Ok(body.data.into_status())
    }

    /// `GET /assets`, personal and family merged.
    pub async fn assets(&self) -> Result<Vec<LineItem>> {
        let url = self.url("/assets");
        let body: AssetsResponse = self.get_json(|c| c.get(&url)).await?;
        let items = models::decode_assets(&body);
        debug!("Fetched {} assets", items.len());
        Ok(items)
    }

    /// `GET /transactions`
    pub async fn transactions(&self) -> Result<Vec<LineItem>> {
        let url = self.url("/transactions");
        let body: TransactionsResponse = self.get_json(|c| c.get(&url)).await?;
        let items = models::decode_transactions(&body.into_records());
        debug!("Fetched {} transactions", items.len());
        Ok(items)
    }

    /// `GET /dashboard/summary?currency=..`
    pub async fn dashboard_summary(&self, currency: Currency) -> Result<DashboardSummary> {
        let url = self.url("/dashboard/summary");
        self.get_json(|c| c.get(&url).query(&[("currency", currency.as_str())]))
            .await
    }

    /// `GET /subscription/plans`, passed through untouched.
    pub async fn plans(&self) -> Result<Value> {
        let url = self.url("/subscription/plans");
        let body: Envelope<Value> = self.get_json(|c| c.get(&url)).await?;
        Ok(body.data)
    }

    /// `GET /subscription/status/{order_id}`
    pub async fn payment_status(&self, order_id: &str) -> Result<Value> {
        let order_id = order_id.trim();
        if order_id.is_empty() || order_id.contains('/') {
            return Err(SyncError::InvalidRequest(format!(
                "invalid order id {order_id:?}"
            )));
        }
        let url = self.url(&format!("/subscription/status/{order_id}"));
        let body: Envelope<Value> = self.get_json(|c| c.get(&url)).await?;
        Ok(body.data)
    }

    /// `GET /reports/export`. The file comes back as raw bytes.
    pub async fn export_report(&self, params: &ExportParams) -> Result<ReportFile> {
        params.validate().map_err(SyncError::InvalidRequest)?;
        let url = self.url("/reports/export");
        let query = params.query();
        let response = self
            .execute(Delivery::Retry, |c| c.get(&url).query(&query))
            .await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| params.format.content_type().to_string());
        let bytes = response.bytes().await?.to_vec();
        info!("Exported report {} ({} bytes)", params.file_name(), bytes.len());
        Ok(ReportFile {
            content_type,
            bytes,
        })
    }

    // ─────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────

    /// `POST /subscription/checkout`. Returns the backend's checkout payload
    /// (payment URL, order id) untouched.
    pub async fn checkout(&self, plan: Tier) -> Result<Value> {
        if plan == Tier::Unknown {
            return Err(SyncError::InvalidRequest(
                "cannot check out an unknown plan".to_string(),
            ));
        }
        let url = self.url("/subscription/checkout");
        let request = CheckoutRequest {
            plan: plan.as_str(),
        };
        let body: Envelope<Value> = self.send_json(|c| c.post(&url).json(&request)).await?;
        Ok(body.data)
    }

    /// `POST /subscription/cancel`
    pub async fn cancel_subscription(&self) -> Result<()> {
        let url = self.url("/subscription/cancel");
        self.execute(Delivery::Once, |c| c.post(&url)).await?;
        Ok(())
    }

    /// `POST /transactions/income` or `/transactions/expense`.
    pub async fn create_transaction(&self, kind: ItemKind, tx: &NewTransaction) -> Result<Value> {
        let path = transaction_path(kind).ok_or_else(|| {
            SyncError::InvalidRequest("balances cannot be recorded as transactions".to_string())
        })?;
        let url = self.url(path);
        self.send_json(|c| c.post(&url).json(tx)).await
    }

    /// `POST /ai/scan-receipt` with the image as the multipart `image` field.
    pub async fn scan_receipt(&self, image: Vec<u8>, content_type: &str) -> Result<Value> {
        if !models::RECEIPT_CONTENT_TYPES.contains(&content_type) {
            return Err(SyncError::InvalidRequest(format!(
                "unsupported image type {content_type:?}"
            )));
        }
        if image.is_empty() {
            return Err(SyncError::InvalidRequest("empty image".to_string()));
        }
        let url = self.url("/ai/scan-receipt");
        let file_name = models::receipt_file_name(content_type);
        self.send_json(|c| {
            let part = Part::bytes(image.clone()).file_name(file_name);
            let part = match part.mime_str(content_type) {
                Ok(part) => part,
                Err(_) => Part::bytes(image.clone()).file_name(file_name),
            };
            c.post(&url).multipart(Form::new().part("image", part))
        })
        .await
    }

    // ─────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────

    async fn get_json<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.execute(Delivery::Retry, build).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_json<T, F>(&self, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn(&Client) -> RequestBuilder,
    {
        let response = self.execute(Delivery::Once, build).await?;
        Ok(response.json::<T>().await?)
    }

    async fn execute<F>(&self, delivery: Delivery, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let max_attempts = match delivery {
            Delivery::Retry => MAX_ATTEMPTS,
            Delivery::Once => 1,
        };
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let response = build(&self.http)
                .bearer_auth(&self.token)
                .header(ACCEPT, "application/json")
                .send()
                .await;

            match response {
                Err(e) if attempt < max_attempts => {
                    warn!("Backend request failed (attempt {attempt}, retry in {backoff:?}): {e}");
                }
                Err(e) => return Err(e.into()),
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS && attempt < max_attempts => {
                    warn!("Rate-limited by backend (attempt {attempt}, retry in {backoff:?})");
                }
                Ok(resp) if !resp.status().is_success() => {
                    let status = resp.status().as_u16();
                    let text = resp.text().await.unwrap_or_default();
                    return Err(SyncError::Api {
                        status,
                        message: error_message(&text),
                    });
                }
                Ok(resp) => return Ok(resp),
            }

            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_secs(MAX_BACKOFF_SECS));
            attempt += 1;
        }
    }
}

fn transaction_path(kind: ItemKind) -> Option<&'static str> {
    match kind {
        ItemKind::Income => Some("/transactions/income"),
        ItemKind::Expense => Some("/transactions/expense"),
        ItemKind::Balance => None,
    }
}

/// Prefer the backend's `message` field; fall back to the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.chars().take(200).collect())
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
