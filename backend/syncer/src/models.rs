//! Wire shapes returned by the Kanemane backend, and their validation into
//! core values.
//!
//! Nothing here trusts the backend's numbers: every amount is parsed and
//! checked for finiteness before it becomes a [`LineItem`]. Lists arrive as
//! raw JSON values and each record is decoded on its own; records that fail
//! are dropped with a warning so one bad row cannot poison a total.

use chrono::NaiveDate;
use kanemane_core::{
    CoreError, Currency, ExchangeRate, ItemKind, LineItem, SubscriptionStatus, Tier,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

// ─────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────

/// `GET /subscription` wraps its payload in `data`.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct RawSubscription {
    #[serde(default)]
    pub has_subscription: bool,
    #[serde(default)]
    pub current_plan: Option<String>,
}

impl RawSubscription {
    /// An empty plan name counts as no plan.
    pub fn into_status(self) -> SubscriptionStatus {
        let plan = self
            .current_plan
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Tier::from);
        SubscriptionStatus::new(self.has_subscription, plan)
    }
}

#[derive(Debug, Serialize)]
pub struct CheckoutRequest<'a> {
    pub plan: &'a str,
}

// ─────────────────────────────────────────────────────────
// Assets & transactions
// ─────────────────────────────────────────────────────────

/// Both lists are kept as raw values so a malformed record only costs itself.
#[derive(Debug, Default, Deserialize)]
pub struct AssetsResponse {
    #[serde(default)]
    pub personal: Option<Vec<Value>>,
    #[serde(default)]
    pub family: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAsset {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    pub currency: Option<String>,
    #[serde(default)]
    pub balance: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub tx_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub amount: Value,
    pub currency: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

/// The transactions endpoint has shipped both a bare array and a `data` wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TransactionsResponse {
    List(Vec<Value>),
    Wrapped { data: Vec<Value> },
}

impl TransactionsResponse {
    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::List(records) | Self::Wrapped { data: records } => records,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DashboardSummary {
    #[serde(default)]
    pub exchange_rate: Option<Value>,
}

/// Body for `POST /transactions/income` and `/transactions/expense`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub asset_id: u64,
    pub category: String,
    pub amount: f64,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Reports & receipts
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Xlsx,
    Csv,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Csv => "text/csv",
        }
    }
}

/// Query for `GET /reports/export`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub currency: Currency,
    #[serde(default)]
    pub format: ReportFormat,
}

impl ExportParams {
    pub fn validate(&self) -> Result<(), String> {
        if self.start_date > self.end_date {
            return Err(format!(
                "start_date {} is after end_date {}",
                self.start_date, self.end_date
            ));
        }
        Ok(())
    }

    /// `laporan_JPY_20261001_to_20261031.xlsx`
    pub fn file_name(&self) -> String {
        format!(
            "laporan_{}_{}_to_{}.{}",
            self.currency,
            self.start_date.format("%Y%m%d"),
            self.end_date.format("%Y%m%d"),
            self.format.as_str()
        )
    }

    pub fn query(&self) -> [(&'static str, String); 4] {
        [
            ("start_date", self.start_date.to_string()),
            ("end_date", self.end_date.to_string()),
            ("currency", self.currency.as_str().to_string()),
            ("format", self.format.as_str().to_string()),
        ]
    }
}

/// A downloaded report, passed through byte for byte.
#[derive(Debug, Clone)]
pub struct ReportFile {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Image types the receipt scanner accepts.
pub const RECEIPT_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/heic", "image/heif"];

/// File name sent with the multipart `image` field.
pub fn receipt_file_name(content_type: &str) -> &'static str {
    match content_type {
        "image/png" => "receipt.png",
        "image/heic" => "receipt.heic",
        "image/heif" => "receipt.heif",
        _ => "receipt.jpg",
    }
}

// ─────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────

/// Accept JSON numbers and numeric strings (`"1500.00"`); reject anything
/// that does not come out finite.
pub fn parse_amount(id: u64, value: &Value) -> Result<f64, CoreError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed {
        Some(amount) if amount.is_finite() => Ok(amount),
        _ => Err(CoreError::NonFiniteAmount {
            id,
            value: value.to_string(),
        }),
    }
}

fn parse_currency(raw: Option<&str>) -> Result<Currency, CoreError> {
    raw.ok_or_else(|| CoreError::UnknownCurrency("null".to_string()))?
        .parse::<Currency>()
}

pub fn asset_to_item(raw: &RawAsset) -> Result<LineItem, CoreError> {
    Ok(LineItem {
        id: raw.id,
        currency: parse_currency(raw.currency.as_deref())?,
        amount: parse_amount(raw.id, &raw.balance)?,
        kind: ItemKind::Balance,
        label: raw.name.clone().unwrap_or_default(),
        date: None,
    })
}

/// Anything not explicitly `"income"` is an expense.
pub fn transaction_to_item(raw: &RawTransaction) -> Result<LineItem, CoreError> {
    let is_income = raw
        .tx_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("income"));
    let kind = if is_income {
        ItemKind::Income
    } else {
        ItemKind::Expense
    };
    Ok(LineItem {
        id: raw.id,
        currency: parse_currency(raw.currency.as_deref())?,
        amount: parse_amount(raw.id, &raw.amount)?,
        kind,
        label: raw.category.clone().unwrap_or_default(),
        date: raw.date.as_deref().and_then(parse_date),
    })
}

/// Decode one record, then validate it. Either step failing drops the record.
fn decode_record<R, F>(what: &str, value: &Value, validate: F) -> Option<LineItem>
where
    R: DeserializeOwned,
    F: Fn(&R) -> Result<LineItem, CoreError>,
{
    let id = value.get("id").map(Value::to_string).unwrap_or_else(|| "?".to_string());
    let raw = match R::deserialize(value) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Dropping {what} {id}: malformed record: {e}");
            return None;
        }
    };
    match validate(&raw) {
        Ok(item) => Some(item),
        Err(e) => {
            warn!("Dropping {what} {id}: {e}");
            None
        }
    }
}

/// Merge personal and family assets into one validated list.
pub fn decode_assets(response: &AssetsResponse) -> Vec<LineItem> {
    let personal = response.personal.iter().flatten();
    let family = response.family.iter().flatten();
    personal
        .chain(family)
        .filter_map(|value| decode_record("asset", value, asset_to_item))
        .collect()
}

pub fn decode_transactions(records: &[Value]) -> Vec<LineItem> {
    records
        .iter()
        .filter_map(|value| decode_record("transaction", value, transaction_to_item))
        .collect()
}

/// Rate from the dashboard summary; the fallback applies only when the field
/// is missing or null.
pub fn exchange_rate(summary: &DashboardSummary) -> Result<ExchangeRate, CoreError> {
    let reported = match &summary.exchange_rate {
        None | Some(Value::Null) => None,
        Some(value) => Some(match value {
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }),
    };
    ExchangeRate::from_reported(reported)
}

/// Dates arrive as `YYYY-MM-DD` or a full ISO-8601 timestamp.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let day = s.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
