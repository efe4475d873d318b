//! # Types
//!
//! Value objects shared by the entitlement gate and the aggregator.
//!
//! ## Subscription status
//!
//! A [`SubscriptionStatus`] is fetched from the backend and treated as an
//! immutable value: a refresh replaces it wholesale. A plan is active only when
//! `has_subscription` is set *and* a [`Tier`] is present.
//!
//! ## Money
//!
//! Amounts are `f64`, matching the JSON numbers the backend emits. Two
//! [`MoneyAmount`]s are only additive when their currencies match; anything
//! else goes through an [`ExchangeRate`], which can only be built from a
//! positive, finite rate.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{CoreError, Result};

/// Rate used when the backend does not report one: 1 JPY = 107 IDR.
pub const FALLBACK_JPY_TO_IDR: f64 = 107.0;

// ─────────────────────────────────────────────────────────
// Subscription
// ─────────────────────────────────────────────────────────

/// Subscription level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Pro,
    /// Any plan name this client does not know yet. Grants nothing.
    #[serde(other)]
    Unknown,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Pro => "pro",
            Tier::Unknown => "unknown",
        }
    }
}

impl From<&str> for Tier {
    /// Plan names are matched case-insensitively; anything unrecognised is
    /// [`Tier::Unknown`].
    fn from(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "basic" => Tier::Basic,
            "pro" => Tier::Pro,
            _ => Tier::Unknown,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription state as reported by `GET /subscription`.
///
/// `Default` is the fail-closed value used whenever the real status could
/// not be obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    pub has_subscription: bool,
    #[serde(default)]
    pub current_plan: Option<Tier>,
}

impl SubscriptionStatus {
    pub fn new(has_subscription: bool, current_plan: Option<Tier>) -> Self {
        Self {
            has_subscription,
            current_plan,
        }
    }

    /// No subscription, no plan. Denies every feature and every gated route.
    pub fn fail_closed() -> Self {
        Self::default()
    }
}

/// A gated capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKey {
    Export,
    Scan,
    Whatsapp,
}

impl FeatureKey {
    pub const ALL: [FeatureKey; 3] = [FeatureKey::Export, FeatureKey::Scan, FeatureKey::Whatsapp];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKey::Export => "export",
            FeatureKey::Scan => "scan",
            FeatureKey::Whatsapp => "whatsapp",
        }
    }

    /// Name shown to the user in upgrade prompts.
    pub fn label(&self) -> &'static str {
        match self {
            FeatureKey::Export => "Laporan Keuangan",
            FeatureKey::Scan => "Scan Resi",
            FeatureKey::Whatsapp => "Integrasi WhatsApp",
        }
    }
}

impl FromStr for FeatureKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "export" => Ok(FeatureKey::Export),
            "scan" => Ok(FeatureKey::Scan),
            "whatsapp" => Ok(FeatureKey::Whatsapp),
            _ => Err(CoreError::UnknownFeature(s.to_string())),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────
// Money
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Jpy,
    Idr,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Jpy => "JPY",
            Currency::Idr => "IDR",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Jpy => "¥",
            Currency::Idr => "Rp",
        }
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "JPY" => Ok(Currency::Jpy),
            "IDR" => Ok(Currency::Idr),
            _ => Err(CoreError::UnknownCurrency(s.to_string())),
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MoneyAmount {
    pub value: f64,
    pub currency: Currency,
}

impl MoneyAmount {
    pub fn new(value: f64, currency: Currency) -> Self {
        Self { value, currency }
    }
}

/// JPY→IDR conversion factor: 1 JPY = `rate` IDR.
///
/// The rate is always positive and finite; there is no way to construct
/// one that is not.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExchangeRate {
    rate: f64,
}

impl ExchangeRate {
    pub fn new(rate: f64) -> Result<Self> {
        if rate.is_finite() && rate > 0.0 {
            Ok(Self { rate })
        } else {
            Err(CoreError::InvalidExchangeRate(rate))
        }
    }

    pub fn fallback() -> Self {
        Self {
            rate: FALLBACK_JPY_TO_IDR,
        }
    }

    /// Use the backend-reported rate, or the fallback when none was reported.
    ///
    /// A rate that *was* reported but is unusable is an error, not a fallback.
    pub fn from_reported(reported: Option<f64>) -> Result<Self> {
        match reported {
            Some(rate) => Self::new(rate),
            None => Ok(Self::fallback()),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn base(&self) -> Currency {
        Currency::Jpy
    }

    pub fn quote(&self) -> Currency {
        Currency::Idr
    }
}

impl Default for ExchangeRate {
    fn default() -> Self {
        Self::fallback()
    }
}

// ─────────────────────────────────────────────────────────
// Line items
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Income,
    Expense,
    /// An asset balance.
    Balance,
}

/// Snapshot of an asset balance or a transaction amount.
///
/// Owned by the backend; the core only ever reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: u64,
    pub currency: Currency,
    pub amount: f64,
    pub kind: ItemKind,
    /// Asset name or transaction category.
    pub label: String,
    pub date: Option<NaiveDate>,
}

impl LineItem {
    pub fn money(&self) -> MoneyAmount {
        MoneyAmount::new(self.amount, self.currency)
    }
}
