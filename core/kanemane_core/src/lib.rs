//! # Kanemane Core
//!
//! Client-side decision logic for the Kanemane personal finance tracker.
//! Two independent, pure components:
//!
//! | Component      | Module          | Entry points                                        |
//! |----------------|-----------------|-----------------------------------------------------|
//! | Entitlements   | [`entitlement`] | `has_active_plan`, `can_access_feature`, `route_decision` |
//! | Aggregation    | [`aggregate`]   | `convert`, `grand_total`, `filter_by_currency`, `split_by_kind`, `expense_ratio`, `remaining` |
//!
//! Neither performs I/O or holds mutable state. Callers fetch snapshots from
//! the backend, validate them into [`types`] values, and pass them in.

pub mod aggregate;
pub mod entitlement;
pub mod errors;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_entitlement;

pub use errors::{CoreError, Result};
pub use types::{
    Currency, ExchangeRate, FeatureKey, ItemKind, LineItem, MoneyAmount, SubscriptionStatus, Tier,
    FALLBACK_JPY_TO_IDR,
};
