//! Error types for the Kanemane core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// The JPY→IDR rate was zero, negative or not a finite number.
    #[error("Invalid exchange rate: {0} (must be a positive, finite number)")]
    InvalidExchangeRate(f64),

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    /// A backend record carried an amount that is not a finite number.
    #[error("Record {id} has a non-finite amount: {value}")]
    NonFiniteAmount { id: u64, value: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
