//! Error types shared by adapters and the market-data core
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// A single field of a decoded message could not be used.
///
/// Field errors are never fatal for the message they came from: the
/// offending field is dropped and the remaining fields still apply.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Invalid decimal in field {field}: {value:?}")]
    InvalidDecimal { field: &'static str, value: String },

    #[error("Invalid side in field {field}: {value:?}")]
    InvalidSide { field: &'static str, value: String },

    #[error("Invalid integer id in field {field}: {value:?}")]
    InvalidId { field: &'static str, value: String },
}

/// A level update cannot be resolved to a book entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LevelError {
    #[error("Level update has no price; cannot derive a synthetic id")]
    MissingPrice,

    #[error("Level update has no side and a zero or missing size; cannot infer side")]
    MissingSide,

    #[error("Level update has no exchange id on a native-id feed")]
    MissingExchangeId,
}
