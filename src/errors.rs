//! Error types for the multiplier and the environment value converter

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("Failed to spawn thread: {0}")]
    Spawn(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Metrics registry error: {0}")]
    Metrics(String),
}

pub type PoolResult<T> = Result<T, PoolError>;

/// Failure to convert a raw environment value into a typed value.
///
/// The offending input is always part of the message; when an underlying
/// parser rejected it, that parser's error is kept as the source.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Can't convert value '{value}' to integer")]
    Integer {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("Can't convert value '{value}' as time duration: {reason}")]
    Duration { value: String, reason: String },

    #[error("Can't convert value '{value}' as RFC3339 time")]
    Rfc3339Time {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Can't convert value '{value}' with separator '{separator}' to slice of strings")]
    StringSlice { value: String, separator: String },

    #[error(
        "Can't convert value '{value}' with separator '{separator}' and pair separator '{pair_separator}' as map of strings"
    )]
    StringMap {
        value: String,
        separator: String,
        pair_separator: String,
    },
}

pub type ConvertResult<T> = Result<T, ConvertError>;
