//! Error types for rtlgen-client
//!
//! This module provides error handling for the library, including:
//! - Field-level validation errors produced when finalizing an upload package
//! - Submission errors for rejected one-shot backend requests
//! - Transport and serialization error conversions
//!
//! Transient polling failures are deliberately *not* represented here: the
//! task monitor swallows them and keeps looping, so they never cross the
//! library boundary as errors.

use thiserror::Error;

/// Result type alias for rtlgen-client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rtlgen-client
///
/// This is the primary error type used throughout the library. Each variant
/// includes contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
    },

    /// Package validation failed when finalizing the upload tree
    ///
    /// Carries every field-level constraint that failed, not just the first.
    /// The package and any previously persisted snapshot are left unchanged.
    #[error("package validation failed with {} error(s)", .errors.len())]
    Validation {
        /// The individual constraints that failed
        errors: Vec<ValidationError>,
    },

    /// The backend rejected a one-shot request with a non-2xx response
    ///
    /// Never retried automatically; the caller decides whether to resubmit.
    #[error("submission rejected with HTTP {status}: {body}")]
    Submission {
        /// HTTP status code returned by the backend
        status: u16,
        /// Response body as returned by the backend
        body: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single field-level constraint violation detected by
/// [`UploadTreeBuilder::build`](crate::package::UploadTreeBuilder::build)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The top module name is empty after trimming
    #[error("top module name is empty")]
    EmptyTopModule,

    /// A sub-module slot holds an empty name
    #[error("sub-module name at index {index} is empty")]
    EmptySubModule {
        /// Zero-based index of the offending sub-module slot
        index: usize,
    },

    /// Two sub-module slots hold the same name (case-sensitive, exact match)
    #[error("duplicate sub-module name: {name}")]
    DuplicateSubModule {
        /// The name that appears more than once
        name: String,
    },

    /// An upload category key did not match any known category
    #[error("unknown upload category: {key}")]
    UnknownCategory {
        /// The rejected key
        key: String,
    },
}
