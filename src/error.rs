use std::sync::Arc;

use thiserror::Error;

use crate::key::KeyError;

/// The reasons a `load` call can fail.
///
/// A missing row is never an error: single-result loaders answer `Ok(None)` and multi-result
/// loaders answer `Ok(vec![])`. Callers that see an `Err` should treat it as "this lookup could
/// not be performed", not "this entity does not exist".
///
/// `LoadError` is cheap to clone so that a single fetch failure can be handed to every call that
/// was waiting on the same batch.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The raw key could not be decoded. Only the calls that used this key see this error.
    #[error(transparent)]
    InvalidKey(#[from] KeyError),
    /// The batch function failed. Every call that was part of the batch sees this error.
    #[error("batch fetch failed: {0}")]
    Fetch(#[source] Arc<dyn std::error::Error + Send + Sync>),
    /// The request scope the loader belongs to was cancelled.
    #[error("request scope was cancelled")]
    Cancelled,
    /// The loader's worker is gone (the loader was dropped while the call was outstanding).
    #[error("loader worker is no longer running")]
    Closed,
}

impl LoadError {
    pub(crate) fn fetch<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        LoadError::Fetch(Arc::new(error))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LoadError::Cancelled)
    }
}

/// Failures reported by a data source while serving a batch query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("query on {relation} failed: {reason}")]
    Query { relation: &'static str, reason: String },
}

/// Loader configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
