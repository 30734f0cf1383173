use thiserror::Error;

/// A raw key that could not be decoded into the loader's domain key type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid key: {raw}")]
pub struct KeyError {
    raw: String,
}

impl KeyError {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The key exactly as the caller supplied it.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Converts the opaque string identifiers used by the API layer into the typed keys a
/// `BatchFunction` fetches with, and back.
///
/// Implementations must be deterministic and free of side effects; a loader parses every raw key
/// before it is queued, so a key that fails to parse never reaches a batch.
pub trait KeyCodec<K>: Default + Send + Sync + 'static {
    fn parse(&self, raw: &str) -> Result<K, KeyError>;
    fn format(&self, key: &K) -> String;
}

/// Decimal codec for the unsigned 32-bit ids every entity in the API uses.
///
/// Leading `+` signs, whitespace and out of range values are rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct UintKey;

impl KeyCodec<u32> for UintKey {
    fn parse(&self, raw: &str) -> Result<u32, KeyError> {
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(KeyError::new(raw));
        }
        raw.parse::<u32>().map_err(|_| KeyError::new(raw))
    }

    fn format(&self, key: &u32) -> String {
        key.to_string()
    }
}
