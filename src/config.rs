use std::env;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(1);
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Tuning knobs shared by every loader of a request scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderConfig {
    /// How long a worker keeps collecting keys after the first load of a batch arrives.
    ///
    /// Resolvers running on other tasks or threads get this long to enqueue their keys into the
    /// same batch. Zero means "whatever is already queued".
    pub batch_delay: Duration,
    /// Upper bound on the number of unique keys handed to a single fetch. Reaching it closes the
    /// collection window early; larger batches are fetched in chunks.
    pub max_batch_size: usize,
    /// Remember outcomes for the rest of the request so repeated loads skip the fetch.
    pub cache: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self { batch_delay: DEFAULT_BATCH_DELAY, max_batch_size: DEFAULT_MAX_BATCH_SIZE, cache: true }
    }
}

impl LoaderConfig {
    /// Reads `LOADER_BATCH_DELAY_MS`, `LOADER_MAX_BATCH_SIZE` and `LOADER_CACHE`, falling back to
    /// the defaults for unset variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup("LOADER_BATCH_DELAY_MS") {
            let millis = value
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidValue { name: "LOADER_BATCH_DELAY_MS", value })?;
            config.batch_delay = Duration::from_millis(millis);
        }
        if let Some(value) = lookup("LOADER_MAX_BATCH_SIZE") {
            config.max_batch_size = value
                .trim()
                .parse::<usize>()
                .map_err(|_| ConfigError::InvalidValue { name: "LOADER_MAX_BATCH_SIZE", value })?;
        }
        if let Some(value) = lookup("LOADER_CACHE") {
            config.cache = match value.trim().to_lowercase().as_str() {
                "1" | "true" | "on" | "yes" => true,
                "0" | "false" | "off" | "no" => false,
                _ => return Err(ConfigError::InvalidValue { name: "LOADER_CACHE", value }),
            };
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_batch_size == 0 {
            return Err(ConfigError::Validation("max_batch_size must be at least 1".to_owned()));
        }
        Ok(())
    }

    pub fn with_batch_delay(mut self, batch_delay: Duration) -> Self {
        self.batch_delay = batch_delay;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }
}
