//! Request-scoped batch loaders for the workout API.
//!
//! Every GraphQL request gets its own [`Loaders`] through a [`RequestScope`]. Resolvers ask a
//! loader for one key at a time; the loader's worker collects the keys requested within a short
//! window, fetches them with one query, and hands each caller its own slice of the rows.

mod batch_function;
mod cache;
mod config;
mod error;
pub mod group;
mod key;
mod loader;
mod loader_op;
mod loader_worker;
pub mod loaders;
pub mod model;
mod multi;
mod registry;
mod single;
pub mod store;
#[cfg(feature = "stats")]
mod worker_stats;

pub use batch_function::BatchFunction;
pub use cache::{Cache, Slot};
pub use config::{LoaderConfig, DEFAULT_BATCH_DELAY, DEFAULT_MAX_BATCH_SIZE};
pub use error::{ConfigError, ConfigResult, LoadError, StoreError};
pub use key::{KeyCodec, KeyError, UintKey};
pub use loader::Loader;
pub use loader_op::LoadResult;
pub use multi::MultiLoader;
pub use registry::{Loaders, RequestScope};
pub use single::SingleLoader;
