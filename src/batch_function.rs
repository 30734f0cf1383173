use std::collections::HashMap;

use async_trait::async_trait;

use crate::key::KeyCodec;

/// A `BatchFunction` defines how some `Loader` fetches batched data from a data source and how
/// the fetched rows are attributed back to the keys that were requested.
///
/// `fetch` receives the deduplicated, sorted keys requested during the loader's most recent
/// collection window, along with a user defined context (usually a handle to the data source).
/// It may return rows in any order and in any quantity. `group` then builds the entity-to-key map
/// for that batch: a single-result loader maps each key to one value, a multi-result loader maps
/// each key to a collection and may file the same row under several keys.
///
/// Keys missing from the map returned by `group` resolve to the loader kind's absent value, which
/// is not an error. An `Err` from `fetch` fails every call that was waiting on the batch.
///
/// Multiple `BatchFunctions` (and therefore loaders) can share the same context (likely through an
/// `Arc`).
#[async_trait]
pub trait BatchFunction<K, V> {
    type Context;
    type Entity;
    type Error: std::error::Error + Send + Sync + 'static;
    /// Decodes the raw keys callers hand to the loader.
    type Codec: KeyCodec<K>;

    async fn fetch(keys: &[K], context: &Self::Context) -> Result<Vec<Self::Entity>, Self::Error>;

    fn group(entities: Vec<Self::Entity>) -> HashMap<K, V>;
}
