use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    batch_function::BatchFunction, config::LoaderConfig, error::LoadError, key::KeyCodec,
    loader::Loader, loader_op::LoadResult,
};

/// A loader for parent-to-many relations (set logs by workout exercise, friendships by user).
///
/// The batch function groups rows one-to-many and may file one row under several keys; the row
/// is shared, not copied. A key with no rows is a successful empty collection, so call sites never
/// have to tell "absent" apart from "empty".
pub struct MultiLoader<K, E, C>
where
    K: 'static + Eq + Debug + Copy + Send,
    E: 'static + Send + Sync + Debug,
{
    inner: Loader<K, Vec<Arc<E>>, C>,
}

fn collection<E>(result: LoadResult<Vec<Arc<E>>>) -> Result<Vec<Arc<E>>, LoadError> {
    result.map(Option::unwrap_or_default)
}

impl<K, E, C> MultiLoader<K, E, C>
where
    K: 'static + Eq + Hash + Debug + Ord + Copy + Send + Sync,
    E: 'static + Send + Sync + Debug,
    C: KeyCodec<K>,
{
    pub fn new<F, ContextT>(
        batch_fn: F,
        context: ContextT,
        config: LoaderConfig,
        cancel: CancellationToken,
    ) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, Vec<Arc<E>>, Context = ContextT, Codec = C> + Send,
    {
        Self { inner: Loader::new(batch_fn, context, config, cancel) }
    }

    pub async fn load(&self, raw_key: &str) -> Result<Vec<Arc<E>>, LoadError> {
        collection(self.inner.load(raw_key).await)
    }

    pub async fn load_many<S: AsRef<str>>(
        &self,
        raw_keys: &[S],
    ) -> Vec<Result<Vec<Arc<E>>, LoadError>> {
        self.inner.load_many(raw_keys).await.into_iter().map(collection).collect()
    }

    pub async fn load_key(&self, key: K) -> Result<Vec<Arc<E>>, LoadError> {
        collection(self.inner.load_key(key).await)
    }

    pub async fn load_keys(&self, keys: Vec<K>) -> Vec<Result<Vec<Arc<E>>, LoadError>> {
        self.inner.load_keys(keys).await.into_iter().map(collection).collect()
    }

    pub fn prime(&self, key: K, entities: Vec<E>) {
        self.inner.prime(key, entities.into_iter().map(Arc::new).collect());
    }

    pub fn clear(&self, key: K) {
        self.inner.clear(key);
    }

    pub fn clear_many(&self, keys: Vec<K>) {
        self.inner.clear_many(keys);
    }

    pub fn clear_all(&self) {
        self.inner.clear_all();
    }

    pub fn dispatch(&self) {
        self.inner.dispatch();
    }

    pub fn format_key(&self, key: &K) -> String {
        self.inner.codec().format(key)
    }
}
