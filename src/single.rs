use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{
    batch_function::BatchFunction, config::LoaderConfig, error::LoadError, key::KeyCodec,
    loader::Loader,
};

/// A loader for parent-to-one relations (user by id, profile by user id).
///
/// The batch function groups rows one-to-one. A key with no row is a successful `None`.
pub struct SingleLoader<K, E, C>
where
    K: 'static + Eq + Debug + Copy + Send,
    E: 'static + Send + Sync + Debug,
{
    inner: Loader<K, Arc<E>, C>,
}

impl<K, E, C> SingleLoader<K, E, C>
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
        F: 'static + BatchFunction<K, Arc<E>, Context = ContextT, Codec = C> + Send,
    {
        Self { inner: Loader::new(batch_fn, context, config, cancel) }
    }

    pub async fn load(&self, raw_key: &str) -> Result<Option<Arc<E>>, LoadError> {
        self.inner.load(raw_key).await
    }

    pub async fn load_many<S: AsRef<str>>(
        &self,
        raw_keys: &[S],
    ) -> Vec<Result<Option<Arc<E>>, LoadError>> {
        self.inner.load_many(raw_keys).await
    }

    pub async fn load_key(&self, key: K) -> Result<Option<Arc<E>>, LoadError> {
        self.inner.load_key(key).await
    }

    pub async fn load_keys(&self, keys: Vec<K>) -> Vec<Result<Option<Arc<E>>, LoadError>> {
        self.inner.load_keys(keys).await
    }

    pub fn prime(&self, key: K, entity: E) {
        self.inner.prime(key, Arc::new(entity));
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
