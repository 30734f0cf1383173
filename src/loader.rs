use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::ops::Drop;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing_futures::Instrument;

use crate::{
    batch_function::BatchFunction,
    config::LoaderConfig,
    error::LoadError,
    key::KeyCodec,
    loader_op::{LoadRequest, LoadResult, LoaderOp},
    loader_worker::LoaderWorker,
};

/// Batch loads values from some expensive resource, primarily intended for mitigating GraphQL's
/// N+1 problem.
///
/// Users can call [`Loader::load`] and [`Loader::load_many`] with raw string keys (decoded by the
/// batch function's key codec), or [`Loader::load_key`] and [`Loader::load_keys`] with typed keys.
/// Outcomes are remembered for the lifetime of the loader; the cache can be cleared with calls to
/// [`Loader::clear`], [`Loader::clear_many`] and [`Loader::clear_all`], and values can be added to
/// it out-of-band through the use of [`Loader::prime`] and [`Loader::prime_many`].
///
/// The `Loader` struct acts as an intermediary between the async domain in which `load` calls are
/// invoked and the pseudo-single-threaded domain of the `LoaderWorker`. Callers can invoke the
/// `Loader` from multiple parallel tasks, and the loader will enqueue the requested operations on
/// the request queue for processing by its `LoaderWorker`. The worker processes the requests
/// sequentially and provides results via response oneshot channels back to the Loader.
///
/// A loader is meant to live for exactly one request: it is created by a `RequestScope` and
/// dropped with it, which also stops its worker.
pub struct Loader<K, V, C>
where
    K: 'static + Eq + Debug + Copy + Send,
    V: 'static + Send + Debug + Clone,
{
    request_tx: mpsc::UnboundedSender<LoaderOp<K, V>>,
    load_task_handle: tokio::task::JoinHandle<()>,
    codec: C,
}

impl<K, V, C> Drop for Loader<K, V, C>
where
    K: 'static + Eq + Debug + Copy + Send,
    V: 'static + Send + Debug + Clone,
{
    fn drop(&mut self) {
        self.load_task_handle.abort();
    }
}

impl<K, V, C> Loader<K, V, C>
where
    K: 'static + Eq + Hash + Debug + Ord + Copy + Send + Sync,
    V: 'static + Send + Sync + Debug + Clone,
    C: KeyCodec<K>,
{
    /// Creates a new Loader for the provided BatchFunction and Context type and spawns its
    /// worker on the current tokio runtime.
    ///
    /// Note: the batch function is passed in as a marker for type inference.
    pub fn new<F, ContextT>(
        _: F,
        context: ContextT,
        config: LoaderConfig,
        cancel: CancellationToken,
    ) -> Self
    where
        ContextT: Send + Sync + 'static,
        F: 'static + BatchFunction<K, V, Context = ContextT, Codec = C> + Send,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let span = tracing::trace_span!("LoaderWorker", kv = std::any::type_name::<(K, V)>());
        let worker = LoaderWorker::<K, V, F, HashMap<K, Option<V>>, ContextT>::new(
            HashMap::new(),
            rx,
            context,
            config,
            cancel,
        );
        Self {
            request_tx: tx,
            load_task_handle: tokio::task::spawn(worker.start().instrument(span)),
            codec: C::default(),
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Loads the value for a raw key.
    ///
    /// Returns `Ok(None)` if the BatchFunction had no row for the key. A key the codec rejects
    /// fails only this call and is never sent to the worker.
    ///
    /// If the value is already in the loader cache, it is returned as soon as it is processed.
    /// Otherwise, the requested key is enqueued for batch loading in the next loader execution
    /// frame.
    pub async fn load(&self, raw_key: &str) -> LoadResult<V> {
        let key = self.codec.parse(raw_key)?;
        self.load_key(key).await
    }

    /// Loads many raw keys at once. The results line up with `raw_keys`.
    pub async fn load_many<S>(&self, raw_keys: &[S]) -> Vec<LoadResult<V>>
    where
        S: AsRef<str>,
    {
        let parsed =
            raw_keys.iter().map(|raw_key| self.codec.parse(raw_key.as_ref())).collect::<Vec<_>>();
        let keys = parsed.iter().filter_map(|key| key.as_ref().ok().copied()).collect::<Vec<_>>();
        let mut loaded = self.load_keys(keys).await.into_iter();
        parsed
            .into_iter()
            .map(|key| match key {
                Ok(_) => loaded.next().unwrap_or(Err(LoadError::Closed)),
                Err(e) => Err(e.into()),
            })
            .collect()
    }

    /// Loads a value by its typed key.
    pub async fn load_key(&self, key: K) -> LoadResult<V> {
        let (response_tx, response_rx) = oneshot::channel();
        if self.request_tx.send(LoaderOp::Load(LoadRequest::One(key, response_tx))).is_err() {
            return Err(LoadError::Closed);
        }
        response_rx.await.unwrap_or(Err(LoadError::Closed))
    }

    /// Loads many values by their typed keys. The results line up with `keys`.
    ///
    /// If all the values are already present in the loader cache, they are returned as soon as
    /// the request is processed by the worker. Otherwise, the keys are enqueued for batch loading
    /// in the next loader execution frame.
    pub async fn load_keys(&self, keys: Vec<K>) -> Vec<LoadResult<V>> {
        if keys.is_empty() {
            return Vec::new();
        }
        let count = keys.len();
        let closed = || vec![Err(LoadError::Closed); count];
        let (response_tx, response_rx) = oneshot::channel();
        if self.request_tx.send(LoaderOp::Load(LoadRequest::Many(keys, response_tx))).is_err() {
            return closed();
        }
        response_rx.await.unwrap_or_else(|_| closed())
    }

    /// Adds a value to the cache.
    pub fn prime(&self, key: K, value: V) {
        self.send(LoaderOp::Prime(key, value));
    }

    /// Adds many values to the cache at once.
    pub fn prime_many(&self, key_vals: Vec<(K, V)>) {
        self.send(LoaderOp::PrimeMany(key_vals));
    }

    /// Removes a value from the cache.
    ///
    /// This key will be reloaded when it is next requested.
    pub fn clear(&self, key: K) {
        self.send(LoaderOp::Clear(key));
    }

    /// Removes multiple values from the cache at once.
    ///
    /// These keys will be reloaded when requested.
    pub fn clear_many(&self, keys: Vec<K>) {
        self.send(LoaderOp::ClearMany(keys));
    }

    pub fn clear_all(&self) {
        self.send(LoaderOp::ClearAll);
    }

    /// Closes the current collection window without waiting for the batch delay.
    ///
    /// Executors that resolve a GraphQL selection level by level can call this once every
    /// resolver of a level has issued its loads.
    pub fn dispatch(&self) {
        self.send(LoaderOp::Dispatch);
    }

    fn send(&self, op: LoaderOp<K, V>) {
        if let Err(e) = self.request_tx.send(op) {
            tracing::debug!(op = ?e.0, "loader worker is gone; dropping op");
        }
    }
}
