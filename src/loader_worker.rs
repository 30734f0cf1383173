use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::hash::Hash;
use std::marker::PhantomData;
use std::slice;

use futures::future::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

#[cfg(feature = "stats")]
use crate::worker_stats::WorkerStats;
use crate::{
    batch_function::BatchFunction,
    cache::Cache,
    config::LoaderConfig,
    error::LoadError,
    loader_op::{LoadRequest, LoaderOp},
};

/// A `LoaderWorker` is the "single-thread" worker task that actually does the loading work. It is
/// the only owner of the pending calls and the request cache, so callers never contend on a lock;
/// they talk to it through the request queue.
///
/// Once started, it runs in a loop until the parent Loader aborts its `JoinHandle` or drops the
/// request queue tx channel.
///
/// The worker can be in one of three states during its lifetime:
///
/// 1. Waiting for requests
/// 2. Collecting requests and staging keys for loading.
/// 3. Executing its load batch function.
///
/// One cycle through this loop may be called an "execution frame".
///
/// In state (1), the worker awaits any messages on the request queue channel, idling until work
/// arrives.
///
/// In state (2), the collection window is open. The worker first drains everything already queued,
/// then keeps receiving until `LoaderConfig::batch_delay` has passed since the window opened, the
/// staged keys reach `LoaderConfig::max_batch_size`, or a `Dispatch` op arrives. The delay is what
/// lets resolvers running on other tasks land in the same batch. Prime and Clear requests are
/// resolved immediately against the cache. Load requests that can be answered entirely from the
/// cache are answered right away; otherwise their missing keys are staged. Priming a staged key
/// unstages it, so the primed value is what the waiting requests receive.
///
/// In state (3), the worker invokes its `BatchFunction` with the sorted, unique staged keys (in
/// chunks of at most `max_batch_size`), groups the rows back to keys, records every requested key
/// in the cache (found or absent), and answers the outstanding Load requests from the cache. If a
/// chunk fails, every key of that chunk is answered with the fetch error and nothing is cached for
/// it.
///
/// Cancelling the request scope's token moves the worker into a terminal state in which every
/// outstanding and future Load request is answered with `LoadError::Cancelled`. A fetch that is
/// already running is allowed to finish, but its rows are thrown away and no further chunk of the
/// batch is fetched.
pub struct LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Debug + Ord + Copy + Send + Sync,
    V: 'static + Send + Sync + Debug + Clone,
    F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    CacheT: Cache,
    ContextT: Send + Sync + 'static,
{
    cache: CacheT,
    request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
    keys_to_load: BTreeSet<K>,
    pending_requests: Vec<LoadRequest<K, V>>,
    dispatch_requested: bool,
    context: ContextT,
    config: LoaderConfig,
    cancel: CancellationToken,
    phantom_batch_function: PhantomData<F>,
    #[cfg(feature = "stats")]
    stats: WorkerStats,
}

impl<K, V, F, CacheT, ContextT> LoaderWorker<K, V, F, CacheT, ContextT>
where
    K: 'static + Eq + Hash + Debug + Ord + Copy + Send + Sync,
    V: 'static + Send + Sync + Debug + Clone,
    F: 'static + BatchFunction<K, V, Context = ContextT> + Send,
    CacheT: Cache<K = K, V = V> + Send,
    ContextT: Send + Sync + 'static,
{
    pub fn new(
        cache: CacheT,
        request_rx: mpsc::UnboundedReceiver<LoaderOp<K, V>>,
        context: ContextT,
        config: LoaderConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cache,
            request_rx,
            keys_to_load: BTreeSet::new(),
            pending_requests: Vec::new(),
            dispatch_requested: false,
            context,
            config,
            cancel,
            phantom_batch_function: PhantomData,
            #[cfg(feature = "stats")]
            stats: WorkerStats::new(std::any::type_name::<(K, V)>()),
        }
    }

    pub async fn start(mut self) {
        loop {
            // Async await until we receive the first op.
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return self.drain_cancelled().await,
                op = self.request_rx.recv() => match op {
                    None => {
                        tracing::info!("Tx channel closed. Terminating LoaderWorker.");
                        return;
                    }
                    Some(op) => self.mux_op(op),
                },
            }
            let open = self.collect().await;
            if self.cancel.is_cancelled() {
                return self.drain_cancelled().await;
            }
            if !self.pending_requests.is_empty() {
                self.execute_load().await;
            }
            self.dispatch_requested = false;
            if !open {
                tracing::info!("Tx channel closed. Terminating LoaderWorker.");
                return;
            }
        }
    }

    /// Keeps the collection window open. Returns `false` once the request queue is closed.
    async fn collect(&mut self) -> bool {
        let deadline = Instant::now() + self.config.batch_delay;
        loop {
            // Flush remainder of the op queue before deciding whether to wait for more.
            while let Some(op) = self.request_rx.recv().now_or_never() {
                match op {
                    Some(op) => self.mux_op(op),
                    None => return false,
                }
            }
            if self.pending_requests.is_empty()
                || self.dispatch_requested
                || self.keys_to_load.len() >= self.config.max_batch_size
            {
                return true;
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return true,
                op = self.request_rx.recv() => match op {
                    Some(op) => self.mux_op(op),
                    None => return false,
                },
                _ = time::sleep_until(deadline) => return true,
            }
        }
    }

    #[tracing::instrument(skip(self))]
    fn mux_op(&mut self, op: LoaderOp<K, V>) {
        match op {
            LoaderOp::Load(request) => {
                let keys_to_load = self.cache.missing(request.keys());
                tracing::debug!(requested_keys = ?request.keys(), ?keys_to_load);
                #[cfg(feature = "stats")]
                {
                    let requested = request.keys().len() as u32;
                    self.stats.record_load_request(requested);
                    self.stats.record_cache_hits(requested - keys_to_load.len() as u32);
                }
                if keys_to_load.is_empty() {
                    let results = self
                        .cache
                        .get(request.keys())
                        .into_iter()
                        .map(|slot| Ok(slot.cloned().flatten()))
                        .collect::<Vec<_>>();
                    request.send_response(results);
                } else {
                    self.keys_to_load.extend(keys_to_load);
                    self.pending_requests.push(request);
                }
            }
            // A primed key no longer needs fetching, even if a waiting request staged it.
            LoaderOp::Prime(key, value) => {
                self.keys_to_load.remove(&key);
                self.cache.insert(key, Some(value));
            }
            LoaderOp::PrimeMany(key_vals) => {
                for (key, _) in &key_vals {
                    self.keys_to_load.remove(key);
                }
                self.cache.insert_many(key_vals.into_iter().map(|(key, value)| (key, Some(value))))
            }
            LoaderOp::Clear(key) => self.clear(slice::from_ref(&key)),
            LoaderOp::ClearMany(keys) => self.clear(&keys),
            LoaderOp::ClearAll => {
                self.cache.flush();
                self.restage_pending();
            }
            LoaderOp::Dispatch => self.dispatch_requested = true,
        }
    }

    fn clear(&mut self, keys: &[K]) {
        self.cache.remove(keys);
        self.restage_pending();
    }

    /// Stages again any key a waiting request relies on that is no longer cached.
    fn restage_pending(&mut self) {
        for request in &self.pending_requests {
            self.keys_to_load.extend(self.cache.missing(request.keys()));
        }
    }

    #[tracing::instrument(skip(self))]
    async fn execute_load(&mut self) {
        let keys = std::mem::take(&mut self.keys_to_load).into_iter().collect::<Vec<_>>();
        #[cfg(feature = "stats")]
        self.stats.record_load_exec(
            self.pending_requests.iter().map(|request| request.keys().len() as u32).sum(),
        );

        let mut loaded = Vec::with_capacity(keys.len());
        let mut failed: HashMap<K, LoadError> = HashMap::new();
        for chunk in keys.chunks(self.config.max_batch_size.max(1)) {
            if self.cancel.is_cancelled() {
                break;
            }
            match F::fetch(chunk, &self.context).await {
                Ok(entities) => {
                    let mut grouped = F::group(entities);
                    tracing::debug!(keys = chunk.len(), matched = grouped.len(), "batch loaded");
                    #[cfg(feature = "stats")]
                    self.stats.record_load_exec_completed(
                        chunk.len() as u32,
                        chunk.iter().filter(|key| grouped.contains_key(*key)).count() as u32,
                    );
                    // Rows fanned out under keys outside this chunk are dropped; caching them
                    // would leave those keys with partial collections.
                    loaded.extend(chunk.iter().map(|key| (*key, grouped.remove(key))));
                }
                Err(e) => {
                    tracing::warn!(error = %e, keys = ?chunk, "batch fetch failed");
                    #[cfg(feature = "stats")]
                    self.stats.record_load_failed();
                    let error = LoadError::fetch(e);
                    failed.extend(chunk.iter().map(|key| (*key, error.clone())));
                }
            }
        }

        if self.cancel.is_cancelled() {
            tracing::debug!("request scope cancelled while fetching; discarding batch");
            for request in self.pending_requests.drain(..) {
                request.reject(LoadError::Cancelled);
            }
            return;
        }

        self.cache.insert_many(loaded);
        for request in self.pending_requests.drain(..) {
            let results = request
                .keys()
                .iter()
                .zip(self.cache.get(request.keys()))
                .map(|(key, slot)| match failed.get(key) {
                    Some(error) => Err(error.clone()),
                    None => Ok(slot.cloned().flatten()),
                })
                .collect::<Vec<_>>();
            request.send_response(results);
        }
        if !self.config.cache {
            self.cache.flush();
        }
    }

    /// Answers everything outstanding, and everything that still arrives, with `Cancelled`.
    async fn drain_cancelled(&mut self) {
        tracing::debug!(pending = self.pending_requests.len(), "request scope cancelled");
        self.keys_to_load.clear();
        self.cache.flush();
        for request in self.pending_requests.drain(..) {
            request.reject(LoadError::Cancelled);
        }
        while let Some(op) = self.request_rx.recv().await {
            if let LoaderOp::Load(request) = op {
                request.reject(LoadError::Cancelled);
            }
        }
    }
}
