use std::slice;

use tokio::sync::oneshot;

use crate::error::LoadError;

/// The outcome of loading one key: the value, `None` when the batch function had no row for the
/// key, or the error that prevented the lookup.
pub type LoadResult<V> = Result<Option<V>, LoadError>;

/// Set of possible requests that can be sent to the [`LoaderWorker`]
///
/// The command categories are Load, Prime, and Clear, plus Dispatch which closes the current
/// collection window early.
///
/// [`LoaderWorker`]: crate::loader_worker::LoaderWorker
#[derive(Debug)]
pub enum LoaderOp<K, V> {
    /// Fetch data from the resource wrapped by this data loader (or the cache).
    Load(LoadRequest<K, V>),
    /// Add values to the cache that were fetched from elsewhere.
    Prime(K, V),
    PrimeMany(Vec<(K, V)>),
    /// Remove values from the cache so that they will be reloaded when they are next requested.
    Clear(K),
    ClearMany(Vec<K>),
    ClearAll,
    /// Stop collecting and execute the pending batch now.
    Dispatch,
}

#[derive(Debug)]
pub enum LoadRequest<K, V> {
    One(K, oneshot::Sender<LoadResult<V>>),
    Many(Vec<K>, oneshot::Sender<Vec<LoadResult<V>>>),
}

impl<K, V> LoadRequest<K, V>
where
    V: Send + std::fmt::Debug,
{
    pub fn keys(&self) -> &[K] {
        match self {
            LoadRequest::One(ref key, _) => slice::from_ref(key),
            LoadRequest::Many(ref keys, _) => keys,
        }
    }

    /// Answers the request with one result per key, in the order of [`LoadRequest::keys`].
    pub fn send_response<I>(self, results: I)
    where
        I: IntoIterator<Item = LoadResult<V>>,
    {
        match self {
            LoadRequest::One(_, response_tx) => {
                let response = results.into_iter().next().unwrap_or(Ok(None));
                if let Err(e) = response_tx.send(response) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
            LoadRequest::Many(_, response_tx) => {
                let response = results.into_iter().collect::<Vec<_>>();
                if let Err(e) = response_tx.send(response) {
                    tracing::error!(?e, "receiver dropped");
                }
            }
        }
    }

    /// Answers every key of the request with the same error.
    pub fn reject(self, error: LoadError) {
        let count = self.keys().len();
        self.send_response(std::iter::repeat(error).take(count).map(Err));
    }
}
