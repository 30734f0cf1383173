use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future;
use tokio_util::sync::CancellationToken;
use workout_loaders::{
    group, BatchFunction, LoadError, LoaderConfig, MultiLoader, SingleLoader, UintKey,
};

#[derive(Debug, PartialEq, Eq, Clone)]
struct Row {
    id: u32,
    parent: u32,
    /// A second parent the row also belongs to.
    also: Option<u32>,
}

fn row(id: u32, parent: u32) -> Row {
    Row { id, parent, also: None }
}

#[derive(Debug, thiserror::Error)]
#[error("source offline")]
struct SourceOffline;

#[derive(Default)]
struct Source {
    rows: Vec<Row>,
    calls: Mutex<Vec<Vec<u32>>>,
    offline: AtomicBool,
    /// Any batch containing this key fails.
    failing_key: Mutex<Option<u32>>,
    /// Cancelled from inside the next fetch.
    cancel_during_fetch: Mutex<Option<CancellationToken>>,
}

impl Source {
    fn with_rows(rows: Vec<Row>) -> Arc<Self> {
        Arc::new(Self { rows, ..Default::default() })
    }

    fn calls(&self) -> Vec<Vec<u32>> {
        self.calls.lock().unwrap().clone()
    }

    fn go_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn select<F>(&self, keys: &[u32], keys_of: F) -> Result<Vec<Row>, SourceOffline>
    where
        F: Fn(&Row) -> Vec<u32>,
    {
        self.calls.lock().unwrap().push(keys.to_vec());
        if let Some(cancel) = self.cancel_during_fetch.lock().unwrap().take() {
            cancel.cancel();
        }
        let failing = self.failing_key.lock().unwrap().map_or(false, |key| keys.contains(&key));
        if self.offline.load(Ordering::SeqCst) || failing {
            return Err(SourceOffline);
        }
        Ok(self
            .rows
            .iter()
            .filter(|row| keys_of(row).iter().any(|key| keys.contains(key)))
            .cloned()
            .collect())
    }
}

struct RowsById;

#[async_trait]
impl BatchFunction<u32, Arc<Row>> for RowsById {
    type Context = Arc<Source>;
    type Entity = Row;
    type Error = SourceOffline;
    type Codec = UintKey;

    async fn fetch(keys: &[u32], source: &Arc<Source>) -> Result<Vec<Row>, SourceOffline> {
        source.select(keys, |row| vec![row.id])
    }

    fn group(rows: Vec<Row>) -> HashMap<u32, Arc<Row>> {
        group::by_key(rows, |row| row.id)
    }
}

struct RowsByParent;

#[async_trait]
impl BatchFunction<u32, Vec<Arc<Row>>> for RowsByParent {
    type Context = Arc<Source>;
    type Entity = Row;
    type Error = SourceOffline;
    type Codec = UintKey;

    async fn fetch(keys: &[u32], source: &Arc<Source>) -> Result<Vec<Row>, SourceOffline> {
        source.select(keys, |row| [Some(row.parent), row.also].into_iter().flatten().collect())
    }

    fn group(rows: Vec<Row>) -> HashMap<u32, Vec<Arc<Row>>> {
        group::by_keys(rows, |row| [Some(row.parent), row.also].into_iter().flatten())
    }
}

fn by_id(
    source: &Arc<Source>,
    config: LoaderConfig,
) -> (SingleLoader<u32, Row, UintKey>, CancellationToken) {
    let cancel = CancellationToken::new();
    (SingleLoader::new(RowsById, source.clone(), config, cancel.clone()), cancel)
}

fn by_parent(source: &Arc<Source>) -> MultiLoader<u32, Row, UintKey> {
    MultiLoader::new(RowsByParent, source.clone(), LoaderConfig::default(), CancellationToken::new())
}

fn id_of(result: Result<Option<Arc<Row>>, LoadError>) -> Option<u32> {
    result.unwrap().map(|row| row.id)
}

fn ids_of(result: Result<Vec<Arc<Row>>, LoadError>) -> Vec<u32> {
    result.unwrap().iter().map(|row| row.id).collect()
}

#[tokio::test]
async fn basic_load() {
    let source = Source::with_rows(vec![row(42, 1)]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default());

    let loaded = loader.load("42").await.unwrap().unwrap();
    assert_eq!(*loaded, row(42, 1));
    assert_eq!(source.calls(), vec![vec![42]]);
}

#[tokio::test]
async fn repeated_load_is_served_from_cache() {
    let source = Source::with_rows(vec![row(42, 1)]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default());

    assert_eq!(id_of(loader.load("42").await), Some(42));
    assert_eq!(id_of(loader.load("42").await), Some(42));
    assert_eq!(source.calls(), vec![vec![42]]);
}

#[test_log::test(tokio::test)]
async fn concurrent_loads_share_one_fetch() {
    let source = Source::with_rows(vec![row(3, 1), row(4, 1)]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default());

    let raw_keys = ["4", "3", "4", "4", "3", "4"];
    let loaded = future::join_all(raw_keys.iter().map(|raw_key| loader.load(raw_key))).await;

    assert_eq!(
        loaded.into_iter().map(id_of).collect::<Vec<_>>(),
        vec![Some(4), Some(3), Some(4), Some(4), Some(3), Some(4)]
    );
    assert_eq!(source.calls(), vec![vec![3, 4]]);
}

#[tokio::test]
async fn load_many_lines_up_with_keys() {
    let source = Source::with_rows(vec![row(1, 1), row(9, 1)]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default());

    let loaded = loader.load_many(&["9", "1", "404", "1"]).await;
    assert_eq!(
        loaded.into_iter().map(id_of).collect::<Vec<_>>(),
        vec![Some(9), Some(1), None, Some(1)]
    );
    assert_eq!(source.calls(), vec![vec![1, 9, 404]]);
}

#[tokio::test]
async fn absent_keys_are_remembered() {
    let source = Source::with_rows(vec![]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default());

    assert_eq!(id_of(loader.load("404").await), None);
    assert_eq!(id_of(loader.load("404").await), None);
    assert_eq!(source.calls(), vec![vec![404]]);
}

#[tokio::test]
async fn collections_are_grouped_per_parent() {
    let source = Source::with_rows(vec![row(10, 5), row(11, 5), row(12, 9)]);
    let loader = by_parent(&source);

    let loaded = loader.load_many(&["5", "9", "7"]).await;
    assert_eq!(
        loaded.into_iter().map(ids_of).collect::<Vec<_>>(),
        vec![vec![10, 11], vec![12], vec![]]
    );
    assert_eq!(source.calls(), vec![vec![5, 7, 9]]);
}

#[tokio::test]
async fn a_row_with_two_parents_is_shared() {
    let source = Source::with_rows(vec![Row { id: 20, parent: 1, also: Some(2) }, row(21, 2)]);
    let loader = by_parent(&source);

    let (first, second) = future::join(loader.load("1"), loader.load("2")).await;
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_eq!(first.iter().map(|row| row.id).collect::<Vec<_>>(), vec![20]);
    assert_eq!(second.iter().map(|row| row.id).collect::<Vec<_>>(), vec![20, 21]);
    assert!(Arc::ptr_eq(&first[0], &second[0]));
}

#[tokio::test]
async fn fanned_out_rows_are_not_cached_under_unrequested_keys() {
    let source = Source::with_rows(vec![Row { id: 20, parent: 1, also: Some(2) }, row(21, 2)]);
    let loader = by_parent(&source);

    assert_eq!(ids_of(loader.load("1").await), vec![20]);
    // Key 2 was never requested, so its collection is fetched in full.
    assert_eq!(ids_of(loader.load("2").await), vec![20, 21]);
    assert_eq!(source.calls(), vec![vec![1], vec![2]]);
}

#[tokio::test]
async fn invalid_key_fails_only_its_caller() {
    let source = Source::with_rows(vec![row(1, 1)]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default());

    let (bad, good) = future::join(loader.load("abc"), loader.load("1")).await;
    assert!(matches!(bad, Err(LoadError::InvalidKey(ref e)) if e.raw() == "abc"));
    assert_eq!(id_of(good), Some(1));

    let mixed = loader.load_many(&["1", "-3", "2"]).await;
    assert_eq!(mixed[0].as_ref().unwrap().as_ref().map(|row| row.id), Some(1));
    assert!(matches!(mixed[1], Err(LoadError::InvalidKey(_))));
    assert!(matches!(mixed[2], Ok(None)));

    assert_eq!(source.calls(), vec![vec![1], vec![2]]);
}

#[test_log::test(tokio::test)]
async fn fetch_error_reaches_every_caller_of_the_batch() {
    let source = Source::with_rows(vec![row(1, 1), row(2, 1)]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default());
    source.go_offline(true);

    let (first, second) = future::join(loader.load("1"), loader.load("2")).await;
    for result in [first, second] {
        let error = result.unwrap_err();
        assert!(matches!(error, LoadError::Fetch(_)));
        assert_eq!(error.to_string(), "batch fetch failed: source offline");
    }

    // Failures are not remembered.
    source.go_offline(false);
    assert_eq!(id_of(loader.load("1").await), Some(1));
    assert_eq!(source.calls(), vec![vec![1, 2], vec![1]]);
}

#[tokio::test]
async fn multi_loader_fetch_error_is_not_an_empty_collection() {
    let source = Source::with_rows(vec![row(10, 5)]);
    let loader = by_parent(&source);
    source.go_offline(true);

    assert!(matches!(loader.load("5").await, Err(LoadError::Fetch(_))));
}

#[tokio::test]
async fn cancelled_before_dispatch() {
    let source = Source::with_rows(vec![row(1, 1)]);
    let config = LoaderConfig::default().with_batch_delay(Duration::from_secs(60));
    let (loader, cancel) = by_id(&source, config);

    let (loaded, _) = tokio::join!(loader.load("1"), async {
        tokio::task::yield_now().await;
        cancel.cancel();
    });
    assert!(loaded.unwrap_err().is_cancelled());

    // Loads issued after cancellation fail the same way.
    assert!(matches!(loader.load("1").await, Err(LoadError::Cancelled)));
    assert!(source.calls().is_empty());
}

#[test_log::test(tokio::test)]
async fn cancelled_during_fetch() {
    let source = Source::with_rows((1..=6).map(|id| row(id, 1)).collect());
    let (loader, cancel) = by_id(&source, LoaderConfig::default().with_max_batch_size(2));
    *source.cancel_during_fetch.lock().unwrap() = Some(cancel.clone());

    let loaded = loader.load_many(&["1", "2", "3", "4", "5", "6"]).await;
    assert!(loaded.iter().all(|result| matches!(result, Err(LoadError::Cancelled))));
    // The chunk in flight finishes; the rest of the batch is never fetched.
    assert_eq!(source.calls(), vec![vec![1, 2]]);

    // Nothing from the discarded chunk was cached.
    assert!(matches!(loader.load("1").await, Err(LoadError::Cancelled)));
    assert_eq!(source.calls(), vec![vec![1, 2]]);
}

#[tokio::test]
async fn a_failing_chunk_fails_only_its_keys() {
    let source = Source::with_rows((1..=5).map(|id| row(id, 1)).collect());
    let (loader, _cancel) = by_id(&source, LoaderConfig::default().with_max_batch_size(2));
    *source.failing_key.lock().unwrap() = Some(3);

    let (loaded, four) =
        future::join(loader.load_many(&["1", "2", "3", "4", "5"]), loader.load("4")).await;
    assert_eq!(loaded[0].as_ref().unwrap().as_ref().map(|row| row.id), Some(1));
    assert_eq!(loaded[1].as_ref().unwrap().as_ref().map(|row| row.id), Some(2));
    assert!(matches!(loaded[2], Err(LoadError::Fetch(_))));
    assert!(matches!(loaded[3], Err(LoadError::Fetch(_))));
    assert_eq!(loaded[4].as_ref().unwrap().as_ref().map(|row| row.id), Some(5));
    assert!(matches!(four, Err(LoadError::Fetch(_))));
    assert_eq!(source.calls(), vec![vec![1, 2], vec![3, 4], vec![5]]);

    // The keys that resolved are cached; the failed ones are fetched again.
    *source.failing_key.lock().unwrap() = None;
    let again = loader.load_many(&["1", "3"]).await;
    assert_eq!(again.into_iter().map(id_of).collect::<Vec<_>>(), vec![Some(1), Some(3)]);
    assert_eq!(source.calls().last(), Some(&vec![3]));
}

#[tokio::test]
async fn priming_a_staged_key_answers_with_the_primed_value() {
    let source = Source::with_rows(vec![row(7, 1), row(8, 1)]);
    let config = LoaderConfig::default().with_batch_delay(Duration::from_secs(60));
    let (loader, _cancel) = by_id(&source, config);

    let (loaded, _) = future::join(loader.load_many(&["7", "8"]), async {
        loader.prime(7, row(7, 99));
        loader.dispatch();
    })
    .await;

    let parents = loaded
        .into_iter()
        .map(|result| result.unwrap().map(|row| row.parent))
        .collect::<Vec<_>>();
    assert_eq!(parents, vec![Some(99), Some(1)]);
    assert_eq!(source.calls(), vec![vec![8]]);
}

#[tokio::test]
async fn primed_values_skip_the_fetch() {
    let source = Source::with_rows(vec![row(7, 1)]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default());

    loader.prime(7, row(7, 99));
    assert_eq!(loader.load("7").await.unwrap().unwrap().parent, 99);
    assert!(source.calls().is_empty());

    let children = by_parent(&source);
    children.prime(3, vec![row(30, 3), row(31, 3)]);
    assert_eq!(ids_of(children.load("3").await), vec![30, 31]);
    assert!(source.calls().is_empty());
}

#[tokio::test]
async fn cleared_keys_are_fetched_again() {
    let source = Source::with_rows(vec![row(1, 1), row(2, 1)]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default());

    assert_eq!(
        loader.load_many(&["1", "2"]).await.into_iter().map(id_of).collect::<Vec<_>>(),
        vec![Some(1), Some(2)]
    );
    loader.clear(1);
    assert_eq!(id_of(loader.load("1").await), Some(1));
    loader.clear_all();
    assert_eq!(id_of(loader.load("2").await), Some(2));

    assert_eq!(source.calls(), vec![vec![1, 2], vec![1], vec![2]]);
}

#[tokio::test]
async fn disabled_cache_fetches_every_batch() {
    let source = Source::with_rows(vec![row(1, 1)]);
    let (loader, _cancel) = by_id(&source, LoaderConfig::default().with_cache(false));

    assert_eq!(id_of(loader.load("1").await), Some(1));
    assert_eq!(id_of(loader.load("1").await), Some(1));
    assert_eq!(source.calls(), vec![vec![1], vec![1]]);
}

#[tokio::test]
async fn large_batches_are_fetched_in_chunks() {
    let source = Source::with_rows((1..=5).map(|id| row(id, 1)).collect());
    let (loader, _cancel) = by_id(&source, LoaderConfig::default().with_max_batch_size(2));

    let loaded = loader.load_many(&["5", "4", "3", "2", "1"]).await;
    assert_eq!(
        loaded.into_iter().map(id_of).collect::<Vec<_>>(),
        vec![Some(5), Some(4), Some(3), Some(2), Some(1)]
    );
    assert_eq!(source.calls(), vec![vec![1, 2], vec![3, 4], vec![5]]);
}

#[tokio::test]
async fn dispatch_closes_the_window_early() {
    let source = Source::with_rows(vec![row(1, 1), row(2, 1)]);
    let config = LoaderConfig::default().with_batch_delay(Duration::from_secs(60));
    let (loader, _cancel) = by_id(&source, config);

    let loads = future::join(loader.load("1"), loader.load("2"));
    let (loaded, _) = tokio::time::timeout(
        Duration::from_secs(5),
        future::join(loads, async { loader.dispatch() }),
    )
    .await
    .expect("dispatch did not close the collection window");

    assert_eq!((id_of(loaded.0), id_of(loaded.1)), (Some(1), Some(2)));
    assert_eq!(source.calls(), vec![vec![1, 2]]);
}

#[tokio::test]
async fn batch_delay_gathers_loads_from_other_tasks() {
    let source = Source::with_rows(vec![row(1, 1), row(2, 1)]);
    let config = LoaderConfig::default().with_batch_delay(Duration::from_millis(50));
    let (loader, _cancel) = by_id(&source, config);
    let loader = Arc::new(loader);

    let handles = ["1", "2"]
        .into_iter()
        .map(|raw_key| {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load(raw_key).await })
        })
        .collect::<Vec<_>>();
    let mut loaded = Vec::new();
    for handle in handles {
        loaded.push(id_of(handle.await.unwrap()));
    }

    assert_eq!(loaded, vec![Some(1), Some(2)]);
    assert_eq!(source.calls(), vec![vec![1, 2]]);
}
