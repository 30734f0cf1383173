//! Builders for the per-batch entity-to-key map.
//!
//! Rows are wrapped in an `Arc` once, so a row filed under several keys is shared rather than
//! copied.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

/// One-to-one grouping. If two rows share a key the later row wins.
pub fn by_key<K, E, F>(entities: Vec<E>, key_of: F) -> HashMap<K, Arc<E>>
where
    K: Eq + Hash,
    F: Fn(&E) -> K,
{
    entities.into_iter().map(|entity| (key_of(&entity), Arc::new(entity))).collect()
}

/// One-to-many grouping.
///
/// `keys_of` may return several keys for one row (a friendship belongs to both of its users) or
/// none at all (a workout outside any group). Rows keep the order the batch function returned
/// them in, and a row is filed at most once under each key.
pub fn by_keys<K, E, F, I>(entities: Vec<E>, keys_of: F) -> HashMap<K, Vec<Arc<E>>>
where
    K: Eq + Hash + Ord + Copy,
    F: Fn(&E) -> I,
    I: IntoIterator<Item = K>,
{
    let mut grouped: HashMap<K, Vec<Arc<E>>> = HashMap::new();
    for entity in entities {
        let mut keys = keys_of(&entity).into_iter().collect::<Vec<_>>();
        keys.sort_unstable();
        keys.dedup();
        let entity = Arc::new(entity);
        for key in keys {
            grouped.entry(key).or_default().push(Arc::clone(&entity));
        }
    }
    grouped
}
