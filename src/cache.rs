use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Per-request memo of lookup outcomes.
///
/// A cache entry is a `Slot`: `Some(value)` for a key the batch function returned a row for and
/// `None` for a key it was asked about and had nothing for. A key that is not in the cache at all
/// has not been looked up yet.
pub trait Cache {
    type K;
    type V;

    /// Returns the slots of the provided keys in order, `None` for keys that were never loaded.
    fn get(&self, keys: &[Self::K]) -> Vec<Option<&Slot<Self::V>>>;

    /// Returns the provided keys that still have to be loaded.
    fn missing(&self, keys: &[Self::K]) -> Vec<Self::K>;

    fn insert(&mut self, key: Self::K, slot: Slot<Self::V>);
    fn insert_many<I: IntoIterator<Item = (Self::K, Slot<Self::V>)>>(&mut self, slots: I);

    fn remove(&mut self, keys: &[Self::K]);
    fn flush(&mut self);
}

pub type Slot<V> = Option<V>;

impl<K, V, S: BuildHasher> Cache for HashMap<K, Slot<V>, S>
where
    K: Eq + Hash + Copy,
{
    type K = K;
    type V = V;

    fn get(&self, keys: &[Self::K]) -> Vec<Option<&Slot<Self::V>>> {
        keys.iter().map(|k| HashMap::get(self, k)).collect::<Vec<_>>()
    }

    fn missing(&self, keys: &[Self::K]) -> Vec<Self::K> {
        keys.iter().filter(|k| !self.contains_key(k)).copied().collect::<Vec<_>>()
    }

    fn insert(&mut self, key: Self::K, slot: Slot<Self::V>) {
        HashMap::insert(self, key, slot);
    }

    fn insert_many<I: IntoIterator<Item = (Self::K, Slot<Self::V>)>>(&mut self, slots: I) {
        for (key, slot) in slots.into_iter() {
            HashMap::insert(self, key, slot);
        }
    }

    fn remove(&mut self, keys: &[Self::K]) {
        for key in keys.iter() {
            HashMap::remove(self, key);
        }
    }

    fn flush(&mut self) {
        self.clear();
    }
}
