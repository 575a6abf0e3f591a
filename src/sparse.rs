use std::collections::{btree_map, BTreeMap};

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

/// A value that knows its own key.
pub trait Keyed {
    type Key: Ord + Clone + std::fmt::Debug;

    fn key(&self) -> Self::Key;
}

/// A map of values indexed by their own keys.
///
/// Iteration is always in ascending key order, never in insertion or hash order, so every rank
/// walking the same graph visits entries identically. Serialized as the sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMap<V: Keyed> {
    inner: BTreeMap<V::Key, V>,
}

impl<V: Keyed> Default for SparseMap<V> {
    fn default() -> Self {
        Self {
            inner: BTreeMap::new(),
        }
    }
}

impl<V: Keyed> SparseMap<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `value` under its own key, returning the value it replaced.
    pub fn insert(&mut self, value: V) -> Option<V> {
        self.inner.insert(value.key(), value)
    }

    pub fn get(&self, key: &V::Key) -> Option<&V> {
        self.inner.get(key)
    }

    pub fn get_mut(&mut self, key: &V::Key) -> Option<&mut V> {
        self.inner.get_mut(key)
    }

    pub fn contains(&self, key: &V::Key) -> bool {
        self.inner.contains_key(key)
    }

    pub fn iter(&self) -> btree_map::Values<'_, V::Key, V> {
        self.inner.values()
    }

    pub fn iter_mut(&mut self) -> btree_map::ValuesMut<'_, V::Key, V> {
        self.inner.values_mut()
    }

    delegate::delegate! {
        to self.inner {
            pub fn len(&self) -> usize;
            pub fn is_empty(&self) -> bool;
            pub fn clear(&mut self);
            pub fn keys(&self) -> btree_map::Keys<'_, V::Key, V>;
            pub fn remove(&mut self, key: &V::Key) -> Option<V>;
        }
    }
}

impl<'a, V: Keyed> IntoIterator for &'a SparseMap<V> {
    type Item = &'a V;
    type IntoIter = btree_map::Values<'a, V::Key, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V: Keyed> FromIterator<V> for SparseMap<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        let mut map = Self::new();
        for value in iter {
            map.insert(value);
        }
        map
    }
}

impl<V: Keyed + Serialize> Serialize for SparseMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.inner.values())
    }
}

impl<'de, V: Keyed + DeserializeOwned> Deserialize<'de> for SparseMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<V>::deserialize(deserializer)?;
        Ok(values.into_iter().collect())
    }
}
