use std::{collections::BTreeMap, str::FromStr};

/// An ordered set of key/value parameters.
///
/// Besides its local entries a set may subscribe to named global sets, which are consulted (in
/// subscription order) for keys not found locally. Global sets live in the owning graph; see
/// [`GlobalParams`].
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Params {
    local: BTreeMap<String, String>,
    global_sets: Vec<String>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key`. An existing value is only replaced when `overwrite` is set. Returns whether
    /// the value was stored.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
        overwrite: bool,
    ) -> bool {
        let key = key.into();
        if !overwrite && self.local.contains_key(&key) {
            return false;
        }
        self.local.insert(key, value.into());
        true
    }

    /// Merges every local entry and subscription of `other` into `self`.
    pub fn insert_all(&mut self, other: &Params, overwrite: bool) {
        for (key, value) in &other.local {
            self.insert(key.clone(), value.clone(), overwrite);
        }
        for set in &other.global_sets {
            self.add_global_set(set.clone());
        }
    }

    pub fn add_global_set(&mut self, set: impl Into<String>) {
        let set = set.into();
        if !self.global_sets.contains(&set) {
            self.global_sets.push(set);
        }
    }

    /// Looks `key` up locally only.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.local.get(key).map(String::as_str)
    }

    /// Looks `key` up locally only and parses it.
    pub fn find<T: FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    pub fn find_or<T: FromStr>(&self, key: &str, default: T) -> T {
        self.find(key).unwrap_or(default)
    }

    /// Looks `key` up locally, then in each subscribed global set.
    pub fn resolve<'a>(&'a self, key: &str, globals: &'a GlobalParams) -> Option<&'a str> {
        self.get(key).or_else(|| {
            self.global_sets
                .iter()
                .filter_map(|set| globals.get(set))
                .find_map(|set| set.get(key))
        })
    }

    pub fn local_keys(&self) -> Vec<String> {
        self.local.keys().cloned().collect()
    }

    pub fn subscribed_global_sets(&self) -> &[String] {
        &self.global_sets
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.local.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    delegate::delegate! {
        to self.local {
            pub fn len(&self) -> usize;
            pub fn is_empty(&self) -> bool;
            #[call(contains_key)]
            pub fn contains(&self, key: &str) -> bool;
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v, true);
        }
        params
    }
}

/// Named global parameter sets, keyed by set name.
pub type GlobalParams = BTreeMap<String, Params>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overwrite_policy() {
        let mut p = Params::new();
        assert!(p.insert("clock", "1GHz", false));
        assert!(!p.insert("clock", "2GHz", false));
        assert_eq!(p.get("clock"), Some("1GHz"));
        assert!(p.insert("clock", "2GHz", true));
        assert_eq!(p.get("clock"), Some("2GHz"));
    }

    #[test]
    fn typed_lookup() {
        let p: Params = [("width", "64"), ("name", "cpu")].into_iter().collect();
        assert_eq!(p.find::<u32>("width"), Some(64));
        assert_eq!(p.find::<u32>("name"), None);
        assert_eq!(p.find_or("depth", 8u32), 8);
        assert_eq!(p.local_keys(), vec!["name".to_string(), "width".to_string()]);
    }

    #[test]
    fn global_inheritance() {
        let mut globals = GlobalParams::new();
        globals
            .entry("mem".to_string())
            .or_default()
            .insert("size", "4GiB", true);
        let mut p = Params::new();
        p.insert("latency", "10ns", true);
        p.add_global_set("mem");
        p.add_global_set("mem");
        assert_eq!(p.subscribed_global_sets(), ["mem".to_string()]);
        assert_eq!(p.resolve("size", &globals), Some("4GiB"));
        assert_eq!(p.resolve("latency", &globals), Some("10ns"));
        assert_eq!(p.resolve("missing", &globals), None);
    }
}
