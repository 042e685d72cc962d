use crate::converter::ParamValue;
use serde::ser::{Serialize, SerializeMap, Serializer};
use smallvec::SmallVec;
use std::sync::Arc;

/// Maximum number of path parameters before heap allocation.
/// Most routes carry ≤4 params (e.g. /org/{org}/users/{id}).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>`: they come from compiled templates that live for
/// the process lifetime, so cloning a name is an atomic increment.
pub type ParamVec = SmallVec<[(Arc<str>, ParamValue); MAX_INLINE_PARAMS]>;

/// Ordered path parameters accumulated while descending the routing tree.
///
/// Insertion order is preserved. Inserting an existing key replaces its value in
/// place, so parameters extracted by a nested node win over those of enclosing
/// mounts and hosts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathParams {
    params: ParamVec,
}

impl PathParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter.
    pub fn insert(&mut self, name: impl Into<Arc<str>>, value: impl Into<ParamValue>) {
        let name = name.into();
        let value = value.into();
        match self.params.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.params.push((name, value)),
        }
    }

    /// Builder-style [`PathParams::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<Arc<str>>, value: impl Into<ParamValue>) -> Self {
        self.insert(name, value);
        self
    }

    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.params
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamValue> {
        let idx = self.params.iter().position(|(k, _)| k.as_ref() == name)?;
        Some(self.params.remove(idx).1)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Merge `other` into `self`; keys from `other` win.
    pub fn merge(&mut self, other: &PathParams) {
        for (k, v) in other.iter() {
            self.insert(Arc::clone(k), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Arc<str>, ParamValue)> {
        self.params.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(k, _)| k.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for PathParams
where
    K: Into<Arc<str>>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = PathParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

impl Serialize for PathParams {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.params.len()))?;
        for (k, v) in &self.params {
            map.serialize_entry(k.as_ref(), v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut params = PathParams::new().with("org", "acme").with("id", 1i64);
        params.insert("org", "globex");
        let keys: Vec<&str> = params.keys().collect();
        assert_eq!(keys, vec!["org", "id"]);
        assert_eq!(params.get("org"), Some(&ParamValue::from("globex")));
    }

    #[test]
    fn test_merge_new_keys_win() {
        let mut outer = PathParams::new().with("tenant", "acme").with("id", 1i64);
        let inner = PathParams::new().with("id", 2i64);
        outer.merge(&inner);
        assert_eq!(outer.get("id"), Some(&ParamValue::Int(2)));
        assert_eq!(outer.len(), 2);
    }
}
