//! Path-addressable map
//!
//! Keys are dot-separated paths into nested maps: `set("a.b", 1)` produces
//! `{"a": {"b": 1}}`. Writing a non-empty map merges it key by key instead of
//! replacing the subtree.

use std::collections::BTreeMap;

use crate::value_objects::Value;

/// Nested map addressed by dotted paths
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathMap {
    root: BTreeMap<String, Value>,
}

impl PathMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(root: BTreeMap<String, Value>) -> Self {
        let mut map = Self::new();
        map.add(root);
        map
    }

    /// Write a value at `path`; non-empty maps are merged recursively
    pub fn set(&mut self, path: &str, value: impl Into<Value>) {
        match value.into() {
            Value::Map(map) if !map.is_empty() => {
                for (key, value) in map {
                    self.set(&format!("{path}.{key}"), value);
                }
            }
            value => {
                let segments: Vec<&str> = path.split('.').collect();
                insert_at(&mut self.root, &segments, value);
            }
        }
    }

    /// Read the value at `path`
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.root.get(first)?;
        for segment in segments {
            current = current.as_map()?.get(segment)?;
        }
        (!current.is_null()).then_some(current)
    }

    /// Integer at `path`, zero when absent
    pub fn count(&self, path: &str) -> i64 {
        self.get(path).and_then(Value::as_i64).unwrap_or(0)
    }

    /// Add `delta` to the integer at `path`
    pub fn increment(&mut self, path: &str, delta: i64) -> i64 {
        let value = self.count(path) + delta;
        self.set(path, value);
        value
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Delete the value at `path`, returning it
    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let (parent_path, last) = match path.rsplit_once('.') {
            Some((parent, last)) => (Some(parent), last),
            None => (None, path),
        };
        let parent = match parent_path {
            None => &mut self.root,
            Some(parent_path) => {
                let mut node = &mut self.root;
                for segment in parent_path.split('.') {
                    node = node.get_mut(segment)?.as_map_mut()?;
                }
                node
            }
        };
        parent.remove(last)
    }

    /// Alias of [`PathMap::remove`] matching the queue vocabulary
    pub fn pop(&mut self, path: &str) -> Option<Value> {
        self.remove(path)
    }

    /// Merge every entry of `data` (keys may be paths)
    pub fn add(&mut self, data: BTreeMap<String, Value>) {
        for (key, value) in data {
            self.set(&key, value);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    pub fn clear(&mut self) {
        self.root.clear();
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.root
    }

    pub fn to_value(&self) -> Value {
        Value::Map(self.root.clone())
    }
}

/// Insert along `segments`, creating maps on the way.
///
/// A non-map value standing where a map is needed moves to the shadow key
/// `_<segment>` so it is never silently dropped.
fn insert_at(node: &mut BTreeMap<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            node.insert(last.to_string(), value);
        }
        [head, rest @ ..] => {
            let slot = node
                .entry(head.to_string())
                .or_insert_with(|| Value::Map(BTreeMap::new()));
            if !matches!(slot, Value::Map(_)) {
                let old = std::mem::replace(slot, Value::Map(BTreeMap::new()));
                node.insert(format!("_{head}"), old);
            }
            if let Some(Value::Map(child)) = node.get_mut(*head) {
                insert_at(child, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_set_and_get() {
        let mut map = PathMap::new();
        map.set("a.b.c", 1);
        assert_eq!(map.get("a.b.c"), Some(&Value::Int(1)));
        assert!(map.get("a.b").and_then(Value::as_map).is_some());
        assert_eq!(map.get("a.x"), None);
        assert_eq!(map.get("a.b.c.d"), None);
    }

    #[test]
    fn test_shadow_key_keeps_demoted_scalar() {
        let mut map = PathMap::new();
        map.set("a.b", 1);
        map.set("a.b.c", 2);
        assert_eq!(map.get("a.b.c"), Some(&Value::Int(2)));
        assert_eq!(map.get("a._b"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_map_values_merge() {
        let mut map = PathMap::new();
        map.set("user.name", "bob");
        map.set("user", Value::map([("age", 1)]));
        assert_eq!(map.get("user.name"), Some(&Value::from("bob")));
        assert_eq!(map.get("user.age"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_empty_map_is_stored() {
        let mut map = PathMap::new();
        map.set("a", Value::Map(BTreeMap::new()));
        assert_eq!(map.get("a"), Some(&Value::Map(BTreeMap::new())));
    }

    #[test]
    fn test_remove_and_counts() {
        let mut map = PathMap::new();
        assert_eq!(map.increment("counts.n", 1), 1);
        assert_eq!(map.increment("counts.n", 1), 2);
        assert_eq!(map.count("counts.missing"), 0);
        assert_eq!(map.remove("counts.n"), Some(Value::Int(2)));
        assert!(!map.contains("counts.n"));
        assert_eq!(map.remove("nothing.here"), None);

        map.set("focus", "x");
        assert_eq!(map.pop("focus"), Some(Value::from("x")));
        assert!(map.get("focus").is_none());
    }

    #[test]
    fn test_dotted_keys_in_added_data() {
        let mut map = PathMap::new();
        let mut data = BTreeMap::new();
        data.insert("keys.mykey".to_string(), Value::map([("hi", "hola")]));
        map.add(data);
        assert_eq!(map.get("keys.mykey.hi"), Some(&Value::from("hola")));
    }
}
