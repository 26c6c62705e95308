//! The notebook-wide variable store.

use rustc_hash::FxHashMap;

use super::value::Value;

/// Ordered mapping from variable name to value.
///
/// Insertion order is kept for display; equality ignores it. Overwriting an
/// existing key keeps the key's original position.
#[derive(Debug, Clone, Default)]
pub struct State {
    entries: Vec<(String, Value)>,
    index: FxHashMap<String, usize>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&i| &self.entries[i].1)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        match self.index.get(key) {
            Some(&i) => Some(&mut self.entries[i].1),
            None => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Bind `key` to `value`, returning the previous value if there was one.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        let key = key.into();
        if let Some(&i) = self.index.get(&key) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
        None
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.index.remove(key)?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// JSON object view, in insertion order where the JSON map preserves it.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(k, v)| other.get(k) == Some(v))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for State {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut state = State::new();
        for (k, v) in iter {
            state.insert(k, v);
        }
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_position() {
        let mut state = State::new();
        state.insert("a", Value::Int(1));
        state.insert("b", Value::Int(2));
        assert_eq!(state.insert("a", Value::Int(3)), Some(Value::Int(1)));

        let keys: Vec<_> = state.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(state.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn test_remove_reindexes() {
        let mut state: State = [("a", Value::Int(1)), ("b", Value::Int(2)), ("c", Value::Int(3))]
            .into_iter()
            .collect();
        assert_eq!(state.remove("a"), Some(Value::Int(1)));
        assert_eq!(state.get("c"), Some(&Value::Int(3)));
        assert_eq!(state.get("b"), Some(&Value::Int(2)));
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn test_equality_ignores_order() {
        let a: State = [("x", Value::Int(1)), ("y", Value::Int(2))].into_iter().collect();
        let b: State = [("y", Value::Int(2)), ("x", Value::Int(1))].into_iter().collect();
        assert_eq!(a, b);
    }
}
