// Value store for reqcraft
// Holds what the user typed, keyed by parameter id.
//
// Two implementations share one interface:
//   ScopedStore - owned by a single editor instance, dropped with it
//   SharedStore - cloneable handle over one map; every clone sees the same values
//
// The shared store is injected by the host application. Editors that share it
// and render the same operation overwrite each other's values, so use a
// ScopedStore wherever isolation matters.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;

/// A single stored entry. `None` items in a list are slots the user added
/// but never filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    List(Vec<Option<Value>>),
    Single(Value),
}

impl From<Value> for StoredValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => StoredValue::List(
                items
                    .into_iter()
                    .map(|v| if v.is_null() { None } else { Some(v) })
                    .collect(),
            ),
            other => StoredValue::Single(other),
        }
    }
}

impl From<&str> for StoredValue {
    fn from(value: &str) -> Self {
        StoredValue::Single(Value::String(value.to_string()))
    }
}

/// Common interface of the scoped and shared stores
pub trait ValueStore {
    fn get(&self, id: &str) -> Option<StoredValue>;

    fn has(&self, id: &str) -> bool;

    /// Replaces whatever is stored under `id`.
    fn set(&mut self, id: &str, value: StoredValue);

    /// Array-mode write. Without `index` the value is appended; with `index`
    /// it is assigned positionally, leaving holes when past the end. A
    /// non-list entry is replaced by a fresh list first.
    fn set_item(&mut self, id: &str, value: Option<Value>, index: Option<usize>);

    /// Without `index` the whole key is dropped; with `index` that position
    /// is spliced out of a list entry.
    fn remove(&mut self, id: &str, index: Option<usize>);
}

/// Store scoped to one editor instance
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedStore {
    values: HashMap<String, StoredValue>,
}

impl ScopedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl FromIterator<(String, StoredValue)> for ScopedStore {
    fn from_iter<T: IntoIterator<Item = (String, StoredValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl ValueStore for ScopedStore {
    fn get(&self, id: &str) -> Option<StoredValue> {
        self.values.get(id).cloned()
    }

    fn has(&self, id: &str) -> bool {
        self.values.contains_key(id)
    }

    fn set(&mut self, id: &str, value: StoredValue) {
        trace!(id, "store set");
        self.values.insert(id.to_string(), value);
    }

    fn set_item(&mut self, id: &str, value: Option<Value>, index: Option<usize>) {
        trace!(id, ?index, "store set item");
        let entry = self
            .values
            .entry(id.to_string())
            .or_insert_with(|| StoredValue::List(Vec::new()));
        if !matches!(entry, StoredValue::List(_)) {
            *entry = StoredValue::List(Vec::new());
        }
        let StoredValue::List(items) = entry else {
            return;
        };
        match index {
            None => items.push(value),
            Some(i) => {
                if i >= items.len() {
                    let Some(len) = i.checked_add(1) else {
                        return;
                    };
                    items.resize(len, None);
                }
                items[i] = value;
            }
        }
    }

    fn remove(&mut self, id: &str, index: Option<usize>) {
        trace!(id, ?index, "store remove");
        match index {
            None => {
                self.values.remove(id);
            }
            Some(i) => {
                if let Some(StoredValue::List(items)) = self.values.get_mut(id) {
                    if i < items.len() {
                        items.remove(i);
                    }
                }
            }
        }
    }
}

/// Process-wide store handle; clones share the underlying map
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    inner: Arc<RwLock<ScopedStore>>,
}

impl SharedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether two handles point at the same map.
    pub fn shares_with(&self, other: &SharedStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl ValueStore for SharedStore {
    fn get(&self, id: &str) -> Option<StoredValue> {
        self.inner.read().get(id)
    }

    fn has(&self, id: &str) -> bool {
        self.inner.read().has(id)
    }

    fn set(&mut self, id: &str, value: StoredValue) {
        self.inner.write().set(id, value);
    }

    fn set_item(&mut self, id: &str, value: Option<Value>, index: Option<usize>) {
        self.inner.write().set_item(id, value, index);
    }

    fn remove(&mut self, id: &str, index: Option<usize>) {
        self.inner.write().remove(id, index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_item_appends_and_creates_list() {
        let mut store = ScopedStore::new();
        store.set_item("p1", Some(json!("a")), None);
        store.set_item("p1", None, None);
        assert_eq!(
            store.get("p1"),
            Some(StoredValue::List(vec![Some(json!("a")), None]))
        );
    }

    #[test]
    fn set_item_past_end_leaves_holes() {
        let mut store = ScopedStore::new();
        store.set_item("p1", Some(json!("x")), Some(2));
        assert_eq!(
            store.get("p1"),
            Some(StoredValue::List(vec![None, None, Some(json!("x"))]))
        );
    }

    #[test]
    fn set_item_ignores_unreachable_index() {
        let mut store = ScopedStore::new();
        store.set_item("p1", Some(json!("a")), None);
        store.set_item("p1", Some(json!("b")), Some(usize::MAX));
        assert_eq!(store.get("p1"), Some(StoredValue::List(vec![Some(json!("a"))])));
    }

    #[test]
    fn set_item_replaces_single_value() {
        let mut store = ScopedStore::new();
        store.set("p1", "plain".into());
        store.set_item("p1", Some(json!(1)), None);
        assert_eq!(store.get("p1"), Some(StoredValue::List(vec![Some(json!(1))])));
    }

    #[test]
    fn remove_with_index_splices() {
        let mut store = ScopedStore::new();
        store.set("p1", json!(["a", "b", "c"]).into());
        store.remove("p1", Some(1));
        assert_eq!(
            store.get("p1"),
            Some(StoredValue::List(vec![Some(json!("a")), Some(json!("c"))]))
        );
        // out of range and non-list entries are left alone
        store.remove("p1", Some(9));
        store.set("p2", "v".into());
        store.remove("p2", Some(0));
        assert!(store.has("p2"));
        store.remove("p2", None);
        assert!(!store.has("p2"));
    }

    #[test]
    fn shared_store_clones_alias() {
        let mut a = SharedStore::new();
        let b = a.clone();
        a.set("id", "value".into());
        assert!(b.has("id"));
        assert!(a.shares_with(&b));
        assert!(!a.shares_with(&SharedStore::new()));
    }
}
