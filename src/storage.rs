use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::HighlightResult;

/// The persisted string key-value facility the visit cache sits on.
///
/// Mirrors what the browser's `localStorage` offered: flat string keys and
/// values, shared by everything that uses the same store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> HighlightResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> HighlightResult<()>;
    fn remove(&self, key: &str) -> HighlightResult<()>;
    fn keys(&self) -> HighlightResult<Vec<String>>;
}

/// Process-local store, for tests and for running without a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> HighlightResult<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> HighlightResult<()> {
        self.values.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> HighlightResult<()> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }

    fn keys(&self) -> HighlightResult<Vec<String>> {
        Ok(self.values.borrow().keys().cloned().collect())
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> HighlightResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> HighlightResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> HighlightResult<()> {
        (**self).remove(key)
    }

    fn keys(&self) -> HighlightResult<Vec<String>> {
        (**self).keys()
    }
}
