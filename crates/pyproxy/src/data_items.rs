//! Values computed once per process and kept for as long as it is attached.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::{
    any::{Any, TypeId},
    fmt,
};

type Key = (TypeId, String);

/// A per-process cache of lazily computed values.
///
/// Entries are keyed by name and by the type of the value, so two items of
/// different types never collide. The cache lives exactly as long as the
/// process attachment that owns it, it must never be shared between
/// processes.
#[derive(Default)]
pub struct DataItems {
    items: Mutex<HashMap<Key, Box<dyn Any + Send + Sync>>>,
}

impl DataItems {
    /// Construct an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached value.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: 'static + Clone,
    {
        let items = self.items.lock();
        let item = items.get(&(TypeId::of::<T>(), key.to_string()))?;
        item.downcast_ref::<T>().cloned()
    }

    /// Get a cached value, or compute and store it.
    ///
    /// Failures are not cached, the next call tries again. The computation
    /// runs without holding the lock, if two callers race the value which was
    /// stored first wins and is returned to both.
    pub fn get_or_try_insert_with<T, E, F>(&self, key: &str, f: F) -> Result<T, E>
    where
        T: 'static + Clone + Send + Sync,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get::<T>(key) {
            return Ok(value);
        }

        let value = f()?;

        let mut items = self.items.lock();
        let item = items
            .entry((TypeId::of::<T>(), key.to_string()))
            .or_insert_with(|| Box::new(value.clone()));

        Ok(item.downcast_ref::<T>().cloned().unwrap_or(value))
    }

    /// Discard a single item.
    pub fn remove<T>(&self, key: &str) -> bool
    where
        T: 'static,
    {
        self.items
            .lock()
            .remove(&(TypeId::of::<T>(), key.to_string()))
            .is_some()
    }

    /// Discard everything, like when the process detaches.
    pub fn clear(&self) {
        self.items.lock().clear();
    }

    /// Number of cached items.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Test if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl fmt::Debug for DataItems {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("DataItems")
            .field("len", &self.len())
            .finish()
    }
}
