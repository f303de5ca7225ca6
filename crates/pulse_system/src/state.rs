//! Per-system local state — an opaque, typed key-value store.
//!
//! Each system gets one [`StateMap`] at registration. It persists across
//! pulses for the system's lifetime and is never touched by the scheduler or
//! by other systems, so no locking is visible to the system itself: access
//! always happens from the single sequential pulse execution path.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Durable scratch state for one system, keyed by string.
///
/// Values are type-erased; accessors downcast to the requested type and
/// return `None` on a key miss or type mismatch.
#[derive(Default)]
pub struct StateMap {
    entries: HashMap<String, Box<dyn Any + Send>>,
}

impl StateMap {
    /// Create an empty state map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a reference to the value at `key`, if present with type `T`.
    #[must_use]
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns a mutable reference to the value at `key`, if present with
    /// type `T`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn insert<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.entries.insert(key.into(), Box::new(value));
    }

    /// Remove and return the value at `key`, if present with type `T`.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        // Only remove entries of the requested type; a mismatched entry stays.
        if self.entries.get(key).is_some_and(|v| v.is::<T>()) {
            let boxed = self.entries.remove(key)?;
            return boxed.downcast::<T>().ok().map(|b| *b);
        }
        None
    }

    /// Returns the value at `key`, inserting `default()` first if the key is
    /// missing or holds a value of a different type.
    pub fn get_or_insert_with<T: Any + Send>(
        &mut self,
        key: &str,
        default: impl FnOnce() -> T,
    ) -> &mut T {
        let usable = self.entries.get(key).is_some_and(|v| v.is::<T>());
        if !usable {
            self.entries.insert(key.to_owned(), Box::new(default()));
        }
        // The entry now exists and holds a T.
        self.entries
            .get_mut(key)
            .and_then(|v| v.downcast_mut::<T>())
            .expect("entry holds T after insert")
    }

    /// Returns `true` if `key` has a value of any type.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl fmt::Debug for StateMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.entries.keys()).finish()
    }
}
