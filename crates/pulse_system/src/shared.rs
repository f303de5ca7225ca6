//! Shared scheduler state — positional values handed to every invocation.
//!
//! The host captures an ordered list of values when constructing the
//! scheduler; every system sees the same list through its context. Values
//! are type-erased and addressed either positionally or by first-of-type.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Ordered, immutable list of scheduler-wide context values.
#[derive(Clone, Default)]
pub struct SharedState {
    values: Vec<Arc<dyn Any + Send + Sync>>,
}

impl SharedState {
    /// Create an empty shared-state list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value to the list.
    #[must_use]
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.values.push(Arc::new(value));
        self
    }

    /// Returns the value at `index` if it has type `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Option<&T> {
        self.values.get(index).and_then(|v| v.downcast_ref::<T>())
    }

    /// Returns the first value of type `T`, in insertion order.
    #[must_use]
    pub fn find<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.values.iter().find_map(|v| v.downcast_ref::<T>())
    }

    /// Returns the number of captured values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if no values were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for SharedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedState")
            .field("len", &self.values.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_access() {
        let shared = SharedState::new().with("world".to_owned()).with(42u32);
        assert_eq!(shared.get::<String>(0).map(String::as_str), Some("world"));
        assert_eq!(shared.get::<u32>(1), Some(&42));
        assert_eq!(shared.get::<u32>(0), None, "wrong type at index");
        assert_eq!(shared.get::<u32>(9), None, "out of range");
    }

    #[test]
    fn test_find_first_of_type() {
        let shared = SharedState::new().with(1u32).with(2u32);
        assert_eq!(shared.find::<u32>(), Some(&1));
        assert_eq!(shared.find::<i64>(), None);
    }
}
