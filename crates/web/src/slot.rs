use std::sync::{Arc, PoisonError, RwLock};

/// A replaceable reference to a shared value.
///
/// Route handlers, exported procedures and the render hook each live in a
/// slot. Whoever holds the slot can swap the value for a proxy and later put
/// the original back; everyone calling through the slot sees the swap.
pub struct Slot<T: ?Sized> {
    current: RwLock<Arc<T>>,
}

impl<T: ?Sized> Slot<T> {
    pub fn new(value: Arc<T>) -> Self {
        Slot {
            current: RwLock::new(value),
        }
    }

    pub fn get(&self) -> Arc<T> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Install `value`, returning what was there before.
    pub fn replace(&self, value: Arc<T>) -> Arc<T> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, value)
    }

    /// True when the slot currently holds exactly `value`.
    pub fn holds(&self, value: &Arc<T>) -> bool {
        Arc::ptr_eq(&self.get(), value)
    }
}

impl<T: ?Sized> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Slot(..)")
    }
}
