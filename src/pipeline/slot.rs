use std::sync::{Mutex, PoisonError};

/// Single-slot hand-off that keeps only the newest value.
///
/// The producer never waits: `put` overwrites whatever the consumer has not
/// taken yet and hands the stale value back so it can be counted.
#[derive(Debug, Default)]
pub struct LatestSlot<T> {
    value: Mutex<Option<T>>,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    /// Store `value`, returning the undelivered value it replaced.
    pub fn put(&self, value: T) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(value)
    }

    pub fn take(&self) -> Option<T> {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_empty(&self) -> bool {
        self.value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}
