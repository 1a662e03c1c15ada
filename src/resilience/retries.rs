//! Reconnect retry counter.
//!
//! One counter is shared by every slot of a container. It paces the whole
//! pool's reconnects: slots that drop together back off together, and if they
//! keep failing they all wait longer. It is not a per-slot attempt count.

use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Debug, Default)]
pub struct RetryCounter(AtomicU32);

impl RetryCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u32 {
        self.0.load(Ordering::Acquire)
    }

    /// Increment and return the new value. Saturates at `u32::MAX`.
    pub fn increment(&self) -> u32 {
        let previous = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| Some(n.saturating_add(1)))
            .unwrap_or(u32::MAX);
        previous.saturating_add(1)
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_increment_and_reset() {
        let counter = RetryCounter::new();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.current(), 2);
        counter.reset();
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_saturates() {
        let counter = RetryCounter(AtomicU32::new(u32::MAX));
        assert_eq!(counter.increment(), u32::MAX);
    }

    #[test]
    fn test_concurrent_increments() {
        let counter = Arc::new(RetryCounter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        counter.increment();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.current(), 800);
    }
}
