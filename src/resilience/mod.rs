//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Slot connection exits:
//!     → retries.rs (read the pool-wide retry count)
//!     → backoff.rs (delay for that count, plus jitter)
//!     → retries.rs (increment after the delay, reset once a restart connects)
//! ```
//!
//! # Design Decisions
//! - Bounded exponential growth, capped at one minute
//! - Jitter de-synchronizes slots that dropped together
//! - One counter per container, not per slot

pub mod backoff;
pub mod retries;

pub use backoff::{reconnect_delay, BackoffPolicy};
pub use retries::RetryCounter;
