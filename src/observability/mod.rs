//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor and router produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters and gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout, human or JSON)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Structured fields (endpoint, slot, connection_id) on every pool event
//! - Metrics are cheap (no-ops until an exporter is installed)

pub mod logging;
pub mod metrics;
