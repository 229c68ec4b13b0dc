//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! registry components produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout via the fmt layer
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields on every event (tracing)
//! - Log level follows the hot-reloaded settings
//! - Metrics are cheap and optional (no recorder, no cost)

pub mod logging;
pub mod metrics;
