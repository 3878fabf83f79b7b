//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Session manager, query client, notifier:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric helpers are free functions; without an installed recorder they are no-ops
//! - Log level from config, overridden by `RUST_LOG`

pub mod logging;
pub mod metrics;
