//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Fetch attempt fails:
//!     → retries.rs (classify: authentication vs transient)
//!     → retries.rs (ceiling for environment + operation kind)
//!     → backoff.rs (exponential delay with jitter before next attempt)
//! ```
//!
//! # Design Decisions
//! - Authentication failures are never retried
//! - Development never retries; failures surface immediately
//! - Each attempt is classified on its own; earlier attempts don't bias later ones

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{ErrorClass, OperationKind, RetryPolicy};
