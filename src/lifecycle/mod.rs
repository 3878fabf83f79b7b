//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validated config → Registry → Providers + watchers → Session actor → Query client
//!
//! Shutdown (shutdown.rs):
//!     trigger() → watchers, event forwarders and session actor exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → trigger shutdown
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{bootstrap, bootstrap_with, DashboardContext, StartupError};
