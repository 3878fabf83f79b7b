//! certdash: wallet connectivity and resilient query core for the
//! certification dashboard.

pub mod backend;
pub mod config;
pub mod lifecycle;
pub mod notify;
pub mod observability;
pub mod query;
pub mod registry;
pub mod resilience;
pub mod wallet;

pub use config::DashboardConfig;
pub use lifecycle::{bootstrap, DashboardContext, Shutdown};
pub use query::{Fingerprint, QueryClient};
pub use registry::Registry;
pub use wallet::{SessionManager, WalletSession};
