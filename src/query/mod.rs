//! Resilient query subsystem.
//!
//! # Data Flow
//! ```text
//! read(fingerprint, fetcher, stale_time)
//!     → cache.rs (fresh? serve; stale? serve + revalidate; empty? wait)
//!     → client.rs (one spawned fetch per fingerprint, shared by all callers)
//!     → resilience (classify each failed attempt, back off, retry up to ceiling)
//!     → cache.rs (store data or record error, publish to subscribers)
//!
//! mutate(fetcher, on_error)
//!     → resilience (mutation ceiling)
//!     → notify (one report per terminal failure, plus 304 notice)
//! ```
//!
//! # Design Decisions
//! - Results are JSON values; callers deserialize into their own types
//! - A failed refresh never hides data that was already shown

pub mod cache;
pub mod client;
pub mod error;
pub mod fingerprint;

pub use cache::QueryState;
pub use client::QueryClient;
pub use error::{FetchError, QueryError};
pub use fingerprint::Fingerprint;
