//! Retry classification and ceilings.
//!
//! # Responsibilities
//! - Name the two failure classes every fetch failure falls into
//! - Decide, per attempt, whether another attempt is allowed
//! - Supply the backoff delay for the next attempt

use std::fmt;
use std::time::Duration;

use crate::config::{Environment, RetryConfig};
use crate::resilience::backoff::calculate_backoff;

/// Failure class of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 401/403 or a rejected signature. Retrying cannot help.
    Authentication,
    /// Anything else.
    Transient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Read,
    Mutation,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Mutation => "mutation",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Environment-dependent retry ceilings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    environment: Environment,
    read_max_retries: u32,
    mutation_max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    /// Configured ceilings in production, none in development.
    pub fn for_environment(environment: Environment, config: &RetryConfig) -> Self {
        let (read, mutation) = if environment.is_production() {
            (config.read_max_retries, config.mutation_max_retries)
        } else {
            (0, 0)
        };
        Self {
            environment,
            read_max_retries: read,
            mutation_max_retries: mutation,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Extra attempts allowed after the first one.
    pub fn max_retries(&self, kind: OperationKind) -> u32 {
        match kind {
            OperationKind::Read => self.read_max_retries,
            OperationKind::Mutation => self.mutation_max_retries,
        }
    }

    /// Whether a failure of `class` after `retries_so_far` retries gets another attempt.
    pub fn should_retry(&self, class: ErrorClass, kind: OperationKind, retries_so_far: u32) -> bool {
        match class {
            ErrorClass::Authentication => false,
            ErrorClass::Transient => retries_so_far < self.max_retries(kind),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        calculate_backoff(retry, self.base_delay_ms, self.max_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production() -> RetryPolicy {
        RetryPolicy::for_environment(Environment::Production, &RetryConfig::default())
    }

    #[test]
    fn test_production_ceilings() {
        let policy = production();
        assert_eq!(policy.max_retries(OperationKind::Read), 4);
        assert_eq!(policy.max_retries(OperationKind::Mutation), 0);
        assert!(policy.should_retry(ErrorClass::Transient, OperationKind::Read, 3));
        assert!(!policy.should_retry(ErrorClass::Transient, OperationKind::Read, 4));
        assert!(!policy.should_retry(ErrorClass::Transient, OperationKind::Mutation, 0));
    }

    #[test]
    fn test_configured_mutation_ceiling() {
        let config = RetryConfig {
            mutation_max_retries: 2,
            ..RetryConfig::default()
        };
        let policy = RetryPolicy::for_environment(Environment::Production, &config);
        assert!(policy.should_retry(ErrorClass::Transient, OperationKind::Mutation, 1));
        assert!(!policy.should_retry(ErrorClass::Transient, OperationKind::Mutation, 2));
    }

    #[test]
    fn test_authentication_never_retried() {
        let policy = production();
        assert!(!policy.should_retry(ErrorClass::Authentication, OperationKind::Read, 0));
        assert!(!policy.should_retry(ErrorClass::Authentication, OperationKind::Mutation, 0));
    }

    #[test]
    fn test_development_never_retries() {
        let policy = RetryPolicy::for_environment(Environment::Development, &RetryConfig::default());
        assert_eq!(policy.max_retries(OperationKind::Read), 0);
        assert!(!policy.should_retry(ErrorClass::Transient, OperationKind::Read, 0));
    }
}
