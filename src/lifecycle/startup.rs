//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the registry from validated configuration
//! - Instantiate wallet providers and start their watchers
//! - Spawn the session actor and wire the query client to the notifier
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Everything lives in one `DashboardContext` passed to callers; no globals

use std::sync::Arc;

use thiserror::Error;

use crate::backend::{BackendClient, BackendError};
use crate::config::{ConfigError, DashboardConfig};
use crate::lifecycle::Shutdown;
use crate::notify::{Notifier, TracingNotifier};
use crate::observability::metrics;
use crate::query::QueryClient;
use crate::registry::Registry;
use crate::resilience::RetryPolicy;
use crate::wallet::{self, NameResolver, ProviderSet, SessionManager};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("backend client error: {0}")]
    Backend(#[from] BackendError),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),
}

/// Everything the dashboard needs at runtime.
pub struct DashboardContext {
    pub config: DashboardConfig,
    pub registry: Arc<Registry>,
    pub session: SessionManager,
    pub query: QueryClient,
    pub backend: BackendClient,
    pub notifier: Arc<dyn Notifier>,
    pub shutdown: Shutdown,
}

impl DashboardContext {
    /// Stop background tasks.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }
}

/// Build the context with real providers. Must be called inside a Tokio runtime.
pub fn bootstrap(config: DashboardConfig) -> Result<DashboardContext, StartupError> {
    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let registry = Registry::from_config(&config.wallet)?.shared();
    let shutdown = Shutdown::new();
    let providers = wallet::build_providers(&registry, &config.session, &shutdown);
    let resolver = wallet::build_resolver(&registry, &config.session);

    assemble(config, registry, providers, resolver, Arc::new(TracingNotifier), shutdown)
}

/// Build the context around caller-supplied providers and notifier.
pub fn bootstrap_with(
    config: DashboardConfig,
    providers: ProviderSet,
    resolver: Option<Arc<dyn NameResolver>>,
    notifier: Arc<dyn Notifier>,
) -> Result<DashboardContext, StartupError> {
    let registry = Registry::from_config(&config.wallet)?.shared();
    assemble(config, registry, providers, resolver, notifier, Shutdown::new())
}

fn assemble(
    config: DashboardConfig,
    registry: Arc<Registry>,
    providers: ProviderSet,
    resolver: Option<Arc<dyn NameResolver>>,
    notifier: Arc<dyn Notifier>,
    shutdown: Shutdown,
) -> Result<DashboardContext, StartupError> {
    let backend = BackendClient::new(&config.backend)?;
    let policy = RetryPolicy::for_environment(config.environment, &config.query.retry);
    let query = QueryClient::new(&config.query, policy, Arc::clone(&notifier));
    let session = SessionManager::spawn(Arc::clone(&registry), providers, resolver, shutdown.subscribe());

    tracing::info!(
        environment = %config.environment,
        chains = registry.chains().len(),
        connectors = registry.connectors().len(),
        "Dashboard core ready"
    );

    Ok(DashboardContext {
        config,
        registry,
        session,
        query,
        backend,
        notifier,
        shutdown,
    })
}
