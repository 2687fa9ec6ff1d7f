//! Core application functionality.

use crate::config::LocatorConfig;
use crate::reporter::{ServicesReporter, ServicesReporterPtr};
use config::ConfigError;
use derive_more::Constructor;
use service_locator::contract::ContractCatalog;
use service_locator::dependency_cache::DependencyCache;
use service_locator::locator::{ServiceDiscoveryPtr, ServiceLocator, ServiceLocatorBuilder};
use service_locator::service::ServicePtr;
use service_locator::{CatalogError, ServiceLocatorError};
use std::cmp::Reverse;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Error loading configuration: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("Error reading dependency cache '{}': {message}", .path.display())]
    CacheReadError { path: PathBuf, message: String },
    #[error("Error applying dependency cache: {0}")]
    CatalogError(#[from] CatalogError),
    #[error("Error registering services: {0}")]
    RegistrationError(#[from] ServiceLocatorError),
}

/// Summary of an application shutdown.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Constructor)]
pub struct ShutdownReport {
    /// Number of services which never got their prerequisites registered.
    pub discarded_pending: usize,
}

/// Builder for [Application] with sensible defaults, for easy construction.
#[derive(Default)]
pub struct ApplicationBuilder {
    config: Option<LocatorConfig>,
    catalog: Option<ContractCatalog>,
    discovery: Option<ServiceDiscoveryPtr>,
    reporters: Vec<ServicesReporterPtr>,
}

impl ApplicationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses given config instead of loading it from the environment.
    pub fn with_config(mut self, config: LocatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses given catalog instead of the statically declared one.
    pub fn with_catalog(mut self, catalog: ContractCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_discovery(mut self, discovery: ServiceDiscoveryPtr) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn with_reporter<R: ServicesReporter + 'static>(mut self, reporter: R) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    /// Builds resulting [Application], installing the tracing logger and loading the contract
    /// catalog along the way.
    pub fn build(self) -> Result<Application, ApplicationError> {
        let config = match self.config {
            Some(config) => config,
            None => LocatorConfig::init_from_environment()?,
        };

        if config.install_tracing_logger {
            install_tracing_logger();
        }

        let mut catalog = self.catalog.unwrap_or_else(ContractCatalog::from_static);
        if let Some(path) = &config.dependency_cache {
            apply_dependency_cache(&mut catalog, path)?;
        }

        debug!(contracts = catalog.len(), mode = ?config.mode, "Creating service locator.");

        let mut builder = ServiceLocatorBuilder::new()
            .with_mode(config.mode)
            .with_catalog(catalog);

        if let Some(discovery) = self.discovery {
            builder = builder.with_discovery(discovery);
        }

        let mut reporters = self.reporters;
        reporters.sort_by_key(|reporter| Reverse(reporter.priority()));

        Ok(Application {
            config,
            locator: builder.build(),
            reporters,
        })
    }
}

/// Main entrypoint for the application. Owns the [ServiceLocator] and drives
/// [ServicesReporters](ServicesReporter) through startup and shutdown.
pub struct Application {
    config: LocatorConfig,
    locator: ServicePtr<ServiceLocator>,
    reporters: Vec<ServicesReporterPtr>,
}

impl Application {
    #[inline]
    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    #[inline]
    pub fn locator(&self) -> &ServicePtr<ServiceLocator> {
        &self.locator
    }

    /// Runs all reporters, highest priority first.
    pub fn start(&self) -> Result<(), ApplicationError> {
        info!("Registering services...");

        for reporter in &self.reporters {
            reporter.register_services(&self.locator)?;
        }

        let pending = self.locator.pending_count();
        if pending > 0 {
            info!(pending, "Some services are waiting for their dependencies.");
        }

        Ok(())
    }

    /// Marks the locator as quitting, lets reporters unregister their services in reverse order
    /// and tears down everything left.
    pub fn shutdown(&self) -> ShutdownReport {
        info!("Shutting down...");

        self.locator.set_quitting();

        for reporter in self.reporters.iter().rev() {
            reporter.unregister_services(&self.locator);
        }

        ShutdownReport::new(self.locator.unregister_all())
    }
}

fn apply_dependency_cache(catalog: &mut ContractCatalog, path: &Path) -> Result<(), ApplicationError> {
    let json = fs::read_to_string(path).map_err(|error| ApplicationError::CacheReadError {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;

    let cache = DependencyCache::from_json(&json)?;
    catalog.apply_dependency_cache(&cache)?;

    debug!(entries = cache.entries().len(), "Applied dependency cache.");
    Ok(())
}

fn install_tracing_logger() {
    if tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .is_err()
    {
        warn!("Global tracing subscriber is already installed - skipping.");
    }
}

#[cfg(test)]
mod tests {
    use crate::application::{ApplicationBuilder, ApplicationError, ShutdownReport};
    use crate::config::LocatorConfig;
    use crate::reporter::MockServicesReporter;
    use mockall::predicate::*;
    use mockall::Sequence;
    use service_locator::contract::{ContractCatalog, ContractId};
    use service_locator::locator::LocatorMode;
    use service_locator::service::{Service, ServicePtr};
    use service_locator::ServiceLocatorError;
    use std::path::PathBuf;

    struct Audio;

    impl Service for Audio {}

    struct Music;

    impl Service for Music {
        fn prerequisites(&self) -> Vec<ContractId> {
            vec![ContractId::of::<Audio>()]
        }
    }

    fn config() -> LocatorConfig {
        LocatorConfig::new(LocatorMode::Production, None, false)
    }

    fn reporter(priority: i8, seq: &mut Sequence) -> MockServicesReporter {
        let mut reporter = MockServicesReporter::new();
        reporter.expect_priority().return_const(priority);
        reporter
            .expect_register_services()
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(()));
        reporter
    }

    #[test]
    fn should_register_by_priority_and_unregister_in_reverse() {
        let mut registration = Sequence::new();
        let mut unregistration = Sequence::new();

        // registered in sequence of expectation creation, so high priority first
        let mut high = reporter(10, &mut registration);
        let mut low = reporter(-5, &mut registration);

        low.expect_unregister_services()
            .times(1)
            .in_sequence(&mut unregistration)
            .return_const(());
        high.expect_unregister_services()
            .times(1)
            .in_sequence(&mut unregistration)
            .return_const(());

        let application = ApplicationBuilder::new()
            .with_config(config())
            .with_catalog(ContractCatalog::default())
            .with_reporter(low)
            .with_reporter(high)
            .build()
            .unwrap();

        application.start().unwrap();
        assert_eq!(application.shutdown(), ShutdownReport::new(0));
        assert!(application.locator().is_quitting());
    }

    #[test]
    fn should_propagate_registration_error() {
        let mut reporter = MockServicesReporter::new();
        reporter.expect_priority().return_const(0i8);
        reporter
            .expect_register_services()
            .returning(|_| Err(ServiceLocatorError::AlreadyRegistered(ContractId::of::<Audio>())));

        let application = ApplicationBuilder::new()
            .with_config(config())
            .with_catalog(ContractCatalog::default())
            .with_reporter(reporter)
            .build()
            .unwrap();

        assert!(matches!(
            application.start().unwrap_err(),
            ApplicationError::RegistrationError(ServiceLocatorError::AlreadyRegistered(_))
        ));
    }

    #[test]
    fn should_report_discarded_pending_services() {
        let mut reporter = MockServicesReporter::new();
        reporter.expect_priority().return_const(0i8);
        reporter.expect_register_services().returning(|locator| {
            locator
                .register_service::<Music, _>(ServicePtr::new(Music))
                .map(|_| ())
        });
        reporter
            .expect_unregister_services()
            .with(always())
            .return_const(());

        let application = ApplicationBuilder::new()
            .with_config(config())
            .with_catalog(ContractCatalog::default())
            .with_reporter(reporter)
            .build()
            .unwrap();

        application.start().unwrap();

        assert_eq!(application.locator().pending_count(), 1);
        assert_eq!(application.shutdown(), ShutdownReport::new(1));
    }

    #[test]
    fn should_fail_on_missing_dependency_cache() {
        let config = LocatorConfig::new(
            LocatorMode::Production,
            Some(PathBuf::from("missing/dependency_cache.json")),
            false,
        );

        assert!(matches!(
            ApplicationBuilder::new()
                .with_config(config)
                .with_catalog(ContractCatalog::default())
                .build()
                .err()
                .unwrap(),
            ApplicationError::CacheReadError { .. }
        ));
    }

    #[test]
    fn should_create_locator_in_configured_mode() {
        let application = ApplicationBuilder::new()
            .with_config(LocatorConfig::new(LocatorMode::Tooling, None, false))
            .with_catalog(ContractCatalog::default())
            .build()
            .unwrap();

        assert_eq!(application.locator().mode(), LocatorMode::Tooling);
        assert_eq!(application.config().mode, LocatorMode::Tooling);
    }
}
