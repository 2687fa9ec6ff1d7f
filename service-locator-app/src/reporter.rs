//! Reporters register groups of services when the application starts and remove them on shutdown.

#[cfg(test)]
use mockall::automock;
use service_locator::locator::ServiceLocator;
use service_locator::ServiceLocatorError;

pub type ServicesReporterPtr = Box<dyn ServicesReporter>;

/// Registers a group of services. Reporters are run by the
/// [Application](crate::application::Application) in priority order.
#[cfg_attr(test, automock)]
pub trait ServicesReporter {
    /// Registers provided services. Services with unmet prerequisites are expected to wait in the
    /// locator, so reporters don't need to be ordered by dependencies.
    fn register_services(&self, locator: &ServiceLocator) -> Result<(), ServiceLocatorError>;

    /// Removes services registered by this reporter.
    fn unregister_services(&self, locator: &ServiceLocator);

    /// Returns the priority for this reporter. Higher priorities get registered first and
    /// unregistered last. Default 0.
    fn priority(&self) -> i8 {
        0
    }
}
