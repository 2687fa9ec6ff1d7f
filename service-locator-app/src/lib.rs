//! Composition root for applications built around [service_locator].
//!
//! Services in a component-based runtime usually get registered by the modules providing them, in
//! no particular order. This crate provides an entrypoint in the form of
//! [Application](application::Application), which loads configuration and the contract catalog,
//! creates the [ServiceLocator](service_locator::locator::ServiceLocator) and drives
//! [ServicesReporters](reporter::ServicesReporter) through startup and shutdown. It also configures
//! supporting infrastructure, e.g. logging.
//!
//! ```
//! use service_locator::locator::ServiceLocator;
//! use service_locator::service::{Service, ServicePtr};
//! use service_locator::ServiceLocatorError;
//! use service_locator_app::application::ApplicationBuilder;
//! use service_locator_app::config::LocatorConfig;
//! use service_locator_app::reporter::ServicesReporter;
//!
//! struct Audio;
//!
//! impl Service for Audio {}
//!
//! struct AudioReporter;
//!
//! impl ServicesReporter for AudioReporter {
//!     fn register_services(&self, locator: &ServiceLocator) -> Result<(), ServiceLocatorError> {
//!         locator.register_service::<Audio, _>(ServicePtr::new(Audio))?;
//!         Ok(())
//!     }
//!
//!     fn unregister_services(&self, locator: &ServiceLocator) {
//!         locator.unregister_service::<Audio>();
//!     }
//! }
//!
//! let application = ApplicationBuilder::new()
//!     .with_config(LocatorConfig::default())
//!     .with_reporter(AudioReporter)
//!     .build()
//!     .unwrap();
//!
//! application.start().unwrap();
//! assert_eq!(application.shutdown().discarded_pending, 0);
//! ```

pub mod application;
pub mod config;
pub mod reporter;
