//! A service registry with deferred dependency resolution, for component-based runtimes where
//! services come and go in arbitrary order.
//!
//! Services register themselves in a [ServiceLocator](locator::ServiceLocator) under a
//! [contract](contract), usually a trait object. A service whose prerequisites are not yet
//! registered is held pending and activated automatically once they are. Consumers declare
//! dependencies in [Injected](dependency::Injected) slots, which get filled immediately or once the
//! required services show up.
//!
//! ```
//! use service_locator::dependency::Injected;
//! use service_locator::locator::ServiceLocatorBuilder;
//! use service_locator::service::{Service, ServicePtr, TypedServiceProvider};
//! use service_locator::{provides, service_contract, Inject};
//!
//! #[service_contract]
//! trait Logger {
//!     fn log(&self, message: &str);
//! }
//!
//! struct ConsoleLogger;
//!
//! impl Service for ConsoleLogger {}
//!
//! #[provides]
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) {
//!         println!("{message}");
//!     }
//! }
//!
//! #[derive(Inject, Default)]
//! struct Hud {
//!     #[inject]
//!     logger: Injected<dyn Logger>,
//! }
//!
//! let locator = ServiceLocatorBuilder::new().build();
//! let hud = ServicePtr::new(Hud::default());
//!
//! locator
//!     .inject_with_callback(&hud, || println!("Hud ready!"))
//!     .unwrap();
//! locator
//!     .register_service::<dyn Logger, _>(ServicePtr::new(ConsoleLogger))
//!     .unwrap();
//!
//! hud.logger.get().unwrap().log("Injected!");
//! ```
//!
//! ## Features
//!
//! * `derive` - `#[derive(Contract)]`, `#[derive(Inject)]`, `#[service_contract]` and
//! `#[provides]` (default)
//! * `async` - futures waiting for services to be registered (default)

pub mod contract;
pub mod dependency;
pub mod dependency_cache;
mod error;
pub mod locator;
pub mod reference;
pub mod service;
pub mod subscription;
#[cfg(feature = "async")]
pub mod wait;

pub use error::{CatalogError, ServiceLocatorError};

#[cfg(feature = "derive")]
pub use service_locator_derive::{provides, service_contract, Contract, Inject};
