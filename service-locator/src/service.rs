//! Services are shared objects registered in a [ServiceLocator] as the active implementation of a
//! [contract](crate::contract).
//!
//! ## Implementing services
//!
//! Any `'static` type implementing [Service] can be registered as itself. To register it as a
//! `dyn Trait` contract, it also needs to implement [Provides] for that trait object, which can be
//! generated by the `#[provides]` attribute when the `derive` feature is enabled:
//!
//! ```
//! use service_locator::locator::ServiceLocatorBuilder;
//! use service_locator::service::{Service, ServicePtr, TypedServiceProvider};
//! use service_locator::{provides, service_contract};
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
//! let locator = ServiceLocatorBuilder::new().build();
//! locator
//!     .register_service::<dyn Logger, _>(ServicePtr::new(ConsoleLogger))
//!     .unwrap();
//!
//! locator.get::<dyn Logger>().unwrap().log("Hello world!");
//! ```
//!
//! Services get notified about their lifecycle through the optional [Service] hooks. The locator
//! itself holds only a shared pointer - the registering module decides when to unregister.

use crate::contract::ContractId;
use crate::error::ServiceLocatorError;
use crate::locator::ServiceLocator;
use derivative::Derivative;
use std::any::Any;
use std::rc::Rc;

pub type ServicePtr<T> = Rc<T>;

pub type ServiceAnyPtr = ServicePtr<dyn Any>;

/// Base trait for registrable services. All hooks are optional.
pub trait Service: 'static {
    /// Contracts which need to be registered before this service becomes active. Treated as a
    /// type-level property - evaluated once per implementation type.
    fn prerequisites(&self) -> Vec<ContractId> {
        Vec::new()
    }

    /// Allows refusing registration, e.g. for services available only on certain platforms.
    fn can_be_registered(&self, _locator: &ServiceLocator) -> bool {
        true
    }

    /// Called when the service becomes active.
    fn on_registered(&self, _locator: &ServiceLocator) {}

    /// Called after the service has been removed from the locator.
    fn on_unregistered(&self, _locator: &ServiceLocator) {}

    /// Host liveness check. Services backed by host-managed objects should return false once the
    /// underlying object has been destroyed.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Conversion of a concrete service into a contract type `C`. Implemented for every service as
/// itself; `dyn Trait` contracts are usually implemented with the `#[provides]` attribute.
pub trait Provides<C: ?Sized + 'static>: Service {
    fn provide(self: ServicePtr<Self>) -> ServicePtr<C>;
}

impl<T: Service> Provides<T> for T {
    #[inline]
    fn provide(self: ServicePtr<Self>) -> ServicePtr<T> {
        self
    }
}

/// Type-erased service instance bound to a contract.
#[derive(Clone, Derivative)]
#[derivative(Debug)]
pub struct ServiceInstance {
    contract: ContractId,
    implementation: ContractId,

    // holds a ServicePtr<C> for contract C
    #[derivative(Debug = "ignore")]
    pointer: ServiceAnyPtr,

    #[derivative(Debug = "ignore")]
    service: ServicePtr<dyn Service>,
}

impl ServiceInstance {
    /// Binds given service to contract `C`.
    pub fn new<C: ?Sized + 'static, S: Provides<C>>(service: ServicePtr<S>) -> Self {
        let pointer = <S as Provides<C>>::provide(service.clone());
        Self {
            contract: ContractId::of::<C>(),
            implementation: ContractId::of::<S>(),
            pointer: ServicePtr::new(pointer) as ServiceAnyPtr,
            service,
        }
    }

    #[inline]
    pub fn contract(&self) -> ContractId {
        self.contract
    }

    /// Identity of the concrete service type.
    #[inline]
    pub fn implementation(&self) -> ContractId {
        self.implementation
    }

    #[inline]
    pub fn service(&self) -> &ServicePtr<dyn Service> {
        &self.service
    }

    /// Returns the instance as `T`, if `T` is the contract this instance is bound to.
    #[inline]
    pub fn downcast<T: ?Sized + 'static>(&self) -> Option<ServicePtr<T>> {
        self.pointer.downcast_ref::<ServicePtr<T>>().cloned()
    }

    /// Checks if both refer to the same underlying object.
    #[inline]
    pub fn same_instance(&self, other: &ServiceInstance) -> bool {
        Rc::as_ptr(&self.service) as *const () == Rc::as_ptr(&other.service) as *const ()
    }
}

/// Generic provider of registered services.
pub trait ServiceProvider {
    /// Checks if given contract has an active service.
    fn has_service(&self, contract: ContractId) -> bool;

    /// Returns the active service for given contract, if any.
    fn try_get_instance(&self, contract: ContractId) -> Option<ServiceInstance>;

    /// Returns the active service for given contract or fails with
    /// [ServiceLocatorError::ServiceNotRegistered].
    fn get_instance(&self, contract: ContractId) -> Result<ServiceInstance, ServiceLocatorError>;
}

/// Helper trait for [ServiceProvider] providing strongly-typed access.
pub trait TypedServiceProvider {
    /// Typesafe version of [ServiceProvider::has_service].
    fn has<T: ?Sized + 'static>(&self) -> bool;

    /// Typesafe version of [ServiceProvider::try_get_instance].
    fn try_get<T: ?Sized + 'static>(&self) -> Option<ServicePtr<T>>;

    /// Typesafe version of [ServiceProvider::get_instance].
    fn get<T: ?Sized + 'static>(&self) -> Result<ServicePtr<T>, ServiceLocatorError>;
}

impl<SP: ServiceProvider + ?Sized> TypedServiceProvider for SP {
    #[inline]
    fn has<T: ?Sized + 'static>(&self) -> bool {
        self.has_service(ContractId::of::<T>())
    }

    fn try_get<T: ?Sized + 'static>(&self) -> Option<ServicePtr<T>> {
        self.try_get_instance(ContractId::of::<T>())
            .and_then(|instance| instance.downcast())
    }

    fn get<T: ?Sized + 'static>(&self) -> Result<ServicePtr<T>, ServiceLocatorError> {
        let contract = ContractId::of::<T>();
        self.get_instance(contract).and_then(|instance| {
            instance
                .downcast()
                .ok_or(ServiceLocatorError::IncompatibleService(contract))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::ContractId;
    use crate::service::{Provides, Service, ServiceInstance, ServicePtr};

    trait Greeter {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Service for English {}

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    impl Provides<dyn Greeter> for English {
        fn provide(self: ServicePtr<Self>) -> ServicePtr<dyn Greeter> {
            self
        }
    }

    #[test]
    fn should_bind_to_trait_contract() {
        let instance = ServiceInstance::new::<dyn Greeter, _>(ServicePtr::new(English));

        assert_eq!(instance.contract(), ContractId::of::<dyn Greeter>());
        assert_eq!(instance.implementation(), ContractId::of::<English>());
        assert_eq!(instance.downcast::<dyn Greeter>().unwrap().greet(), "hello");
        assert!(instance.downcast::<English>().is_none());
    }

    #[test]
    fn should_compare_instances_by_pointer() {
        let service = ServicePtr::new(English);
        let first = ServiceInstance::new::<dyn Greeter, _>(service.clone());
        let second = ServiceInstance::new::<English, _>(service);
        let third = ServiceInstance::new::<English, _>(ServicePtr::new(English));

        assert!(first.same_instance(&second));
        assert!(!first.same_instance(&third));
    }
}
