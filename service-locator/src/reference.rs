//! Lazily resolved handles to services, which stay up to date with registration changes.
//!
//! ```
//! use service_locator::locator::ServiceLocatorBuilder;
//! use service_locator::reference::ServiceReference;
//! use service_locator::service::{Service, ServicePtr};
//!
//! struct Audio;
//!
//! impl Service for Audio {}
//!
//! let locator = ServiceLocatorBuilder::new().build();
//! let audio = ServiceReference::<Audio>::new(&locator);
//!
//! assert!(audio.reference().is_none());
//!
//! locator.register_service::<Audio, _>(ServicePtr::new(Audio)).unwrap();
//!
//! assert!(audio.reference().is_some());
//! ```

use crate::contract::ContractId;
#[cfg(feature = "async")]
use crate::error::ServiceLocatorError;
use crate::locator::ServiceLocator;
use crate::service::{ServiceInstance, ServicePtr, ServiceProvider};
use crate::subscription::{ServiceObserver, ServiceObserverPtr};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::{Rc, Weak};
use tracing::trace;

struct CachedService<T: ?Sized> {
    pointer: ServicePtr<T>,
    instance: ServiceInstance,
}

/// Handle to the service registered for contract `T`, looked up on first use and cached
/// afterwards. Once resolved, the handle observes the contract: unregistration clears the cache
/// and registration of a different instance replaces it.
pub struct ServiceReference<T: ?Sized + 'static> {
    locator: ServicePtr<ServiceLocator>,
    this: Weak<Self>,
    cache: RefCell<Option<CachedService<T>>>,
}

impl<T: ?Sized + 'static> ServiceReference<T> {
    pub fn new(locator: &ServicePtr<ServiceLocator>) -> ServicePtr<Self> {
        Rc::new_cyclic(|this| Self {
            locator: locator.clone(),
            this: this.clone(),
            cache: RefCell::new(None),
        })
    }

    /// Returns the cached service or looks it up. The locator is not queried while it is
    /// quitting.
    pub fn reference(&self) -> Option<ServicePtr<T>> {
        if let Some(cached) = self.cached_reference() {
            return Some(cached);
        }

        if self.locator.is_quitting() {
            return None;
        }

        self.fetch()
    }

    /// Checks if the service is available, without resolving the reference.
    pub fn exists(&self) -> bool {
        if let Some(cached) = self.cache.borrow().as_ref() {
            return cached.instance.service().is_alive();
        }

        self.locator.has_service(ContractId::of::<T>())
    }

    /// Returns the cached service, without querying the locator.
    #[inline]
    pub fn cached_reference(&self) -> Option<ServicePtr<T>> {
        self.cache
            .borrow()
            .as_ref()
            .map(|cached| cached.pointer.clone())
    }

    #[inline]
    pub fn clear_cache(&self) {
        self.cache.replace(None);
    }

    /// Waits until the service is registered and returns it.
    #[cfg(feature = "async")]
    pub async fn wait_until_available(&self) -> Result<ServicePtr<T>, ServiceLocatorError> {
        let contract = ContractId::of::<T>();
        self.locator.wait_for_service(contract).await?;
        self.reference()
            .ok_or(ServiceLocatorError::WaitCancelled(contract))
    }

    fn fetch(&self) -> Option<ServicePtr<T>> {
        let contract = ContractId::of::<T>();
        let instance = self.locator.try_get_instance(contract)?;
        let pointer = instance.downcast::<T>()?;

        self.cache.replace(Some(CachedService {
            pointer: pointer.clone(),
            instance,
        }));

        let observer: ServiceObserverPtr = self.this.clone();
        self.locator.unsubscribe(contract, &observer);
        self.locator.subscribe(contract, observer);

        Some(pointer)
    }

    fn is_cached(&self, instance: &ServiceInstance) -> bool {
        self.cache
            .borrow()
            .as_ref()
            .map(|cached| cached.instance.same_instance(instance))
            .unwrap_or(false)
    }
}

impl<T: ?Sized + 'static> ServiceObserver for ServiceReference<T> {
    fn on_service_registered(&self, contract: ContractId) {
        let Some(instance) = self.locator.try_get_instance(contract) else {
            return;
        };

        if self.is_cached(&instance) {
            return;
        }

        if let Some(pointer) = instance.downcast::<T>() {
            trace!(contract = %contract, "Refreshing service reference.");
            self.cache.replace(Some(CachedService { pointer, instance }));
        }
    }

    fn on_service_unregistered(&self, _contract: ContractId) {
        self.clear_cache();
    }
}

impl<T: ?Sized + 'static> Debug for ServiceReference<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceReference")
            .field("contract", &ContractId::of::<T>())
            .field("cached", &self.cache.borrow().is_some())
            .finish()
    }
}
