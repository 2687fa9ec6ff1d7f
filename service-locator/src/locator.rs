//! The [ServiceLocator] stores active services, parks services with unmet prerequisites and injects
//! dependencies into consumers.
//!
//! ## Deferred resolution
//!
//! Registering a service whose prerequisites are not all registered doesn't fail - the service is
//! held pending. Every time a service becomes active, pending services are re-evaluated until a
//! full pass promotes nothing (a fixed point), after which callbacks waiting for sets of contracts
//! are fired. Dependency cycles are not detected: services forming one stay pending forever and
//! are reported when calling [ServiceLocator::unregister_all].
//!
//! ## Threading
//!
//! The locator is meant to live on a single thread (usually the host's main loop) and is shared as
//! a [ServicePtr]. No internal borrow is held while hooks, observers or callbacks run, so those can
//! safely call back into the locator.

use crate::contract::{ContractCatalog, ContractId};
use crate::dependency::{Consumer, DependencyExtractor, DependsOnServices};
use crate::error::ServiceLocatorError;
use crate::service::{Provides, ServiceInstance, ServicePtr, ServiceProvider};
use crate::subscription::{ServiceObserverPtr, SubscriptionTable};
use derivative::Derivative;
#[cfg(feature = "async")]
use futures::channel::oneshot;
use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::cmp::Reverse;
use std::rc::{Rc, Weak};
use tracing::{debug, error, trace, warn};

/// Operating mode of a [ServiceLocator].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorMode {
    /// Only registered services are ever returned.
    #[default]
    Production,
    /// Missing services can be discovered by a [ServiceDiscovery], e.g. in editor tooling.
    Tooling,
}

/// Last-resort lookup for services which were not registered, used only in
/// [LocatorMode::Tooling]. Typically scans the host's live objects or constructs a default
/// instance.
#[cfg_attr(test, automock)]
pub trait ServiceDiscovery {
    fn discover(&self, contract: ContractId) -> Option<ServiceInstance>;
}

pub type ServiceDiscoveryPtr = Box<dyn ServiceDiscovery>;

/// Outcome of injecting dependencies into a consumer.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum InjectionStatus {
    /// All dependencies have been injected.
    Complete,
    /// Some dependencies are missing - the callback will fire once they're available.
    Deferred,
    /// The consumer has been injected before and was left untouched.
    AlreadyInjected,
}

type WaitCallback = Box<dyn FnOnce(&ServiceLocator)>;

#[derive(Clone, Debug)]
struct ServiceRecord {
    instance: ServiceInstance,
    epoch: u64,
}

#[derive(Clone, Debug)]
struct PendingRegistration {
    instance: ServiceInstance,
    prerequisites: Rc<[ContractId]>,
}

#[derive(Derivative)]
#[derivative(Debug)]
struct CallbackWaitEntry {
    required: FxHashSet<ContractId>,
    #[derivative(Debug = "ignore")]
    callback: WaitCallback,
}

struct InjectedMember {
    consumer: Weak<dyn Consumer>,
    member: usize,
}

#[derive(Default)]
struct LocatorState {
    services: FxHashMap<ContractId, ServiceRecord>,
    pending: FxHashMap<ContractId, PendingRegistration>,
    callbacks: Vec<CallbackWaitEntry>,
    injected: FxHashMap<*const (), Weak<dyn Any>>,
    injected_members: FxHashMap<ContractId, Vec<InjectedMember>>,
    registered_once: FxHashSet<ContractId>,
    next_epoch: u64,
    resolving: bool,
    #[cfg(feature = "async")]
    waiters: FxHashMap<ContractId, Vec<(u64, oneshot::Sender<()>)>>,
    #[cfg(feature = "async")]
    next_waiter: u64,
}

impl LocatorState {
    fn prune_injected(&mut self) {
        self.injected.retain(|_, consumer| consumer.strong_count() > 0);
        self.injected_members.retain(|_, members| {
            members.retain(|member| member.consumer.strong_count() > 0);
            !members.is_empty()
        });
    }

    fn missing(&self, contracts: &[ContractId]) -> Vec<ContractId> {
        contracts
            .iter()
            .filter(|contract| !self.services.contains_key(contract))
            .copied()
            .unique()
            .collect()
    }
}

/// Builder for [ServiceLocator] with sensible defaults, for easy construction.
pub struct ServiceLocatorBuilder {
    mode: LocatorMode,
    catalog: ContractCatalog,
    discovery: Option<ServiceDiscoveryPtr>,
}

impl ServiceLocatorBuilder {
    /// Creates a new builder in production mode, with a catalog of statically declared contracts.
    pub fn new() -> Self {
        Self {
            mode: LocatorMode::default(),
            catalog: ContractCatalog::from_static(),
            discovery: None,
        }
    }

    pub fn with_mode(mut self, mode: LocatorMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets new [ContractCatalog].
    pub fn with_catalog(mut self, catalog: ContractCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Sets the fallback used for missing services in [LocatorMode::Tooling].
    pub fn with_discovery(mut self, discovery: ServiceDiscoveryPtr) -> Self {
        self.discovery = Some(discovery);
        self
    }

    /// Builds resulting [ServiceLocator].
    pub fn build(self) -> ServicePtr<ServiceLocator> {
        Rc::new_cyclic(|this| ServiceLocator {
            this: this.clone(),
            mode: self.mode,
            catalog: self.catalog,
            discovery: self.discovery,
            extractor: Default::default(),
            state: Default::default(),
            subscriptions: Default::default(),
            quitting: Cell::new(false),
        })
    }
}

impl Default for ServiceLocatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of active services. See module documentation for details.
pub struct ServiceLocator {
    this: Weak<ServiceLocator>,
    mode: LocatorMode,
    catalog: ContractCatalog,
    discovery: Option<ServiceDiscoveryPtr>,
    extractor: DependencyExtractor,
    state: RefCell<LocatorState>,
    subscriptions: RefCell<SubscriptionTable>,
    quitting: Cell<bool>,
}

impl ServiceLocator {
    #[inline]
    pub fn mode(&self) -> LocatorMode {
        self.mode
    }

    #[inline]
    pub fn catalog(&self) -> &ContractCatalog {
        &self.catalog
    }

    #[inline]
    pub fn extractor(&self) -> &DependencyExtractor {
        &self.extractor
    }

    /// Registers given service as the implementation of its contract. Returns `Ok(true)` if the
    /// service became active and `Ok(false)` if it refused registration or is waiting for its
    /// prerequisites.
    pub fn register(&self, instance: ServiceInstance) -> Result<bool, ServiceLocatorError> {
        let contract = instance.contract();
        {
            let state = self.state.borrow();
            if state.services.contains_key(&contract) || state.pending.contains_key(&contract) {
                error!(contract = %contract, "Service is already registered.");
                return Err(ServiceLocatorError::AlreadyRegistered(contract));
            }
        }

        if !instance.service().can_be_registered(self) {
            debug!(contract = %contract, "Service refused registration.");
            return Ok(false);
        }

        let prerequisites = self.extractor.prerequisites(&instance, &self.catalog);
        {
            let mut state = self.state.borrow_mut();
            let missing = state.missing(&prerequisites);
            if !missing.is_empty() {
                debug!(
                    contract = %contract,
                    missing = %missing.iter().join(", "),
                    "Service is waiting for its dependencies."
                );

                state.pending.insert(
                    contract,
                    PendingRegistration {
                        instance,
                        prerequisites,
                    },
                );
                return Ok(false);
            }
        }

        self.activate(instance);
        self.resolve_pending();

        Ok(true)
    }

    /// Typesafe version of [ServiceLocator::register], registering `service` as contract `C`.
    #[inline]
    pub fn register_service<C: ?Sized + 'static, S: Provides<C>>(
        &self,
        service: ServicePtr<S>,
    ) -> Result<bool, ServiceLocatorError> {
        self.register(ServiceInstance::new::<C, S>(service))
    }

    /// Removes the active service for given contract. Returns false if there was none.
    pub fn unregister(&self, contract: ContractId) -> bool {
        let record = self.state.borrow_mut().services.remove(&contract);
        let Some(record) = record else {
            return false;
        };

        debug!(contract = %contract, "Service unregistered.");

        record.instance.service().on_unregistered(self);
        self.notify_unregistered(contract);

        true
    }

    fn notify_unregistered(&self, contract: ContractId) {
        let observers = self.subscriptions.borrow_mut().live_observers(contract);
        for observer in observers {
            observer.on_service_unregistered(contract);
        }
    }

    /// Typesafe version of [ServiceLocator::unregister].
    #[inline]
    pub fn unregister_service<C: ?Sized + 'static>(&self) -> bool {
        self.unregister(ContractId::of::<C>())
    }

    /// Unregisters all services, most recently registered first, and discards everything waiting
    /// for services. Returns the number of pending services which never got their prerequisites -
    /// non-zero usually means a dependency cycle or a missing registration.
    pub fn unregister_all(&self) -> usize {
        let contracts = self
            .state
            .borrow()
            .services
            .iter()
            .sorted_by_key(|(_, record)| Reverse(record.epoch))
            .map(|(contract, _)| *contract)
            .collect_vec();

        for contract in contracts {
            self.unregister(contract);
        }

        // registered by hooks during teardown; dropped without running hooks again
        let leftovers = std::mem::take(&mut self.state.borrow_mut().services);
        if !leftovers.is_empty() {
            warn!(
                count = leftovers.len(),
                contracts = %leftovers.keys().join(", "),
                "Services were registered during teardown, dropping them."
            );

            for contract in leftovers.keys() {
                self.notify_unregistered(*contract);
            }
        }

        let (pending, callbacks) = {
            let mut state = self.state.borrow_mut();
            let pending = std::mem::take(&mut state.pending);
            let callbacks = std::mem::take(&mut state.callbacks);
            state.prune_injected();

            #[cfg(feature = "async")]
            state.waiters.clear();

            (pending, callbacks)
        };

        if !pending.is_empty() {
            warn!(
                count = pending.len(),
                contracts = %pending.keys().join(", "),
                "Services were still waiting for dependencies to be resolved."
            );
        }

        drop(callbacks);
        pending.len()
    }

    #[inline]
    pub fn is_pending(&self, contract: ContractId) -> bool {
        self.state.borrow().pending.contains_key(&contract)
    }

    #[inline]
    pub fn pending_count(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Pending contracts with their missing prerequisites.
    pub fn pending_contracts(&self) -> Vec<(ContractId, Vec<ContractId>)> {
        let state = self.state.borrow();
        state
            .pending
            .iter()
            .map(|(contract, pending)| (*contract, state.missing(&pending.prerequisites)))
            .collect()
    }

    /// Number of active services.
    #[inline]
    pub fn service_count(&self) -> usize {
        self.state.borrow().services.len()
    }

    /// Injects dependencies into given consumer, failing if any are missing. See
    /// [ServiceLocator::inject_with_callback] for deferred injection.
    pub fn inject<T: Consumer>(
        &self,
        consumer: &ServicePtr<T>,
    ) -> Result<InjectionStatus, ServiceLocatorError> {
        self.inject_consumer(consumer, None)
    }

    /// Injects available dependencies into given consumer. If some are missing, they're injected
    /// once registered and `callback` is called exactly once afterwards. Nothing happens if the
    /// consumer gets dropped in the meantime.
    pub fn inject_with_callback<T: Consumer, F: FnOnce() + 'static>(
        &self,
        consumer: &ServicePtr<T>,
        callback: F,
    ) -> Result<InjectionStatus, ServiceLocatorError> {
        self.inject_consumer(consumer, Some(Box::new(callback)))
    }

    /// Checks if given consumer has been fully injected.
    pub fn is_injected<T: Consumer>(&self, consumer: &ServicePtr<T>) -> bool {
        self.state
            .borrow()
            .injected
            .get(&consumer_key(consumer))
            .map(|existing| existing.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Notifies given dependent once all of its listed services are registered, immediately if
    /// they already are.
    pub fn resolve_dependencies<T: DependsOnServices>(&self, dependent: &ServicePtr<T>) {
        let dependent_ref = Rc::downgrade(dependent);
        self.on_services_registered(&dependent.depends_on_services(), move |_| {
            if let Some(dependent) = dependent_ref.upgrade() {
                dependent.on_services_dependencies_resolved();
            }
        });
    }

    /// Calls `callback` exactly once, when all given contracts are registered.
    pub fn on_services_registered<F: FnOnce(&ServiceLocator) + 'static>(
        &self,
        contracts: &[ContractId],
        callback: F,
    ) {
        let missing = self.state.borrow().missing(contracts);
        if missing.is_empty() {
            callback(self);
            return;
        }

        trace!(missing = %missing.iter().join(", "), "Waiting for services.");

        self.state.borrow_mut().callbacks.push(CallbackWaitEntry {
            required: missing.into_iter().collect(),
            callback: Box::new(callback),
        });
    }

    /// Subscribes an observer to registration changes of given contract. Returns false if it was
    /// already subscribed.
    #[inline]
    pub fn subscribe(&self, contract: ContractId, observer: ServiceObserverPtr) -> bool {
        self.subscriptions.borrow_mut().subscribe(contract, observer)
    }

    #[inline]
    pub fn unsubscribe(&self, contract: ContractId, observer: &ServiceObserverPtr) -> bool {
        self.subscriptions
            .borrow_mut()
            .unsubscribe(contract, observer)
    }

    /// Number of observers subscribed to given contract, including ones not yet pruned.
    #[inline]
    pub fn observer_count(&self, contract: ContractId) -> usize {
        self.subscriptions.borrow().observer_count(contract)
    }

    /// Marks the host as shutting down, which stops lazy references from looking up services.
    #[inline]
    pub fn set_quitting(&self) {
        self.quitting.set(true);
    }

    #[inline]
    pub fn is_quitting(&self) -> bool {
        self.quitting.get()
    }

    #[inline]
    #[cfg_attr(not(feature = "async"), allow(dead_code))]
    pub(crate) fn this(&self) -> Weak<ServiceLocator> {
        self.this.clone()
    }

    fn inject_consumer<T: Consumer>(
        &self,
        consumer: &ServicePtr<T>,
        callback: Option<Box<dyn FnOnce()>>,
    ) -> Result<InjectionStatus, ServiceLocatorError> {
        if self.is_injected(consumer) {
            warn!(
                consumer = std::any::type_name::<T>(),
                "Trying to inject a consumer which was already injected, skipping."
            );
            return Ok(InjectionStatus::AlreadyInjected);
        }

        let unresolved = self.extractor.unresolved_dependencies::<T>(self);
        if unresolved.is_empty() {
            self.complete_injection(consumer);
            return Ok(InjectionStatus::Complete);
        }

        let Some(callback) = callback else {
            let error = ServiceLocatorError::UnresolvedDependencies {
                consumer: ContractId::of::<T>(),
                missing: unresolved,
            };
            error!("{error}");
            return Err(error);
        };

        self.apply_dependencies(consumer);

        let consumer_ref = Rc::downgrade(consumer);
        self.on_services_registered(&unresolved, move |locator| {
            let Some(consumer) = consumer_ref.upgrade() else {
                debug!(
                    consumer = std::any::type_name::<T>(),
                    "Consumer dropped before its dependencies were resolved."
                );
                return;
            };

            if !locator.is_injected(&consumer) {
                locator.complete_injection(&consumer);
            }

            callback();
        });

        Ok(InjectionStatus::Deferred)
    }

    pub(crate) fn complete_injection<T: Consumer>(&self, consumer: &ServicePtr<T>) {
        self.apply_dependencies(consumer);

        let mut state = self.state.borrow_mut();
        state.injected.retain(|_, existing| existing.strong_count() > 0);
        state
            .injected
            .insert(consumer_key(consumer), Rc::downgrade(consumer) as Weak<dyn Any>);
        drop(state);

        consumer.on_injected();
    }

    pub(crate) fn apply_dependencies<T: Consumer>(&self, consumer: &ServicePtr<T>) -> bool {
        let result = self
            .extractor
            .apply_resolved_dependencies(consumer.as_ref(), self);

        let consumer_ref = Rc::downgrade(consumer) as Weak<dyn Consumer>;
        let mut state = self.state.borrow_mut();
        for (member, contract) in &result.applied {
            let members = state.injected_members.entry(*contract).or_default();
            members.retain(|existing| existing.consumer.strong_count() > 0);
            if !members.iter().any(|existing| {
                existing.member == *member && existing.consumer.ptr_eq(&consumer_ref)
            }) {
                members.push(InjectedMember {
                    consumer: consumer_ref.clone(),
                    member: *member,
                });
            }
        }

        result.all_resolved()
    }

    fn activate(&self, instance: ServiceInstance) {
        let contract = instance.contract();
        let registered_before = {
            let mut state = self.state.borrow_mut();
            let epoch = state.next_epoch;
            state.next_epoch += 1;
            state.services.insert(
                contract,
                ServiceRecord {
                    instance: instance.clone(),
                    epoch,
                },
            );
            !state.registered_once.insert(contract)
        };

        debug!(contract = %contract, implementation = %instance.implementation(), "Service registered.");

        instance.service().on_registered(self);

        let observers = self.subscriptions.borrow_mut().live_observers(contract);
        for observer in observers {
            observer.on_service_registered(contract);
        }

        if registered_before {
            self.refresh_injected_members(&instance);
        }

        #[cfg(feature = "async")]
        self.wake_waiters(contract);
    }

    // Fixed point: promote pending services until a full pass promotes nothing. Registrations made
    // by hooks during the loop are picked up by the next pass.
    fn resolve_pending(&self) {
        {
            let mut state = self.state.borrow_mut();
            if state.resolving {
                return;
            }

            state.resolving = true;
        }

        loop {
            let ready = {
                let mut state = self.state.borrow_mut();
                let state = &mut *state;
                let contracts = state
                    .pending
                    .iter()
                    .filter(|(_, pending)| {
                        pending
                            .prerequisites
                            .iter()
                            .all(|contract| state.services.contains_key(contract))
                    })
                    .map(|(contract, _)| *contract)
                    .collect_vec();

                contracts
                    .into_iter()
                    .filter_map(|contract| state.pending.remove(&contract))
                    .collect_vec()
            };

            if ready.is_empty() {
                break;
            }

            for pending in ready {
                self.promote(pending);
            }
        }

        self.state.borrow_mut().resolving = false;
        self.fire_satisfied_callbacks();
    }

    fn promote(&self, pending: PendingRegistration) {
        let contract = pending.instance.contract();
        if self.has_service(contract) {
            warn!(contract = %contract, "Dropping pending service - the contract got registered in the meantime.");
            return;
        }

        if !pending.instance.service().can_be_registered(self) {
            debug!(contract = %contract, "Pending service refused registration.");
            return;
        }

        trace!(contract = %contract, "Dependencies resolved for pending service.");
        self.activate(pending.instance);
    }

    fn fire_satisfied_callbacks(&self) {
        let satisfied = {
            let mut state = self.state.borrow_mut();
            let LocatorState {
                callbacks,
                services,
                ..
            } = &mut *state;

            let (satisfied, waiting): (Vec<_>, Vec<_>) = callbacks.drain(..).partition(|entry| {
                entry
                    .required
                    .iter()
                    .all(|contract| services.contains_key(contract))
            });

            *callbacks = waiting;
            satisfied
        };

        for entry in satisfied {
            (entry.callback)(self);
        }
    }

    fn refresh_injected_members(&self, instance: &ServiceInstance) {
        let members = {
            let mut state = self.state.borrow_mut();
            let Some(members) = state.injected_members.get_mut(&instance.contract()) else {
                return;
            };

            members.retain(|member| member.consumer.strong_count() > 0);
            members
                .iter()
                .filter_map(|member| {
                    member
                        .consumer
                        .upgrade()
                        .map(|consumer| (consumer, member.member))
                })
                .collect_vec()
        };

        for (consumer, member) in members {
            if consumer.assign_dependency(member, instance) {
                trace!(contract = %instance.contract(), member, "Refreshed injected member.");
            }
        }
    }

    fn try_discover(&self, contract: ContractId) -> Option<ServiceInstance> {
        if self.mode != LocatorMode::Tooling {
            return None;
        }

        let instance = self.discovery.as_ref()?.discover(contract)?;
        if instance.contract() != contract {
            warn!(
                contract = %contract,
                discovered = %instance.contract(),
                "Discovered service is bound to a different contract."
            );
            return None;
        }

        debug!(contract = %contract, "Using discovered service.");

        let mut state = self.state.borrow_mut();
        let epoch = state.next_epoch;
        state.next_epoch += 1;
        state.registered_once.insert(contract);
        state.services.insert(
            contract,
            ServiceRecord {
                instance: instance.clone(),
                epoch,
            },
        );

        Some(instance)
    }

    #[cfg(feature = "async")]
    pub(crate) fn add_waiter(&self, contract: ContractId) -> (u64, oneshot::Receiver<()>) {
        let (sender, receiver) = oneshot::channel();
        let mut state = self.state.borrow_mut();
        let id = state.next_waiter;
        state.next_waiter += 1;
        state
            .waiters
            .entry(contract)
            .or_default()
            .push((id, sender));

        (id, receiver)
    }

    #[cfg(feature = "async")]
    pub(crate) fn remove_waiter(&self, contract: ContractId, id: u64) {
        let mut state = self.state.borrow_mut();
        if let Some(waiters) = state.waiters.get_mut(&contract) {
            waiters.retain(|(existing, _)| *existing != id);
            if waiters.is_empty() {
                state.waiters.remove(&contract);
            }
        }
    }

    #[cfg(feature = "async")]
    pub(crate) fn waiter_count(&self, contract: ContractId) -> usize {
        self.state
            .borrow()
            .waiters
            .get(&contract)
            .map(Vec::len)
            .unwrap_or(0)
    }

    #[cfg(feature = "async")]
    fn wake_waiters(&self, contract: ContractId) {
        let waiters = self.state.borrow_mut().waiters.remove(&contract);
        for (_, sender) in waiters.into_iter().flatten() {
            // the receiver might have been dropped without removing itself yet
            let _ = sender.send(());
        }
    }
}

impl ServiceProvider for ServiceLocator {
    #[inline]
    fn has_service(&self, contract: ContractId) -> bool {
        self.state.borrow().services.contains_key(&contract)
    }

    fn try_get_instance(&self, contract: ContractId) -> Option<ServiceInstance> {
        let instance = self
            .state
            .borrow()
            .services
            .get(&contract)
            .map(|record| record.instance.clone());

        instance.or_else(|| self.try_discover(contract))
    }

    fn get_instance(&self, contract: ContractId) -> Result<ServiceInstance, ServiceLocatorError> {
        self.try_get_instance(contract).ok_or_else(|| {
            let error = ServiceLocatorError::ServiceNotRegistered(contract);
            error!("{error}");
            error
        })
    }
}

#[inline]
fn consumer_key<T>(consumer: &ServicePtr<T>) -> *const () {
    Rc::as_ptr(consumer) as *const ()
}
