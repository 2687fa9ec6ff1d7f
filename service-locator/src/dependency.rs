//! Consumers declare dependencies on contracts in their member slots, which get filled by a
//! [ServiceLocator](crate::locator::ServiceLocator) once the services are registered.
//!
//! ## Declaring dependencies
//!
//! Member slots are [Injected] cells, so a consumer can be shared as a
//! [ServicePtr](crate::service::ServicePtr) and still receive its dependencies later. The
//! [Consumer] trait describes the slots and can be derived when the `derive` feature is enabled:
//!
//! ```
//! use service_locator::dependency::Injected;
//! use service_locator::Inject;
//!
//! trait Logger {}
//!
//! struct Config;
//!
//! #[derive(Inject, Default)]
//! #[inject(on_injected = "Self::ready")]
//! struct Hud {
//!     #[inject]
//!     logger: Injected<dyn Logger>,
//!     #[inject]
//!     config: Injected<Config>,
//!     // not managed by the locator
//!     visible: bool,
//! }
//!
//! impl Hud {
//!     fn ready(&self) {}
//! }
//! ```
//!
//! Alternatively, a type can list contracts explicitly with [DependsOnServices] and only get
//! notified when all of them are available.

use crate::contract::{ContractCatalog, ContractId};
use crate::service::{ServiceInstance, ServicePtr, ServiceProvider};
use fxhash::FxHashMap;
use itertools::Itertools;
use std::any::{type_name, TypeId};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use tracing::trace;

/// A member slot receiving a service of contract `T`.
pub struct Injected<T: ?Sized + 'static> {
    slot: RefCell<Option<ServicePtr<T>>>,
}

impl<T: ?Sized + 'static> Injected<T> {
    /// Returns the injected service, if already available.
    #[inline]
    pub fn get(&self) -> Option<ServicePtr<T>> {
        self.slot.borrow().clone()
    }

    #[inline]
    pub fn is_injected(&self) -> bool {
        self.slot.borrow().is_some()
    }
}

impl<T: ?Sized + 'static> Default for Injected<T> {
    fn default() -> Self {
        Self {
            slot: RefCell::new(None),
        }
    }
}

impl<T: ?Sized + 'static> Debug for Injected<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Injected")
            .field("contract", &type_name::<T>())
            .field("injected", &self.is_injected())
            .finish()
    }
}

/// Storage for an injected dependency.
pub trait DependencySlot {
    type Contract: ?Sized + 'static;

    /// Stores given instance, returning false if it's not bound to [Self::Contract].
    fn assign(&self, instance: &ServiceInstance) -> bool;
}

impl<T: ?Sized + 'static> DependencySlot for Injected<T> {
    type Contract = T;

    fn assign(&self, instance: &ServiceInstance) -> bool {
        if let Some(pointer) = instance.downcast::<T>() {
            *self.slot.borrow_mut() = Some(pointer);
            true
        } else {
            false
        }
    }
}

/// A single declared dependency.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DependencyMember {
    /// Member name, for diagnostics.
    pub name: &'static str,
    pub contract: ContractId,
}

/// All dependencies declared by a consumer type, in declaration order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DependencyDeclaration {
    consumer: ContractId,
    members: Vec<DependencyMember>,
}

impl DependencyDeclaration {
    pub fn new(consumer: ContractId, members: Vec<DependencyMember>) -> Self {
        Self { consumer, members }
    }

    #[inline]
    pub fn consumer(&self) -> ContractId {
        self.consumer
    }

    #[inline]
    pub fn members(&self) -> &[DependencyMember] {
        &self.members
    }

    /// Distinct required contracts.
    pub fn contracts(&self) -> impl Iterator<Item = ContractId> + '_ {
        self.members.iter().map(|member| member.contract).unique()
    }
}

/// A type with injectable member slots. Usually derived with `#[derive(Inject)]`.
pub trait Consumer: 'static {
    /// Lists member slots. Called once per type, since the shape of dependencies is a type-level
    /// property.
    fn declare_dependencies() -> Vec<DependencyMember>
    where
        Self: Sized;

    /// Writes given instance into the slot at `member` index of the declaration.
    fn assign_dependency(&self, member: usize, instance: &ServiceInstance) -> bool;

    /// Called when all dependencies have been injected.
    fn on_injected(&self) {}
}

/// A type listing its dependencies explicitly, notified once all of them are registered.
pub trait DependsOnServices: 'static {
    fn depends_on_services(&self) -> Vec<ContractId>;

    fn on_services_dependencies_resolved(&self);
}

/// Result of applying currently available dependencies to a consumer.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AppliedDependencies {
    /// Indices and contracts of members which got a service assigned.
    pub applied: Vec<(usize, ContractId)>,
    /// Contracts which are still missing, without duplicates.
    pub unresolved: Vec<ContractId>,
}

impl AppliedDependencies {
    #[inline]
    pub fn all_resolved(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Produces and memoizes dependency information for consumers and services.
#[derive(Debug, Default)]
pub struct DependencyExtractor {
    declarations: RefCell<FxHashMap<TypeId, Rc<DependencyDeclaration>>>,
    prerequisites: RefCell<FxHashMap<(ContractId, ContractId), Rc<[ContractId]>>>,
}

impl DependencyExtractor {
    /// Returns the declaration of given consumer type, computing it on first use.
    pub fn declaration<T: Consumer>(&self) -> Rc<DependencyDeclaration> {
        self.declarations
            .borrow_mut()
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                trace!(consumer = type_name::<T>(), "Extracting dependency declaration.");
                Rc::new(DependencyDeclaration::new(
                    ContractId::of::<T>(),
                    T::declare_dependencies(),
                ))
            })
            .clone()
    }

    /// Returns prerequisites of given service instance: those declared in the catalog for its
    /// contract and implementation type, followed by the ones reported by the service itself.
    pub fn prerequisites(
        &self,
        instance: &ServiceInstance,
        catalog: &ContractCatalog,
    ) -> Rc<[ContractId]> {
        let key = (instance.contract(), instance.implementation());
        if let Some(prerequisites) = self.prerequisites.borrow().get(&key) {
            return prerequisites.clone();
        }

        let prerequisites: Rc<[ContractId]> = catalog
            .prerequisites(instance.contract())
            .iter()
            .chain(catalog.prerequisites(instance.implementation()))
            .copied()
            .chain(instance.service().prerequisites())
            .unique()
            .collect();

        self.prerequisites
            .borrow_mut()
            .insert(key, prerequisites.clone());

        prerequisites
    }

    /// Writes every currently available dependency into the consumer, leaving slots of missing
    /// ones untouched.
    pub fn apply_resolved_dependencies<T: Consumer>(
        &self,
        consumer: &T,
        provider: &dyn ServiceProvider,
    ) -> AppliedDependencies {
        let declaration = self.declaration::<T>();
        let mut result = AppliedDependencies::default();

        for (index, member) in declaration.members().iter().enumerate() {
            match provider.try_get_instance(member.contract) {
                Some(instance) if consumer.assign_dependency(index, &instance) => {
                    result.applied.push((index, member.contract));
                }
                _ => {
                    if !result.unresolved.contains(&member.contract) {
                        result.unresolved.push(member.contract);
                    }
                }
            }
        }

        result
    }

    /// Returns contracts required by the consumer type which are not available.
    pub fn unresolved_dependencies<T: Consumer>(
        &self,
        provider: &dyn ServiceProvider,
    ) -> Vec<ContractId> {
        self.declaration::<T>()
            .contracts()
            .filter(|contract| provider.try_get_instance(*contract).is_none())
            .collect()
    }

    /// Forgets all memoized information.
    pub fn clear(&self) {
        self.declarations.borrow_mut().clear();
        self.prerequisites.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::{ContractCatalog, ContractDescriptor, ContractId};
    use crate::dependency::{
        Consumer, DependencyExtractor, DependencyMember, DependencySlot, Injected,
    };
    use crate::error::ServiceLocatorError;
    use crate::service::{Service, ServiceInstance, ServicePtr, ServiceProvider};
    use std::cell::Cell;

    struct Logger;

    impl Service for Logger {}

    struct Audio;

    impl Service for Audio {
        fn prerequisites(&self) -> Vec<ContractId> {
            vec![ContractId::of::<Logger>()]
        }
    }

    thread_local! {
        static DECLARATIONS: Cell<usize> = Cell::new(0);
    }

    #[derive(Default)]
    struct Player {
        logger: Injected<Logger>,
        audio: Injected<Audio>,
    }

    impl Consumer for Player {
        fn declare_dependencies() -> Vec<DependencyMember> {
            DECLARATIONS.with(|count| count.set(count.get() + 1));
            vec![
                DependencyMember {
                    name: "logger",
                    contract: ContractId::of::<Logger>(),
                },
                DependencyMember {
                    name: "audio",
                    contract: ContractId::of::<Audio>(),
                },
            ]
        }

        fn assign_dependency(&self, member: usize, instance: &ServiceInstance) -> bool {
            match member {
                0 => self.logger.assign(instance),
                1 => self.audio.assign(instance),
                _ => false,
            }
        }
    }

    struct LoggerOnlyProvider {
        logger: ServiceInstance,
    }

    impl ServiceProvider for LoggerOnlyProvider {
        fn has_service(&self, contract: ContractId) -> bool {
            contract == self.logger.contract()
        }

        fn try_get_instance(&self, contract: ContractId) -> Option<ServiceInstance> {
            self.has_service(contract).then(|| self.logger.clone())
        }

        fn get_instance(&self, contract: ContractId) -> Result<ServiceInstance, ServiceLocatorError> {
            self.try_get_instance(contract)
                .ok_or(ServiceLocatorError::ServiceNotRegistered(contract))
        }
    }

    #[test]
    fn should_memoize_declarations_per_type() {
        let extractor = DependencyExtractor::default();
        let before = DECLARATIONS.with(Cell::get);

        let first = extractor.declaration::<Player>();
        let second = extractor.declaration::<Player>();

        assert_eq!(DECLARATIONS.with(Cell::get), before + 1);
        assert_eq!(first, second);
        assert_eq!(first.consumer(), ContractId::of::<Player>());
        assert_eq!(first.members().len(), 2);
    }

    #[test]
    fn should_apply_only_resolved_dependencies() {
        let extractor = DependencyExtractor::default();
        let provider = LoggerOnlyProvider {
            logger: ServiceInstance::new::<Logger, _>(ServicePtr::new(Logger)),
        };
        let player = Player::default();

        let result = extractor.apply_resolved_dependencies(&player, &provider);

        assert!(!result.all_resolved());
        assert_eq!(result.applied, vec![(0, ContractId::of::<Logger>())]);
        assert_eq!(result.unresolved, vec![ContractId::of::<Audio>()]);
        assert!(player.logger.is_injected());
        assert!(!player.audio.is_injected());
        assert_eq!(
            extractor.unresolved_dependencies::<Player>(&provider),
            vec![ContractId::of::<Audio>()]
        );
    }

    #[test]
    fn should_merge_catalog_and_declared_prerequisites() {
        struct Config;

        let mut catalog = ContractCatalog::default();
        let mut descriptor = ContractDescriptor::new(ContractId::of::<Audio>());
        descriptor.prerequisites = vec![ContractId::of::<Config>(), ContractId::of::<Logger>()];
        catalog.register(descriptor);

        let extractor = DependencyExtractor::default();
        let instance = ServiceInstance::new::<Audio, _>(ServicePtr::new(Audio));

        assert_eq!(
            &*extractor.prerequisites(&instance, &catalog),
            &[ContractId::of::<Config>(), ContractId::of::<Logger>()]
        );

        extractor.clear();

        assert_eq!(
            &*extractor.prerequisites(&instance, &ContractCatalog::default()),
            &[ContractId::of::<Logger>()]
        );
    }
}
