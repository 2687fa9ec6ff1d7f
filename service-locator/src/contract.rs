//! Contracts are the identities services are registered under and consumers depend on. A contract
//! is usually a `dyn Trait`, but any `'static` type can serve as one.
//!
//! ## Describing contracts
//!
//! Each contract can carry a [ContractDescriptor] with a display name, a category used to group
//! contracts in diagnostics and a list of prerequisites - other contracts which must be registered
//! before an implementation of this one can become active. Descriptors are collected at startup
//! into a [ContractCatalog]. With the `derive` feature, they can be declared directly on types:
//!
//! ```
//! use service_locator::{service_contract, Contract};
//!
//! #[service_contract(category = "Core")]
//! trait Logger {
//!     fn log(&self, message: &str);
//! }
//!
//! #[derive(Contract)]
//! #[contract(name = "Game Config", category = "Core", depends_on(dyn Logger))]
//! struct GameConfig;
//! ```
//!
//! ### Supported `#[contract]` / `#[service_contract]` arguments
//!
//! * `name = "name"` - display name used in diagnostics; defaults to the type name in title case
//! * `category = "category"` - grouping for diagnostics
//! * `depends_on(Type, dyn Trait, ...)` - prerequisites which need to be registered before an
//! implementation becomes active
//!
//! Names and categories are never used for matching - only the type identity is.

use crate::dependency_cache::DependencyCache;
use crate::error::CatalogError;
use fxhash::FxHashMap;
use itertools::Itertools;
use std::any::{type_name, TypeId};
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};

/// Stable identity of a contract. Two ids are equal only if they refer to the same type; the type
/// name is kept purely for diagnostics.
#[derive(Clone, Copy)]
pub struct ContractId {
    type_id: TypeId,
    name: &'static str,
}

impl ContractId {
    /// Returns the id of given type.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Full type name of the contract, as reported by the compiler.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for ContractId {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ContractId {}

impl Hash for ContractId {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl PartialOrd for ContractId {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ContractId {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_id.cmp(&other.type_id)
    }
}

impl Display for ContractId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name)
    }
}

impl Debug for ContractId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContractId({})", self.name)
    }
}

/// Static metadata describing a contract.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContractDescriptor {
    pub id: ContractId,

    /// Human readable name, used only in diagnostics.
    pub name: String,

    /// Optional grouping, used only in diagnostics.
    pub category: Option<String>,

    /// Contracts which need to be registered before an implementation of this one can become
    /// active.
    pub prerequisites: Vec<ContractId>,
}

impl ContractDescriptor {
    /// Creates a descriptor with no category and prerequisites, named after the type.
    pub fn new(id: ContractId) -> Self {
        Self {
            id,
            name: id.name().to_string(),
            category: None,
            prerequisites: Vec::new(),
        }
    }
}

/// Registry of [ContractDescriptor]s. Services registered in a
/// [ServiceLocator](crate::locator::ServiceLocator) consult the catalog for prerequisites of both
/// their contract and implementation type.
#[derive(Clone, Debug, Default)]
pub struct ContractCatalog {
    descriptors: FxHashMap<ContractId, ContractDescriptor>,
    names: FxHashMap<&'static str, ContractId>,
}

impl ContractCatalog {
    /// Creates a catalog containing all descriptors declared with derive macros.
    pub fn from_static() -> Self {
        let mut catalog = Self::default();

        inventory::iter::<internal::ContractRegisterer>
            .into_iter()
            .map(|registerer| (registerer.register)())
            .for_each(|descriptor| {
                catalog.register(descriptor);
            });

        catalog
    }

    /// Adds a descriptor, replacing and returning any previous one for the same contract.
    pub fn register(&mut self, descriptor: ContractDescriptor) -> Option<ContractDescriptor> {
        self.names.insert(descriptor.id.name(), descriptor.id);
        self.descriptors.insert(descriptor.id, descriptor)
    }

    #[inline]
    pub fn descriptor(&self, id: ContractId) -> Option<&ContractDescriptor> {
        self.descriptors.get(&id)
    }

    /// Returns declared prerequisites for given contract, or an empty slice for unknown ones.
    #[inline]
    pub fn prerequisites(&self, id: ContractId) -> &[ContractId] {
        self.descriptors
            .get(&id)
            .map(|descriptor| descriptor.prerequisites.as_slice())
            .unwrap_or_default()
    }

    /// Looks up a contract by its full type name.
    #[inline]
    pub fn find_by_name(&self, type_name: &str) -> Option<ContractId> {
        self.names.get(type_name).copied()
    }

    #[inline]
    pub fn descriptors(&self) -> impl Iterator<Item = &ContractDescriptor> {
        self.descriptors.values()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Merges a precomputed prerequisite table into this catalog. Every type name in the cache must
    /// refer to a contract already known to the catalog.
    pub fn apply_dependency_cache(&mut self, cache: &DependencyCache) -> Result<(), CatalogError> {
        for entry in cache.entries() {
            let owner = self.resolve_name(&entry.type_name)?;
            let dependencies: Vec<ContractId> = entry
                .dependencies
                .iter()
                .map(|name| self.resolve_name(name))
                .try_collect()?;

            if let Some(descriptor) = self.descriptors.get_mut(&owner) {
                descriptor.prerequisites = descriptor
                    .prerequisites
                    .iter()
                    .copied()
                    .chain(dependencies)
                    .unique()
                    .collect();
            }
        }

        Ok(())
    }

    fn resolve_name(&self, type_name: &str) -> Result<ContractId, CatalogError> {
        self.find_by_name(type_name)
            .ok_or_else(|| CatalogError::UnknownContract(type_name.to_string()))
    }
}

#[doc(hidden)]
pub mod internal {
    use crate::contract::ContractDescriptor;
    use inventory::collect;
    pub use inventory::submit;

    pub struct ContractRegisterer {
        pub register: fn() -> ContractDescriptor,
    }

    collect!(ContractRegisterer);
}

#[cfg(test)]
mod tests {
    use crate::contract::{ContractCatalog, ContractDescriptor, ContractId};
    use crate::dependency_cache::DependencyCache;
    use crate::error::CatalogError;

    trait Logger {}

    struct Config;

    struct Network;

    #[test]
    fn should_compare_by_type_identity() {
        assert_eq!(ContractId::of::<Config>(), ContractId::of::<Config>());
        assert_ne!(ContractId::of::<Config>(), ContractId::of::<Network>());
        assert_ne!(ContractId::of::<dyn Logger>(), ContractId::of::<Config>());
    }

    #[test]
    fn should_distinguish_types_with_the_same_short_name() {
        mod first {
            pub struct Service;
        }

        mod second {
            pub struct Service;
        }

        assert_ne!(
            ContractId::of::<first::Service>(),
            ContractId::of::<second::Service>()
        );
    }

    #[test]
    fn should_register_descriptor() {
        let mut catalog = ContractCatalog::default();
        let mut descriptor = ContractDescriptor::new(ContractId::of::<Network>());
        descriptor.prerequisites = vec![ContractId::of::<Config>()];

        assert!(catalog.register(descriptor).is_none());
        assert_eq!(
            catalog.prerequisites(ContractId::of::<Network>()),
            &[ContractId::of::<Config>()]
        );
        assert_eq!(
            catalog.find_by_name(ContractId::of::<Network>().name()),
            Some(ContractId::of::<Network>())
        );
        assert!(catalog.prerequisites(ContractId::of::<Config>()).is_empty());
    }

    #[test]
    fn should_apply_dependency_cache() {
        let mut catalog = ContractCatalog::default();
        catalog.register(ContractDescriptor::new(ContractId::of::<Network>()));
        catalog.register(ContractDescriptor::new(ContractId::of::<Config>()));
        catalog.register(ContractDescriptor::new(ContractId::of::<dyn Logger>()));

        let mut cache = DependencyCache::default();
        cache.add(
            ContractId::of::<Network>(),
            [ContractId::of::<Config>(), ContractId::of::<dyn Logger>()],
        );
        cache.add(ContractId::of::<Network>(), [ContractId::of::<Config>()]);

        catalog.apply_dependency_cache(&cache).unwrap();

        assert_eq!(
            catalog.prerequisites(ContractId::of::<Network>()),
            &[ContractId::of::<Config>(), ContractId::of::<dyn Logger>()]
        );
    }

    #[test]
    fn should_reject_unknown_cache_entries() {
        let mut catalog = ContractCatalog::default();
        catalog.register(ContractDescriptor::new(ContractId::of::<Network>()));

        let mut cache = DependencyCache::default();
        cache.add(ContractId::of::<Network>(), [ContractId::of::<Config>()]);

        assert_eq!(
            catalog.apply_dependency_cache(&cache).unwrap_err(),
            CatalogError::UnknownContract(ContractId::of::<Config>().name().to_string())
        );
    }
}
