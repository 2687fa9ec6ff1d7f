//! Precomputed prerequisite tables, loaded once at startup to avoid analyzing types at runtime.
//!
//! The serialized form is an ordered JSON list:
//!
//! ```json
//! [
//!     { "type": "game::Network", "dependencies": ["game::Config", "dyn game::Auth"] }
//! ]
//! ```
//!
//! Type names are compiler-reported names ([std::any::type_name]), which are only stable within a
//! single build, so caches should be regenerated alongside the binary. Loading a cache is purely an
//! optimization - the [ContractCatalog](crate::contract::ContractCatalog) works without one.

use crate::contract::{ContractCatalog, ContractId};
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};

/// Prerequisites of a single type, by name.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TypeToDependencies {
    #[serde(rename = "type")]
    pub type_name: String,
    pub dependencies: Vec<String>,
}

/// Ordered table of type names to prerequisite type names.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyCache {
    entries: Vec<TypeToDependencies>,
}

impl DependencyCache {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(json).map_err(|error| CatalogError::MalformedCache(error.to_string()))
    }

    pub fn to_json(&self) -> Result<String, CatalogError> {
        serde_json::to_string_pretty(self)
            .map_err(|error| CatalogError::MalformedCache(error.to_string()))
    }

    /// Snapshots prerequisites of every catalog entry which declares any.
    pub fn from_catalog(catalog: &ContractCatalog) -> Self {
        let mut cache = Self::default();
        let mut descriptors: Vec<_> = catalog
            .descriptors()
            .filter(|descriptor| !descriptor.prerequisites.is_empty())
            .collect();
        descriptors.sort_unstable_by_key(|descriptor| descriptor.id.name());

        for descriptor in descriptors {
            cache.add(descriptor.id, descriptor.prerequisites.iter().copied());
        }

        cache
    }

    pub fn add<I: IntoIterator<Item = ContractId>>(&mut self, owner: ContractId, dependencies: I) {
        self.entries.push(TypeToDependencies {
            type_name: owner.name().to_string(),
            dependencies: dependencies
                .into_iter()
                .map(|dependency| dependency.name().to_string())
                .collect(),
        });
    }

    /// Returns dependencies of the first entry for given type name.
    pub fn dependencies_of(&self, type_name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|entry| entry.type_name == type_name)
            .map(|entry| entry.dependencies.as_slice())
    }

    #[inline]
    pub fn entries(&self) -> &[TypeToDependencies] {
        &self.entries
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
