use crate::contract::ContractId;
use itertools::Itertools;
use thiserror::Error;

/// Errors related to registering and retrieving services.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum ServiceLocatorError {
    #[error("Service '{0}' is already registered or waiting for its dependencies.")]
    AlreadyRegistered(ContractId),
    #[error("Service '{0}' is not yet registered - consider waiting for it or injecting with a callback.")]
    ServiceNotRegistered(ContractId),
    #[error(
        "'{consumer}' has unresolved dependencies and no callback was provided to handle it: {}",
        .missing.iter().join(", ")
    )]
    UnresolvedDependencies {
        consumer: ContractId,
        missing: Vec<ContractId>,
    },
    #[error("Service registered as '{0}' cannot be cast to the requested type.")]
    IncompatibleService(ContractId),
    #[error("Stopped waiting for service '{0}' - the locator has been torn down.")]
    WaitCancelled(ContractId),
}

/// Errors related to the contract catalog and offline dependency caches.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum CatalogError {
    #[error("Cannot find contract with type name: {0}")]
    UnknownContract(String),
    #[error("Malformed dependency cache: {0}")]
    MalformedCache(String),
}
