//! Futures resolving once services get registered. Available with the `async` feature.
//!
//! Waits are executor-agnostic - they are woken synchronously by the registration which satisfies
//! them, so any single-threaded executor driving the host loop can poll them.

use crate::contract::ContractId;
use crate::dependency::Consumer;
use crate::error::ServiceLocatorError;
use crate::locator::{InjectionStatus, ServiceLocator};
use crate::service::{ServicePtr, ServiceProvider, TypedServiceProvider};
use futures::channel::oneshot;
use futures::future::try_join_all;
use futures::FutureExt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Weak;
use std::task::{Context, Poll};
use tracing::trace;

/// Future resolving when a contract gets registered. Fails with
/// [ServiceLocatorError::WaitCancelled] when the locator is torn down first. Dropping it removes
/// the underlying waiter.
#[must_use = "futures do nothing unless polled"]
pub struct ServiceWait {
    locator: Weak<ServiceLocator>,
    contract: ContractId,
    waiter: Option<(u64, oneshot::Receiver<()>)>,
}

impl ServiceWait {
    fn new(locator: &ServiceLocator, contract: ContractId) -> Self {
        let waiter = if locator.try_get_instance(contract).is_some() {
            None
        } else {
            trace!(contract = %contract, "Waiting for service.");
            Some(locator.add_waiter(contract))
        };

        Self {
            locator: locator.this(),
            contract,
            waiter,
        }
    }

    #[inline]
    pub fn contract(&self) -> ContractId {
        self.contract
    }
}

impl Future for ServiceWait {
    type Output = Result<(), ServiceLocatorError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some((_, receiver)) = self.waiter.as_mut() else {
            return Poll::Ready(Ok(()));
        };

        let result = match receiver.poll_unpin(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(Ok(())) => Ok(()),
            Poll::Ready(Err(_)) => Err(ServiceLocatorError::WaitCancelled(self.contract)),
        };

        // the sender is gone, so there's nothing to remove
        self.waiter = None;
        Poll::Ready(result)
    }
}

impl Drop for ServiceWait {
    fn drop(&mut self) {
        if let (Some((id, _)), Some(locator)) = (self.waiter.take(), self.locator.upgrade()) {
            locator.remove_waiter(self.contract, id);
        }
    }
}

impl ServiceLocator {
    /// Returns a future resolving once given contract is registered, immediately if it already
    /// is.
    pub fn wait_for_service(&self, contract: ContractId) -> ServiceWait {
        ServiceWait::new(self, contract)
    }

    /// Waits for contract `T` and returns its service.
    pub async fn wait_for<T: ?Sized + 'static>(&self) -> Result<ServicePtr<T>, ServiceLocatorError> {
        self.wait_for_service(ContractId::of::<T>()).await?;
        self.get::<T>()
    }

    /// Injects available dependencies into given consumer and waits for the missing ones.
    pub async fn inject_async<T: Consumer>(
        &self,
        consumer: &ServicePtr<T>,
    ) -> Result<InjectionStatus, ServiceLocatorError> {
        loop {
            if self.is_injected(consumer) {
                return Ok(InjectionStatus::AlreadyInjected);
            }

            let unresolved = self.extractor().unresolved_dependencies::<T>(self);
            if unresolved.is_empty() {
                self.complete_injection(consumer);
                return Ok(InjectionStatus::Complete);
            }

            self.apply_dependencies(consumer);

            // services can be unregistered again before all waits finish, hence the loop
            try_join_all(
                unresolved
                    .into_iter()
                    .map(|contract| self.wait_for_service(contract)),
            )
            .await?;
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::{ContractCatalog, ContractId};
    use crate::dependency::{Consumer, DependencyMember, DependencySlot, Injected};
    use crate::error::ServiceLocatorError;
    use crate::locator::{InjectionStatus, ServiceLocator, ServiceLocatorBuilder};
    use crate::service::{Service, ServiceInstance, ServicePtr};
    use futures::executor::block_on;
    use futures::FutureExt;

    struct Audio;

    impl Service for Audio {}

    struct Input;

    impl Service for Input {}

    fn locator() -> ServicePtr<ServiceLocator> {
        ServiceLocatorBuilder::new()
            .with_catalog(ContractCatalog::default())
            .build()
    }

    #[test]
    fn should_resolve_immediately_when_registered() {
        let locator = locator();
        locator.register_service::<Audio, _>(ServicePtr::new(Audio)).unwrap();

        assert_eq!(
            locator
                .wait_for_service(ContractId::of::<Audio>())
                .now_or_never(),
            Some(Ok(()))
        );
        assert_eq!(locator.waiter_count(ContractId::of::<Audio>()), 0);
    }

    #[test]
    fn should_resolve_after_registration() {
        let locator = locator();
        let mut wait = Box::pin(locator.wait_for::<Audio>());

        assert!(wait.as_mut().now_or_never().is_none());

        let audio = ServicePtr::new(Audio);
        locator.register_service::<Audio, _>(audio.clone()).unwrap();

        assert!(ServicePtr::ptr_eq(&block_on(wait).unwrap(), &audio));
    }

    #[test]
    fn should_cancel_waits_on_teardown() {
        let locator = locator();
        let mut wait = locator.wait_for_service(ContractId::of::<Audio>());

        assert!((&mut wait).now_or_never().is_none());

        locator.unregister_all();

        assert_eq!(
            block_on(wait),
            Err(ServiceLocatorError::WaitCancelled(ContractId::of::<Audio>()))
        );
    }

    #[test]
    fn should_remove_dropped_waits_only() {
        let contract = ContractId::of::<Audio>();
        let locator = locator();
        let dropped = locator.wait_for_service(contract);
        let mut kept = locator.wait_for_service(contract);

        assert_eq!(locator.waiter_count(contract), 2);

        drop(dropped);

        assert_eq!(locator.waiter_count(contract), 1);

        locator.register_service::<Audio, _>(ServicePtr::new(Audio)).unwrap();

        assert_eq!((&mut kept).now_or_never(), Some(Ok(())));
        assert_eq!(locator.waiter_count(contract), 0);
    }

    #[derive(Default)]
    struct Player {
        audio: Injected<Audio>,
        input: Injected<Input>,
    }

    impl Consumer for Player {
        fn declare_dependencies() -> Vec<DependencyMember> {
            vec![
                DependencyMember {
                    name: "audio",
                    contract: ContractId::of::<Audio>(),
                },
                DependencyMember {
                    name: "input",
                    contract: ContractId::of::<Input>(),
                },
            ]
        }

        fn assign_dependency(&self, member: usize, instance: &ServiceInstance) -> bool {
            match member {
                0 => self.audio.assign(instance),
                1 => self.input.assign(instance),
                _ => false,
            }
        }
    }

    #[test]
    fn should_inject_asynchronously() {
        let locator = locator();
        locator.register_service::<Audio, _>(ServicePtr::new(Audio)).unwrap();

        let player = ServicePtr::new(Player::default());
        let mut injection = Box::pin(locator.inject_async(&player));

        assert!(injection.as_mut().now_or_never().is_none());
        assert!(player.audio.is_injected());
        assert!(!player.input.is_injected());

        locator.register_service::<Input, _>(ServicePtr::new(Input)).unwrap();

        assert_eq!(block_on(injection), Ok(InjectionStatus::Complete));
        assert!(player.input.is_injected());
        assert!(locator.is_injected(&player));
    }
}
