//! Observers interested in registration changes of specific contracts.
//!
//! Observers are held weakly - the locator never keeps an observer alive. Dead observers (dropped
//! or reporting [ServiceObserver::is_alive] as false) are pruned lazily, right before a dispatch.

use crate::contract::ContractId;
use fxhash::FxHashMap;
#[cfg(test)]
use mockall::automock;
use std::rc::{Rc, Weak};

pub type ServiceObserverPtr = Weak<dyn ServiceObserver>;

/// Listener for registration changes of a contract.
#[cfg_attr(test, automock)]
pub trait ServiceObserver {
    fn on_service_registered(&self, contract: ContractId);

    fn on_service_unregistered(&self, contract: ContractId);

    /// Host liveness check. Dead observers are removed instead of being notified.
    fn is_alive(&self) -> bool {
        true
    }
}

#[derive(Default)]
pub(crate) struct SubscriptionTable {
    observers: FxHashMap<ContractId, Vec<ServiceObserverPtr>>,
}

impl SubscriptionTable {
    /// Adds an observer, unless already subscribed to given contract.
    pub(crate) fn subscribe(&mut self, contract: ContractId, observer: ServiceObserverPtr) -> bool {
        let observers = self.observers.entry(contract).or_default();
        if observers
            .iter()
            .any(|existing| existing.ptr_eq(&observer))
        {
            return false;
        }

        observers.push(observer);
        true
    }

    pub(crate) fn unsubscribe(&mut self, contract: ContractId, observer: &ServiceObserverPtr) -> bool {
        let Some(observers) = self.observers.get_mut(&contract) else {
            return false;
        };

        let count = observers.len();
        observers.retain(|existing| !existing.ptr_eq(observer));
        count != observers.len()
    }

    /// Prunes dead observers and returns the living ones, in subscription order.
    pub(crate) fn live_observers(&mut self, contract: ContractId) -> Vec<Rc<dyn ServiceObserver>> {
        let Some(observers) = self.observers.get_mut(&contract) else {
            return Vec::new();
        };

        let mut live = Vec::with_capacity(observers.len());
        observers.retain(|observer| match observer.upgrade() {
            Some(observer) if observer.is_alive() => {
                live.push(observer);
                true
            }
            _ => false,
        });

        if observers.is_empty() {
            self.observers.remove(&contract);
        }

        live
    }

    pub(crate) fn observer_count(&self, contract: ContractId) -> usize {
        self.observers.get(&contract).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use crate::contract::ContractId;
    use crate::subscription::{MockServiceObserver, ServiceObserver, ServiceObserverPtr, SubscriptionTable};
    use std::rc::Rc;

    struct Audio;

    fn observer(alive: bool) -> Rc<dyn ServiceObserver> {
        let mut observer = MockServiceObserver::new();
        observer.expect_is_alive().return_const(alive);
        Rc::new(observer)
    }

    #[test]
    fn should_not_subscribe_twice() {
        let contract = ContractId::of::<Audio>();
        let observer = observer(true);

        let mut table = SubscriptionTable::default();
        assert!(table.subscribe(contract, Rc::downgrade(&observer)));
        assert!(!table.subscribe(contract, Rc::downgrade(&observer)));
        assert_eq!(table.observer_count(contract), 1);
    }

    #[test]
    fn should_unsubscribe() {
        let contract = ContractId::of::<Audio>();
        let observer = observer(true);
        let weak: ServiceObserverPtr = Rc::downgrade(&observer);

        let mut table = SubscriptionTable::default();
        table.subscribe(contract, weak.clone());

        assert!(table.unsubscribe(contract, &weak));
        assert!(!table.unsubscribe(contract, &weak));
        assert!(table.live_observers(contract).is_empty());
    }

    #[test]
    fn should_prune_dead_observers() {
        let contract = ContractId::of::<Audio>();
        let alive = observer(true);
        let not_alive = observer(false);
        let dropped = observer(true);

        let mut table = SubscriptionTable::default();
        table.subscribe(contract, Rc::downgrade(&alive));
        table.subscribe(contract, Rc::downgrade(&not_alive));
        table.subscribe(contract, Rc::downgrade(&dropped));
        drop(dropped);

        let live = table.live_observers(contract);

        assert_eq!(live.len(), 1);
        assert!(Rc::ptr_eq(&live[0], &alive));
        assert_eq!(table.observer_count(contract), 1);
    }
}
