#[cfg(feature = "derive")]
mod contract_derive_test {
    use service_locator::contract::{ContractCatalog, ContractId};
    use service_locator::dependency::{Consumer, DependencyMember, Injected};
    use service_locator::dependency_cache::DependencyCache;
    use service_locator::locator::ServiceLocatorBuilder;
    use service_locator::service::{Service, ServiceInstance, ServicePtr, TypedServiceProvider};
    use service_locator::{provides, service_contract, Contract, Inject};
    use std::cell::Cell;

    #[service_contract(name = "Test Logger", category = "Core")]
    trait TestLogger {
        fn name(&self) -> &'static str;
    }

    #[service_contract(depends_on(dyn TestLogger))]
    trait TestAnalytics {}

    #[derive(Contract)]
    #[contract(category = "Gameplay", depends_on(dyn TestLogger, dyn TestAnalytics))]
    struct TestLeaderboard;

    impl Service for TestLeaderboard {}

    #[derive(Contract)]
    struct TestSettingsStore;

    struct TestConsoleLogger;

    impl Service for TestConsoleLogger {}

    #[provides]
    impl TestLogger for TestConsoleLogger {
        fn name(&self) -> &'static str {
            "console"
        }
    }

    struct TestAnalyticsClient;

    impl Service for TestAnalyticsClient {}

    #[provides]
    impl TestAnalytics for TestAnalyticsClient {}

    #[derive(Inject, Default)]
    #[inject(on_injected = "Self::ready")]
    struct TestHud {
        #[inject]
        logger: Injected<dyn TestLogger>,
        #[inject]
        leaderboard: Injected<TestLeaderboard>,
        ready: Cell<bool>,
    }

    impl TestHud {
        fn ready(&self) {
            self.ready.set(true);
        }
    }

    #[derive(Inject)]
    struct TestTupleConsumer(u8, #[inject] Injected<dyn TestAnalytics>);

    #[test]
    fn should_register_service_contract_descriptors() {
        let catalog = ContractCatalog::from_static();

        let logger = catalog
            .descriptor(ContractId::of::<dyn TestLogger>())
            .unwrap();
        assert_eq!(logger.name, "Test Logger");
        assert_eq!(logger.category.as_deref(), Some("Core"));
        assert!(logger.prerequisites.is_empty());

        let analytics = catalog
            .descriptor(ContractId::of::<dyn TestAnalytics>())
            .unwrap();
        assert_eq!(analytics.name, "Test Analytics");
        assert_eq!(analytics.category, None);
        assert_eq!(
            analytics.prerequisites,
            vec![ContractId::of::<dyn TestLogger>()]
        );
    }

    #[test]
    fn should_register_derived_contract_descriptors() {
        let catalog = ContractCatalog::from_static();

        let leaderboard = catalog
            .descriptor(ContractId::of::<TestLeaderboard>())
            .unwrap();
        assert_eq!(leaderboard.name, "Test Leaderboard");
        assert_eq!(leaderboard.category.as_deref(), Some("Gameplay"));
        assert_eq!(
            leaderboard.prerequisites,
            vec![
                ContractId::of::<dyn TestLogger>(),
                ContractId::of::<dyn TestAnalytics>()
            ]
        );

        assert_eq!(
            catalog
                .find_by_name(ContractId::of::<TestSettingsStore>().name()),
            Some(ContractId::of::<TestSettingsStore>())
        );
    }

    #[test]
    fn should_provide_trait_contracts() {
        let instance = ServiceInstance::new::<dyn TestLogger, _>(ServicePtr::new(TestConsoleLogger));

        assert_eq!(instance.contract(), ContractId::of::<dyn TestLogger>());
        assert_eq!(
            instance.downcast::<dyn TestLogger>().unwrap().name(),
            "console"
        );
    }

    #[test]
    fn should_declare_injected_members() {
        assert_eq!(
            TestHud::declare_dependencies(),
            vec![
                DependencyMember {
                    name: "logger",
                    contract: ContractId::of::<dyn TestLogger>(),
                },
                DependencyMember {
                    name: "leaderboard",
                    contract: ContractId::of::<TestLeaderboard>(),
                },
            ]
        );
        assert_eq!(
            TestTupleConsumer::declare_dependencies(),
            vec![DependencyMember {
                name: "1",
                contract: ContractId::of::<dyn TestAnalytics>(),
            }]
        );
    }

    #[test]
    fn should_resolve_declared_prerequisites() {
        let locator = ServiceLocatorBuilder::new().build();
        let hud = ServicePtr::new(TestHud::default());

        locator
            .inject_with_callback(&hud, || {})
            .unwrap();

        // waits for the logger and analytics declared on the contract
        assert!(!locator
            .register_service::<TestLeaderboard, _>(ServicePtr::new(TestLeaderboard))
            .unwrap());
        locator
            .register_service::<dyn TestAnalytics, _>(ServicePtr::new(TestAnalyticsClient))
            .unwrap();
        assert!(!locator.has::<dyn TestAnalytics>());

        locator
            .register_service::<dyn TestLogger, _>(ServicePtr::new(TestConsoleLogger))
            .unwrap();

        assert!(locator.has::<dyn TestAnalytics>());
        assert!(locator.has::<TestLeaderboard>());
        assert!(hud.ready.get());
        assert!(hud.leaderboard.is_injected());
        assert_eq!(hud.logger.get().unwrap().name(), "console");
    }

    #[test]
    fn should_round_trip_catalog_through_dependency_cache() {
        let cache = DependencyCache::from_catalog(&ContractCatalog::from_static());
        let json = cache.to_json().unwrap();

        let mut catalog = ContractCatalog::from_static();
        for descriptor in ContractCatalog::from_static().descriptors() {
            let mut descriptor = descriptor.clone();
            descriptor.prerequisites.clear();
            catalog.register(descriptor);
        }

        catalog
            .apply_dependency_cache(&DependencyCache::from_json(&json).unwrap())
            .unwrap();

        assert_eq!(
            catalog.prerequisites(ContractId::of::<TestLeaderboard>()),
            &[
                ContractId::of::<dyn TestLogger>(),
                ContractId::of::<dyn TestAnalytics>()
            ]
        );
    }
}
