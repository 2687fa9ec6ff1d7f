// note: this example assumes you've analyzed the previous ones

use service_locator::contract::ContractId;
use service_locator::locator::ServiceLocator;
use service_locator::service::{Service, ServicePtr};
use service_locator::ServiceLocatorError;
use service_locator_app::application::ApplicationBuilder;
use service_locator_app::config::LocatorConfig;
use service_locator_app::reporter::ServicesReporter;

struct Storage;

impl Service for Storage {
    fn on_registered(&self, _locator: &ServiceLocator) {
        println!("Storage ready");
    }
}

struct SaveGames;

impl Service for SaveGames {
    // save games cannot work without storage, so they will wait for it
    fn prerequisites(&self) -> Vec<ContractId> {
        vec![ContractId::of::<Storage>()]
    }

    fn on_registered(&self, _locator: &ServiceLocator) {
        println!("Save games ready");
    }
}

struct GameplayReporter;

impl ServicesReporter for GameplayReporter {
    fn register_services(&self, locator: &ServiceLocator) -> Result<(), ServiceLocatorError> {
        println!("Registering gameplay services");
        locator.register_service::<SaveGames, _>(ServicePtr::new(SaveGames))?;
        Ok(())
    }

    fn unregister_services(&self, locator: &ServiceLocator) {
        locator.unregister_service::<SaveGames>();
    }

    // higher priority reporters run first, so gameplay services get registered before the core
    // ones, despite depending on them
    fn priority(&self) -> i8 {
        10
    }
}

struct CoreReporter;

impl ServicesReporter for CoreReporter {
    fn register_services(&self, locator: &ServiceLocator) -> Result<(), ServiceLocatorError> {
        println!("Registering core services");
        locator.register_service::<Storage, _>(ServicePtr::new(Storage))?;
        Ok(())
    }

    fn unregister_services(&self, locator: &ServiceLocator) {
        locator.unregister_service::<Storage>();
    }
}

fn main() {
    let mut config = LocatorConfig::default();
    config.install_tracing_logger = false;

    let application = ApplicationBuilder::new()
        .with_config(config)
        .with_reporter(CoreReporter)
        .with_reporter(GameplayReporter)
        .build()
        .expect("unable to create application");

    // prints:
    // Registering gameplay services
    // Registering core services
    // Storage ready
    // Save games ready
    application.start().expect("error registering services");

    let report = application.shutdown();
    assert_eq!(report.discarded_pending, 0);
}
