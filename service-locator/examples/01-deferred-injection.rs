// note: this example assumes you've analyzed the previous one

use service_locator::dependency::Injected;
use service_locator::locator::{ServiceLocator, ServiceLocatorBuilder};
use service_locator::service::{Service, ServicePtr};
use service_locator::{provides, service_contract, Contract, Inject};

#[service_contract]
trait Storage {
    fn load(&self) -> String;
}

struct FileStorage;

impl Service for FileStorage {}

#[provides]
impl Storage for FileStorage {
    fn load(&self) -> String {
        "level 3".to_string()
    }
}

// save games need storage to work - the locator will keep them waiting until storage is
// registered
#[derive(Contract)]
#[contract(depends_on(dyn Storage))]
struct SaveGames;

impl Service for SaveGames {
    fn on_registered(&self, _locator: &ServiceLocator) {
        println!("Save games are ready");
    }
}

// consumers have their dependencies injected into marked fields, once they're available
#[derive(Inject, Default)]
#[inject(on_injected = "Self::ready")]
struct MainMenu {
    #[inject]
    storage: Injected<dyn Storage>,
    #[inject]
    save_games: Injected<SaveGames>,
}

impl MainMenu {
    fn ready(&self) {
        if let Some(storage) = self.storage.get() {
            println!("Main menu ready, continuing from: {}", storage.load());
        }
    }
}

fn main() {
    let locator = ServiceLocatorBuilder::new().build();
    let main_menu = ServicePtr::new(MainMenu::default());

    // nothing is registered yet, so injection will complete later and call the callback
    locator
        .inject_with_callback(&main_menu, || println!("Injection callback called"))
        .expect("error injecting main menu");

    // save games will wait for storage
    locator
        .register_service::<SaveGames, _>(ServicePtr::new(SaveGames))
        .expect("service already registered");

    // prints:
    // Save games are ready
    // Main menu ready, continuing from: level 3
    // Injection callback called
    locator
        .register_service::<dyn Storage, _>(ServicePtr::new(FileStorage))
        .expect("service already registered");

    // nothing should be left waiting
    assert_eq!(locator.unregister_all(), 0);
}
