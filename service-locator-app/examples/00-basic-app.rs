use service_locator::locator::ServiceLocator;
use service_locator::service::{Service, ServicePtr, TypedServiceProvider};
use service_locator::{provides, service_contract, ServiceLocatorError};
use service_locator_app::application::ApplicationBuilder;
use service_locator_app::reporter::ServicesReporter;

#[service_contract]
trait Greeter {
    fn greet(&self);
}

struct HelloWorld;

impl Service for HelloWorld {}

#[provides]
impl Greeter for HelloWorld {
    fn greet(&self) {
        println!("Hello world!");
    }
}

// reporters group registration of services, which would otherwise be spread all over the
// application
struct GreeterReporter;

impl ServicesReporter for GreeterReporter {
    fn register_services(&self, locator: &ServiceLocator) -> Result<(), ServiceLocatorError> {
        locator.register_service::<dyn Greeter, _>(ServicePtr::new(HelloWorld))?;
        Ok(())
    }

    fn unregister_services(&self, locator: &ServiceLocator) {
        locator.unregister_service::<dyn Greeter>();
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // create our application, with config taken from the environment
    let application = ApplicationBuilder::new()
        .with_reporter(GreeterReporter)
        .build()
        .expect("unable to create application");

    application.start().expect("error registering services");

    // prints "Hello world!"
    application
        .locator()
        .get::<dyn Greeter>()
        .expect("missing greeter")
        .greet();

    application.shutdown();
}
