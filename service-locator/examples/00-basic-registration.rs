use service_locator::locator::ServiceLocatorBuilder;
use service_locator::service::{Service, ServicePtr, TypedServiceProvider};
use service_locator::{provides, service_contract};

// contracts are usually traits - this one gets registered in the static contract catalog
#[service_contract]
trait Greeter {
    fn greet(&self);
}

// any 'static type implementing Service can be registered in the locator
struct HelloWorld;

impl Service for HelloWorld {}

// allow registering HelloWorld as dyn Greeter
#[provides]
impl Greeter for HelloWorld {
    fn greet(&self) {
        println!("Hello world!");
    }
}

// note: for the sake of simplicity, errors are unwrapped, rather than gracefully handled
fn main() {
    // create a locator with all statically declared contracts
    let locator = ServiceLocatorBuilder::new().build();

    locator
        .register_service::<dyn Greeter, _>(ServicePtr::new(HelloWorld))
        .expect("service already registered");

    // prints "Hello world!"
    locator
        .get::<dyn Greeter>()
        .expect("greeter not registered")
        .greet();
}
