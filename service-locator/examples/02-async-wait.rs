// note: this example assumes you've analyzed the previous ones

use futures::executor::block_on;
use futures::FutureExt;
use service_locator::locator::ServiceLocatorBuilder;
use service_locator::reference::ServiceReference;
use service_locator::service::{Service, ServicePtr};

struct Audio;

impl Service for Audio {}

impl Audio {
    fn play(&self) {
        println!("Playing music");
    }
}

fn main() {
    let locator = ServiceLocatorBuilder::new().build();

    // references are resolved lazily and follow registration changes
    let audio = ServiceReference::<Audio>::new(&locator);
    let mut wait = Box::pin(audio.wait_until_available());

    // audio is not registered yet, so waiting doesn't finish
    assert!(wait.as_mut().now_or_never().is_none());

    locator
        .register_service::<Audio, _>(ServicePtr::new(Audio))
        .expect("service already registered");

    // prints "Playing music"
    block_on(wait).expect("audio never registered").play();

    // dropping services clears the reference
    locator.unregister_all();
    assert!(audio.cached_reference().is_none());
}
