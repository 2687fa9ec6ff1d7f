// note: this example assumes you've analyzed the previous one

use service_locator::locator::LocatorMode;
use service_locator_app::application::ApplicationBuilder;
use service_locator_app::config::LocatorConfig;

fn main() {
    // by default, configuration is read from environment variables and a configuration file (see
    // module documentation); it can also be provided explicitly - start with a default config and
    // override what's needed
    let mut config = LocatorConfig::default();
    config.install_tracing_logger = false;
    config.mode = LocatorMode::Tooling;

    let application = ApplicationBuilder::new()
        .with_config(config)
        .build()
        .expect("unable to create application");

    // prints "Using built-in logger: false"
    println!(
        "Using built-in logger: {}",
        application.config().install_tracing_logger
    );

    // prints "Locator mode: Tooling"
    println!("Locator mode: {:?}", application.locator().mode());
}
