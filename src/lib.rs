pub mod config;
pub mod devices;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod matchers;
pub mod perception;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{load_config, load_config_from, Config, ConfigFile, RegionConfig};
pub use devices::Devices;
pub use engine::element::{ClickOptions, Element, ElementConfig};
pub use engine::events::{Event, RecordingReporter, Reporter, TracingReporter};
pub use engine::region::Region;
pub use errors::{ClickshotError, ClickshotResult};
pub use executor::input::Button;
pub use perception::types::Rect;

/// Install the global `tracing` subscriber. `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
