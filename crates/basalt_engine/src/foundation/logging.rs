//! Log initialization, re-exporting the `log` macros

pub use log::{debug, error, info, trace, warn};

/// Initialize logging from the `RUST_LOG` environment variable
pub fn init() {
    env_logger::init();
}

/// Initialize logging with `filter` as the fallback when `RUST_LOG` is unset
pub fn init_with_default(filter: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();
}
