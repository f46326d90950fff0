//! Diagnostic tracing, separate from the console output the user interacts with.
//!
//! Reads `RUST_LOG` and defaults to `warn`. Events go to stderr in the compact format.
//!
//! ```bash
//! RUST_LOG=errand=debug errand "add a README"
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
