use std::env;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Logging bootstrap.
///
/// Honours RUST_LOG when set. STREAMFLOW_DEBUG switches to a verbose format
/// with targets, file locations, and thread ids.
pub struct LoggingConfig;

impl LoggingConfig {
    pub fn init() {
        let is_debug = env::var("STREAMFLOW_DEBUG").is_ok();

        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => {
                if is_debug {
                    EnvFilter::new("streamflow=debug,info")
                } else {
                    EnvFilter::new("streamflow=info,warn")
                }
            }
        };

        let fmt_layer = if is_debug {
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_thread_ids(true)
        } else {
            fmt::layer()
                .with_target(false)
                .with_file(false)
                .with_line_number(false)
                .with_thread_ids(false)
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
    }

    pub fn init_with_filter(filter: &str) {
        let env_filter = EnvFilter::new(filter);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }

    pub fn is_debug() -> bool {
        env::var("STREAMFLOW_DEBUG").is_ok()
    }
}
