//! Logging setup
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard filter directives, overrides `-v`
//! - `POLLSTER_LOG_FORMAT`: `pretty` (default) or `json`

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset: warnings only, `-v` info, `-vv` debug
fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "pollster=warn",
        1 => "pollster=info",
        _ => "pollster=debug",
    }
}

/// Initialize tracing on stderr so stdout stays free for results
pub fn init(verbose: u8) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(verbose)))?;

    let log_format =
        std::env::var("POLLSTER_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    match log_format.as_str() {
        "json" => {
            // Structured logging for log shippers
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}
