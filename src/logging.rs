use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, ToolError};

const DEFAULT_FILTER: &str = "info,reqwest=warn";

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` switches this crate to
/// debug level.
pub fn init(verbose: bool) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) if verbose => EnvFilter::new(format!("{DEFAULT_FILTER},price_bot=debug")),
        Err(_) => EnvFilter::new(DEFAULT_FILTER),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}
