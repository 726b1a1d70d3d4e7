//! Tracing subscriber setup shared by the service binary and the CLI.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `default_directives` (comma separated)
/// apply on top of `RUST_LOG`; `json` switches to one JSON object per line.
pub fn init(default_directives: &str, json: bool) -> Result<()> {
    let mut filter = EnvFilter::from_default_env();
    for directive in default_directives.split(',').filter(|d| !d.trim().is_empty()) {
        filter = filter.add_directive(directive.trim().parse()?);
    }
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).try_init()?;
    } else {
        registry.with(fmt::layer()).try_init()?;
    }
    Ok(())
}
