use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_ENV: &str = "PBXPROJ_LOG";
const DEFAULT_FILTER: &str = "warn";

/// Filter from `PBXPROJ_LOG`, `warn` when unset or unparsable.
pub fn env_filter(raw: Option<&str>) -> EnvFilter {
    raw.and_then(|r| EnvFilter::try_new(r).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs a stderr subscriber; stdout carries JSON and MCP frames.
/// A second call is a no-op.
pub fn init() {
    let filter = env_filter(std::env::var(LOG_ENV).ok().as_deref());
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(true);
    let _ = Registry::default().with(filter).with(layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_warn() {
        assert_eq!(env_filter(None).to_string(), "warn");
        assert_eq!(env_filter(Some("pbxproj_mcp=debug")).to_string(), "pbxproj_mcp=debug");
        assert_eq!(env_filter(Some("pbxproj_mcp=loud")).to_string(), "warn");
    }
}
