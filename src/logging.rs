//! Process-wide tracing setup.
//!
//! The subscriber is installed before the config file is read so that config
//! loading can log. Once the config is known its `debug` flag picks the final
//! filter, unless `RUST_LOG` was set.

use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

use crate::config::GatewayConfig;

const BOOT_FILTER: &str = "aihub_gateway=info";

pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` chose the filter; config never overrides it.
    pinned: bool,
}

fn filter_layer(rust_log: Option<&str>) -> (reload::Layer<EnvFilter, Registry>, LogHandle) {
    let filter = rust_log
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(BOOT_FILTER));
    let (layer, handle) = reload::Layer::new(filter);
    (
        layer,
        LogHandle {
            handle,
            pinned: rust_log.is_some(),
        },
    )
}

/// Install the global subscriber.
pub fn init() -> LogHandle {
    let rust_log = std::env::var("RUST_LOG").ok();
    let (filter, handle) = filter_layer(rust_log.as_deref());
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    handle
}

impl LogHandle {
    /// Switch to the filter `config` asks for.
    pub fn apply(&self, config: &GatewayConfig) -> anyhow::Result<()> {
        if self.pinned {
            return Ok(());
        }
        self.handle.reload(EnvFilter::new(config.log_filter()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(debug: bool) -> GatewayConfig {
        let mut cfg: GatewayConfig = toml::from_str("").unwrap();
        cfg.debug = debug;
        cfg
    }

    fn current(handle: &LogHandle) -> String {
        handle.handle.with_current(|f| f.to_string()).unwrap()
    }

    #[test]
    fn boot_filter_is_info_until_config_applies() {
        let (_layer, handle) = filter_layer(None);
        assert!(current(&handle).contains("aihub_gateway=info"));

        handle.apply(&config(true)).unwrap();
        assert!(current(&handle).contains("aihub_gateway=debug"));
        assert!(current(&handle).contains("tower_http=debug"));
    }

    #[test]
    fn rust_log_wins_over_config() {
        let (_layer, handle) = filter_layer(Some("warn"));
        handle.apply(&config(true)).unwrap();
        let filter = current(&handle);
        assert!(filter.contains("warn"));
        assert!(!filter.contains("aihub_gateway=debug"));
    }
}
