use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_engine_url")]
    pub engine_url: String,
    #[serde(default = "default_users_file")]
    pub users_file: PathBuf,
    #[serde(default)]
    pub passthrough: PassthroughConfig,
}

/// Which unmodelled `/api/*` paths may be forwarded to the engine untouched.
///
/// Prefixes are matched on whole segments against the path with `/api`
/// already stripped, so `"/"` admits everything and `"/file"` admits
/// `/api/file` and `/api/file/...` but not `/api/filesystem`.
#[derive(Debug, Deserialize, Clone)]
pub struct PassthroughConfig {
    #[serde(default = "default_allow_prefixes")]
    pub allow_prefixes: Vec<String>,
}

impl Default for PassthroughConfig {
    fn default() -> Self {
        Self {
            allow_prefixes: default_allow_prefixes(),
        }
    }
}

impl PassthroughConfig {
    pub fn allows(&self, path: &str) -> bool {
        self.allow_prefixes.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            match path.strip_prefix(prefix) {
                Some(rest) => rest.is_empty() || rest.starts_with('/'),
                None => false,
            }
        })
    }
}

impl GatewayConfig {
    /// Default `tracing` filter directive for this config.
    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "aihub_gateway=debug,tower_http=debug"
        } else {
            "aihub_gateway=info"
        }
    }
}

// Default functions
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_engine_url() -> String {
    "http://127.0.0.1:4096".into()
}
fn default_users_file() -> PathBuf {
    PathBuf::from("users.json")
}
fn default_allow_prefixes() -> Vec<String> {
    vec!["/".into()]
}

/// Load config from TOML file with env var overrides.
pub fn load(path: &str) -> anyhow::Result<GatewayConfig> {
    let content = if std::path::Path::new(path).exists() {
        std::fs::read_to_string(path)?
    } else {
        tracing::warn!("Config file not found at {}, using defaults", path);
        String::new()
    };

    let mut config: GatewayConfig = toml::from_str(&content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.engine_url = config.engine_url.trim_end_matches('/').to_string();

    Ok(config)
}

fn apply_env_overrides<F>(config: &mut GatewayConfig, var: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = var("AIHUB_HOST") {
        config.host = v;
    }
    if let Some(v) = var("AIHUB_PORT") {
        config.port = v.parse()?;
    }
    if let Some(v) = var("AIHUB_DEBUG") {
        config.debug = v.eq_ignore_ascii_case("true") || v == "1";
    }
    if let Some(v) = var("AIHUB_ENGINE_URL") {
        config.engine_url = v;
    }
    if let Some(v) = var("AIHUB_USERS_FILE") {
        config.users_file = PathBuf::from(v);
    }
    Ok(())
}
