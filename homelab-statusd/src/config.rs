use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use shared::protocol::{DEFAULT_PORT, DEFAULT_PROBE_TIMEOUT_MS, PORT_ENV, SELF_PORT_SENTINEL};
use shared::types::{Meta, Service};

/// Daemon settings, read from TOML
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    /// Used when the PORT environment variable is unset or invalid
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
    /// Takes precedence over `path` when the file exists
    #[serde(default = "default_catalog_local_path")]
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,
    /// Upper bound on sockets in flight across all requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_command_timeout")]
    pub command_timeout_ms: u64,
}

fn default_bind() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("web")
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("services.json")
}

fn default_catalog_local_path() -> PathBuf {
    PathBuf::from("services.local.json")
}

fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

fn default_max_concurrent() -> usize {
    64
}

fn default_command_timeout() -> u64 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
            local_path: default_catalog_local_path(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: default_command_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Like `load`, but a missing file falls back to defaults unless the
    /// path was given explicitly on the command line.
    pub fn load_or_default(path: impl AsRef<Path>, explicit: bool) -> Result<Self> {
        let path = path.as_ref();
        if !explicit && !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

impl ServerConfig {
    /// Listening port: PORT from the environment, else the configured port
    pub fn listen_port(&self) -> u16 {
        port_from_env(std::env::var(PORT_ENV).ok().as_deref(), self.port)
    }
}

fn port_from_env(value: Option<&str>, fallback: u16) -> u16 {
    let Some(raw) = value else {
        return fallback;
    };
    match raw.trim().parse::<u16>() {
        Ok(port) if port > 0 => port,
        _ => {
            tracing::warn!("Ignoring invalid {}={:?}, using port {}", PORT_ENV, raw, fallback);
            fallback
        }
    }
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl DiscoveryConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl CatalogConfig {
    /// The local override if it exists, else the default catalog file
    pub fn active_path(&self) -> &Path {
        if self.local_path.exists() {
            &self.local_path
        } else {
            &self.path
        }
    }
}

/// Normalized service list plus UI metadata, immutable after startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    pub services: Vec<Service>,
    pub meta: Meta,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalog {
    #[serde(default)]
    services: Vec<Value>,
    #[serde(default)]
    repo_url: Option<String>,
    #[serde(default)]
    telegram_username: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawService {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    port: Option<Value>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    repo_url: Option<String>,
}

impl Catalog {
    /// Load the active catalog file. Any failure yields an empty catalog.
    pub fn load(config: &CatalogConfig, self_port: u16) -> Self {
        let path = config.active_path();
        match Self::read(path, self_port) {
            Ok(catalog) => {
                tracing::info!(
                    "Loaded {} services from {}",
                    catalog.services.len(),
                    path.display()
                );
                catalog
            }
            Err(e) => {
                tracing::warn!("Using empty service catalog: {:#}", e);
                Self::default()
            }
        }
    }

    fn read(path: &Path, self_port: u16) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
        Self::from_json(&contents, self_port)
            .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
    }

    pub fn from_json(contents: &str, self_port: u16) -> Result<Self> {
        let raw: RawCatalog = serde_json::from_str(contents)?;

        let mut services: Vec<Service> = Vec::with_capacity(raw.services.len());
        for value in raw.services {
            match normalize_service(value, self_port) {
                Ok(service) if services.iter().any(|s| s.key == service.key) => {
                    tracing::warn!("Dropping service with duplicate key {:?}", service.key);
                }
                Ok(service) => services.push(service),
                Err(e) => tracing::warn!("Dropping service entry: {}", e),
            }
        }

        Ok(Self {
            services,
            meta: Meta {
                repo_url: raw.repo_url.unwrap_or_default(),
                telegram_username: raw.telegram_username.unwrap_or_default(),
            },
        })
    }
}

fn normalize_service(value: Value, self_port: u16) -> Result<Service> {
    let raw: RawService = serde_json::from_value(value).context("malformed entry")?;

    let key = non_empty(raw.key).context("missing key")?;
    let name = non_empty(raw.name)
        .with_context(|| format!("service {:?} is missing a name", key))?;
    let port = raw
        .port
        .as_ref()
        .and_then(|port| resolve_port(port, self_port))
        .with_context(|| format!("service {:?} has no valid port", key))?;

    Ok(Service {
        key,
        name,
        port,
        path: non_empty(raw.path).unwrap_or_else(|| "/".to_string()),
        repo_url: non_empty(raw.repo_url),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Accepts a positive number, a numeric string, or the "self" sentinel
fn resolve_port(value: &Value, self_port: u16) -> Option<u16> {
    let port = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => {
                let f = n.as_f64()?;
                if f.fract() != 0.0 {
                    return None;
                }
                f as i64
            }
        },
        Value::String(s) if s.trim().eq_ignore_ascii_case(SELF_PORT_SENTINEL) => {
            i64::from(self_port)
        }
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    u16::try_from(port).ok().filter(|p| *p > 0)
}

/// Reject settings that would make the daemon useless at runtime
pub fn validate(config: &Config) -> Result<()> {
    if config.probe.timeout_ms == 0 {
        bail!("probe.timeout_ms must be greater than zero");
    }
    if config.discovery.command_timeout_ms == 0 {
        bail!("discovery.command_timeout_ms must be greater than zero");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const SELF_PORT: u16 = 3499;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.static_dir, PathBuf::from("web"));
        assert_eq!(config.probe.timeout(), Duration::from_millis(500));
        assert_eq!(config.probe.max_concurrent, 64);
        assert_eq!(config.catalog.path, PathBuf::from("services.json"));
    }

    #[test]
    fn test_load_toml_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("statusd.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nbind = \"127.0.0.1\"\nport = 4000\n\n[probe]\ntimeout_ms = 250"
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.server.bind, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.probe.timeout_ms, 250);
        assert_eq!(config.discovery.command_timeout_ms, 3000);
    }

    #[test]
    fn test_missing_file_only_fatal_when_explicit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        assert!(Config::load_or_default(&path, false).is_ok());
        assert!(Config::load_or_default(&path, true).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let mut config = Config::default();
        assert!(validate(&config).is_ok());

        config.probe.timeout_ms = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_port_from_env() {
        assert_eq!(port_from_env(None, 3499), 3499);
        assert_eq!(port_from_env(Some("8080"), 3499), 8080);
        assert_eq!(port_from_env(Some(" 8081 "), 3499), 8081);
        assert_eq!(port_from_env(Some("0"), 3499), 3499);
        assert_eq!(port_from_env(Some("http"), 3499), 3499);
    }

    #[test]
    fn test_catalog_normalization() {
        let json = r#"{
            "services": [
                { "key": "camreview", "name": "CamReview", "port": 3000, "path": "/browse" },
                { "key": "noname", "port": 3001 },
                { "key": "dash", "name": "Dashboard", "port": "self", "repoUrl": "https://example.com/dash" },
                { "key": "zero", "name": "Zero", "port": 0 },
                { "key": "neg", "name": "Negative", "port": -5 },
                { "key": "text", "name": "Text", "port": "abc" },
                { "key": "big", "name": "Big", "port": 70000 },
                { "name": "NoKey", "port": 3002 },
                { "key": "str", "name": "StringPort", "port": "3434" },
                42
            ],
            "repoUrl": "https://example.com/homelab",
            "telegramUsername": "operator"
        }"#;

        let catalog = Catalog::from_json(json, SELF_PORT).unwrap();
        let keys: Vec<&str> = catalog.services.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["camreview", "dash", "str"]);

        assert_eq!(catalog.services[0].path, "/browse");
        assert_eq!(catalog.services[1].port, SELF_PORT);
        assert_eq!(
            catalog.services[1].repo_url.as_deref(),
            Some("https://example.com/dash")
        );
        assert_eq!(catalog.services[1].path, "/");
        assert_eq!(catalog.services[2].port, 3434);

        assert_eq!(catalog.meta.repo_url, "https://example.com/homelab");
        assert_eq!(catalog.meta.telegram_username, "operator");
    }

    #[test]
    fn test_catalog_drops_duplicate_keys() {
        let json = r#"{ "services": [
            { "key": "web", "name": "First", "port": 80 },
            { "key": "web", "name": "Second", "port": 81 }
        ] }"#;

        let catalog = Catalog::from_json(json, SELF_PORT).unwrap();
        assert_eq!(catalog.services.len(), 1);
        assert_eq!(catalog.services[0].name, "First");
    }

    #[test]
    fn test_catalog_local_override_takes_precedence() {
        let dir = TempDir::new().unwrap();
        let config = CatalogConfig {
            path: dir.path().join("services.json"),
            local_path: dir.path().join("services.local.json"),
        };
        std::fs::write(
            &config.path,
            r#"{ "services": [ { "key": "default", "name": "Default", "port": 80 } ] }"#,
        )
        .unwrap();

        let catalog = Catalog::load(&config, SELF_PORT);
        assert_eq!(catalog.services[0].key, "default");

        std::fs::write(
            &config.local_path,
            r#"{ "services": [ { "key": "local", "name": "Local", "port": "self" } ] }"#,
        )
        .unwrap();

        let catalog = Catalog::load(&config, SELF_PORT);
        assert_eq!(catalog.services.len(), 1);
        assert_eq!(catalog.services[0].key, "local");
        assert_eq!(catalog.services[0].port, SELF_PORT);
    }

    #[test]
    fn test_broken_catalog_falls_back_to_empty() {
        let dir = TempDir::new().unwrap();
        let config = CatalogConfig {
            path: dir.path().join("services.json"),
            local_path: dir.path().join("services.local.json"),
        };

        assert_eq!(Catalog::load(&config, SELF_PORT), Catalog::default());

        std::fs::write(&config.path, "{ not json").unwrap();
        assert_eq!(Catalog::load(&config, SELF_PORT), Catalog::default());
    }
}
