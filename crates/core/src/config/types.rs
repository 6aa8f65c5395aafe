use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub media_service: MediaServiceConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Media service (Bazarr) connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaServiceConfig {
    /// Base URL (e.g., "http://localhost:6767")
    pub url: String,
    /// Value sent in the X-API-KEY header
    pub api_key: String,
    /// Optional HTTP basic auth, for services behind a reverse proxy
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Subtitle catalog (SubSource) connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_url")]
    pub api_url: String,
    /// Clearance cookie value, sent as `cf_clearance` when set
    #[serde(default)]
    pub cf_clearance: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
    /// Maximum results per title search (default: 15)
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_url: default_catalog_url(),
            cf_clearance: None,
            timeout_secs: default_timeout(),
            search_limit: default_search_limit(),
        }
    }
}

/// Retrieval pipeline settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Where archives are downloaded and subtitles extracted
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// Pause after every catalog call, in milliseconds
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Pause between languages of one item, in milliseconds
    #[serde(default = "default_language_delay_ms")]
    pub language_delay_ms: u64,
    /// Pause between media items, in milliseconds
    #[serde(default = "default_item_delay_ms")]
    pub item_delay_ms: u64,
    /// Accept a bare `E07` in release names when no season is present
    #[serde(default = "default_true")]
    pub episode_only_fallback: bool,
}

impl RetrievalConfig {
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn language_delay(&self) -> Duration {
        Duration::from_millis(self.language_delay_ms)
    }

    pub fn item_delay(&self) -> Duration {
        Duration::from_millis(self.item_delay_ms)
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            request_delay_ms: default_request_delay_ms(),
            language_delay_ms: default_language_delay_ms(),
            item_delay_ms: default_item_delay_ms(),
            episode_only_fallback: true,
        }
    }
}

/// Search history file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

/// What a run processes
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    #[serde(default = "default_true")]
    pub movies_enabled: bool,
    #[serde(default = "default_true")]
    pub episodes_enabled: bool,
    /// Trigger sync and text cleanup after uploads, when the service has them on
    #[serde(default = "default_true")]
    pub post_process: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            movies_enabled: true,
            episodes_enabled: true,
            post_process: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_timeout() -> u32 {
    30
}

fn default_catalog_url() -> String {
    "https://api.subsource.net/v1".to_string()
}

fn default_search_limit() -> u32 {
    15
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloaded_subtitles")
}

fn default_request_delay_ms() -> u64 {
    2000
}

fn default_language_delay_ms() -> u64 {
    500
}

fn default_item_delay_ms() -> u64 {
    1000
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("ledger.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Sanitized config for logging (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub media_service: SanitizedMediaServiceConfig,
    pub catalog: SanitizedCatalogConfig,
    pub retrieval: RetrievalConfig,
    pub ledger: LedgerConfig,
    pub run: RunConfig,
    pub logging: LoggingConfig,
}

/// Sanitized media service config (API key and password hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedMediaServiceConfig {
    pub url: String,
    pub api_key_configured: bool,
    pub basic_auth_configured: bool,
    pub timeout_secs: u32,
}

/// Sanitized catalog config (clearance cookie hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCatalogConfig {
    pub api_url: String,
    pub cf_clearance_configured: bool,
    pub timeout_secs: u32,
    pub search_limit: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            media_service: SanitizedMediaServiceConfig {
                url: config.media_service.url.clone(),
                api_key_configured: !config.media_service.api_key.is_empty(),
                basic_auth_configured: config
                    .media_service
                    .username
                    .as_deref()
                    .is_some_and(|u| !u.is_empty()),
                timeout_secs: config.media_service.timeout_secs,
            },
            catalog: SanitizedCatalogConfig {
                api_url: config.catalog.api_url.clone(),
                cf_clearance_configured: config
                    .catalog
                    .cf_clearance
                    .as_deref()
                    .is_some_and(|c| !c.is_empty()),
                timeout_secs: config.catalog.timeout_secs,
                search_limit: config.catalog.search_limit,
            },
            retrieval: config.retrieval.clone(),
            ledger: config.ledger.clone(),
            run: config.run.clone(),
            logging: config.logging.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[media_service]
url = "http://localhost:6767"
api_key = "secret"
"#;

    #[test]
    fn test_deserialize_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.media_service.url, "http://localhost:6767");
        assert_eq!(config.media_service.timeout_secs, 30);
        assert!(config.media_service.username.is_none());
        assert_eq!(config.catalog.api_url, "https://api.subsource.net/v1");
        assert_eq!(config.catalog.search_limit, 15);
        assert_eq!(config.retrieval.request_delay(), Duration::from_secs(2));
        assert_eq!(config.retrieval.language_delay(), Duration::from_millis(500));
        assert_eq!(config.retrieval.item_delay(), Duration::from_secs(1));
        assert!(config.retrieval.episode_only_fallback);
        assert_eq!(config.ledger.path.to_str().unwrap(), "ledger.json");
        assert!(config.run.movies_enabled);
        assert!(config.run.episodes_enabled);
        assert!(config.run.post_process);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_deserialize_missing_media_service_fails() {
        let toml = r#"
[catalog]
api_url = "https://example.com"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[media_service]
url = "https://bazarr.example.com"
api_key = "key"
username = "user"
password = "pass"
timeout_secs = 10

[catalog]
cf_clearance = "cookie"
search_limit = 5

[retrieval]
download_dir = "/tmp/subs"
request_delay_ms = 0
episode_only_fallback = false

[ledger]
path = "/var/lib/subscout/ledger.json"

[run]
episodes_enabled = false
post_process = false

[logging]
level = "debug"
json = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.media_service.username.as_deref(), Some("user"));
        assert_eq!(config.catalog.cf_clearance.as_deref(), Some("cookie"));
        assert_eq!(config.catalog.search_limit, 5);
        assert_eq!(config.retrieval.download_dir.to_str().unwrap(), "/tmp/subs");
        assert_eq!(config.retrieval.request_delay(), Duration::ZERO);
        assert_eq!(config.retrieval.item_delay_ms, 1000);
        assert!(!config.retrieval.episode_only_fallback);
        assert!(config.run.movies_enabled);
        assert!(!config.run.episodes_enabled);
        assert!(config.logging.json);
    }

    #[test]
    fn test_sanitized_config_hides_secrets() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.catalog.cf_clearance = Some("cookie".to_string());

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.media_service.api_key_configured);
        assert!(!sanitized.media_service.basic_auth_configured);
        assert!(sanitized.catalog.cf_clearance_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("secret"));
        assert!(!json.contains("\"cookie\""));
    }
}
