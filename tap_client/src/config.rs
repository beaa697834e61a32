//! Client configuration.
//!
//! Configuration can be read from a TOML file or from environment variables.
//!
//! ```toml
//! [server]
//! url = "https://gea.esac.esa.int/tap-server/tap"
//! tap_plus = true
//!
//! [server.contexts]
//! data = "data"
//! datalink = "datalink"
//!
//! [http]
//! timeout_secs = 120
//!
//! [jobs]
//! poll_interval_ms = 1000
//! output_dir = "downloads"
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::conn::handler::{DEFAULT_MAX_REDIRECTS, DEFAULT_POLL_INTERVAL};
use crate::conn::reqwest_transport::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::conn::{ConnSettings, Endpoints, ServiceContexts};
use crate::error::{ErrorContext, TapError, TapResult};

/// Row limit applied to synchronous queries without a `TOP` clause.
pub const DEFAULT_SYNC_ROW_LIMIT: u64 = 2000;

/// Complete client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TapConfig {
    pub server: ServerSettings,
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub jobs: JobSettings,
}

/// Where the TAP service lives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Full TAP URL. Takes precedence over `host`.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_ssl_port")]
    pub ssl_port: u16,
    #[serde(default)]
    pub https: bool,
    /// Fill unset user space contexts with the TAP+ defaults.
    #[serde(default)]
    pub tap_plus: bool,
    #[serde(default)]
    pub contexts: ServiceContexts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_sync_row_limit")]
    pub sync_row_limit: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Directory for result files given by relative name.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_port() -> u16 {
    80
}

fn default_ssl_port() -> u16 {
    443
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_sync_row_limit() -> u64 {
    DEFAULT_SYNC_ROW_LIMIT
}

fn default_max_redirects() -> usize {
    DEFAULT_MAX_REDIRECTS
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            sync_row_limit: default_sync_row_limit(),
            max_redirects: default_max_redirects(),
            output_dir: None,
        }
    }
}

impl ServerSettings {
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            host: None,
            port: default_port(),
            ssl_port: default_ssl_port(),
            https: false,
            tap_plus: false,
            contexts: ServiceContexts::default(),
        }
    }
}

impl TapConfig {
    /// Configuration with default settings for a TAP URL.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            server: ServerSettings::for_url(url),
            http: HttpSettings::default(),
            jobs: JobSettings::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TapResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content).map_err(|e| {
            e.with_context(ErrorContext::new("load_config").with_details(path.display().to_string()))
        })
    }

    /// Parse configuration from TOML text. Errors name the offending key.
    pub fn from_toml_str(content: &str) -> TapResult<Self> {
        let deserializer = toml::Deserializer::new(content);
        serde_path_to_error::deserialize(deserializer).map_err(|e| {
            TapError::configuration(format!(
                "Failed to parse config at '{}': {}",
                e.path(),
                e.inner()
            ))
        })
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `tap.toml` in:
    /// 1. Current directory
    /// 2. `tap_client/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> TapResult<Self> {
        let search_paths = [
            PathBuf::from("tap.toml"),
            PathBuf::from("tap_client/tap.toml"),
            PathBuf::from("../tap.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(TapError::configuration(
            "No tap.toml found in standard locations",
        ))
    }

    /// Load configuration from environment variables.
    ///
    /// `TAP_URL` is required. `TAP_DATA_CONTEXT`, `TAP_DATALINK_CONTEXT`,
    /// `TAP_TIMEOUT_SECS` and `TAP_POLL_INTERVAL_MS` are optional.
    pub fn from_env() -> TapResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> TapResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("TAP_URL").ok_or_else(|| {
            TapError::configuration("TAP_URL environment variable not set")
        })?;
        let mut config = Self::for_url(url);
        config.server.contexts.data = lookup("TAP_DATA_CONTEXT");
        config.server.contexts.datalink = lookup("TAP_DATALINK_CONTEXT");

        if let Some(timeout) = lookup("TAP_TIMEOUT_SECS") {
            config.http.timeout_secs = timeout.trim().parse().map_err(|_| {
                TapError::configuration("TAP_TIMEOUT_SECS must be a number of seconds")
            })?;
        }
        if let Some(interval) = lookup("TAP_POLL_INTERVAL_MS") {
            config.jobs.poll_interval_ms = interval.trim().parse().map_err(|_| {
                TapError::configuration("TAP_POLL_INTERVAL_MS must be a number of milliseconds")
            })?;
        }
        Ok(config)
    }

    /// Service contexts with TAP+ defaults applied when enabled.
    pub fn contexts(&self) -> ServiceContexts {
        let mut contexts = self.server.contexts.clone();
        if self.server.tap_plus {
            let defaults = ServiceContexts::tap_plus_defaults();
            contexts.upload = contexts.upload.or(defaults.upload);
            contexts.table_edit = contexts.table_edit.or(defaults.table_edit);
            contexts.share = contexts.share.or(defaults.share);
            contexts.users = contexts.users.or(defaults.users);
        }
        contexts
    }

    /// Resolve the service endpoints.
    pub fn endpoints(&self) -> TapResult<Endpoints> {
        let contexts = self.contexts();
        if let Some(url) = &self.server.url {
            return Endpoints::from_url(url, &contexts);
        }
        let host = self.server.host.as_deref().ok_or_else(|| {
            TapError::configuration("Either 'server.url' or 'server.host' must be set")
        })?;
        Ok(Endpoints::from_host(
            self.server.https,
            host,
            self.server.port,
            self.server.ssl_port,
            &contexts,
        ))
    }

    pub fn conn_settings(&self) -> ConnSettings {
        ConnSettings {
            poll_interval: Duration::from_millis(self.jobs.poll_interval_ms),
            max_redirects: self.jobs.max_redirects,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}

/// User name and password for TAP+ login.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// Read credentials from a file: user name on the first line, password on
    /// the second.
    pub fn from_file<P: AsRef<Path>>(path: P) -> TapResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        let mut lines = content.lines().map(str::trim);
        let user = lines
            .next()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| TapError::invalid_argument("Invalid user name"))?;
        let password = lines
            .next()
            .filter(|p| !p.is_empty())
            .ok_or_else(|| TapError::invalid_argument("Invalid password"))?;
        Ok(Self::new(user, password))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[server]
url = "http://test:1111/tap"
"#;
        let config = TapConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.server.url.as_deref(), Some("http://test:1111/tap"));
        assert_eq!(config.http, HttpSettings::default());
        assert_eq!(config.jobs.sync_row_limit, 2000);
        assert_eq!(config.jobs.max_redirects, 20);
        assert_eq!(
            config.conn_settings().poll_interval,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[server]
url = "https://gea.esac.esa.int/tap-server/tap"
tap_plus = true

[server.contexts]
data = "data"
share = "myshare"

[http]
timeout_secs = 120
user_agent = "archive-bot"

[jobs]
poll_interval_ms = 50
sync_row_limit = 100
output_dir = "downloads"
"#;
        let config = TapConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(120));
        assert_eq!(config.http.user_agent, "archive-bot");
        assert_eq!(config.jobs.output_dir, Some(PathBuf::from("downloads")));

        let contexts = config.contexts();
        assert_eq!(contexts.upload.as_deref(), Some("Upload"));
        assert_eq!(contexts.share.as_deref(), Some("myshare"));

        let endpoints = config.endpoints().unwrap();
        assert_eq!(
            endpoints.upload_url(),
            "https://gea.esac.esa.int/tap-server/Upload"
        );
        assert_eq!(
            endpoints.data_url(None).unwrap(),
            "https://gea.esac.esa.int/tap-server/data"
        );
    }

    #[test]
    fn test_host_config() {
        let toml = r#"
[server]
host = "localhost"
port = 8080
ssl_port = 8443

[server.contexts]
server = "tap-server"
tap = "tap"
"#;
        let endpoints = TapConfig::from_toml_str(toml).unwrap().endpoints().unwrap();
        assert_eq!(
            endpoints.tap_url("sync"),
            "http://localhost:8080/tap-server/tap/sync"
        );
        assert_eq!(
            endpoints.secure_url("login"),
            "https://localhost:8443/tap-server/login"
        );
    }

    #[test]
    fn test_missing_server_location() {
        let config = TapConfig::from_toml_str("[server]\nport = 80\n").unwrap();
        assert!(matches!(
            config.endpoints(),
            Err(TapError::Configuration { .. })
        ));
    }

    #[test]
    fn test_parse_error_reports_key_path() {
        let toml = r#"
[server]
url = "http://test/tap"

[jobs]
poll_interval_ms = "soon"
"#;
        let err = TapConfig::from_toml_str(toml).unwrap_err();
        assert!(
            err.to_string().contains("jobs.poll_interval_ms"),
            "unexpected message: {}",
            err
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[server]\nurl = \"http://test:1111/tap\"\n").unwrap();
        let config = TapConfig::from_file(file.path()).unwrap();
        assert_eq!(config.server.url.as_deref(), Some("http://test:1111/tap"));

        assert!(TapConfig::from_file("/nonexistent/tap.toml").is_err());
    }

    #[test]
    fn test_from_env_lookup() {
        let vars: HashMap<&str, &str> = [
            ("TAP_URL", "http://test:1111/tap"),
            ("TAP_DATA_CONTEXT", "data"),
            ("TAP_TIMEOUT_SECS", "5"),
        ]
        .into_iter()
        .collect();
        let config = TapConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.server.contexts.data.as_deref(), Some("data"));
        assert_eq!(config.server.contexts.datalink, None);
        assert_eq!(config.http.timeout_secs, 5);

        let err = TapConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("TAP_URL"));

        let err = TapConfig::from_lookup(|k| match k {
            "TAP_URL" => Some("http://test/tap".to_string()),
            "TAP_POLL_INTERVAL_MS" => Some("fast".to_string()),
            _ => None,
        })
        .unwrap_err();
        assert!(err.to_string().contains("TAP_POLL_INTERVAL_MS"));
    }

    #[test]
    fn test_credentials_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "  joe \n s3cret\n").unwrap();
        let creds = Credentials::from_file(file.path()).unwrap();
        assert_eq!(creds.user, "joe");
        assert_eq!(creds.password, "s3cret");
        assert!(!format!("{:?}", creds).contains("s3cret"));

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "joe\n").unwrap();
        let err = Credentials::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid password"));
    }
}
