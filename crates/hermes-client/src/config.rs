//! Client configuration.
//!
//! [`ClientConfig`] is a plain struct assembled before connecting. It can be
//! built in code with the `with_*` setters, loaded from a TOML or JSON file,
//! and adjusted through `HERMES_*` environment variables.

use std::path::Path;
use std::time::Duration;

use http::Uri;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{WsError, WsResult};
use crate::transport::TlsConnectorSupplier;

/// Default maximum frame size (1 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Default HTTP version used in the upgrade request line.
pub const DEFAULT_HTTP_VERSION: &str = "HTTP/1.1";

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("hermes/", env!("CARGO_PKG_VERSION"));

/// Configuration for a WebSocket client connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target URL (`ws://` or `wss://`).
    pub url: String,
    /// Maximum frame size in bytes, for both outbound frames and inbound reads.
    pub max_frame_size: usize,
    /// HTTP version string used in the upgrade request.
    pub http_version: String,
    /// Whether inbound pings are answered automatically.
    pub auto_respond_to_ping: bool,
    /// Interval between keep-alive pings; disabled when `None`.
    #[serde(with = "humantime_serde")]
    pub ping_interval: Option<Duration>,
    /// Extra request headers, sent in insertion order.
    pub headers: IndexMap<String, String>,
    /// Whether to disable Nagle's algorithm on the TCP socket.
    pub tcp_nodelay: bool,
    /// Supplies the TLS connector for `wss` URLs.
    #[serde(skip)]
    pub tls: TlsConnectorSupplier,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut headers = IndexMap::new();
        headers.insert("User-Agent".to_string(), DEFAULT_USER_AGENT.to_string());
        Self {
            url: String::new(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            http_version: DEFAULT_HTTP_VERSION.to_string(),
            auto_respond_to_ping: true,
            ping_interval: None,
            headers,
            tcp_nodelay: true,
            tls: TlsConnectorSupplier::default(),
        }
    }
}

impl ClientConfig {
    /// Create a default configuration for `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self::default().with_url(url)
    }

    /// Set the target URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the maximum frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set the HTTP version string.
    pub fn with_http_version(mut self, version: impl Into<String>) -> Self {
        self.http_version = version.into();
        self
    }

    /// Set whether pings are answered automatically.
    pub fn with_auto_respond_to_ping(mut self, enabled: bool) -> Self {
        self.auto_respond_to_ping = enabled;
        self
    }

    /// Enable keep-alive pings at `interval`.
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = Some(interval);
        self
    }

    /// Disable keep-alive pings.
    pub fn without_ping(mut self) -> Self {
        self.ping_interval = None;
        self
    }

    /// Add a request header. An existing header with the same name is replaced.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    /// Set whether `TCP_NODELAY` is enabled.
    pub fn with_tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Set the TLS connector supplier.
    pub fn with_tls(mut self, tls: TlsConnectorSupplier) -> Self {
        self.tls = tls;
        self
    }

    /// Parse the target URL.
    pub fn target(&self) -> WsResult<Target> {
        Target::parse(&self.url)
    }

    /// Load configuration from a `.toml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> WsResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            WsError::invalid_config(format!("failed to read {}: {e}", path.display()))
        })?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => toml::from_str(&content)
                .map_err(|e| WsError::invalid_config(format!("invalid TOML: {e}"))),
            "json" => serde_json::from_str(&content)
                .map_err(|e| WsError::invalid_config(format!("invalid JSON: {e}"))),
            _ => Err(WsError::invalid_config(format!(
                "unsupported config format: {extension}"
            ))),
        }
    }

    /// Apply `HERMES_*` environment variable overrides.
    ///
    /// - `HERMES_URL`
    /// - `HERMES_MAX_FRAME_SIZE`
    /// - `HERMES_HTTP_VERSION`
    /// - `HERMES_AUTO_RESPOND_TO_PING` (`true`/`false`)
    /// - `HERMES_PING_INTERVAL_SECS` (`0` disables pings)
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Unparsable values are ignored.
    #[must_use]
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("HERMES_URL") {
            self.url = url;
        }

        if let Some(size) = lookup("HERMES_MAX_FRAME_SIZE").and_then(|v| v.parse().ok()) {
            self.max_frame_size = size;
        }

        if let Some(version) = lookup("HERMES_HTTP_VERSION") {
            self.http_version = version;
        }

        if let Some(enabled) = lookup("HERMES_AUTO_RESPOND_TO_PING").and_then(|v| v.parse().ok())
        {
            self.auto_respond_to_ping = enabled;
        }

        if let Some(secs) = lookup("HERMES_PING_INTERVAL_SECS").and_then(|v| v.parse::<u64>().ok())
        {
            self.ping_interval = (secs > 0).then(|| Duration::from_secs(secs));
        }

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> WsResult<()> {
        if self.url.is_empty() {
            return Err(WsError::invalid_config("url is required"));
        }
        self.target()?;

        if self.max_frame_size == 0 {
            return Err(WsError::invalid_config("max_frame_size must be positive"));
        }

        if self.http_version.trim().is_empty() {
            return Err(WsError::invalid_config("http_version must not be empty"));
        }

        if self.ping_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(WsError::invalid_config("ping_interval must be positive"));
        }

        Ok(())
    }
}

/// Connection target derived from the configured URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Whether the connection uses TLS (`wss`).
    pub secure: bool,
    /// Host name or address as written in the URL.
    pub host: String,
    /// Port, defaulting to 80 for `ws` and 443 for `wss`.
    pub port: u16,
    /// Request target: path plus query, `/` when empty.
    pub path: String,
}

impl Target {
    /// Parse a `ws://` or `wss://` URL.
    pub fn parse(url: &str) -> WsResult<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| WsError::invalid_config(format!("invalid url {url:?}: {e}")))?;

        let secure = match uri.scheme_str().map(str::to_ascii_lowercase).as_deref() {
            Some("ws") => false,
            Some("wss") => true,
            Some(other) => return Err(WsError::UnsupportedScheme(other.to_string())),
            None => {
                return Err(WsError::invalid_config(format!(
                    "url {url:?} has no ws:// or wss:// scheme"
                )))
            }
        };

        let host = uri
            .host()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| WsError::invalid_config(format!("url {url:?} has no host")))?
            .to_string();

        let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });

        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/")
            .to_string();

        Ok(Self {
            secure,
            host,
            port,
            path,
        })
    }

    /// Value for the `Host` header.
    pub fn host_header(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Host name suitable for socket connection and TLS server name.
    pub fn connect_host(&self) -> &str {
        self.host.trim_start_matches('[').trim_end_matches(']')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.max_frame_size, 1024 * 1024);
        assert_eq!(config.http_version, "HTTP/1.1");
        assert!(config.auto_respond_to_ping);
        assert_eq!(config.ping_interval, None);
        assert_eq!(
            config.headers.get("User-Agent").map(String::as_str),
            Some(DEFAULT_USER_AGENT)
        );
    }

    #[test]
    fn test_config_setters() {
        let config = ClientConfig::new("ws://example.com/feed")
            .with_max_frame_size(512)
            .with_http_version("HTTP/1.0")
            .with_auto_respond_to_ping(false)
            .with_ping_interval(Duration::from_secs(10))
            .with_tcp_nodelay(false);

        assert_eq!(config.url, "ws://example.com/feed");
        assert_eq!(config.max_frame_size, 512);
        assert_eq!(config.http_version, "HTTP/1.0");
        assert!(!config.auto_respond_to_ping);
        assert_eq!(config.ping_interval, Some(Duration::from_secs(10)));
        assert!(!config.tcp_nodelay);
        assert_eq!(config.without_ping().ping_interval, None);
    }

    #[test]
    fn test_with_header_replaces_case_insensitively() {
        let config = ClientConfig::default()
            .with_header("user-agent", "custom/2.0")
            .with_header("Authorization", "Bearer t");

        assert_eq!(config.headers.len(), 2);
        assert_eq!(config.headers.get("user-agent").map(String::as_str), Some("custom/2.0"));
        assert!(config.headers.get("User-Agent").is_none());
    }

    #[test]
    fn test_target_defaults() {
        let target = Target::parse("ws://example.com").unwrap();
        assert!(!target.secure);
        assert_eq!(target.port, 80);
        assert_eq!(target.path, "/");
        assert_eq!(target.host_header(), "example.com:80");

        let target = Target::parse("wss://example.com/chat?room=1").unwrap();
        assert!(target.secure);
        assert_eq!(target.port, 443);
        assert_eq!(target.path, "/chat?room=1");
    }

    #[test]
    fn test_target_explicit_port() {
        let target = Target::parse("WS://localhost:9001/socket").unwrap();
        assert_eq!(target.port, 9001);
        assert_eq!(target.host, "localhost");
        assert_eq!(target.host_header(), "localhost:9001");
    }

    #[test]
    fn test_target_ipv6_connect_host() {
        let target = Target::parse("ws://[::1]:8080/").unwrap();
        assert_eq!(target.connect_host(), "::1");
    }

    #[test]
    fn test_target_rejects_other_schemes() {
        assert!(matches!(
            Target::parse("http://example.com"),
            Err(WsError::UnsupportedScheme(scheme)) if scheme == "http"
        ));
        assert!(matches!(
            Target::parse("/just/a/path"),
            Err(WsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::default().validate().is_err());
        assert!(ClientConfig::new("ws://localhost").validate().is_ok());
        assert!(ClientConfig::new("ws://localhost")
            .with_max_frame_size(0)
            .validate()
            .is_err());
        assert!(ClientConfig::new("ftp://localhost").validate().is_err());
        assert!(ClientConfig::new("ws://localhost")
            .with_ping_interval(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HERMES_URL", "wss://override.example/ws"),
            ("HERMES_MAX_FRAME_SIZE", "4096"),
            ("HERMES_AUTO_RESPOND_TO_PING", "false"),
            ("HERMES_PING_INTERVAL_SECS", "15"),
        ]
        .into_iter()
        .collect();

        let config = ClientConfig::new("ws://localhost")
            .with_overrides(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(config.url, "wss://override.example/ws");
        assert_eq!(config.max_frame_size, 4096);
        assert!(!config.auto_respond_to_ping);
        assert_eq!(config.ping_interval, Some(Duration::from_secs(15)));
        assert_eq!(config.http_version, "HTTP/1.1");
    }

    #[test]
    fn test_overrides_ignore_garbage_and_zero_disables_ping() {
        let config = ClientConfig::new("ws://localhost")
            .with_ping_interval(Duration::from_secs(5))
            .with_overrides(|key| match key {
                "HERMES_MAX_FRAME_SIZE" => Some("lots".to_string()),
                "HERMES_PING_INTERVAL_SECS" => Some("0".to_string()),
                _ => None,
            });

        assert_eq!(config.max_frame_size, DEFAULT_MAX_FRAME_SIZE);
        assert_eq!(config.ping_interval, None);
    }

    #[test]
    fn test_deserialize_toml() {
        let config: ClientConfig = toml::from_str(
            r#"
            url = "ws://localhost:8080/"
            max_frame_size = 2048
            ping_interval = "30s"

            [headers]
            Authorization = "Bearer abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.url, "ws://localhost:8080/");
        assert_eq!(config.max_frame_size, 2048);
        assert_eq!(config.ping_interval, Some(Duration::from_secs(30)));
        assert_eq!(config.headers.get("Authorization").map(String::as_str), Some("Bearer abc"));
        assert!(config.auto_respond_to_ping);
    }

    #[test]
    fn test_from_file_rejects_unknown_extension() {
        let err = ClientConfig::from_file("client.yaml").unwrap_err();
        assert!(matches!(err, WsError::InvalidConfig(_)));
    }
}
