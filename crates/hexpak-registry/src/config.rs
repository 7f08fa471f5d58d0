//! Per-call client configuration.

use std::collections::BTreeMap;

use crate::httpc::{Headers, HttpClient};

/// Configuration threaded through every registry and API operation.
///
/// There is no process-wide state; each client holds its own copy and all
/// knobs flow through it.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP realization used for every request.
    pub client: HttpClient,

    /// Base URL for the signed index and tarball downloads.
    pub repo_uri: String,

    /// Base URL for the REST API.
    pub api_uri: String,

    /// SPKI PEM public key used to verify signed index payloads.
    pub repo_public_key: Option<String>,

    /// Gate for the signature check. Disable for development and tests
    /// only.
    pub verify: bool,

    /// Opaque validator echoed as `if-none-match` when present.
    pub etag: Option<String>,

    /// Opaque key sent as `authorization` when present.
    pub api_key: Option<String>,

    /// Extra headers merged into every outgoing request, last.
    pub http_headers: BTreeMap<String, String>,
}

fn default_repo_uri() -> String {
    "https://repo.hex.pm".to_string()
}

fn default_api_uri() -> String {
    "https://hex.pm/api".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client: HttpClient::default(),
            repo_uri: default_repo_uri(),
            api_uri: default_api_uri(),
            repo_public_key: None,
            verify: true,
            etag: None,
            api_key: None,
            http_headers: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `HEXPAK_REPO_URI` | Repository base URL |
    /// | `HEXPAK_API_URI` | REST API base URL |
    /// | `HEXPAK_API_KEY` | API key |
    pub fn from_env() -> Self {
        Self {
            repo_uri: std::env::var("HEXPAK_REPO_URI").unwrap_or_else(|_| default_repo_uri()),
            api_uri: std::env::var("HEXPAK_API_URI").unwrap_or_else(|_| default_api_uri()),
            api_key: std::env::var("HEXPAK_API_KEY").ok().filter(|k| !k.is_empty()),
            ..Self::default()
        }
    }

    /// Set the HTTP realization.
    pub fn with_client(mut self, client: HttpClient) -> Self {
        self.client = client;
        self
    }

    /// Set the repository base URL.
    pub fn with_repo_uri(mut self, uri: impl Into<String>) -> Self {
        self.repo_uri = uri.into();
        self
    }

    /// Set the API base URL.
    pub fn with_api_uri(mut self, uri: impl Into<String>) -> Self {
        self.api_uri = uri.into();
        self
    }

    /// Set the repository public key (SPKI PEM).
    pub fn with_repo_public_key(mut self, pem: impl Into<String>) -> Self {
        self.repo_public_key = Some(pem.into());
        self
    }

    /// Enable or disable signature verification.
    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Set the ETag for conditional requests.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Add a header sent with every request.
    pub fn with_http_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.http_headers.insert(name.into(), value.into());
        self
    }

    /// Headers every request starts from: auth and conditional-request
    /// headers from the config, then user headers merged last.
    pub(crate) fn request_headers(&self) -> Headers {
        let mut headers = Headers::new();
        if let Some(key) = &self.api_key {
            headers.insert("authorization".to_string(), key.clone());
        }
        if let Some(etag) = &self.etag {
            headers.insert("if-none-match".to_string(), etag.clone());
        }
        for (name, value) in &self.http_headers {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn builder_chain() {
        let config = Config::default()
            .with_repo_uri("https://repo.example")
            .with_api_uri("https://api.example")
            .with_api_key("secret")
            .with_etag("W/\"tag\"")
            .with_verify(false)
            .with_http_header("x-custom", "1");

        assert_eq!(config.repo_uri, "https://repo.example");
        assert_eq!(config.api_uri, "https://api.example");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.etag.as_deref(), Some("W/\"tag\""));
        assert!(!config.verify);
        assert_eq!(config.http_headers.get("x-custom").map(String::as_str), Some("1"));
    }

    #[test]
    fn request_headers_reflect_config() {
        let config = Config::default()
            .with_api_key("secret")
            .with_etag("dummy")
            .with_http_header("x-custom", "1");
        let headers = config.request_headers();

        assert_eq!(headers.get("authorization").map(String::as_str), Some("secret"));
        assert_eq!(headers.get("if-none-match").map(String::as_str), Some("dummy"));
        assert_eq!(headers.get("x-custom").map(String::as_str), Some("1"));
    }

    #[test]
    fn absent_options_add_no_headers() {
        let headers = Config::default().request_headers();
        assert!(headers.is_empty());
    }

    #[test]
    fn user_headers_merge_last() {
        let config = Config::default()
            .with_api_key("from-config")
            .with_http_header("authorization", "user-override");
        let headers = config.request_headers();
        assert_eq!(
            headers.get("authorization").map(String::as_str),
            Some("user-override")
        );
    }

    #[test]
    #[serial]
    fn from_env_defaults() {
        std::env::remove_var("HEXPAK_REPO_URI");
        std::env::remove_var("HEXPAK_API_URI");
        std::env::remove_var("HEXPAK_API_KEY");

        let config = Config::from_env();
        assert_eq!(config.repo_uri, "https://repo.hex.pm");
        assert_eq!(config.api_uri, "https://hex.pm/api");
        assert!(config.api_key.is_none());
        assert!(config.verify);
    }

    #[test]
    #[serial]
    fn from_env_overrides() {
        std::env::set_var("HEXPAK_REPO_URI", "https://repo.example");
        std::env::set_var("HEXPAK_API_KEY", "env-key");

        let config = Config::from_env();
        assert_eq!(config.repo_uri, "https://repo.example");
        assert_eq!(config.api_key.as_deref(), Some("env-key"));

        std::env::remove_var("HEXPAK_REPO_URI");
        std::env::remove_var("HEXPAK_API_KEY");
    }
}
