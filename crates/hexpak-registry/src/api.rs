//! REST API client.
//!
//! Thin wrapper over the HTTP seam: URL assembly with percent-encoded
//! path segments and query pairs, the standard header set, and typed
//! helpers mirroring the registry's REST surface. Statuses are passed
//! through untouched; a 404 is a response, not an error.

use serde::Serialize;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::httpc::{Headers, Method};

/// A decoded REST response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Headers,
    /// JSON body; an empty body decodes to `Null`, a non-JSON body to a
    /// string.
    pub body: serde_json::Value,
}

/// Permission granted to an API key.
#[derive(Debug, Clone, Serialize)]
pub struct KeyPermission {
    /// Permission domain, e.g. `api` or `repository`.
    pub domain: String,

    /// Resource within the domain, e.g. `read`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

#[derive(Debug, Serialize)]
struct KeyParams<'a> {
    name: &'a str,
    permissions: &'a [KeyPermission],
}

#[derive(Debug, Serialize)]
struct RetireParams<'a> {
    reason: &'a str,
    message: &'a str,
}

enum RequestBody {
    None,
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

/// Client for the registry REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: Config,
}

impl ApiClient {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // -- verbs ------------------------------------------------------------

    /// GET a path given as segments, e.g. `&["packages", name]`.
    pub async fn get(&self, segments: &[&str]) -> Result<ApiResponse> {
        self.request(Method::GET, segments, &[], RequestBody::None)
            .await
    }

    /// POST a JSON body.
    pub async fn post(&self, segments: &[&str], body: serde_json::Value) -> Result<ApiResponse> {
        self.request(Method::POST, segments, &[], RequestBody::Json(body))
            .await
    }

    /// PUT a JSON body.
    pub async fn put(&self, segments: &[&str], body: serde_json::Value) -> Result<ApiResponse> {
        self.request(Method::PUT, segments, &[], RequestBody::Json(body))
            .await
    }

    /// DELETE a path.
    pub async fn delete(&self, segments: &[&str]) -> Result<ApiResponse> {
        self.request(Method::DELETE, segments, &[], RequestBody::None)
            .await
    }

    // -- packages ---------------------------------------------------------

    pub async fn package(&self, name: &str) -> Result<ApiResponse> {
        self.get(&["packages", name]).await
    }

    pub async fn search(&self, query: &str, page: u32) -> Result<ApiResponse> {
        let page = page.to_string();
        self.request(
            Method::GET,
            &["packages"],
            &[("search", query), ("page", page.as_str())],
            RequestBody::None,
        )
        .await
    }

    // -- releases ---------------------------------------------------------

    pub async fn release(&self, name: &str, version: &str) -> Result<ApiResponse> {
        self.get(&["packages", name, "releases", version]).await
    }

    /// Publish a package tarball produced by the tarball engine.
    pub async fn publish(&self, tarball: Vec<u8>) -> Result<ApiResponse> {
        self.request(
            Method::POST,
            &["publish"],
            &[],
            RequestBody::Binary(tarball),
        )
        .await
    }

    pub async fn retire(
        &self,
        name: &str,
        version: &str,
        reason: &str,
        message: &str,
    ) -> Result<ApiResponse> {
        let params = serde_json::to_value(RetireParams { reason, message })
            .map_err(|e| Error::InvalidResponse {
                message: e.to_string(),
            })?;
        self.post(&["packages", name, "releases", version, "retire"], params)
            .await
    }

    pub async fn unretire(&self, name: &str, version: &str) -> Result<ApiResponse> {
        self.delete(&["packages", name, "releases", version, "retire"])
            .await
    }

    // -- users ------------------------------------------------------------

    pub async fn user(&self, username: &str) -> Result<ApiResponse> {
        self.get(&["users", username]).await
    }

    pub async fn me(&self) -> Result<ApiResponse> {
        self.get(&["users", "me"]).await
    }

    // -- keys -------------------------------------------------------------

    pub async fn keys(&self) -> Result<ApiResponse> {
        self.get(&["keys"]).await
    }

    pub async fn key(&self, name: &str) -> Result<ApiResponse> {
        self.get(&["keys", name]).await
    }

    pub async fn add_key(&self, name: &str, permissions: &[KeyPermission]) -> Result<ApiResponse> {
        let params =
            serde_json::to_value(KeyParams { name, permissions }).map_err(|e| {
                Error::InvalidResponse {
                    message: e.to_string(),
                }
            })?;
        self.post(&["keys"], params).await
    }

    pub async fn delete_key(&self, name: &str) -> Result<ApiResponse> {
        self.delete(&["keys", name]).await
    }

    // -- owners -----------------------------------------------------------

    pub async fn owners(&self, package: &str) -> Result<ApiResponse> {
        self.get(&["packages", package, "owners"]).await
    }

    pub async fn add_owner(&self, package: &str, email: &str) -> Result<ApiResponse> {
        self.put(
            &["packages", package, "owners", email],
            serde_json::Value::Null,
        )
        .await
    }

    pub async fn delete_owner(&self, package: &str, email: &str) -> Result<ApiResponse> {
        self.delete(&["packages", package, "owners", email]).await
    }

    // -- internals --------------------------------------------------------

    async fn request(
        &self,
        method: Method,
        segments: &[&str],
        query: &[(&str, &str)],
        body: RequestBody,
    ) -> Result<ApiResponse> {
        let uri = self.api_url(segments, query)?;
        debug!(method = %method, uri = %uri, "api request");

        let mut headers = Headers::new();
        headers.insert("accept".to_string(), "application/json".to_string());

        let body = match body {
            RequestBody::None => None,
            RequestBody::Json(value) => {
                headers.insert("content-type".to_string(), "application/json".to_string());
                Some(serde_json::to_vec(&value).map_err(|e| Error::InvalidResponse {
                    message: e.to_string(),
                })?)
            }
            RequestBody::Binary(bytes) => {
                headers.insert(
                    "content-type".to_string(),
                    "application/octet-stream".to_string(),
                );
                Some(bytes)
            }
        };

        // Auth, ETag and user headers win over the defaults above.
        for (name, value) in self.config.request_headers() {
            headers.insert(name, value);
        }

        let response = self
            .config
            .client
            .request(method, &uri, &headers, body)
            .await?;

        Ok(ApiResponse {
            status: response.status,
            headers: response.headers,
            body: decode_body(&response.body),
        })
    }

    fn api_url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String> {
        let mut url =
            reqwest::Url::parse(&self.config.api_uri).map_err(|e| Error::Config {
                message: format!("invalid api_uri: {e}"),
            })?;

        url.path_segments_mut()
            .map_err(|_| Error::Config {
                message: "api_uri cannot be a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);

        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }

        Ok(url.into())
    }
}

fn decode_body(body: &[u8]) -> serde_json::Value {
    if body.is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| serde_json::Value::String(String::from_utf8_lossy(body).into_owned()))
}
