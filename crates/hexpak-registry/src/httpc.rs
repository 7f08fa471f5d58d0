//! HTTP transport seam.
//!
//! Everything that goes over the wire funnels through [`HttpClient`]. Two
//! realizations ship: [`HttpClient::Reqwest`] for production and
//! [`HttpClient::Fixture`] for tests, which serves canned responses and
//! fails loudly on anything it does not recognize.

use std::collections::BTreeMap;
use std::time::Duration;

pub use reqwest::Method;

use crate::error::Result;

/// Case-normalized request/response headers.
pub type Headers = BTreeMap<String, String>;

const USER_AGENT_VALUE: &str = concat!("hexpak/", env!("CARGO_PKG_VERSION"));

/// Request timeout for the default production transport.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A raw HTTP response: status, headers, body.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

/// Pluggable HTTP realization.
#[derive(Debug, Clone)]
pub enum HttpClient {
    /// Production transport.
    Reqwest(reqwest::Client),

    /// Canned responses for tests.
    Fixture(FixtureClient),
}

impl Default for HttpClient {
    fn default() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        Self::Reqwest(client)
    }
}

impl HttpClient {
    /// Issue a single request. No retries, no redirect policy of its own;
    /// transport errors are returned as-is.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &Headers,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        match self {
            Self::Reqwest(client) => request_reqwest(client, method, uri, headers, body).await,
            Self::Fixture(fixture) => Ok(fixture.respond(&method, uri, headers)),
        }
    }
}

async fn request_reqwest(
    client: &reqwest::Client,
    method: Method,
    uri: &str,
    headers: &Headers,
    body: Option<Vec<u8>>,
) -> Result<HttpResponse> {
    let mut request = client.request(method, uri);

    if !headers.contains_key("user-agent") {
        request = request.header(reqwest::header::USER_AGENT, USER_AGENT_VALUE);
    }
    for (name, value) in headers {
        request = request.header(name.as_str(), value.as_str());
    }
    if let Some(body) = body {
        request = request.body(body);
    }

    let response = request.send().await?;
    let status = response.status().as_u16();

    let mut response_headers = Headers::new();
    for (name, value) in response.headers() {
        if let Ok(value) = value.to_str() {
            response_headers.insert(name.as_str().to_ascii_lowercase(), value.to_string());
        }
    }

    let body = response.bytes().await?.to_vec();
    Ok(HttpResponse {
        status,
        headers: response_headers,
        body,
    })
}

/// Canned-response transport for tests.
///
/// Responses are keyed on method and URI prefix. Requests carrying
/// `if-none-match: dummy` get a 304 with the same tag echoed back; routes
/// registered as protected answer 401 when no `authorization` header is
/// present; a request no route matches panics, which is the intended
/// failure mode in a test.
#[derive(Debug, Clone, Default)]
pub struct FixtureClient {
    routes: Vec<FixtureRoute>,
}

#[derive(Debug, Clone)]
struct FixtureRoute {
    method: Method,
    uri_prefix: String,
    requires_auth: bool,
    status: u16,
    headers: Headers,
    body: Vec<u8>,
}

impl FixtureClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned response for `method` + URI prefix.
    pub fn route(
        mut self,
        method: Method,
        uri_prefix: impl Into<String>,
        status: u16,
        body: impl Into<Vec<u8>>,
    ) -> Self {
        self.routes.push(FixtureRoute {
            method,
            uri_prefix: uri_prefix.into(),
            requires_auth: false,
            status,
            headers: Headers::new(),
            body: body.into(),
        });
        self
    }

    /// Add a response header to the most recently registered route.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let Some(route) = self.routes.last_mut() {
            route.headers.insert(name.into(), value.into());
        }
        self
    }

    /// Require an `authorization` header on the most recently registered
    /// route; requests without one get a 401.
    pub fn protected(mut self) -> Self {
        if let Some(route) = self.routes.last_mut() {
            route.requires_auth = true;
        }
        self
    }

    fn respond(&self, method: &Method, uri: &str, headers: &Headers) -> HttpResponse {
        let Some(route) = self
            .routes
            .iter()
            .find(|route| route.method == *method && uri.starts_with(&route.uri_prefix))
        else {
            panic!("no fixture for {method} {uri}");
        };

        if route.requires_auth && !headers.contains_key("authorization") {
            return HttpResponse {
                status: 401,
                headers: Headers::new(),
                body: Vec::new(),
            };
        }

        if headers.get("if-none-match").map(String::as_str) == Some("dummy") {
            let mut headers = Headers::new();
            headers.insert("etag".to_string(), "dummy".to_string());
            return HttpResponse {
                status: 304,
                headers,
                body: Vec::new(),
            };
        }

        HttpResponse {
            status: route.status,
            headers: route.headers.clone(),
            body: route.body.clone(),
        }
    }
}
