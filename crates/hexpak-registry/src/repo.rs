//! Signed registry index reader.
//!
//! Fetches the `/names`, `/versions` and `/packages/{name}` resources
//! through a fetch → gunzip → verify → decode pipeline, and release
//! tarballs verbatim. Conditional requests are driven by the configured
//! ETag; a 304 short-circuits before any decompression or verification.

use prost::Message;
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::httpc::{Headers, Method};
use crate::proto::{Names, Package, Versions};
use crate::signed;

/// Outcome of a registry fetch.
///
/// Statuses other than 200 and 304 are handed back unchanged; deciding
/// what a 403 or 500 means is the caller's business.
#[derive(Debug, Clone)]
pub enum Fetched<T> {
    /// 200: decoded (or verbatim, for tarballs) response.
    Success { headers: Headers, value: T },

    /// 304: the caller's cached value is still current.
    NotModified { headers: Headers },

    /// Any other status, body untouched.
    Unexpected {
        status: u16,
        headers: Headers,
        body: Vec<u8>,
    },
}

impl<T> Fetched<T> {
    fn try_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<Fetched<U>> {
        Ok(match self {
            Self::Success { headers, value } => Fetched::Success {
                headers,
                value: f(value)?,
            },
            Self::NotModified { headers } => Fetched::NotModified { headers },
            Self::Unexpected {
                status,
                headers,
                body,
            } => Fetched::Unexpected {
                status,
                headers,
                body,
            },
        })
    }
}

/// Client for the signed registry index.
#[derive(Debug, Clone)]
pub struct RepoClient {
    config: Config,
}

impl RepoClient {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch and decode `/names`.
    pub async fn names(&self) -> Result<Fetched<Names>> {
        self.fetch_index("/names")
            .await?
            .try_map(|payload| Ok(Names::decode(payload.as_slice())?))
    }

    /// Fetch and decode `/versions`.
    pub async fn versions(&self) -> Result<Fetched<Versions>> {
        self.fetch_index("/versions")
            .await?
            .try_map(|payload| Ok(Versions::decode(payload.as_slice())?))
    }

    /// Fetch and decode `/packages/{name}`.
    pub async fn package(&self, name: &str) -> Result<Fetched<Package>> {
        self.fetch_index(&format!("/packages/{name}"))
            .await?
            .try_map(|payload| Ok(Package::decode(payload.as_slice())?))
    }

    /// Fetch a release tarball, verbatim.
    ///
    /// The body is already in its canonical form; compute its SHA-256 and
    /// compare against the checksum in the corresponding [`package`]
    /// release entry before trusting it.
    ///
    /// [`package`]: Self::package
    pub async fn tarball(&self, name: &str, version: &str) -> Result<Fetched<Vec<u8>>> {
        let uri = self.repo_uri(&format!("/tarballs/{name}-{version}.tar"));
        debug!(uri = %uri, "fetching tarball");

        let response = self
            .config
            .client
            .request(Method::GET, &uri, &self.config.request_headers(), None)
            .await?;

        Ok(match response.status {
            200 => Fetched::Success {
                headers: response.headers,
                value: response.body,
            },
            304 => Fetched::NotModified {
                headers: response.headers,
            },
            status => Fetched::Unexpected {
                status,
                headers: response.headers,
                body: response.body,
            },
        })
    }

    /// Shared pipeline for the signed endpoints: GET, then on 200
    /// gunzip → verify signature → hand back the payload bytes.
    async fn fetch_index(&self, path: &str) -> Result<Fetched<Vec<u8>>> {
        let uri = self.repo_uri(path);
        debug!(uri = %uri, etag = ?self.config.etag, "fetching signed index");

        let response = self
            .config
            .client
            .request(Method::GET, &uri, &self.config.request_headers(), None)
            .await?;

        match response.status {
            200 => {
                let blob = gunzip(&response.body)?;
                let payload = if self.config.verify {
                    let key =
                        self.config
                            .repo_public_key
                            .as_deref()
                            .ok_or_else(|| Error::Config {
                                message: "repo_public_key is required when verify is enabled"
                                    .to_string(),
                            })?;
                    signed::read_signed(&blob, key, true)?
                } else {
                    signed::read_signed(&blob, "", false)?
                };
                Ok(Fetched::Success {
                    headers: response.headers,
                    value: payload,
                })
            }
            304 => Ok(Fetched::NotModified {
                headers: response.headers,
            }),
            status => Ok(Fetched::Unexpected {
                status,
                headers: response.headers,
                body: response.body,
            }),
        }
    }

    fn repo_uri(&self, path: &str) -> String {
        format!("{}{}", self.config.repo_uri.trim_end_matches('/'), path)
    }
}

fn gunzip(body: &[u8]) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut decoder = flate2::read::GzDecoder::new(body);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| Error::Gunzip {
            message: e.to_string(),
        })?;
    Ok(out)
}
