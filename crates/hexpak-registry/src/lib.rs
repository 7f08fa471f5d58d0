//! Client for Hex-compatible package registries.
//!
//! Two clients ship here:
//!
//! - [`RepoClient`] reads the signed registry index (`/names`, `/versions`,
//!   `/packages/{name}`) and downloads release tarballs. Index payloads are
//!   gzipped, protobuf-encoded and signed by the repository; the signature
//!   is verified against the configured public key before anything is
//!   decoded.
//! - [`ApiClient`] talks to the REST API (packages, releases, users, keys,
//!   owners) with JSON bodies.
//!
//! Both are driven by a per-call [`Config`]; there is no process-wide
//! state, and no request is retried or issued concurrently on the
//! library's own initiative.
//!
//! # Example
//!
//! ```no_run
//! use hexpak_registry::{Config, Fetched, RepoClient};
//!
//! # async fn example() -> hexpak_registry::Result<()> {
//! let config = Config::default().with_repo_public_key(REPO_KEY_PEM);
//! let client = RepoClient::new(config);
//!
//! if let Fetched::Success { value, .. } = client.names().await? {
//!     for package in value.packages {
//!         println!("{}", package.name);
//!     }
//! }
//! # Ok(())
//! # }
//! # const REPO_KEY_PEM: &str = "";
//! ```
//!
//! # Caching
//!
//! Set [`Config::etag`] to the tag from a previous response and a 304
//! comes back as [`Fetched::NotModified`] without touching gunzip or the
//! signature check; keep using the prior value.

pub mod api;
pub mod config;
pub mod error;
pub mod httpc;
pub mod proto;
pub mod repo;
pub mod signed;

pub use api::{ApiClient, ApiResponse, KeyPermission};
pub use config::Config;
pub use error::{Error, Result};
pub use httpc::{FixtureClient, Headers, HttpClient, HttpResponse, Method};
pub use repo::{Fetched, RepoClient};
pub use signed::read_signed;
