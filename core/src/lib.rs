//! Client library for the school-management REST API.
//!
//! # Overview
//! Wraps every endpoint of the school API (auth, admin CRUD, teacher and
//! student views) as a call that returns the server's JSON body unchanged,
//! and keeps the signed-in session in persistent storage plus observable
//! cells for UI binding.
//!
//! # Design
//! - `SchoolClient` is stateless: `build*` produces an `HttpRequest`,
//!   `parse*` consumes an `HttpResponse`. No I/O happens there.
//! - `Transport` executes requests; `UreqTransport` is the default.
//! - `Api` combines the two with a `SessionStore` and attaches the stored
//!   bearer token unless a call supplies its own.
//! - Every non-2xx response becomes `ApiError::Http` with the status code
//!   and the server's error payload.
//!
//! ```no_run
//! use school_core::{Api, ClientConfig, Query};
//!
//! let api = Api::from_config(&ClientConfig::load()?)?;
//! api.session().init_auth()?;
//! api.sign_in("admin@school.test", "secret")?;
//! let classes = api.classes().get_all()?;
//! let results = api.teacher().my_results(&Query::new().with("term_id", 1))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod query;
pub mod session;
pub mod transport;

pub use api::Api;
pub use client::{RequestOptions, SchoolClient, TokenResponse};
pub use config::{ClientConfig, ConfigError};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use query::Query;
pub use session::{FileStorage, MemoryStorage, Session, SessionStorage, SessionStore};
pub use transport::{Transport, UreqTransport};
