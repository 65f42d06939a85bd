//! Pandora API Client Library
//!
//! This library provides authenticated access to Pandora's private JSON API:
//! it bootstraps a session (anti-forgery token, credentialed login), retains
//! the session cookies across calls, and issues JSON requests against the
//! versioned `/api/<version>/<endpoint>` surface.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`cookies`] - In-memory cookie jar fed by `Set-Cookie` response headers
//! - [`rest`] - API gateway: URL/header assembly, request dispatch, cookie
//!   ingestion
//! - Session bootstrap - the two-step `login` sequence, implemented on
//!   [`RestClient`]
//!
//! # Example
//!
//! ```no_run
//! use pandora_api::{CallOptions, RestClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = RestClient::new()?;
//! let login = client.login("user@example.com", "hunter2").await?;
//! // Bad credentials come back as a normal envelope; inspect the body.
//! println!("login status: {}", login.status);
//!
//! let stations = client
//!     .call(
//!         "station/getStations",
//!         CallOptions::new().query("pageSize", "10"),
//!     )
//!     .await?;
//! println!("{}", stations.body);
//! # Ok(())
//! # }
//! ```

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cookies;
pub mod rest;
mod session;

// Re-export commonly used types
pub use cookies::{CSRF_COOKIE, Cookie, CookieJar, CookieParseError, IngestReport};
pub use rest::{ApiError, ApiResponse, CallOptions, RestClient};
