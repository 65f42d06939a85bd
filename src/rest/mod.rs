//! API gateway for the versioned JSON endpoints.
//!
//! This module centralizes request assembly so every call stays consistent
//! on URL shape, headers, and cookie handling:
//!
//! 1. Build `<base>api/<version>/<endpoint>[?<urlencoded query>]`
//! 2. Attach `Content-Type: application/json`, the `X-CsrfToken` header
//!    (mirroring the jar's `csrftoken` cookie), the serialized `Cookie`
//!    header, and any caller overrides
//! 3. Dispatch, then fold the response's `Set-Cookie` headers back into the
//!    shared jar before handing the envelope to the caller
//!
//! Status codes are never interpreted here; a completed exchange always
//! yields an [`ApiResponse`], 2xx or not.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, SET_COOKIE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::cookies::{CSRF_COOKIE, CookieJar};

mod error;

pub use error::ApiError;

/// Production API host. The bare root (no `/api` prefix) is also the target
/// of the anti-forgery bootstrap request.
const BASE_URL: &str = "https://www.pandora.com/";

/// Anti-forgery request header; carries the `csrftoken` cookie value.
/// Header names are case-insensitive on the wire, so the lowercase form is
/// used throughout.
pub const CSRF_HEADER: &str = "x-csrftoken";

/// Session-token header; attached only once a token has been installed.
pub const AUTH_TOKEN_HEADER: &str = "x-authtoken";

const CONNECT_TIMEOUT_SECS: u64 = 10;
const READ_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("pandora-api/", env!("CARGO_PKG_VERSION"));

/// Per-call request options.
///
/// Defaults mirror the service's conventions: API version `v1`, method
/// `POST`, cookies and (reserved) auth token attached.
///
/// # Example
///
/// ```
/// use pandora_api::CallOptions;
/// use reqwest::Method;
///
/// let options = CallOptions::new()
///     .method(Method::GET)
///     .version("v3")
///     .query("pageSize", "10");
/// ```
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// API version path segment (default `"v1"`).
    pub version: String,
    /// HTTP method (default `POST`).
    pub method: Method,
    /// Query parameters, URL-encoded into the request URL when non-empty.
    pub query: BTreeMap<String, String>,
    /// Header overrides; these win over the defaults on key collision.
    pub headers: BTreeMap<String, String>,
    /// JSON request body, serialized when present.
    pub content: Option<Value>,
    /// Whether to attach the jar's serialized `Cookie` header (default true).
    pub attach_cookies: bool,
    /// Whether to attach `X-AuthToken` when a token is held (default true).
    pub attach_auth_token: bool,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            version: "v1".to_string(),
            method: Method::POST,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            content: None,
            attach_cookies: true,
            attach_auth_token: true,
        }
    }
}

impl CallOptions {
    /// Creates options with the default version, method, and flags.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API version path segment (e.g. `"v3"`).
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds one query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Adds one header override.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets the JSON request body.
    #[must_use]
    pub fn content(mut self, content: Value) -> Self {
        self.content = Some(content);
        self
    }

    /// Controls whether the `Cookie` header is attached.
    #[must_use]
    pub fn attach_cookies(mut self, attach: bool) -> Self {
        self.attach_cookies = attach;
        self
    }

    /// Controls whether `X-AuthToken` is attached when a token is held.
    #[must_use]
    pub fn attach_auth_token(mut self, attach: bool) -> Self {
        self.attach_auth_token = attach;
        self
    }
}

/// Envelope returned for every completed HTTP exchange.
///
/// Status inspection is the caller's responsibility; a 401 from
/// `auth/login` arrives here, not as an error.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    /// HTTP status code of the response.
    pub status: StatusCode,
    /// Response headers as received.
    pub headers: HeaderMap,
    /// Raw response body.
    pub body: String,
}

impl ApiResponse {
    /// Deserializes the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the body is not valid JSON for
    /// `T` (common for error pages served with non-2xx statuses).
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// HTTP gateway to the private JSON API.
///
/// Holds the [`reqwest::Client`], the base URL, and the session's shared
/// [`CookieJar`]. The jar sits behind a mutex so callers may issue requests
/// concurrently from multiple tasks or threads; concurrent ingestions race
/// and the last write per cookie name wins.
///
/// Created with an empty jar — run [`login`](RestClient::login) (or at least
/// [`fetch_csrf_token`](RestClient::fetch_csrf_token)) before credentialed
/// calls. Each client is an independent session; dropping it is the only
/// "logout".
#[derive(Debug)]
pub struct RestClient {
    http: Client,
    base: Url,
    jar: Arc<Mutex<CookieJar>>,
    auth_token: Mutex<Option<String>>,
}

impl RestClient {
    /// Creates a client for the production host.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::ClientBuild`] when HTTP client construction fails.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_base_url(BASE_URL)
    }

    /// Creates a client against an explicit base URL (primarily for tests
    /// against a local mock server).
    ///
    /// The base should be a host root; endpoint paths are joined under it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidUrl`] for an unparseable base, or
    /// [`ApiError::ClientBuild`] when HTTP client construction fails.
    pub fn with_base_url(base: impl AsRef<str>) -> Result<Self, ApiError> {
        let base = Url::parse(base.as_ref()).map_err(|_| ApiError::InvalidUrl {
            url: base.as_ref().to_string(),
        })?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|source| ApiError::ClientBuild { source })?;

        Ok(Self {
            http,
            base,
            jar: Arc::new(Mutex::new(CookieJar::new())),
            auth_token: Mutex::new(None),
        })
    }

    /// The base URL this client targets.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Current value of a stored session cookie, or `None`.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.lock_jar().get(name).map(str::to_owned)
    }

    /// Serialized `Cookie` header for the current jar state (empty string
    /// for a fresh session).
    #[must_use]
    pub fn cookie_header(&self) -> String {
        self.lock_jar().cookie_string()
    }

    /// Installs a session token to be sent as `X-AuthToken` on subsequent
    /// calls.
    ///
    /// No endpoint of the private API is known to issue such a token, so
    /// nothing sets one automatically; the slot exists for callers that
    /// obtain a token through some other channel.
    pub fn set_auth_token(&self, token: impl Into<String>) {
        *self
            .auth_token
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Issues a request against a versioned API endpoint.
    ///
    /// Builds `<base>api/<version>/<endpoint>[?<query>]`, attaches the
    /// default and override headers, and dispatches. Any received response,
    /// whatever its status, has its `Set-Cookie` headers ingested into the
    /// jar before the envelope is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the transport layer fails (the
    /// jar is left untouched in that case), or [`ApiError::Serialize`] /
    /// [`ApiError::InvalidUrl`] for request-assembly failures.
    #[instrument(
        level = "debug",
        skip(self, options),
        fields(method = %options.method, version = %options.version)
    )]
    pub async fn call(
        &self,
        endpoint: &str,
        options: CallOptions,
    ) -> Result<ApiResponse, ApiError> {
        let url = self.endpoint_url(endpoint, &options)?;
        let headers = self.build_headers(&options);
        debug!(url = %url, "issuing API request");

        let mut request = self
            .http
            .request(options.method.clone(), url.clone())
            .headers(headers);
        if let Some(content) = &options.content {
            request = request.body(serde_json::to_vec(content)?);
        }

        let response = request.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        self.ingest_response_cookies(&response);

        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        debug!(status = %status, bytes = body.len(), "API response received");

        Ok(ApiResponse {
            status,
            headers: response_headers,
            body,
        })
    }

    /// Folds a response's `Set-Cookie` headers into the shared jar.
    ///
    /// Runs for every received response regardless of status, and exactly
    /// once per response, before the envelope reaches the caller.
    pub(crate) fn ingest_response_cookies(&self, response: &reqwest::Response) {
        let raw: Vec<String> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok().map(str::to_owned))
            .collect();
        if raw.is_empty() {
            return;
        }

        let report = self.lock_jar().ingest(&raw);
        debug!(
            applied = report.applied,
            skipped = report.warnings.len(),
            "ingested response cookies"
        );
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.http
    }

    fn lock_jar(&self) -> std::sync::MutexGuard<'_, CookieJar> {
        // A poisoned jar still holds valid cookie state; keep going.
        self.jar.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Assembles the full endpoint URL, URL-encoding the query map.
    fn endpoint_url(&self, endpoint: &str, options: &CallOptions) -> Result<Url, ApiError> {
        let path = format!("api/{}/{}", options.version, endpoint);
        let mut url = self.base.join(&path).map_err(|_| ApiError::InvalidUrl {
            url: format!("{}{path}", self.base),
        })?;

        if !options.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &options.query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }

    /// Builds the outgoing header map: defaults first, caller overrides on
    /// top.
    fn build_headers(&self, options: &CallOptions) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        {
            let jar = self.lock_jar();

            // The bootstrap request runs before any csrftoken exists; the
            // service tolerates the empty value on that first call.
            let csrf = jar.get(CSRF_COOKIE).unwrap_or_default();
            match HeaderValue::from_str(csrf) {
                Ok(value) => {
                    headers.insert(HeaderName::from_static(CSRF_HEADER), value);
                }
                Err(_) => warn!("csrftoken cookie holds a non-header-safe value; omitting header"),
            }

            if options.attach_cookies && !jar.is_empty() {
                match HeaderValue::from_str(&jar.cookie_string()) {
                    Ok(value) => {
                        headers.insert(COOKIE, value);
                    }
                    Err(_) => warn!("cookie jar serialization is not header-safe; omitting Cookie"),
                }
            }
        }

        if options.attach_auth_token {
            let token = self
                .auth_token
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(token) = token.as_deref() {
                if let Ok(value) = HeaderValue::from_str(token) {
                    headers.insert(HeaderName::from_static(AUTH_TOKEN_HEADER), value);
                }
            }
        }

        for (key, value) in &options.headers {
            match (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %key, "skipping header override with invalid name or value"),
            }
        }

        headers
    }
}
