//! In-memory cookie jar for the Pandora session.
//!
//! Pandora hands out its session state (including the `csrftoken`
//! anti-forgery cookie) via `Set-Cookie` response headers. The jar keeps one
//! value per cookie name, serializes the `Cookie` request header, and folds
//! each response's headers back in. A malformed entry is skipped without
//! aborting the rest of the batch.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, instrument, warn};

/// Name of the anti-forgery cookie issued by the service root.
pub const CSRF_COOKIE: &str = "csrftoken";

/// A single stored cookie: value plus the attributes we retain.
///
/// Attributes are stored for inspection only; name-keyed storage is all the
/// matching a single-host session needs. The value is redacted in `Debug`
/// output to keep session secrets out of logs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    /// Cookie value (sensitive — never log).
    value: String,
    /// The `Domain` attribute, when present (e.g., `.pandora.com`).
    pub domain: Option<String>,
    /// The `Path` attribute, when present.
    pub path: Option<String>,
    /// Expiry as a Unix timestamp, derived from `Expires` or `Max-Age`.
    pub expires: Option<u64>,
    /// Whether the `Secure` flag was set.
    pub secure: bool,
}

impl Cookie {
    /// Creates a cookie with the given value and no attributes.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// Returns the cookie value.
    ///
    /// Cookie values are sensitive — avoid logging the return value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether the cookie's expiry (if any) has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|at| at <= now_unix())
    }
}

// Custom Debug impl that redacts the cookie value.
impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("expires", &self.expires)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Errors that can occur while parsing a single `Set-Cookie` header.
#[derive(Debug, thiserror::Error)]
pub enum CookieParseError {
    /// The header has no `name=value` pair before the first `;`.
    #[error("missing name=value pair (got: {header})")]
    MissingPair {
        /// The offending header content (truncated).
        header: String,
    },

    /// The name portion of the `name=value` pair is empty.
    #[error("empty cookie name")]
    EmptyName,
}

/// Result of ingesting a batch of `Set-Cookie` headers: how many entries
/// were applied, and a warning per skipped malformed entry.
#[derive(Debug)]
pub struct IngestReport {
    /// Number of headers successfully parsed and applied.
    pub applied: usize,
    /// Warnings for malformed headers (0-based index and reason).
    pub warnings: Vec<(usize, String)>,
}

/// Session-scoped cookie storage keyed by cookie name.
///
/// At most one value is stored per name; a later `Set-Cookie` for the same
/// name overwrites the earlier one, and an expiry-based deletion
/// (`Max-Age=0` or a past `Expires`) removes the entry. Created empty at
/// session start and discarded with the session — nothing is persisted.
#[derive(Debug, Default)]
pub struct CookieJar {
    cookies: BTreeMap<String, Cookie>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites the named cookie.
    ///
    /// An already-expired cookie is treated as a deletion request for the
    /// name, matching how servers retract cookies over HTTP.
    pub fn set(&mut self, name: impl Into<String>, cookie: Cookie) {
        let name = name.into();
        if cookie.is_expired() {
            debug!(name = %name, "removing expired cookie");
            self.cookies.remove(&name);
        } else {
            self.cookies.insert(name, cookie);
        }
    }

    /// Returns the stored value for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(Cookie::value)
    }

    /// Whether the jar holds no cookies.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Number of stored cookies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    /// Serializes the jar as a `Cookie` request-header value
    /// (`name=value; name2=value2`).
    ///
    /// Ordering is by cookie name; the server treats cookie order as
    /// insignificant, any stable ordering would do.
    #[must_use]
    pub fn cookie_string(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, cookie)| format!("{name}={}", cookie.value()))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Applies a batch of raw `Set-Cookie` header values to the jar.
    ///
    /// Malformed headers are skipped with a warning (partial success); a
    /// single bad entry never prevents the rest of the response's cookies
    /// from being stored.
    #[instrument(level = "debug", skip(self, headers))]
    pub fn ingest<S: AsRef<str>>(&mut self, headers: &[S]) -> IngestReport {
        let mut applied = 0;
        let mut warnings = Vec::new();

        for (index, raw) in headers.iter().enumerate() {
            match parse_set_cookie(raw.as_ref()) {
                Ok((name, cookie)) => {
                    debug!(index, name = %name, "ingested cookie");
                    self.set(name, cookie);
                    applied += 1;
                }
                Err(e) => {
                    warn!(index, reason = %e, "skipping malformed Set-Cookie header");
                    warnings.push((index, e.to_string()));
                }
            }
        }

        IngestReport { applied, warnings }
    }
}

/// Parses one raw `Set-Cookie` header value into `(name, Cookie)`.
///
/// The first `;`-separated segment must be a `name=value` pair; remaining
/// segments are attributes. Unrecognized attributes (`Version`, `HttpOnly`,
/// `SameSite`, ...) are ignored, and attribute values that fail to parse are
/// dropped rather than failing the cookie (best-effort storage).
///
/// # Errors
///
/// Returns [`CookieParseError`] when the leading `name=value` pair is
/// missing or has an empty name.
pub fn parse_set_cookie(raw: &str) -> Result<(String, Cookie), CookieParseError> {
    let mut segments = raw.split(';');

    let pair = segments.next().unwrap_or("").trim();
    let Some((name, value)) = pair.split_once('=') else {
        return Err(CookieParseError::MissingPair {
            header: truncate_for_error(raw),
        });
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(CookieParseError::EmptyName);
    }

    let mut cookie = Cookie::new(value.trim());

    for attribute in segments {
        let attribute = attribute.trim();
        let (key, val) = attribute
            .split_once('=')
            .map_or((attribute, ""), |(k, v)| (k.trim(), v.trim()));

        match key.to_ascii_lowercase().as_str() {
            "domain" => cookie.domain = Some(val.to_string()),
            "path" => cookie.path = Some(val.to_string()),
            "secure" => cookie.secure = true,
            "expires" => {
                if let Ok(time) = httpdate::parse_http_date(val) {
                    let secs = time
                        .duration_since(UNIX_EPOCH)
                        .map(|d| d.as_secs())
                        // Pre-epoch dates are the conventional deletion idiom
                        .unwrap_or(0);
                    cookie.expires = Some(secs);
                }
            }
            "max-age" => {
                if let Ok(secs) = val.parse::<i64>() {
                    cookie.expires = if secs <= 0 {
                        Some(0)
                    } else {
                        Some(now_unix().saturating_add(secs.unsigned_abs()))
                    };
                }
            }
            _ => {}
        }
    }

    Ok((name.to_string(), cookie))
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Truncates a raw header for safe inclusion in an error message.
fn truncate_for_error(raw: &str) -> String {
    const MAX: usize = 48;
    if raw.len() > MAX {
        let cut = raw
            .char_indices()
            .take_while(|(i, _)| *i < MAX)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}...", &raw[..cut])
    } else {
        raw.to_string()
    }
}
