//! Session bootstrap: anti-forgery acquisition followed by login.
//!
//! The service rejects credentialed calls whose `x-csrftoken` header does
//! not match the `csrftoken` cookie, and it only issues that cookie from the
//! bare site root. Login is therefore a strictly ordered two-step sequence:
//!
//! 1. `HEAD /` — ingest the `Set-Cookie` headers (the anti-forgery cookie)
//! 2. `POST /api/v1/auth/login` with the credentials as the JSON body,
//!    relying on the gateway's default header/cookie behavior
//!
//! Step 2 is never attempted when step 1 fails. There is no explicit
//! logout; a fresh [`RestClient`] (with its fresh jar) is the only reset.

use serde::Serialize;
use tracing::{debug, instrument};

use crate::rest::{ApiError, ApiResponse, CallOptions, RestClient};

/// Request body for `auth/login`. No `Debug` derive: the password must not
/// end up in logs.
#[derive(Serialize)]
struct Credentials<'a> {
    username: &'a str,
    password: &'a str,
}

impl RestClient {
    /// Fetches the anti-forgery cookie from the service root.
    ///
    /// Issues a header-only `HEAD` request to the bare base URL (no
    /// `/api/<version>` prefix) and folds its `Set-Cookie` headers into the
    /// jar. The response status is not inspected; only the cookies matter.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] when the request cannot be delivered;
    /// the jar is left untouched in that case.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch_csrf_token(&self) -> Result<(), ApiError> {
        let url = self.base_url().clone();
        let response = self
            .http_client()
            .head(url.clone())
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        self.ingest_response_cookies(&response);
        debug!(status = %response.status(), "anti-forgery bootstrap complete");
        Ok(())
    }

    /// Logs in with account credentials.
    ///
    /// Runs [`fetch_csrf_token`](Self::fetch_csrf_token) strictly first,
    /// then calls `auth/login` with the credentials as the JSON body so the
    /// freshly acquired anti-forgery value is attached automatically.
    ///
    /// The returned envelope is not interpreted: bad credentials surface as
    /// a normal envelope whose status or body indicates failure, and it is
    /// up to the caller to check for a user/session payload.
    ///
    /// # Errors
    ///
    /// Returns whatever error either step raised, without retrying. A
    /// bootstrap failure aborts the sequence before `auth/login` is issued.
    #[instrument(level = "debug", skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<ApiResponse, ApiError> {
        self.fetch_csrf_token().await?;

        let body = serde_json::to_value(Credentials { username, password })?;
        self.call("auth/login", CallOptions::new().content(body)).await
    }
}
