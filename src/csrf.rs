//! Per-session CSRF tokens and the guard for state-mutating requests.
//!
//! Each session holds exactly one live token at any time. The guard checks
//! POST/PUT/DELETE requests for the token under the configured field name in
//! the form body or the query string; safe methods are never checked. A token
//! should be regenerated after a successful mutation so a consumed token
//! cannot be replayed.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Request, State},
    http::{Method, StatusCode, header::CONTENT_TYPE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use rand::Rng;
use rusqlite::Connection;

use crate::{
    AppState, Error,
    session::{Session, SessionId, set_csrf_token},
};

/// A CSRF token service bound to the configured token field name.
///
/// The service is stateless; tokens live in the session rows.
#[derive(Debug, Clone)]
pub struct Csrf {
    field_name: String,
}

impl Csrf {
    /// Create a service that reads and writes tokens under `field_name`.
    pub fn new(field_name: &str) -> Self {
        Self {
            field_name: field_name.to_owned(),
        }
    }

    /// The form/query field name that carries the token.
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Generate a fresh token for the session, replacing any prior token.
    ///
    /// The token is 32 bytes from the CSPRNG, hex-encoded to 64 lowercase hex
    /// characters.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if the session does not exist.
    pub fn generate_token(
        &self,
        connection: &Connection,
        session_id: &SessionId,
    ) -> Result<String, Error> {
        let mut bytes = [0u8; 32];
        rand::rng().fill(&mut bytes[..]);
        let token = hex::encode(bytes);

        set_csrf_token(connection, session_id, &token)?;

        Ok(token)
    }

    /// The session's live token, generating one lazily when absent.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if the session does not exist.
    pub fn token(&self, connection: &Connection, session: &Session) -> Result<String, Error> {
        match &session.csrf_token {
            Some(token) => Ok(token.clone()),
            None => self.generate_token(connection, &session.id),
        }
    }

    /// Check a supplied token against the session's stored token.
    ///
    /// Fails when the session has no token or the supplied token is missing or
    /// empty. The comparison is constant-time so the result leaks nothing
    /// about how much of the token matched.
    pub fn verify(&self, session: &Session, supplied: Option<&str>) -> bool {
        let Some(stored) = session.csrf_token.as_deref() else {
            return false;
        };
        let Some(supplied) = supplied else {
            return false;
        };
        if supplied.is_empty() {
            return false;
        }

        constant_time_eq(stored.as_bytes(), supplied.as_bytes())
    }

    /// Force a new token, invalidating the current one.
    ///
    /// Intended to be called after a successful mutation so the consumed token
    /// cannot be replayed.
    ///
    /// # Errors
    ///
    /// Returns [Error::NotFound] if the session does not exist.
    pub fn regenerate(
        &self,
        connection: &Connection,
        session_id: &SessionId,
    ) -> Result<String, Error> {
        self.generate_token(connection, session_id)
    }
}

/// Constant-time comparison of two byte slices.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// The state needed for the CSRF guard.
#[derive(Debug, Clone)]
pub struct CsrfState {
    /// The form/query field name that carries the CSRF token.
    pub field_name: String,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for CsrfState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            field_name: state.csrf_field.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

fn find_field<'a>(pairs: &'a [(String, String)], field_name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == field_name)
        .map(|(_, value)| value.as_str())
}

fn invalid_token_response() -> Response {
    (StatusCode::FORBIDDEN, "Invalid CSRF token.").into_response()
}

/// Middleware function that rejects state-mutating requests without a valid
/// CSRF token.
///
/// Only POST, PUT and DELETE requests are checked. The supplied token is read
/// from the form body (urlencoded) or the query string under the configured
/// field name. Requests failing the check get a 403 and never reach the
/// application handlers.
pub async fn csrf_guard(State(state): State<CsrfState>, request: Request, next: Next) -> Response {
    if !matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::DELETE
    ) {
        return next.run(request).await;
    }

    let Some(session) = request.extensions().get::<Session>().cloned() else {
        tracing::error!("CSRF guard ran on a request without a session.");
        return invalid_token_response();
    };

    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read request body in CSRF guard: {error}");
            return invalid_token_response();
        }
    };

    let form_pairs: Vec<(String, String)> = if is_urlencoded_form(&parts.headers) {
        serde_urlencoded::from_bytes(&body_bytes).unwrap_or_default()
    } else {
        Vec::new()
    };
    let query_pairs: Vec<(String, String)> = parts
        .uri
        .query()
        .map(|query| serde_urlencoded::from_str(query).unwrap_or_default())
        .unwrap_or_default();

    let csrf = Csrf::new(&state.field_name);
    let supplied = find_field(&form_pairs, csrf.field_name())
        .or_else(|| find_field(&query_pairs, csrf.field_name()));

    if !csrf.verify(&session, supplied) {
        tracing::warn!(
            "Rejected {} {} with a missing or invalid CSRF token.",
            parts.method,
            parts.uri.path()
        );
        return invalid_token_response();
    }

    let request = Request::from_parts(parts, body_bytes.into());
    next.run(request).await
}

fn is_urlencoded_form(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/x-www-form-urlencoded"))
}
