//! Server-side sessions stored in SQLite.
//!
//! Each session row holds the authenticated user (if any), their role and the
//! live CSRF token. Only the opaque session id travels to the client, inside a
//! private (signed and encrypted) cookie. The middleware starts a fresh
//! session on the first request that does not present a valid one.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, FromRequestParts, Request, State},
    http::{StatusCode, header::SET_COOKIE},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, Key, SameSite},
};
use rand::Rng;
use rusqlite::{Connection, OptionalExtension};
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error,
    user::{Role, UserID},
};

pub(crate) const SESSION_COOKIE: &str = "session";

/// The default duration for which server-side sessions are valid.
pub(crate) const DEFAULT_SESSION_DURATION: Duration = Duration::hours(8);

/// A newtype wrapper for the opaque session identifier.
///
/// Session ids are 64 lowercase hex characters (32 bytes from the CSPRNG), so
/// they cannot be guessed or enumerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an identifier received from a cookie.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Generate a fresh random session identifier.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill(&mut bytes[..]);

        Self(hex::encode(bytes))
    }

    /// The identifier as stored in the database and the cookie.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A server-side session, as loaded from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// The opaque session identifier.
    pub id: SessionId,
    /// The logged-in user, when the session is authenticated.
    pub user_id: Option<UserID>,
    /// The logged-in user's role.
    pub role: Option<Role>,
    /// The live CSRF token for this session, once one has been issued.
    pub csrf_token: Option<String>,
    /// When the session stops being valid.
    pub expires_at: OffsetDateTime,
}

/// Create the session table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_session_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS session (
                id TEXT PRIMARY KEY,
                user_id INTEGER,
                role TEXT,
                csrf_token TEXT,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a fresh, unauthenticated session.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn create_session(connection: &Connection, duration: Duration) -> Result<Session, Error> {
    let id = SessionId::generate();
    let now = OffsetDateTime::now_utc();
    let expires_at = now + duration;

    connection.execute(
        "INSERT INTO session (id, created_at, expires_at) VALUES (?1, ?2, ?3)",
        (id.as_str(), now.unix_timestamp(), expires_at.unix_timestamp()),
    )?;

    Ok(Session {
        id,
        user_id: None,
        role: None,
        csrf_token: None,
        expires_at,
    })
}

/// Get the unexpired session with the given id, or `None` when it does not
/// exist or has expired.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn get_session(connection: &Connection, id: &SessionId) -> Result<Option<Session>, Error> {
    let now = OffsetDateTime::now_utc().unix_timestamp();

    connection
        .prepare(
            "SELECT id, user_id, role, csrf_token, expires_at
                FROM session WHERE id = ?1 AND expires_at > ?2",
        )?
        .query_row((id.as_str(), now), map_row)
        .optional()
        .map_err(|error| error.into())
}

fn map_row(row: &rusqlite::Row) -> Result<Session, rusqlite::Error> {
    let id: String = row.get(0)?;
    let user_id: Option<i64> = row.get(1)?;
    let role: Option<String> = row.get(2)?;
    let csrf_token: Option<String> = row.get(3)?;
    let expires_at: i64 = row.get(4)?;

    Ok(Session {
        id: SessionId::new(id),
        user_id: user_id.map(UserID::new),
        role: role.as_deref().and_then(|raw| raw.parse().ok()),
        csrf_token,
        expires_at: OffsetDateTime::from_unix_timestamp(expires_at)
            .unwrap_or(OffsetDateTime::UNIX_EPOCH),
    })
}

/// Mark the session as authenticated for `user_id` with `role`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the session does not exist.
pub fn set_user(
    connection: &Connection,
    id: &SessionId,
    user_id: UserID,
    role: Role,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE session SET user_id = ?1, role = ?2 WHERE id = ?3",
        (user_id.as_i64(), role.as_str(), id.as_str()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Store `token` as the session's one live CSRF token, replacing any prior
/// value.
///
/// # Errors
///
/// Returns [Error::NotFound] if the session does not exist.
pub fn set_csrf_token(connection: &Connection, id: &SessionId, token: &str) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE session SET csrf_token = ?1 WHERE id = ?2",
        (token, id.as_str()),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Delete the session row, logging the user out everywhere the cookie is held.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn delete_session(connection: &Connection, id: &SessionId) -> Result<(), Error> {
    connection.execute("DELETE FROM session WHERE id = ?1", (id.as_str(),))?;

    Ok(())
}

/// Delete every expired session row and return how many were removed.
///
/// # Errors
///
/// Returns an [Error::SqlError] if an SQL related error occurred.
pub fn delete_expired_sessions(connection: &Connection) -> Result<usize, Error> {
    let now = OffsetDateTime::now_utc().unix_timestamp();

    connection
        .execute("DELETE FROM session WHERE expires_at <= ?1", (now,))
        .map_err(|error| error.into())
}

/// The state needed for the session middleware.
#[derive(Clone)]
pub struct SessionState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which server-side sessions are valid.
    pub session_duration: Duration,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for SessionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            session_duration: state.session_duration,
            db_connection: state.db_connection.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<SessionState> for Key {
    fn from_ref(state: &SessionState) -> Self {
        state.cookie_key.clone()
    }
}

fn load_or_start_session(
    connection: &Connection,
    existing: Option<SessionId>,
    duration: Duration,
) -> Result<(Session, bool), Error> {
    if let Some(id) = existing {
        if let Some(session) = get_session(connection, &id)? {
            return Ok((session, false));
        }
    }

    let session = create_session(connection, duration)?;

    Ok((session, true))
}

/// Middleware function that attaches a server-side [Session] to every request.
///
/// A request that presents a valid session cookie gets its stored session; any
/// other request gets a freshly created one, and the Set-Cookie header for it
/// is appended to the response.
///
/// **Note**: Route handlers can use the function argument
/// `Extension(session): Extension<Session>` to receive the session.
pub async fn session_middleware(
    State(state): State<SessionState>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let jar: PrivateCookieJar = match PrivateCookieJar::from_request_parts(&mut parts, &state).await
    {
        Ok(jar) => jar,
        Err(err) => {
            tracing::error!("Error getting cookie jar: {err:?}.");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let existing = jar
        .get(SESSION_COOKIE)
        .map(|cookie| SessionId::new(cookie.value_trimmed()));

    let (session, is_new) = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(_) => return Error::DatabaseLockError.into_response(),
        };

        match load_or_start_session(&connection, existing, state.session_duration) {
            Ok(pair) => pair,
            Err(error) => return error.into_response(),
        }
    };

    let session_id = session.id.clone();
    tracing::debug!(
        "Request session {} expires at {}.",
        session_id.as_str(),
        session.expires_at
    );
    parts.extensions.insert(session);
    let request = Request::from_parts(parts, body);
    let response = next.run(request).await;

    if !is_new {
        return response;
    }

    let jar = jar.add(
        Cookie::build((SESSION_COOKIE, session_id.as_str().to_owned()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true)
            .path("/"),
    );

    let (mut parts, body) = response.into_parts();
    for (key, value) in jar.into_response().headers().iter() {
        if key != SET_COOKIE {
            continue;
        }

        parts.headers.append(key, value.to_owned());
    }

    Response::from_parts(parts, body)
}


#[cfg(test)]
mod session_middleware_tests {
    use axum::{Extension, Router, middleware, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;

    use crate::{AppState, session::SESSION_COOKIE};

    use super::{Session, session_middleware};

    async fn echo_session_id(Extension(session): Extension<Session>) -> String {
        session.id.as_str().to_owned()
    }

    fn get_test_server() -> TestServer {
        let db_connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        let state = AppState::new(db_connection, "foobar", "csrf_token", false)
            .expect("Could not create app state.");

        let app = Router::new()
            .route("/", get(echo_session_id))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                session_middleware,
            ))
            .with_state(state);

        let mut server = TestServer::new(app);
        server.save_cookies();

        server
    }

    #[tokio::test]
    async fn first_request_starts_a_session_and_sets_the_cookie() {
        let server = get_test_server();

        let response = server.get("/").await;

        response.assert_status_ok();
        let session_id = response.text();
        assert_eq!(session_id.len(), 64);
        assert!(!response.cookie(SESSION_COOKIE).value().is_empty());
    }

    #[tokio::test]
    async fn later_requests_reuse_the_same_session() {
        let server = get_test_server();

        let first_id = server.get("/").await.text();
        let second_id = server.get("/").await.text();

        assert_eq!(first_id, second_id);
    }
}
