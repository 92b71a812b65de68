//! Log-out route handler that destroys the server-side session and redirects
//! users.

use std::sync::{Arc, Mutex};

use axum::{
    Extension,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    PrivateCookieJar,
    cookie::{Cookie, SameSite},
};
use rusqlite::Connection;
use time::{Duration, OffsetDateTime};

use crate::{
    AppState, Error, endpoints,
    html::lang_href,
    session::{SESSION_COOKIE, Session, delete_session},
    translation::LangQuery,
};

/// The state needed to log out.
#[derive(Debug, Clone)]
pub struct LogOutState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LogOutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// Destroy the session and redirect the client to the log-in page.
///
/// The session row is deleted server-side, so the cookie is useless even if a
/// stale copy survives on another device.
pub async fn get_log_out(
    State(state): State<LogOutState>,
    Query(LangQuery { lang }): Query<LangQuery>,
    Extension(session): Extension<Session>,
    jar: PrivateCookieJar,
) -> Response {
    {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(_) => return Error::DatabaseLockError.into_response(),
        };

        if let Err(error) = delete_session(&connection, &session.id) {
            tracing::error!("Could not delete session at log-out: {error}");
            return error.into_response();
        }
    }

    let jar = jar.add(
        Cookie::build((SESSION_COOKIE, "deleted"))
            .expires(OffsetDateTime::UNIX_EPOCH)
            .max_age(Duration::ZERO)
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(true)
            .path("/"),
    );

    (
        jar,
        Redirect::to(&lang_href(endpoints::LOG_IN_VIEW, lang)),
    )
        .into_response()
}
