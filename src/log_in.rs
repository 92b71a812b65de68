//! This file defines the routes for displaying the log-in page and handling
//! log-in requests. The session module handles the lower level session state.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form,
    extract::{FromRef, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    csrf::Csrf,
    endpoints,
    html::{
        ALERT_ERROR_STYLE, BUTTON_PRIMARY_STYLE, FORM_CONTAINER_STYLE, FORM_LABEL_STYLE,
        FORM_TEXT_INPUT_STYLE, base, lang_href,
    },
    session::{Session, set_user},
    translation::{Lang, LangQuery, translate},
    user::get_user_by_username,
};

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LoginState {
    /// The form/query field name that carries the CSRF token.
    pub csrf_field: String,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for LoginState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            csrf_field: state.csrf_field.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

fn log_in_form(
    lang: Lang,
    csrf_field: &str,
    csrf_token: &str,
    error_message: Option<&str>,
) -> Markup {
    html! {
        form method="post" action=(lang_href(endpoints::LOG_IN_API, lang)) class=(FORM_CONTAINER_STYLE)
        {
            h1 { (translate(lang, "page.log_in")) }

            @if let Some(error_message) = error_message {
                p class=(ALERT_ERROR_STYLE) { (error_message) }
            }

            input type="hidden" name=(csrf_field) value=(csrf_token);

            label for="username" class=(FORM_LABEL_STYLE)
            {
                (translate(lang, "form.username"))
            }
            input
                type="text" name="username" id="username"
                required autofocus class=(FORM_TEXT_INPUT_STYLE);

            label for="password" class=(FORM_LABEL_STYLE)
            {
                (translate(lang, "form.password"))
            }
            input
                type="password" name="password" id="password"
                required class=(FORM_TEXT_INPUT_STYLE);

            p
            {
                button type="submit" class=(BUTTON_PRIMARY_STYLE)
                {
                    (translate(lang, "form.log_in"))
                }
            }
        }
    }
}

fn render_log_in_page(
    state: &LoginState,
    session: &Session,
    lang: Lang,
    error_message: Option<&str>,
) -> Response {
    let csrf_token = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(_) => return Error::DatabaseLockError.into_response(),
        };

        match Csrf::new(&state.csrf_field).token(&connection, session) {
            Ok(token) => token,
            Err(error) => return error.into_response(),
        }
    };

    let content = log_in_form(lang, &state.csrf_field, &csrf_token, error_message);

    base(translate(lang, "page.log_in"), lang, &content).into_response()
}

/// Display the log-in page.
pub async fn get_log_in_page(
    State(state): State<LoginState>,
    Query(LangQuery { lang }): Query<LangQuery>,
    Extension(session): Extension<Session>,
) -> Response {
    render_log_in_page(&state, &session, lang, None)
}

/// The credentials submitted through the log-in form.
#[derive(Debug, Deserialize)]
pub struct LogInData {
    /// The name the user logs in with.
    pub username: String,
    /// Password entered during log-in.
    pub password: String,
}

/// Handler for log-in requests via the POST method.
///
/// On a successful log-in, the session is marked as authenticated, the CSRF
/// token is regenerated so the pre-login token cannot be replayed, and the
/// client is redirected to the clients page. Otherwise, the form is returned
/// with an error message explaining the problem.
pub async fn post_log_in(
    State(state): State<LoginState>,
    Query(LangQuery { lang }): Query<LangQuery>,
    Extension(session): Extension<Session>,
    Form(user_data): Form<LogInData>,
) -> Response {
    // The lookup result is matched outside this block so the connection lock
    // is released before any page render takes it again.
    let lookup = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(_) => return Error::DatabaseLockError.into_response(),
        };

        get_user_by_username(&connection, &user_data.username)
    };

    let user = match lookup {
        Ok(user) => Some(user),
        Err(Error::NotFound) => None,
        Err(error) => {
            tracing::error!("Unhandled error while looking up user: {error}");
            return render_log_in_page(
                &state,
                &session,
                lang,
                Some(translate(lang, "log_in.internal_error")),
            );
        }
    };

    let Some(user) = user else {
        return render_log_in_page(&state, &session, lang, Some(translate(lang, "log_in.invalid")));
    };

    let is_password_valid = match user.password_hash.verify(&user_data.password) {
        Ok(is_password_valid) => is_password_valid,
        Err(error) => {
            tracing::error!("Unhandled error while verifying credentials: {error}");
            return render_log_in_page(
                &state,
                &session,
                lang,
                Some(translate(lang, "log_in.internal_error")),
            );
        }
    };

    if !is_password_valid {
        return render_log_in_page(&state, &session, lang, Some(translate(lang, "log_in.invalid")));
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(_) => return Error::DatabaseLockError.into_response(),
    };

    if let Err(error) = set_user(&connection, &session.id, user.id, user.role) {
        tracing::error!("Could not mark session as logged in: {error}");
        return error.into_response();
    }

    // A fresh token prevents replaying the pre-login token (session fixation).
    if let Err(error) = Csrf::new(&state.csrf_field).regenerate(&connection, &session.id) {
        tracing::error!("Could not regenerate CSRF token after login: {error}");
        return error.into_response();
    }

    Redirect::to(&lang_href(endpoints::CLIENTS_VIEW, lang)).into_response()
}
