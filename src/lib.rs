//! Mizan is a bilingual (Arabic/English) ledger web app for tracking client
//! balances in multiple currencies.
//!
//! This library provides a REST API that directly serves HTML pages, plus the
//! building blocks for the operational binaries (migration runner, backup job).

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use axum_server::Handle;
use tokio::signal;

mod app_state;
mod auth;
mod backup;
mod balance;
mod client;
mod client_page;
mod clients_page;
mod config;
mod csrf;
mod dashboard;
mod db;
mod endpoints;
mod html;
mod log_in;
mod log_out;
mod migrate;
mod navigation;
mod not_found;
mod password;
mod routing;
mod security;
mod session;
mod transaction;
mod translation;
mod user;

pub use app_state::AppState;
pub use backup::{BackupConfig, BackupError, run_backup};
pub use config::Config;
pub use db::initialize as initialize_db;
pub use migrate::{MigrationError, MigrationReport, run_migrations};
pub use password::{PasswordHash, ValidatedPassword};
pub use routing::build_router;
pub use session::delete_expired_sessions;
pub use user::{Role, User, UserID, count_users, create_user, get_user_by_username};

/// An async task that waits for either the ctrl+c or terminate signal,
/// whichever comes first, and then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The user provided an invalid username or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// A string did not name one of the supported currency codes.
    #[error("\"{0}\" is not a supported currency code")]
    InvalidCurrency(String),

    /// A string did not name one of the application roles.
    #[error("\"{0}\" is not a valid role")]
    InvalidRole(String),

    /// A payment was requested for more than the client still owes.
    #[error("payment of {requested:.2} exceeds the outstanding amount {outstanding:.2}")]
    PaymentExceedsOutstanding {
        /// The amount the client tried to pay.
        requested: f64,
        /// The amount the client still owes.
        outstanding: f64,
    },

    /// A payment was requested for a zero or negative amount.
    #[error("payment amount must be positive")]
    NonPositivePayment,

    /// Could not acquire the database lock.
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound => not_found::get_404_not_found_response(translation::Lang::En),
            Error::PaymentExceedsOutstanding { .. } | Error::NonPositivePayment => {
                (StatusCode::BAD_REQUEST, Html(self.to_string())).into_response()
            }
            // Any errors that are not handled above are not intended to be
            // shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Html("Something went wrong, check the server logs for more details."),
                )
                    .into_response()
            }
        }
    }
}
