//! Authentication middleware that gates requests on a logged-in session.
//!
//! Browser clients without a logged-in user are redirected to the log in
//! page; API clients (requests under the `/api` prefix, or with an Accept
//! header asking for JSON) get a 401 JSON error instead.

use axum::{
    Json,
    extract::Request,
    http::{StatusCode, header::ACCEPT},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::{endpoints, session::Session};

/// The JSON body sent to unauthenticated API clients.
///
/// Field order matters: clients depend on the exact serialized form
/// `{"success":false,"error":"Unauthorized"}`.
#[derive(Serialize)]
struct ApiErrorBody {
    success: bool,
    error: &'static str,
}

fn unauthorized_response() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiErrorBody {
            success: false,
            error: "Unauthorized",
        }),
    )
        .into_response()
}

fn wants_json(request: &Request) -> bool {
    if request.uri().path().starts_with(endpoints::API_PREFIX) {
        return true;
    }

    request
        .headers()
        .get(ACCEPT)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|accept| accept.contains("application/json"))
}

/// Middleware function that checks for a logged-in user in the session.
///
/// Requests with an authenticated session are executed normally, with the user
/// ID and role placed into request extensions. All other requests are halted:
/// API clients get a 401 JSON error, browser clients are redirected to the
/// log in page.
///
/// **Note**: Route handlers can use the function arguments
/// `Extension(user_id): Extension<UserID>` and
/// `Extension(role): Extension<Role>` to receive the logged-in user.
pub async fn auth_guard(mut request: Request, next: Next) -> Response {
    let logged_in_user = request
        .extensions()
        .get::<Session>()
        .and_then(|session| session.user_id.zip(session.role));

    match logged_in_user {
        Some((user_id, role)) => {
            request.extensions_mut().insert(user_id);
            request.extensions_mut().insert(role);

            next.run(request).await
        }
        None if wants_json(&request) => unauthorized_response(),
        None => Redirect::to(endpoints::LOG_IN_VIEW).into_response(),
    }
}
