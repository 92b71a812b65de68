//! The application's endpoint URIs.
//!
//! For endpoints that take a parameter, e.g., '/clients/{client_id}', use
//! [format_endpoint].

/// The root route which redirects to the dashboard or log in page.
pub const ROOT: &str = "/";
/// The landing page for logged in users.
pub const DASHBOARD_VIEW: &str = "/dashboard";
/// The page listing all clients with their balances.
pub const CLIENTS_VIEW: &str = "/clients";
/// The page for a single client with its ledger entries and payment form.
pub const CLIENT_VIEW: &str = "/clients/{client_id}";
/// The route for getting the log in page.
pub const LOG_IN_VIEW: &str = "/login";
/// The route for logging in a user.
pub const LOG_IN_API: &str = "/login";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/logout";
/// The route to record a payment against a client's balance.
pub const CLIENT_PAYMENTS: &str = "/clients/{client_id}/payments";

/// The prefix that marks a route as part of the JSON API.
///
/// Unauthenticated requests under this prefix receive a JSON 401 instead of a
/// redirect to the log in page.
pub const API_PREFIX: &str = "/api";
/// The route to delete a client via the JSON API.
pub const DELETE_CLIENT_API: &str = "/api/clients/{client_id}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/clients/{client_id}', '{client_id}' is
/// the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
