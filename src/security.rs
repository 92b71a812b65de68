//! Basic hardening middleware applied to every request.
//!
//! Three fail-closed checks run before any application logic: an HTTP method
//! allow-list, then a coarse regex scan of query and form parameters for
//! obvious script-injection markers. Hardening headers are set on every
//! response, including the rejections. The scan blocks obvious attempts only;
//! it is not a sanitizer and no substitute for output encoding.

use std::{net::SocketAddr, sync::OnceLock};

use axum::{
    extract::{ConnectInfo, FromRef, Request, State},
    http::{
        HeaderMap, HeaderValue, Method, StatusCode,
        header::{
            CONTENT_TYPE, REFERRER_POLICY, SERVER, STRICT_TRANSPORT_SECURITY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use regex::Regex;

use crate::AppState;

/// The response body sent when the parameter scan matches.
pub const BLOCKED_BODY: &str = "Request blocked for security reasons.";

const METHOD_NOT_ALLOWED_BODY: &str = "Method not allowed.";

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
];

/// Markers of script/markup injection that no legitimate form value contains.
const INJECTION_MARKERS: [&str; 6] = [
    "<script",
    "javascript:",
    "vbscript:",
    "<iframe",
    "onload=",
    "onerror=",
];

fn injection_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

    PATTERNS.get_or_init(|| {
        INJECTION_MARKERS
            .iter()
            .map(|marker| {
                Regex::new(&format!("(?i){}", regex::escape(marker)))
                    .expect("injection marker is a valid regex")
            })
            .collect()
    })
}

fn find_injection(value: &str) -> Option<&'static Regex> {
    injection_patterns()
        .iter()
        .find(|pattern| pattern.is_match(value))
}

/// The state needed for the security middleware.
#[derive(Debug, Clone)]
pub struct SecurityState {
    /// Whether requests reach this server over a secure transport.
    pub secure_transport: bool,
}

impl FromRef<AppState> for SecurityState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            secure_transport: state.secure_transport,
        }
    }
}

fn apply_security_headers(headers: &mut HeaderMap, secure_transport: bool) {
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));
    headers.insert(
        REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );

    if secure_transport {
        headers.insert(
            STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        );
    }

    headers.remove(SERVER);
    headers.remove("x-powered-by");
}

fn received_over_secure_transport(state: &SecurityState, request: &Request) -> bool {
    state.secure_transport
        || request
            .headers()
            .get("X-Forwarded-Proto")
            .and_then(|value| value.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

fn client_address(request: &Request) -> String {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(address)| address.to_string())
        .unwrap_or_else(|| "unknown".to_owned())
}

fn is_urlencoded_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.starts_with("application/x-www-form-urlencoded"))
}

/// Middleware function that applies the hardening checks to every request.
///
/// Requests using a method outside the allow-list get a 405; requests whose
/// query or form parameters match an injection marker get a 403 with
/// [BLOCKED_BODY] and the offending key, value and client address are logged.
/// Everything else runs normally. The hardening headers are set on every
/// response this middleware produces or passes through.
pub async fn security_middleware(
    State(state): State<SecurityState>,
    request: Request,
    next: Next,
) -> Response {
    let secure_transport = received_over_secure_transport(&state, &request);

    if !ALLOWED_METHODS.contains(request.method()) {
        let mut response =
            (StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_BODY).into_response();
        apply_security_headers(response.headers_mut(), secure_transport);

        return response;
    }

    let client = client_address(&request);
    let (parts, body) = request.into_parts();
    let body_bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::error!("Could not read request body in security middleware: {error}");
            let mut response = StatusCode::BAD_REQUEST.into_response();
            apply_security_headers(response.headers_mut(), secure_transport);

            return response;
        }
    };

    let mut parameters: Vec<(String, String)> = parts
        .uri
        .query()
        .map(|query| serde_urlencoded::from_str(query).unwrap_or_default())
        .unwrap_or_default();
    if is_urlencoded_form(&parts.headers) {
        let form_parameters: Vec<(String, String)> =
            serde_urlencoded::from_bytes(&body_bytes).unwrap_or_default();
        parameters.extend(form_parameters);
    }

    for (key, value) in &parameters {
        if let Some(pattern) = find_injection(value) {
            tracing::warn!(
                "Blocked request from {client}: parameter {key:?} with value {value:?} \
                matched injection pattern {pattern}."
            );
            let mut response = (StatusCode::FORBIDDEN, BLOCKED_BODY).into_response();
            apply_security_headers(response.headers_mut(), secure_transport);

            return response;
        }
    }

    let request = Request::from_parts(parts, body_bytes.into());
    let mut response = next.run(request).await;
    apply_security_headers(response.headers_mut(), secure_transport);

    response
}

#[cfg(test)]
mod security_middleware_tests {
    use axum::{
        Router,
        http::{Method, StatusCode},
        middleware,
        routing::get,
    };
    use axum_test::TestServer;

    use super::{BLOCKED_BODY, SecurityState, security_middleware};

    async fn test_handler() -> &'static str {
        "reached the handler"
    }

    fn get_test_server(secure_transport: bool) -> TestServer {
        let state = SecurityState { secure_transport };

        let app = Router::new()
            .route("/", get(test_handler))
            .route("/search", get(test_handler))
            .layer(middleware::from_fn_with_state(state, security_middleware));

        TestServer::new(app)
    }

    #[tokio::test]
    async fn script_tag_in_query_parameter_is_blocked() {
        let server = get_test_server(false);

        let response = server
            .get("/search")
            .add_query_param("q", "<script>alert(1)</script>")
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        response.assert_text(BLOCKED_BODY);
    }

    #[tokio::test]
    async fn injection_markers_are_matched_case_insensitively() {
        let server = get_test_server(false);

        for value in ["<SCRIPT>", "JaVaScRiPt:alert(1)", "vbscript:x", "<IFRAME src=x>"] {
            let response = server.get("/search").add_query_param("q", value).await;

            response.assert_status(StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn event_handler_attributes_are_blocked() {
        let server = get_test_server(false);

        for value in ["<img onload=hack()>", "<img onerror=hack()>"] {
            let response = server.get("/search").add_query_param("q", value).await;

            response.assert_status(StatusCode::FORBIDDEN);
        }
    }

    #[tokio::test]
    async fn harmless_parameters_reach_the_handler() {
        let server = get_test_server(false);

        let response = server
            .get("/search")
            .add_query_param("q", "office chairs <= 100 AED")
            .await;

        response.assert_status_ok();
        response.assert_text("reached the handler");
    }

    #[tokio::test]
    async fn disallowed_method_gets_405() {
        let server = get_test_server(false);

        let response = server.method(Method::TRACE, "/").await;

        response.assert_status(StatusCode::METHOD_NOT_ALLOWED);
        response.assert_text("Method not allowed.");
    }

    #[tokio::test]
    async fn hardening_headers_are_set_on_every_response() {
        let server = get_test_server(false);

        let ok_response = server.get("/").await;
        let blocked_response = server
            .get("/search")
            .add_query_param("q", "<script>")
            .await;

        for response in [ok_response, blocked_response] {
            assert_eq!(response.header("X-Content-Type-Options"), "nosniff");
            assert_eq!(response.header("X-Frame-Options"), "DENY");
            assert_eq!(response.header("X-XSS-Protection"), "1; mode=block");
            assert_eq!(
                response.header("Referrer-Policy"),
                "strict-origin-when-cross-origin"
            );
            assert!(response.maybe_header("Server").is_none());
        }
    }

    #[tokio::test]
    async fn hsts_is_only_set_over_secure_transport() {
        let insecure_server = get_test_server(false);
        let response = insecure_server.get("/").await;
        assert!(response.maybe_header("Strict-Transport-Security").is_none());

        let secure_server = get_test_server(true);
        let response = secure_server.get("/").await;
        assert_eq!(
            response.header("Strict-Transport-Security"),
            "max-age=31536000; includeSubDomains"
        );
    }

    #[tokio::test]
    async fn forwarded_https_proto_enables_hsts() {
        let server = get_test_server(false);

        let response = server
            .get("/")
            .add_header("X-Forwarded-Proto", "https")
            .await;

        assert_eq!(
            response.header("Strict-Transport-Security"),
            "max-age=31536000; includeSubDomains"
        );
    }
}
