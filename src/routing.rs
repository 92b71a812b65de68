//! Application router configuration with protected and unprotected route
//! definitions and the middleware pipeline.
//!
//! Requests pass through the security middleware, then the session middleware;
//! protected routes additionally pass the auth guard and then the CSRF guard.
//! Each stage either forwards the request or produces the terminal response
//! itself.

use axum::{
    Router, middleware,
    response::Redirect,
    routing::{delete, get, post},
};

use crate::{
    AppState,
    auth::auth_guard,
    client_page::{delete_client_endpoint, get_client_page, post_payment},
    clients_page::get_clients_page,
    csrf::csrf_guard,
    dashboard::get_dashboard_page,
    endpoints,
    log_in::{get_log_in_page, post_log_in},
    log_out::get_log_out,
    not_found::get_404_not_found,
    security::security_middleware,
    session::session_middleware,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route(endpoints::ROOT, get(get_index_page))
        .route(endpoints::DASHBOARD_VIEW, get(get_dashboard_page))
        .route(endpoints::CLIENTS_VIEW, get(get_clients_page))
        .route(endpoints::CLIENT_VIEW, get(get_client_page))
        .route(endpoints::CLIENT_PAYMENTS, post(post_payment))
        .route(endpoints::DELETE_CLIENT_API, delete(delete_client_endpoint))
        .layer(middleware::from_fn_with_state(state.clone(), csrf_guard))
        .layer(middleware::from_fn(auth_guard));

    let unprotected_routes = Router::new()
        .route(
            endpoints::LOG_IN_VIEW,
            get(get_log_in_page).post(post_log_in),
        )
        .route(endpoints::LOG_OUT, get(get_log_out))
        .layer(middleware::from_fn_with_state(state.clone(), csrf_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            security_middleware,
        ))
        .with_state(state)
}

/// The root path '/' redirects to the dashboard page.
async fn get_index_page() -> Redirect {
    Redirect::to(endpoints::DASHBOARD_VIEW)
}

#[cfg(test)]
mod root_route_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::{endpoints, routing::get_index_page};

    #[tokio::test]
    async fn root_redirects_to_dashboard() {
        let response = get_index_page().await.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get("location").unwrap();
        assert_eq!(location, endpoints::DASHBOARD_VIEW);
    }
}

#[cfg(test)]
mod full_stack_tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use scraper::{Html, Selector};

    use crate::{
        AppState, PasswordHash, build_router, endpoints,
        user::{Role, create_user},
    };

    fn get_test_server_with_role(role: Role) -> TestServer {
        let db_connection =
            Connection::open_in_memory().expect("Could not open database in memory.");
        let state = AppState::new(db_connection, "foobar", "csrf_token", false)
            .expect("Could not create app state.");

        {
            let connection = state.db_connection.lock().unwrap();
            create_user(
                &connection,
                "fatima",
                PasswordHash::from_raw_password("averysafeandsecurepassword", 4).unwrap(),
                role,
            )
            .unwrap();
            crate::client::create_client(&connection, "Al Amal Trading").unwrap();
        }

        let mut server =
            TestServer::new(build_router(state));
        server.save_cookies();

        server
    }

    fn extract_csrf_token(page_html: &str) -> String {
        let html = Html::parse_document(page_html);
        let selector = Selector::parse("input[name=csrf_token]").unwrap();

        html.select(&selector)
            .next()
            .expect("Could not find CSRF input")
            .attr("value")
            .expect("CSRF input has no value")
            .to_owned()
    }

    async fn log_in(server: &TestServer) {
        let token = extract_csrf_token(&server.get(endpoints::LOG_IN_VIEW).await.text());

        server
            .post(endpoints::LOG_IN_VIEW)
            .form(&[
                ("csrf_token", token.as_str()),
                ("username", "fatima"),
                ("password", "averysafeandsecurepassword"),
            ])
            .await
            .assert_status_see_other();
    }

    #[tokio::test]
    async fn protected_page_redirects_anonymous_browser_to_log_in() {
        let server = get_test_server_with_role(Role::Accountant);

        let response = server.get(endpoints::CLIENTS_VIEW).await;

        response.assert_status_see_other();
        assert_eq!(response.header("location"), endpoints::LOG_IN_VIEW);
    }

    #[tokio::test]
    async fn api_delete_without_log_in_gets_exact_json_401() {
        let server = get_test_server_with_role(Role::Admin);

        let response = server
            .delete("/api/clients/1")
            .add_header("Accept", "application/json")
            .await;

        response.assert_status(StatusCode::UNAUTHORIZED);
        response.assert_text(r#"{"success":false,"error":"Unauthorized"}"#);
    }

    #[tokio::test]
    async fn logged_in_user_can_browse_clients() {
        let server = get_test_server_with_role(Role::Accountant);

        log_in(&server).await;

        let response = server.get(endpoints::CLIENTS_VIEW).await;
        response.assert_status_ok();
        assert!(response.text().contains("Al Amal Trading"));
    }

    #[tokio::test]
    async fn log_in_post_without_csrf_token_is_rejected() {
        let server = get_test_server_with_role(Role::Accountant);

        // Establish a session first.
        server.get(endpoints::LOG_IN_VIEW).await.assert_status_ok();

        let response = server
            .post(endpoints::LOG_IN_VIEW)
            .form(&[
                ("username", "fatima"),
                ("password", "averysafeandsecurepassword"),
            ])
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_can_delete_client_through_the_api() {
        let server = get_test_server_with_role(Role::Admin);

        log_in(&server).await;

        // The CSRF guard also covers API mutations.
        let token = extract_csrf_token(&server.get("/clients/1").await.text());

        let response = server
            .delete(&format!("/api/clients/1?csrf_token={token}"))
            .await;

        response.assert_status_ok();
        response.assert_text(r#"{"success":true}"#);
    }

    #[tokio::test]
    async fn non_admin_cannot_delete_client_through_the_api() {
        let server = get_test_server_with_role(Role::Accountant);

        log_in(&server).await;

        let token = extract_csrf_token(&server.get("/clients/1").await.text());

        let response = server
            .delete(&format!("/api/clients/1?csrf_token={token}"))
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn injection_attempt_is_blocked_before_any_handler() {
        let server = get_test_server_with_role(Role::Accountant);

        let response = server
            .get(endpoints::CLIENTS_VIEW)
            .add_query_param("q", "<script>alert(1)</script>")
            .await;

        response.assert_status(StatusCode::FORBIDDEN);
        response.assert_text("Request blocked for security reasons.");
    }

    #[tokio::test]
    async fn unknown_page_gets_404() {
        let server = get_test_server_with_role(Role::Accountant);

        let response = server.get("/no/such/page").await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn log_out_ends_the_session() {
        let server = get_test_server_with_role(Role::Accountant);

        log_in(&server).await;
        server.get(endpoints::CLIENTS_VIEW).await.assert_status_ok();

        server
            .get(endpoints::LOG_OUT)
            .await
            .assert_status_see_other();

        let response = server.get(endpoints::CLIENTS_VIEW).await;
        response.assert_status_see_other();
        assert_eq!(response.header("location"), endpoints::LOG_IN_VIEW);
    }
}
