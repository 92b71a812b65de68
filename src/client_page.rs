//! Displays a single client with its ledger entries and the payment form, and
//! implements the payment and delete endpoints.

use std::sync::{Arc, Mutex};

use axum::{
    Extension, Form, Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

use crate::{
    AppState, Error,
    balance::{BalanceType, Currency, balance_type, format_balance},
    client::{Client, ClientBalance, ClientID, delete_client, get_balances, get_client},
    csrf::Csrf,
    endpoints::{self, format_endpoint},
    html::{
        ALERT_ERROR_STYLE, BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE,
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, TABLE_STYLE,
        base, lang_href,
    },
    navigation::NavBar,
    not_found::get_404_not_found_response,
    session::Session,
    transaction::{LedgerEntry, entries_for_client, record_payment},
    translation::{Lang, LangQuery, translate},
    user::Role,
};

/// The state needed for the client detail page and its endpoints.
#[derive(Debug, Clone)]
pub struct ClientPageState {
    /// The form/query field name that carries the CSRF token.
    pub csrf_field: String,
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ClientPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            csrf_field: state.csrf_field.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

fn balances_list(balances: &[ClientBalance], lang: Lang) -> Markup {
    html! {
        ul
        {
            @if balances.is_empty() {
                li { (translate(lang, "balance.settled")) }
            }

            @for balance in balances {
                @let class = match balance_type(balance.amount) {
                    BalanceType::Debt => "balance-debt",
                    BalanceType::Credit => "balance-credit",
                    BalanceType::Zero => "",
                };

                li class=(class)
                {
                    (format_balance(balance.amount, balance.currency, true, lang))
                }
            }
        }
    }
}

fn entries_table(entries: &[LedgerEntry], lang: Lang) -> Markup {
    html! {
        table class=(TABLE_STYLE)
        {
            thead
            {
                tr
                {
                    th scope="col" class=(TABLE_HEADER_STYLE) { "Date" }
                    th scope="col" class=(TABLE_HEADER_STYLE)
                    {
                        (translate(lang, "form.description"))
                    }
                    th scope="col" class=(TABLE_HEADER_STYLE)
                    {
                        (translate(lang, "form.amount"))
                    }
                }
            }

            tbody
            {
                @for entry in entries {
                    tr class=(TABLE_ROW_STYLE)
                    {
                        td class=(TABLE_CELL_STYLE)
                        {
                            time datetime=(entry.date) { (entry.date) }
                        }
                        td class=(TABLE_CELL_STYLE) { (entry.description) }
                        td class=(TABLE_CELL_STYLE)
                        {
                            (format!("{:+.2} {}", entry.amount, entry.currency))
                        }
                    }
                }

                @if entries.is_empty() {
                    tr
                    {
                        td colspan="3" class=(TABLE_CELL_STYLE)
                        {
                            (translate(lang, "client.no_entries"))
                        }
                    }
                }
            }
        }
    }
}

fn payment_form(
    client_id: ClientID,
    lang: Lang,
    csrf_field: &str,
    csrf_token: &str,
) -> Markup {
    let action = lang_href(
        &format_endpoint(endpoints::CLIENT_PAYMENTS, client_id.as_i64()),
        lang,
    );

    html! {
        form method="post" action=(action)
        {
            input type="hidden" name=(csrf_field) value=(csrf_token);

            label for="currency" class=(FORM_LABEL_STYLE)
            {
                (translate(lang, "form.currency"))
            }
            select name="currency" id="currency" class=(FORM_TEXT_INPUT_STYLE)
            {
                @for currency in Currency::ALL {
                    option value=(currency.code()) { (currency.code()) }
                }
            }

            label for="amount" class=(FORM_LABEL_STYLE)
            {
                (translate(lang, "form.amount"))
            }
            input
                type="number" name="amount" id="amount"
                min="0.01" step="0.01" required class=(FORM_TEXT_INPUT_STYLE);

            label for="description" class=(FORM_LABEL_STYLE)
            {
                (translate(lang, "form.description"))
            }
            input
                type="text" name="description" id="description"
                class=(FORM_TEXT_INPUT_STYLE);

            p
            {
                button type="submit" class=(BUTTON_PRIMARY_STYLE)
                {
                    (translate(lang, "form.record_payment"))
                }
            }
        }
    }
}

struct ClientPageData {
    client: Client,
    balances: Vec<ClientBalance>,
    entries: Vec<LedgerEntry>,
    csrf_token: String,
}

fn load_client_page_data(
    connection: &Connection,
    csrf_field: &str,
    session: &Session,
    client_id: ClientID,
) -> Result<ClientPageData, Error> {
    let client = get_client(connection, client_id)?;
    let balances = get_balances(connection, client_id)?;
    let entries = entries_for_client(connection, client_id)?;
    let csrf_token = Csrf::new(csrf_field).token(connection, session)?;

    Ok(ClientPageData {
        client,
        balances,
        entries,
        csrf_token,
    })
}

fn client_view(
    data: &ClientPageData,
    lang: Lang,
    csrf_field: &str,
    error_message: Option<&str>,
) -> Markup {
    let nav_bar = NavBar::new(endpoints::CLIENTS_VIEW, lang).into_html();

    let content = html!(
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            h1 { (data.client.name) }

            @if let Some(error_message) = error_message {
                p class=(ALERT_ERROR_STYLE) { (error_message) }
            }

            section
            {
                h2 { (translate(lang, "clients.balances")) }
                (balances_list(&data.balances, lang))
            }

            section
            {
                h2 { (translate(lang, "client.entries")) }
                (entries_table(&data.entries, lang))
            }

            section
            {
                h2 { (translate(lang, "form.record_payment")) }
                (payment_form(data.client.id, lang, csrf_field, &data.csrf_token))
            }
        }
    );

    base(&data.client.name, lang, &content)
}

fn render_client_page(
    state: &ClientPageState,
    session: &Session,
    client_id: ClientID,
    lang: Lang,
    status_code: StatusCode,
    error_message: Option<&str>,
) -> Response {
    let data = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(_) => return Error::DatabaseLockError.into_response(),
        };

        match load_client_page_data(&connection, &state.csrf_field, session, client_id) {
            Ok(data) => data,
            Err(Error::NotFound) => return get_404_not_found_response(lang),
            Err(error) => return error.into_response(),
        }
    };

    (
        status_code,
        client_view(&data, lang, &state.csrf_field, error_message),
    )
        .into_response()
}

/// Renders the client detail page with balances, ledger entries and the
/// payment form.
pub async fn get_client_page(
    State(state): State<ClientPageState>,
    Path(client_id): Path<i64>,
    Query(LangQuery { lang }): Query<LangQuery>,
    Extension(session): Extension<Session>,
) -> Response {
    render_client_page(
        &state,
        &session,
        ClientID::new(client_id),
        lang,
        StatusCode::OK,
        None,
    )
}

/// The payment submitted through the payment form.
#[derive(Debug, Deserialize)]
pub struct PaymentForm {
    /// The currency to pay in.
    pub currency: Currency,
    /// The amount to pay; must be positive and within the outstanding amount.
    pub amount: f64,
    /// An optional note shown in the ledger.
    pub description: Option<String>,
}

/// Handler for recording a payment against a client's outstanding balance.
///
/// On success the CSRF token is regenerated, so the consumed token cannot be
/// replayed, and the client is redirected back to the client page. Invalid
/// payments re-render the page with an error message and status 400.
pub async fn post_payment(
    State(state): State<ClientPageState>,
    Path(client_id): Path<i64>,
    Query(LangQuery { lang }): Query<LangQuery>,
    Extension(session): Extension<Session>,
    Form(payment): Form<PaymentForm>,
) -> Response {
    let client_id = ClientID::new(client_id);
    let description = payment
        .description
        .as_deref()
        .filter(|description| !description.is_empty())
        .unwrap_or("Payment received");

    let result = {
        let mut connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(_) => return Error::DatabaseLockError.into_response(),
        };

        let result = record_payment(
            &mut connection,
            client_id,
            payment.currency,
            payment.amount,
            description,
        );

        if result.is_ok() {
            if let Err(error) = Csrf::new(&state.csrf_field).regenerate(&connection, &session.id) {
                tracing::error!("Could not regenerate CSRF token after payment: {error}");
            }
        }

        result
    };

    match result {
        Ok(entry) => {
            tracing::info!(
                "Recorded payment entry {} for client {}.",
                entry.id,
                entry.client_id
            );

            Redirect::to(&lang_href(
                &format_endpoint(endpoints::CLIENT_VIEW, client_id.as_i64()),
                lang,
            ))
            .into_response()
        }
        Err(
            error @ (Error::PaymentExceedsOutstanding { .. } | Error::NonPositivePayment),
        ) => render_client_page(
            &state,
            &session,
            client_id,
            lang,
            StatusCode::BAD_REQUEST,
            Some(&error.to_string()),
        ),
        Err(Error::NotFound) => get_404_not_found_response(lang),
        Err(error) => error.into_response(),
    }
}

/// Handler for deleting a client via the JSON API.
///
/// Only administrators may delete clients; everyone else gets a 403.
pub async fn delete_client_endpoint(
    State(state): State<ClientPageState>,
    Path(client_id): Path<i64>,
    Extension(role): Extension<Role>,
) -> Response {
    if role != Role::Admin {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({"success": false, "error": "Forbidden"})),
        )
            .into_response();
    }

    let connection = match state.db_connection.lock() {
        Ok(connection) => connection,
        Err(_) => return Error::DatabaseLockError.into_response(),
    };

    match delete_client(&connection, ClientID::new(client_id)) {
        Ok(()) => Json(json!({"success": true})).into_response(),
        Err(Error::NotFound) => (
            StatusCode::NOT_FOUND,
            Json(json!({"success": false, "error": "Not found"})),
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}

#[cfg(test)]
mod client_page_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Extension,
        extract::{Path, Query, State},
        http::StatusCode,
    };
    use rusqlite::Connection;
    use scraper::{Html, Selector};
    use time::Duration;

    use crate::{
        balance::Currency,
        client::{adjust_balance, create_client},
        db::initialize,
        session::{Session, create_session},
        translation::{Lang, LangQuery},
    };

    use super::{ClientPageState, get_client_page};

    fn get_test_state_and_session() -> (ClientPageState, Session) {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");
        let session =
            create_session(&connection, Duration::hours(1)).expect("Could not create session");

        (
            ClientPageState {
                csrf_field: "csrf_token".to_owned(),
                db_connection: Arc::new(Mutex::new(connection)),
            },
            session,
        )
    }

    async fn parse_html(response: axum::response::Response) -> Html {
        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body).to_string();

        Html::parse_document(&text)
    }

    #[tokio::test]
    async fn client_page_shows_balances_and_payment_form() {
        let (state, session) = get_test_state_and_session();
        let client_id = {
            let connection = state.db_connection.lock().unwrap();
            let client = create_client(&connection, "Al Amal Trading").unwrap();
            adjust_balance(&connection, client.id, Currency::Usd, -99.9).unwrap();

            client.id
        };

        let response = get_client_page(
            State(state),
            Path(client_id.as_i64()),
            Query(LangQuery { lang: Lang::En }),
            Extension(session),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = parse_html(response).await;

        let heading_selector = Selector::parse("h1").unwrap();
        let heading: String = html
            .select(&heading_selector)
            .next()
            .unwrap()
            .text()
            .collect();
        assert_eq!(heading, "Al Amal Trading");

        let token_selector = Selector::parse("input[name=csrf_token]").unwrap();
        let token = html
            .select(&token_selector)
            .next()
            .expect("payment form has a CSRF input")
            .attr("value")
            .unwrap();
        assert_eq!(token.len(), 64);

        let balance_selector = Selector::parse("li.balance-debt").unwrap();
        let balance: String = html
            .select(&balance_selector)
            .next()
            .expect("page shows the debt balance")
            .text()
            .collect();
        assert_eq!(balance, "$99.90 outstanding debt");
    }

    #[tokio::test]
    async fn unknown_client_gets_404() {
        let (state, session) = get_test_state_and_session();

        let response = get_client_page(
            State(state),
            Path(999),
            Query(LangQuery { lang: Lang::En }),
            Extension(session),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
