//! Displays all clients and their balances.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    balance::{BalanceType, balance_type, format_balance},
    client::{Client, ClientBalance, get_balances, list_clients},
    endpoints::{self, format_endpoint},
    html::{
        LINK_STYLE, PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE,
        TABLE_STYLE, base, lang_href,
    },
    navigation::NavBar,
    translation::{Lang, LangQuery, translate},
};

/// The state needed for the [get_clients_page](crate::clients_page::get_clients_page) route handler.
#[derive(Debug, Clone)]
pub struct ClientsPageState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for ClientsPageState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

fn balance_cell(balances: &[ClientBalance], lang: Lang) -> Markup {
    html! {
        @if balances.is_empty() {
            span { (translate(lang, "balance.settled")) }
        }

        @for balance in balances {
            @let class = match balance_type(balance.amount) {
                BalanceType::Debt => "balance-debt",
                BalanceType::Credit => "balance-credit",
                BalanceType::Zero => "",
            };

            div class=(class)
            {
                (format_balance(balance.amount, balance.currency, true, lang))
            }
        }
    }
}

fn clients_view(clients: &[(Client, Vec<ClientBalance>)], lang: Lang) -> Markup {
    let nav_bar = NavBar::new(endpoints::CLIENTS_VIEW, lang).into_html();

    let table_row = |client: &Client, balances: &[ClientBalance]| {
        let client_url = lang_href(&format_endpoint(endpoints::CLIENT_VIEW, client.id.as_i64()), lang);

        html!(
            tr class=(TABLE_ROW_STYLE)
            {
                th scope="row" class=(TABLE_CELL_STYLE)
                {
                    a href=(client_url) class=(LINK_STYLE) { (client.name) }
                }

                td class=(TABLE_CELL_STYLE)
                {
                    (balance_cell(balances, lang))
                }
            }
        )
    };

    let content = html!(
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            h1 { (translate(lang, "page.clients")) }

            table class=(TABLE_STYLE)
            {
                thead
                {
                    tr
                    {
                        th scope="col" class=(TABLE_HEADER_STYLE)
                        {
                            (translate(lang, "clients.name"))
                        }
                        th scope="col" class=(TABLE_HEADER_STYLE)
                        {
                            (translate(lang, "clients.balances"))
                        }
                    }
                }

                tbody
                {
                    @for (client, balances) in clients {
                        (table_row(client, balances))
                    }

                    @if clients.is_empty() {
                        tr
                        {
                            td colspan="2" class=(TABLE_CELL_STYLE)
                            {
                                (translate(lang, "clients.none"))
                            }
                        }
                    }
                }
            }
        }
    );

    base(translate(lang, "page.clients"), lang, &content)
}

fn get_clients_with_balances(
    connection: &Connection,
) -> Result<Vec<(Client, Vec<ClientBalance>)>, Error> {
    list_clients(connection)?
        .into_iter()
        .map(|client| {
            let balances = get_balances(connection, client.id)?;

            Ok((client, balances))
        })
        .collect()
}

/// Renders the clients page showing every client and their balances per
/// currency.
pub async fn get_clients_page(
    State(state): State<ClientsPageState>,
    Query(LangQuery { lang }): Query<LangQuery>,
) -> Response {
    let clients = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(_) => return Error::DatabaseLockError.into_response(),
        };

        match get_clients_with_balances(&connection) {
            Ok(clients) => clients,
            Err(error) => return error.into_response(),
        }
    };

    clients_view(&clients, lang).into_response()
}
