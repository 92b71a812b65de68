//! The landing page for logged in users: totals per currency and how many
//! clients still owe money.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    balance::{BalanceType, Currency, balance_type, format_balance},
    endpoints,
    html::{
        PAGE_CONTAINER_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE, TABLE_ROW_STYLE, TABLE_STYLE,
        base,
    },
    navigation::NavBar,
    translation::{Lang, LangQuery, translate},
};

/// The state needed for the [get_dashboard_page](crate::dashboard::get_dashboard_page) route handler.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

struct DashboardData {
    totals: Vec<(Currency, f64)>,
    debtor_count: i64,
}

fn get_dashboard_data(connection: &Connection) -> Result<DashboardData, Error> {
    let totals = connection
        .prepare(
            "SELECT currency, COALESCE(SUM(amount), 0) FROM balance
                GROUP BY currency ORDER BY currency",
        )?
        .query_map([], |row| {
            let raw_currency: String = row.get(0)?;
            let total: f64 = row.get(1)?;

            Ok((raw_currency, total))
        })?
        .map(|maybe_row| {
            let (raw_currency, total) = maybe_row?;

            Ok((raw_currency.parse::<Currency>()?, total))
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let debtor_count = connection.query_row(
        "SELECT COUNT(DISTINCT client_id) FROM balance WHERE amount < 0",
        [],
        |row| row.get(0),
    )?;

    Ok(DashboardData {
        totals,
        debtor_count,
    })
}

fn dashboard_view(data: &DashboardData, lang: Lang) -> Markup {
    let nav_bar = NavBar::new(endpoints::DASHBOARD_VIEW, lang).into_html();

    let content = html!(
        (nav_bar)

        main class=(PAGE_CONTAINER_STYLE)
        {
            h1 { (translate(lang, "page.dashboard")) }

            section
            {
                h2 { (translate(lang, "dashboard.totals")) }

                table class=(TABLE_STYLE)
                {
                    thead
                    {
                        tr
                        {
                            th scope="col" class=(TABLE_HEADER_STYLE)
                            {
                                (translate(lang, "form.currency"))
                            }
                            th scope="col" class=(TABLE_HEADER_STYLE)
                            {
                                (translate(lang, "clients.balances"))
                            }
                        }
                    }

                    tbody
                    {
                        @for (currency, total) in &data.totals {
                            tr class=(TABLE_ROW_STYLE)
                            {
                                th scope="row" class=(TABLE_CELL_STYLE) { (currency.code()) }

                                @let class = match balance_type(*total) {
                                    BalanceType::Debt => "balance-debt",
                                    BalanceType::Credit => "balance-credit",
                                    BalanceType::Zero => "",
                                };
                                td class=(TABLE_CELL_STYLE)
                                {
                                    span class=(class)
                                    {
                                        (format_balance(*total, *currency, true, lang))
                                    }
                                }
                            }
                        }
                    }
                }
            }

            section
            {
                h2 { (translate(lang, "dashboard.debtors")) }
                p { (data.debtor_count) }
            }
        }
    );

    base(translate(lang, "page.dashboard"), lang, &content)
}

/// Renders the dashboard page.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
    Query(LangQuery { lang }): Query<LangQuery>,
) -> Response {
    let data = {
        let connection = match state.db_connection.lock() {
            Ok(connection) => connection,
            Err(_) => return Error::DatabaseLockError.into_response(),
        };

        match get_dashboard_data(&connection) {
            Ok(data) => data,
            Err(error) => return error.into_response(),
        }
    };

    dashboard_view(&data, lang).into_response()
}
