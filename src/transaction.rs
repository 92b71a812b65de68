//! Ledger entries and payment posting.
//!
//! Every entry is posted together with the matching balance adjustment inside
//! one SQL transaction, so a client's balance is always the sum of their
//! entries.

use rusqlite::Connection;
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    balance::{Currency, can_make_payment, outstanding_amount},
    client::{ClientID, adjust_balance, get_balance},
};

/// Date format for ledger entry dates, e.g. "2026-08-07".
const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

/// A ledger entry as stored in the database.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    /// The entry's ID in the application database.
    pub id: i64,
    /// The client the entry was posted against.
    pub client_id: ClientID,
    /// The currency of the entry.
    pub currency: Currency,
    /// The signed amount; negative entries increase the client's debt.
    pub amount: f64,
    /// A short human readable description.
    pub description: String,
    /// The day the entry was posted.
    pub date: Date,
}

/// A ledger entry that has not been posted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    /// The client to post against.
    pub client_id: ClientID,
    /// The currency of the entry.
    pub currency: Currency,
    /// The signed amount; negative entries increase the client's debt.
    pub amount: f64,
    /// A short human readable description.
    pub description: String,
}

/// Create the ledger entry table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_ledger_entry_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entry (
                id INTEGER PRIMARY KEY,
                client_id INTEGER NOT NULL REFERENCES client(id),
                currency TEXT NOT NULL,
                amount REAL NOT NULL,
                description TEXT NOT NULL,
                date TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Post `entry` and adjust the matching balance, all or nothing.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred. The entry and
/// the balance adjustment are rolled back together.
pub fn record_entry(connection: &mut Connection, entry: NewEntry) -> Result<LedgerEntry, Error> {
    let date = OffsetDateTime::now_utc().date();
    let transaction = connection.transaction()?;

    transaction.execute(
        "INSERT INTO ledger_entry (client_id, currency, amount, description, date)
            VALUES (?1, ?2, ?3, ?4, ?5)",
        (
            entry.client_id.as_i64(),
            entry.currency.code(),
            entry.amount,
            &entry.description,
            date.format(DATE_FORMAT)
                .unwrap_or_else(|_| date.to_string()),
        ),
    )?;
    let id = transaction.last_insert_rowid();

    adjust_balance(&transaction, entry.client_id, entry.currency, entry.amount)?;

    transaction.commit()?;

    Ok(LedgerEntry {
        id,
        client_id: entry.client_id,
        currency: entry.currency,
        amount: entry.amount,
        description: entry.description,
        date,
    })
}

/// Record a payment of `amount` against the client's outstanding balance in
/// `currency`.
///
/// # Errors
///
/// Returns:
/// - [Error::NonPositivePayment] when `amount` is zero or negative.
/// - [Error::PaymentExceedsOutstanding] when `amount` is more than the client
///   still owes in `currency`.
pub fn record_payment(
    connection: &mut Connection,
    client_id: ClientID,
    currency: Currency,
    amount: f64,
    description: &str,
) -> Result<LedgerEntry, Error> {
    let balance = get_balance(connection, client_id, currency)?;

    if !can_make_payment(balance, amount) {
        if amount <= 0.0 {
            return Err(Error::NonPositivePayment);
        }

        return Err(Error::PaymentExceedsOutstanding {
            requested: amount,
            outstanding: outstanding_amount(balance),
        });
    }

    record_entry(
        connection,
        NewEntry {
            client_id,
            currency,
            amount,
            description: description.to_owned(),
        },
    )
}

/// Get the client's ledger entries, newest first.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn entries_for_client(
    connection: &Connection,
    client_id: ClientID,
) -> Result<Vec<LedgerEntry>, Error> {
    connection
        .prepare(
            "SELECT id, client_id, currency, amount, description, date
                FROM ledger_entry WHERE client_id = :id ORDER BY date DESC, id DESC",
        )?
        .query_map(&[(":id", &client_id.as_i64())], |row| {
            let id = row.get(0)?;
            let raw_client_id = row.get(1)?;
            let raw_currency: String = row.get(2)?;
            let amount = row.get(3)?;
            let description = row.get(4)?;
            let raw_date: String = row.get(5)?;

            Ok((id, raw_client_id, raw_currency, amount, description, raw_date))
        })?
        .map(|maybe_row| {
            let (id, raw_client_id, raw_currency, amount, description, raw_date) = maybe_row?;

            Ok(LedgerEntry {
                id,
                client_id: ClientID::new(raw_client_id),
                currency: raw_currency.parse()?,
                amount,
                description,
                date: Date::parse(&raw_date, DATE_FORMAT).map_err(|error| {
                    tracing::error!("Invalid date {raw_date:?} in ledger entry {id}: {error}");
                    Error::NotFound
                })?,
            })
        })
        .collect()
}

#[cfg(test)]
mod ledger_entry_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        balance::Currency,
        client::{create_balance_table, create_client, create_client_table, get_balance},
    };

    use super::{
        NewEntry, create_ledger_entry_table, entries_for_client, record_entry, record_payment,
    };

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_client_table(&conn).expect("Could not create client table");
        create_balance_table(&conn).expect("Could not create balance table");
        create_ledger_entry_table(&conn).expect("Could not create ledger entry table");

        conn
    }

    #[test]
    fn record_entry_adjusts_the_balance() {
        let mut conn = get_db_connection();
        let client = create_client(&conn, "Al Amal Trading").unwrap();

        record_entry(
            &mut conn,
            NewEntry {
                client_id: client.id,
                currency: Currency::Usd,
                amount: -120.0,
                description: "Invoice 1001".to_owned(),
            },
        )
        .unwrap();

        assert_eq!(get_balance(&conn, client.id, Currency::Usd).unwrap(), -120.0);
    }

    #[test]
    fn entries_are_listed_newest_first() {
        let mut conn = get_db_connection();
        let client = create_client(&conn, "Al Amal Trading").unwrap();

        for (amount, description) in [(-120.0, "Invoice 1001"), (50.0, "Payment")] {
            record_entry(
                &mut conn,
                NewEntry {
                    client_id: client.id,
                    currency: Currency::Usd,
                    amount,
                    description: description.to_owned(),
                },
            )
            .unwrap();
        }

        let entries = entries_for_client(&conn, client.id).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].description, "Payment");
        assert_eq!(entries[1].description, "Invoice 1001");
    }

    #[test]
    fn payment_reduces_outstanding_debt() {
        let mut conn = get_db_connection();
        let client = create_client(&conn, "Al Amal Trading").unwrap();
        record_entry(
            &mut conn,
            NewEntry {
                client_id: client.id,
                currency: Currency::Aed,
                amount: -300.0,
                description: "Invoice 1002".to_owned(),
            },
        )
        .unwrap();

        record_payment(&mut conn, client.id, Currency::Aed, 100.0, "Payment").unwrap();

        assert_eq!(get_balance(&conn, client.id, Currency::Aed).unwrap(), -200.0);
    }

    #[test]
    fn payment_above_outstanding_amount_is_rejected() {
        let mut conn = get_db_connection();
        let client = create_client(&conn, "Al Amal Trading").unwrap();
        record_entry(
            &mut conn,
            NewEntry {
                client_id: client.id,
                currency: Currency::Aed,
                amount: -300.0,
                description: "Invoice 1002".to_owned(),
            },
        )
        .unwrap();

        let result = record_payment(&mut conn, client.id, Currency::Aed, 300.01, "Payment");

        assert_eq!(
            result,
            Err(Error::PaymentExceedsOutstanding {
                requested: 300.01,
                outstanding: 300.0
            })
        );
        // The rejected payment must not have touched the balance.
        assert_eq!(get_balance(&conn, client.id, Currency::Aed).unwrap(), -300.0);
    }

    #[test]
    fn non_positive_payment_is_rejected() {
        let mut conn = get_db_connection();
        let client = create_client(&conn, "Al Amal Trading").unwrap();

        assert_eq!(
            record_payment(&mut conn, client.id, Currency::Usd, 0.0, "Payment"),
            Err(Error::NonPositivePayment)
        );
        assert_eq!(
            record_payment(&mut conn, client.id, Currency::Usd, -10.0, "Payment"),
            Err(Error::NonPositivePayment)
        );
    }

    #[test]
    fn payment_against_settled_balance_is_rejected() {
        let mut conn = get_db_connection();
        let client = create_client(&conn, "Al Amal Trading").unwrap();

        let result = record_payment(&mut conn, client.id, Currency::Usd, 10.0, "Payment");

        assert_eq!(
            result,
            Err(Error::PaymentExceedsOutstanding {
                requested: 10.0,
                outstanding: 0.0
            })
        );
    }
}
