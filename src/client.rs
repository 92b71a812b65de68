//! Code for creating the client and balance tables and querying them.
//!
//! A client carries one signed balance per currency. Negative balances are
//! money the client still owes; see [crate::balance] for the display helpers.

use std::fmt::Display;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{Error, balance::Currency};

/// A newtype wrapper for integer client IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct ClientID(i64);

impl ClientID {
    /// Create a new client ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the client ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for ClientID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// A client of the company.
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    /// The client's ID in the application database.
    pub id: ClientID,
    /// The client's display name.
    pub name: String,
}

/// A client's balance in one currency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientBalance {
    /// The currency the balance is tracked in.
    pub currency: Currency,
    /// The signed amount; negative means the client still owes.
    pub amount: f64,
}

/// Create the client table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_client_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS client (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE
                )",
        (),
    )?;

    Ok(())
}

/// Create the balance table.
///
/// Each client has at most one row per currency.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_balance_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS balance (
                id INTEGER PRIMARY KEY,
                client_id INTEGER NOT NULL REFERENCES client(id),
                currency TEXT NOT NULL,
                amount REAL NOT NULL,
                UNIQUE(client_id, currency)
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new client into the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred, e.g. the name
/// already exists.
pub fn create_client(connection: &Connection, name: &str) -> Result<Client, Error> {
    connection.execute("INSERT INTO client (name) VALUES (?1)", (name,))?;

    let id = ClientID::new(connection.last_insert_rowid());

    Ok(Client {
        id,
        name: name.to_owned(),
    })
}

/// Get the client with an ID equal to `client_id`.
///
/// # Errors
///
/// This function will return an error if:
/// - `client_id` does not belong to a known client.
/// - there was an error trying to access the database.
pub fn get_client(connection: &Connection, client_id: ClientID) -> Result<Client, Error> {
    connection
        .prepare("SELECT id, name FROM client WHERE id = :id")?
        .query_row(&[(":id", &client_id.as_i64())], |row| {
            let raw_id = row.get(0)?;
            let name = row.get(1)?;

            Ok(Client {
                id: ClientID::new(raw_id),
                name,
            })
        })
        .map_err(|error| error.into())
}

/// Get all clients, ordered by name.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn list_clients(connection: &Connection) -> Result<Vec<Client>, Error> {
    connection
        .prepare("SELECT id, name FROM client ORDER BY name")?
        .query_map([], |row| {
            let raw_id = row.get(0)?;
            let name = row.get(1)?;

            Ok(Client {
                id: ClientID::new(raw_id),
                name,
            })
        })?
        .map(|maybe_client| maybe_client.map_err(|error| error.into()))
        .collect()
}

/// Get the client's balances, one per currency that has ever been posted to.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_balances(
    connection: &Connection,
    client_id: ClientID,
) -> Result<Vec<ClientBalance>, Error> {
    connection
        .prepare("SELECT currency, amount FROM balance WHERE client_id = :id ORDER BY currency")?
        .query_map(&[(":id", &client_id.as_i64())], |row| {
            let raw_currency: String = row.get(0)?;
            let amount = row.get(1)?;

            Ok((raw_currency, amount))
        })?
        .map(|maybe_row| {
            let (raw_currency, amount) = maybe_row?;

            Ok(ClientBalance {
                currency: raw_currency.parse()?,
                amount,
            })
        })
        .collect()
}

/// The client's balance in one currency, zero when nothing has been posted.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn get_balance(
    connection: &Connection,
    client_id: ClientID,
    currency: Currency,
) -> Result<f64, Error> {
    connection
        .query_row(
            "SELECT COALESCE(SUM(amount), 0) FROM balance
                WHERE client_id = ?1 AND currency = ?2",
            (client_id.as_i64(), currency.code()),
            |row| row.get(0),
        )
        .map_err(|error| error.into())
}

/// Add `delta` to the client's balance in `currency`, creating the balance row
/// when it does not exist yet.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn adjust_balance(
    connection: &Connection,
    client_id: ClientID,
    currency: Currency,
    delta: f64,
) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO balance (client_id, currency, amount) VALUES (?1, ?2, ?3)
            ON CONFLICT(client_id, currency)
            DO UPDATE SET amount = amount + excluded.amount",
        (client_id.as_i64(), currency.code(), delta),
    )?;

    Ok(())
}

/// Delete a client and its balances.
///
/// # Errors
///
/// Returns [Error::NotFound] if the client does not exist.
pub fn delete_client(connection: &Connection, client_id: ClientID) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM balance WHERE client_id = ?1",
        (client_id.as_i64(),),
    )?;
    let rows_affected = connection.execute(
        "DELETE FROM client WHERE id = ?1",
        (client_id.as_i64(),),
    )?;

    if rows_affected == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}
