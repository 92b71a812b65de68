//! Creating the application's database schema.

use rusqlite::Connection;

use crate::{
    client::{create_balance_table, create_client_table},
    session::create_session_table,
    transaction::create_ledger_entry_table,
    user::create_user_table,
};

/// Create the tables for the application's domain models.
///
/// Each `create_*_table` statement is idempotent, so this function can be
/// called on every startup.
///
/// # Errors
///
/// This function will return an error if any SQL query failed.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    create_session_table(connection)?;
    create_user_table(connection)?;
    create_client_table(connection)?;
    create_balance_table(connection)?;
    create_ledger_entry_table(connection)?;

    Ok(())
}
