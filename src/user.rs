//! Code for creating the user table and fetching users from the database.

use std::{fmt::Display, str::FromStr};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{Error, PasswordHash};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better
/// compile time errors, and more flexible generics that can have distinct
/// implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The application role assigned to a user.
///
/// Stored in the database and the session as a lowercase string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including user management.
    Admin,
    /// Day-to-day bookkeeping access.
    Accountant,
    /// Read access plus reports.
    Manager,
    /// Plain read access.
    User,
}

impl Role {
    /// The lowercase string form, as stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Accountant => "accountant",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "accountant" => Ok(Role::Accountant),
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            other => Err(Error::InvalidRole(other.to_owned())),
        }
    }
}

/// A user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// The name the user logs in with.
    pub username: String,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// The user's application role.
    pub role: Role,
}

/// Create the user table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                role TEXT NOT NULL
                )",
        (),
    )?;

    Ok(())
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred, e.g. the
/// username already exists.
pub fn create_user(
    connection: &Connection,
    username: &str,
    password_hash: PasswordHash,
    role: Role,
) -> Result<User, Error> {
    connection.execute(
        "INSERT INTO user (username, password, role) VALUES (?1, ?2, ?3)",
        (username, password_hash.to_string(), role.as_str()),
    )?;

    let id = UserID::new(connection.last_insert_rowid());

    Ok(User {
        id,
        username: username.to_owned(),
        password_hash,
        role,
    })
}

/// Get the user that logs in as `username`.
///
/// # Errors
///
/// This function will return an error if:
/// - `username` does not belong to a registered user.
/// - there was an error trying to access the database.
pub fn get_user_by_username(connection: &Connection, username: &str) -> Result<User, Error> {
    connection
        .prepare("SELECT id, username, password, role FROM user WHERE username = :username")?
        .query_row(&[(":username", username)], |row| {
            let raw_id = row.get(0)?;
            let username: String = row.get(1)?;
            let raw_password_hash: String = row.get(2)?;
            let raw_role: String = row.get(3)?;

            Ok((raw_id, username, raw_password_hash, raw_role))
        })
        .map_err(Error::from)
        .and_then(|(raw_id, username, raw_password_hash, raw_role)| {
            Ok(User {
                id: UserID::new(raw_id),
                username,
                password_hash: PasswordHash::new_unchecked(&raw_password_hash),
                role: raw_role.parse()?,
            })
        })
}

/// Get the number of users in the database.
///
/// # Errors
///
/// Returns a [Error::SqlError] if an SQL related error occurred.
pub fn count_users(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM user;", [], |row| row.get::<_, i64>(0))
        .map(|count| count as usize)
        .map_err(|error| error.into())
}


#[cfg(test)]
mod user_tests {
    use rusqlite::Connection;

    use crate::{
        Error, PasswordHash,
        user::{Role, count_users, create_user, get_user_by_username},
    };

    use super::create_user_table;

    fn get_db_connection() -> Connection {
        let conn =
            Connection::open_in_memory().expect("Could not create in-memory SQLite database");
        create_user_table(&conn).expect("Could not create user table");

        conn
    }

    #[test]
    fn insert_user_succeeds() {
        let db_connection = get_db_connection();
        let password_hash = PasswordHash::new_unchecked("hunter2");

        let inserted_user = create_user(
            &db_connection,
            "fatima",
            password_hash.clone(),
            Role::Accountant,
        )
        .unwrap();

        assert!(inserted_user.id.as_i64() > 0);
        assert_eq!(inserted_user.username, "fatima");
        assert_eq!(inserted_user.password_hash, password_hash);
        assert_eq!(inserted_user.role, Role::Accountant);
    }

    #[test]
    fn insert_user_fails_with_duplicate_username() {
        let db_connection = get_db_connection();

        create_user(
            &db_connection,
            "fatima",
            PasswordHash::new_unchecked("hunter2"),
            Role::Admin,
        )
        .unwrap();
        let result = create_user(
            &db_connection,
            "fatima",
            PasswordHash::new_unchecked("hunter3"),
            Role::User,
        );

        assert!(matches!(result, Err(Error::SqlError(_))));
    }

    #[test]
    fn get_user_fails_with_non_existent_username() {
        let db_connection = get_db_connection();

        assert_eq!(
            get_user_by_username(&db_connection, "nobody"),
            Err(Error::NotFound)
        );
    }

    #[test]
    fn get_user_succeeds_with_existing_username() {
        let db_connection = get_db_connection();
        let test_user = create_user(
            &db_connection,
            "fatima",
            PasswordHash::new_unchecked("hunter2"),
            Role::Manager,
        )
        .unwrap();

        let retrieved_user = get_user_by_username(&db_connection, "fatima").unwrap();

        assert_eq!(retrieved_user, test_user);
    }

    #[test]
    fn returns_correct_count() {
        let db_connection = get_db_connection();

        let count = count_users(&db_connection).expect("Could not get user count");
        assert_eq!(0, count, "Want zero users before insertion, got {count}");

        create_user(
            &db_connection,
            "fatima",
            PasswordHash::new_unchecked("hunter2"),
            Role::Admin,
        )
        .unwrap();

        let count = count_users(&db_connection).expect("Could not get user count");
        assert_eq!(1, count, "Want one user after insertion, got {count}");
    }
}
