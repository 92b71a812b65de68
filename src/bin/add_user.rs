use std::{
    error::Error,
    io::{self},
    path::{Path, PathBuf},
    process::exit,
};

use bcrypt::DEFAULT_COST;
use clap::Parser;
use rusqlite::Connection;

use mizan::{
    Config, PasswordHash, Role, ValidatedPassword, count_users, create_user, initialize_db,
};

/// A utility for adding a user to the application database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database. Overrides MIZAN_DB_PATH.
    #[arg(long)]
    db_path: Option<String>,

    /// The name the new user will log in with.
    #[arg(long)]
    username: String,

    /// The role to give the new user.
    #[arg(long, default_value = "accountant")]
    role: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = Config::from_env();

    let db_path = args
        .db_path
        .map(PathBuf::from)
        .or(config.db_path)
        .unwrap_or_else(|| {
            print_error("A database path is required: pass --db-path or set MIZAN_DB_PATH.");
            exit(1);
        });
    validate_db_path(&db_path);

    let role: Role = match args.role.parse() {
        Ok(role) => role,
        Err(error) => {
            print_error(error);
            exit(1);
        }
    };

    let password_hash = match get_new_password_hash() {
        Some(password_hash) => password_hash,
        None => return Ok(()),
    };

    let conn = Connection::open(&db_path)
        .unwrap_or_else(|_| panic!("Could not open the database at {db_path:?}"));
    initialize_db(&conn)?;

    let user = create_user(&conn, &args.username, password_hash, role)?;
    let total = count_users(&conn)?;
    println!(
        "Created user {} with role {}. The database now has {total} user(s).",
        user.username, user.role
    );

    Ok(())
}

fn validate_db_path(db_path: &Path) {
    match db_path.extension() {
        None => {
            print_error("Database path must include a file extension (e.g., 'mizan.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            print_error("Database path must include a file extension (e.g., 'mizan.db').");
            exit(1);
        }
        _ => {}
    }
}

fn get_new_password_hash() -> Option<PasswordHash> {
    loop {
        println!();

        let first_password = match rpassword::prompt_password("Enter a password: ") {
            Ok(string) => string,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return None;
            }
            Err(error) => {
                print_error(format!("Could not read password from stdin: {error}"));
                return None;
            }
        };

        if let Err(error) = ValidatedPassword::new(&first_password) {
            print_error(error);
            continue;
        }

        let second_password = match rpassword::prompt_password("Enter the same password again: ") {
            Ok(string) => string,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return None;
            }
            Err(error) => {
                print_error(format!("Could not read password from stdin: {error}"));
                return None;
            }
        };

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        let password_hash = match PasswordHash::from_raw_password(&first_password, DEFAULT_COST) {
            Ok(password_hash) => password_hash,
            Err(error) => {
                print_error(format!("Could not hash password: {error}. Try again."));
                continue;
            }
        };

        return Some(password_hash);
    }
}

fn print_error(error: impl ToString) {
    eprintln!(
        "\x1b[31;1m{}\x1b[0m",
        capitalise_first_char(&error.to_string())
    )
}

/// From https://crates.io/crates/capitalize
fn capitalise_first_char(string: &str) -> String {
    let mut chars = string.chars();
    let Some(first) = chars.next() else {
        return String::with_capacity(0);
    };
    first.to_uppercase().chain(chars).collect()
}
