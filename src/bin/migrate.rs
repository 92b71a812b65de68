use std::{path::PathBuf, process::exit};

use clap::Parser;
use rusqlite::Connection;

use mizan::{Config, run_migrations};

/// A utility for applying pending SQL migration files to the application
/// database.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database. Overrides MIZAN_DB_PATH.
    #[arg(long)]
    db_path: Option<String>,

    /// The directory holding the `.sql` migration files.
    #[arg(long, default_value = "migrations")]
    migrations_dir: PathBuf,
}

fn main() {
    let args = Args::parse();
    let config = Config::from_env();

    let db_path = args
        .db_path
        .map(PathBuf::from)
        .or(config.db_path)
        .unwrap_or_else(|| {
            eprintln!("A database path is required: pass --db-path or set MIZAN_DB_PATH.");
            exit(1);
        });

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(error) => {
            eprintln!("Could not open the database at {}: {error}", db_path.display());
            exit(1);
        }
    };

    let report = match run_migrations(&mut conn, &args.migrations_dir) {
        Ok(report) => report,
        Err(error) => {
            eprintln!("{error}");
            exit(1);
        }
    };

    for filename in &report.skipped {
        println!("skipped {filename} (already applied)");
    }
    for filename in &report.applied {
        println!("applied {filename}");
    }
    println!(
        "{} applied, {} skipped",
        report.applied.len(),
        report.skipped.len()
    );
}
