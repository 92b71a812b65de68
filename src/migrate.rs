//! The sequential SQL migration runner.
//!
//! Migrations are plain `.sql` files applied in lexicographic order. Applied
//! file names are recorded in a tracking table so a file only ever runs once.
//! Each file runs inside its own transaction together with its tracking row;
//! the first failure rolls that file back and aborts the whole run. There is
//! no guard against concurrent runs; the runner assumes a single invocation.

use std::{fs, io, path::Path};

use rusqlite::Connection;
use time::OffsetDateTime;

/// The errors that may occur while running migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// The migrations directory could not be read.
    #[error("could not read migrations directory: {0}")]
    Io(#[from] io::Error),

    /// A migration file failed; its statements were rolled back.
    #[error("migration {file} failed: {source}")]
    Sql {
        /// The migration file that failed.
        file: String,
        /// The database error that aborted the run.
        source: rusqlite::Error,
    },

    /// An error outside any single migration file, e.g. creating the tracking
    /// table.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(#[from] rusqlite::Error),
}

/// The outcome of a successful migration run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Files applied by this run, in order.
    pub applied: Vec<String>,
    /// Files skipped because they were already recorded as applied.
    pub skipped: Vec<String>,
}

/// Create the tracking table that records applied migration files.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_migrations_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
                filename TEXT PRIMARY KEY,
                applied_at INTEGER NOT NULL
                )",
        (),
    )?;

    Ok(())
}

fn is_applied(connection: &Connection, filename: &str) -> Result<bool, rusqlite::Error> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM schema_migrations WHERE filename = ?1",
        (filename,),
        |row| row.get(0),
    )?;

    Ok(count > 0)
}

fn collect_migration_files(directory: &Path) -> Result<Vec<(String, std::path::PathBuf)>, io::Error> {
    let mut files: Vec<(String, std::path::PathBuf)> = fs::read_dir(directory)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|extension| extension == "sql"))
        .map(|path| {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            (name, path)
        })
        .collect();

    files.sort();

    Ok(files)
}

/// Apply all pending `.sql` files from `directory` to the database.
///
/// Already-recorded files are reported as skipped. Each pending file runs in
/// its own transaction together with its tracking row, so a failing file
/// leaves no trace. The run stops at the first failure; subsequent files are
/// not attempted.
///
/// # Errors
///
/// Returns a [MigrationError] naming the failing file, or an IO error when the
/// directory cannot be read.
pub fn run_migrations(
    connection: &mut Connection,
    directory: &Path,
) -> Result<MigrationReport, MigrationError> {
    create_migrations_table(connection)?;

    let files = collect_migration_files(directory)?;
    let mut report = MigrationReport::default();

    for (name, path) in files {
        if is_applied(connection, &name)? {
            report.skipped.push(name);
            continue;
        }

        let sql = fs::read_to_string(&path)?;
        let applied_at = OffsetDateTime::now_utc().unix_timestamp();

        // The transaction rolls back on drop unless committed, taking the
        // half-applied file's statements with it.
        let transaction = connection.transaction()?;
        transaction
            .execute_batch(&sql)
            .map_err(|source| MigrationError::Sql {
                file: name.clone(),
                source,
            })?;
        transaction.execute(
            "INSERT INTO schema_migrations (filename, applied_at) VALUES (?1, ?2)",
            (&name, applied_at),
        )?;
        transaction.commit()?;

        report.applied.push(name);
    }

    Ok(report)
}

#[cfg(test)]
mod run_migrations_tests {
    use std::fs;

    use rusqlite::Connection;
    use tempfile::TempDir;

    use super::{MigrationError, run_migrations};

    fn write_migration(directory: &TempDir, name: &str, sql: &str) {
        fs::write(directory.path().join(name), sql).expect("Could not write migration file");
    }

    fn get_db_connection() -> Connection {
        Connection::open_in_memory().expect("Could not create in-memory SQLite database")
    }

    #[test]
    fn applies_files_in_lexicographic_order() {
        let directory = TempDir::new().unwrap();
        write_migration(
            &directory,
            "002_add_color.sql",
            "ALTER TABLE fruit ADD COLUMN color TEXT;",
        );
        write_migration(
            &directory,
            "001_create_fruit.sql",
            "CREATE TABLE fruit (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
        );
        let mut conn = get_db_connection();

        let report = run_migrations(&mut conn, directory.path()).unwrap();

        assert_eq!(report.applied, ["001_create_fruit.sql", "002_add_color.sql"]);
        assert!(report.skipped.is_empty());

        // Both statements took effect.
        conn.execute("INSERT INTO fruit (name, color) VALUES ('fig', 'purple')", ())
            .unwrap();
    }

    #[test]
    fn second_run_skips_applied_files() {
        let directory = TempDir::new().unwrap();
        write_migration(
            &directory,
            "001_create_fruit.sql",
            "CREATE TABLE fruit (id INTEGER PRIMARY KEY);",
        );
        let mut conn = get_db_connection();

        run_migrations(&mut conn, directory.path()).unwrap();

        write_migration(
            &directory,
            "002_create_veg.sql",
            "CREATE TABLE veg (id INTEGER PRIMARY KEY);",
        );
        let report = run_migrations(&mut conn, directory.path()).unwrap();

        assert_eq!(report.skipped, ["001_create_fruit.sql"]);
        assert_eq!(report.applied, ["002_create_veg.sql"]);
    }

    #[test]
    fn failing_file_is_rolled_back_and_aborts_the_run() {
        let directory = TempDir::new().unwrap();
        write_migration(
            &directory,
            "001_partial.sql",
            "CREATE TABLE fruit (id INTEGER PRIMARY KEY);
             CREATE TABLE nope (id INTEGER PRIMARY KEY, REFERENCES garbage);",
        );
        write_migration(
            &directory,
            "002_never_runs.sql",
            "CREATE TABLE veg (id INTEGER PRIMARY KEY);",
        );
        let mut conn = get_db_connection();

        let result = run_migrations(&mut conn, directory.path());

        match result {
            Err(MigrationError::Sql { file, .. }) => assert_eq!(file, "001_partial.sql"),
            other => panic!("want MigrationError::Sql, got {other:?}"),
        }

        // The failing file's earlier statement was rolled back, and the later
        // file never ran.
        let table_count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                    WHERE type = 'table' AND name IN ('fruit', 'veg')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(table_count, 0);

        // Nothing was recorded as applied.
        let applied_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied_count, 0);
    }

    #[test]
    fn non_sql_files_are_ignored() {
        let directory = TempDir::new().unwrap();
        write_migration(&directory, "README.md", "not a migration");
        write_migration(
            &directory,
            "001_create_fruit.sql",
            "CREATE TABLE fruit (id INTEGER PRIMARY KEY);",
        );
        let mut conn = get_db_connection();

        let report = run_migrations(&mut conn, directory.path()).unwrap();

        assert_eq!(report.applied, ["001_create_fruit.sql"]);
    }

    #[test]
    fn empty_directory_is_a_successful_noop() {
        let directory = TempDir::new().unwrap();
        let mut conn = get_db_connection();

        let report = run_migrations(&mut conn, directory.path()).unwrap();

        assert!(report.applied.is_empty());
        assert!(report.skipped.is_empty());
    }
}
