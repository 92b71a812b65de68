//! The scheduled backup job.
//!
//! Produces timestamped, gzip-compressed copies of the application database
//! and retains a configurable number of the most recent ones. The source
//! database is health-checked with a fixed connection timeout before the dump.
//! Compression failure is non-fatal; the uncompressed dump is kept instead.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use flate2::{Compression, write::GzEncoder};
use rusqlite::{Connection, OpenFlags, backup::Backup};
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

/// How long the health check waits for a locked database before giving up.
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Timestamp embedded in backup file names; lexicographic order is
/// chronological order.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year][month][day]-[hour][minute][second][subsecond digits:3]");

const BACKUP_FILE_PREFIX: &str = "mizan-";

/// Settings for one backup run.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// File path to the application SQLite database.
    pub db_path: PathBuf,
    /// The directory where dumps are written.
    pub backup_dir: PathBuf,
    /// How many of the most recent backups to retain.
    pub keep: usize,
}

/// The errors that may occur while taking a backup.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// A file or directory could not be read or written.
    #[error("backup IO error: {0}")]
    Io(#[from] io::Error),

    /// The source database failed the health check or the dump itself failed.
    #[error("backup database error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// The dump completed but produced an empty file.
    #[error("backup produced an empty dump at {0}")]
    EmptyDump(PathBuf),
}

fn health_check(db_path: &Path) -> Result<(), BackupError> {
    let connection = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    connection.busy_timeout(HEALTH_CHECK_TIMEOUT)?;
    connection.query_row("SELECT 1", [], |_| Ok(()))?;

    Ok(())
}

fn dump_database(db_path: &Path, dump_path: &Path) -> Result<(), BackupError> {
    let source = Connection::open_with_flags(db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut destination = Connection::open(dump_path)?;

    let backup = Backup::new(&source, &mut destination)?;
    backup.run_to_completion(64, Duration::ZERO, None)?;

    Ok(())
}

fn compress_dump(dump_path: &Path) -> Result<PathBuf, io::Error> {
    let gz_path = dump_path.with_extension("db.gz");

    let mut input = File::open(dump_path)?;
    let output = File::create(&gz_path)?;
    let mut encoder = GzEncoder::new(output, Compression::default());
    io::copy(&mut input, &mut encoder)?;
    encoder.finish()?;

    Ok(gz_path)
}

fn prune_old_backups(backup_dir: &Path, keep: usize) -> Result<usize, io::Error> {
    let mut backups: Vec<PathBuf> = fs::read_dir(backup_dir)?
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(BACKUP_FILE_PREFIX))
        })
        .collect();

    // File names embed the timestamp, so sorting by name sorts by age.
    backups.sort();
    backups.reverse();

    let mut removed = 0;
    for stale in backups.iter().skip(keep) {
        fs::remove_file(stale)?;
        tracing::info!("Removed old backup {}", stale.display());
        removed += 1;
    }

    Ok(removed)
}

/// Take one backup: health check, dump, compress, prune.
///
/// Returns the path of the finished backup file. Compression failure is
/// demoted to a warning and the uncompressed dump is kept.
///
/// # Errors
///
/// Returns a [BackupError] when the source database fails the health check,
/// the dump fails or produces an empty file, or the backup directory cannot be
/// written.
pub fn run_backup(config: &BackupConfig) -> Result<PathBuf, BackupError> {
    health_check(&config.db_path)?;

    fs::create_dir_all(&config.backup_dir)?;

    let timestamp = OffsetDateTime::now_utc()
        .format(TIMESTAMP_FORMAT)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string());
    let dump_path = config
        .backup_dir
        .join(format!("{BACKUP_FILE_PREFIX}{timestamp}.db"));

    dump_database(&config.db_path, &dump_path)?;

    let dump_size = fs::metadata(&dump_path)?.len();
    if dump_size == 0 {
        return Err(BackupError::EmptyDump(dump_path));
    }

    let final_path = match compress_dump(&dump_path) {
        Ok(gz_path) => {
            fs::remove_file(&dump_path)?;
            gz_path
        }
        Err(error) => {
            tracing::warn!(
                "Could not compress dump {}: {error}. Keeping the uncompressed dump.",
                dump_path.display()
            );
            dump_path
        }
    };

    prune_old_backups(&config.backup_dir, config.keep)?;

    tracing::info!("Backup written to {}", final_path.display());

    Ok(final_path)
}
