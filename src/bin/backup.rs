use std::{fs::OpenOptions, path::PathBuf, process::exit, sync::Arc};

use clap::Parser;
use tracing_subscriber::{Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use mizan::{BackupConfig, Config, run_backup};

/// A utility that dumps the application database to a timestamped,
/// gzip-compressed backup file. Intended to be run on a schedule (cron).
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database. Overrides MIZAN_DB_PATH.
    #[arg(long)]
    db_path: Option<String>,

    /// The directory to write backups to. Overrides MIZAN_BACKUP_DIR.
    #[arg(long)]
    backup_dir: Option<PathBuf>,

    /// How many of the most recent backups to retain. Overrides
    /// MIZAN_BACKUP_KEEP.
    #[arg(long)]
    keep: Option<usize>,
}

fn main() {
    let args = Args::parse();
    let config = Config::from_env();

    setup_logging(&config.backup_log);

    let db_path = args
        .db_path
        .map(PathBuf::from)
        .or(config.db_path)
        .unwrap_or_else(|| {
            eprintln!("A database path is required: pass --db-path or set MIZAN_DB_PATH.");
            exit(1);
        });

    let backup_config = BackupConfig {
        db_path,
        backup_dir: args.backup_dir.unwrap_or(config.backup_dir),
        keep: args.keep.unwrap_or(config.backup_keep),
    };

    match run_backup(&backup_config) {
        Ok(backup_path) => {
            tracing::info!("Backup finished: {}", backup_path.display());
        }
        Err(error) => {
            tracing::error!("Backup failed: {error}");
            exit(1);
        }
    }
}

fn setup_logging(log_path: &std::path::Path) {
    let stdout_log = tracing_subscriber::fmt::layer().pretty();

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .expect("Could not create log file");

    let file_log = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(Arc::new(log_file));

    tracing_subscriber::registry()
        .with(
            stdout_log
                .with_filter(filter::LevelFilter::INFO)
                .and_then(file_log)
                .with_filter(filter::LevelFilter::DEBUG),
        )
        .init();
}
