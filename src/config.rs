//! Environment-style key/value configuration for the application binaries.

use std::{env, path::PathBuf};

/// The environment variable that holds the SQLite database file path.
pub const ENV_DB_PATH: &str = "MIZAN_DB_PATH";
/// The environment variable that holds the cookie signing secret.
pub const ENV_SECRET: &str = "MIZAN_SECRET";
/// The environment variable that overrides the CSRF token field name.
pub const ENV_CSRF_FIELD: &str = "MIZAN_CSRF_FIELD";
/// The environment variable that holds the backup output directory.
pub const ENV_BACKUP_DIR: &str = "MIZAN_BACKUP_DIR";
/// The environment variable that holds the number of backups to retain.
pub const ENV_BACKUP_KEEP: &str = "MIZAN_BACKUP_KEEP";
/// The environment variable that holds the backup job's log file path.
pub const ENV_BACKUP_LOG: &str = "MIZAN_BACKUP_LOG";

const DEFAULT_CSRF_FIELD: &str = "csrf_token";
const DEFAULT_BACKUP_DIR: &str = "backups";
const DEFAULT_BACKUP_KEEP: usize = 7;
const DEFAULT_BACKUP_LOG: &str = "backup.log";

/// Application settings read from environment variables.
///
/// Optional keys fall back to defaults. The cookie secret is optional here
/// because only the server binary needs it; it enforces the key's presence at
/// startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// File path to the application SQLite database.
    pub db_path: Option<PathBuf>,
    /// The secret used to derive the cookie signing key.
    pub secret: Option<String>,
    /// The form/query field name that carries the CSRF token.
    pub csrf_field: String,
    /// The directory where the backup job writes its dumps.
    pub backup_dir: PathBuf,
    /// How many of the most recent backups to retain.
    pub backup_keep: usize,
    /// The log file the backup job appends to.
    pub backup_log: PathBuf,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            db_path: env::var(ENV_DB_PATH).ok().map(PathBuf::from),
            secret: env::var(ENV_SECRET).ok(),
            csrf_field: env::var(ENV_CSRF_FIELD)
                .unwrap_or_else(|_| DEFAULT_CSRF_FIELD.to_owned()),
            backup_dir: env::var(ENV_BACKUP_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_BACKUP_DIR)),
            backup_keep: env::var(ENV_BACKUP_KEEP)
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(DEFAULT_BACKUP_KEEP),
            backup_log: env::var(ENV_BACKUP_LOG)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_BACKUP_LOG)),
        }
    }
}
