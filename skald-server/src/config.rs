//! Service configuration
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | SKALD_DATA_DIR | /var/lib/skald | Roster, backlog and secret files |
//! | SKALD_SPOOL_DIR | <data_dir>/spool | Pre-scaled image spool |
//! | SKALD_PRINTER_HOST | 192.168.1.23 | Printer address |
//! | SKALD_PRINTER_PORT | 9100 | Printer raw TCP port |
//! | SKALD_PAPER_WIDTH | 48 | Characters per receipt line |
//! | SKALD_DEFAULT_PERMISSION | true | Permission for newly registered users |
//! | SKALD_INDICATOR_INTERVAL_SECS | 300 | Backlog attention pulse interval |
//! | SKALD_LOG_DIR | (unset) | If set, logs also roll into this directory |
//!
//! The bot token and admin id are deliberately files, not environment
//! variables: `token.txt` and `admin_id.txt` in the data directory. The
//! service refuses to start without them.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required file {path}: {source}")]
    MissingFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid admin id in {path}: {value:?}")]
    InvalidAdminId { path: PathBuf, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Roster, backlog and secret files live here
    pub data_dir: PathBuf,
    /// Pre-scaled image spool
    pub spool_dir: PathBuf,
    pub printer_host: String,
    pub printer_port: u16,
    /// Characters per receipt line
    pub paper_width: usize,
    /// Permission granted to newly registered users
    pub default_permission: bool,
    /// Backlog attention pulse interval, seconds
    pub indicator_interval_secs: u64,
    /// Optional rolling log directory
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let data_dir: PathBuf = std::env::var("SKALD_DATA_DIR")
            .unwrap_or_else(|_| "/var/lib/skald".into())
            .into();
        let spool_dir = std::env::var("SKALD_SPOOL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("spool"));

        Self {
            spool_dir,
            data_dir,
            printer_host: std::env::var("SKALD_PRINTER_HOST")
                .unwrap_or_else(|_| "192.168.1.23".into()),
            printer_port: std::env::var("SKALD_PRINTER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(9100),
            paper_width: std::env::var("SKALD_PAPER_WIDTH")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(48),
            default_permission: std::env::var("SKALD_DEFAULT_PERMISSION")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            indicator_interval_secs: std::env::var("SKALD_INDICATOR_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
            log_dir: std::env::var("SKALD_LOG_DIR").ok().map(PathBuf::from),
        }
    }
}

/// The two required secret files
#[derive(Debug, Clone)]
pub struct Secrets {
    pub bot_token: String,
    pub admin_id: i64,
}

impl Secrets {
    /// Read `token.txt` and `admin_id.txt` from the data directory.
    /// Both are required; a missing or malformed file is fatal.
    pub fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let bot_token = read_trimmed(&data_dir.join("token.txt"))?;

        let admin_path = data_dir.join("admin_id.txt");
        let raw = read_trimmed(&admin_path)?;
        let admin_id = raw.parse().map_err(|_| ConfigError::InvalidAdminId {
            path: admin_path,
            value: raw,
        })?;

        Ok(Self {
            bot_token,
            admin_id,
        })
    }
}

fn read_trimmed(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| ConfigError::MissingFile {
            path: path.to_path_buf(),
            source,
        })
}
