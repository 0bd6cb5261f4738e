use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tidemark_common::{Dialect, Error, Result, TrackingMode, validate_table_name};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub migrations: MigrationsConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory holding `<sequence>.sql` files.
    pub dir: PathBuf,
    pub tracking: TrackingMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file. Required before running.
    pub path: Option<PathBuf>,
    pub dialect: Dialect,
    pub ledger_table: String,
    /// Deadline for a whole run, in seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("migrations"),
            tracking: TrackingMode::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            dialect: Dialect::default(),
            ledger_table: "migrations".to_string(),
            timeout_secs: None,
        }
    }
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.migrations.dir.as_os_str().is_empty() {
            return Err(Error::Config("migrations.dir cannot be empty".into()));
        }
        if self.database.timeout_secs == Some(0) {
            return Err(Error::Config(
                "database.timeout_secs must be greater than zero".into(),
            ));
        }
        validate_table_name(&self.database.ledger_table)
    }

    /// Resolve relative paths against `base`, the directory of the file the
    /// config was read from.
    pub fn resolve_relative_to(mut self, base: &Path) -> Self {
        if self.migrations.dir.is_relative() {
            self.migrations.dir = base.join(&self.migrations.dir);
        }
        if let Some(path) = self.database.path.take() {
            self.database.path = Some(if path.is_relative() {
                base.join(path)
            } else {
                path
            });
        }
        self
    }
}
