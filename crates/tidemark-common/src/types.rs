use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result as CrateResult};

/// Integer order key of a migration, taken from its file name. Wide enough
/// for timestamp names such as `20240101120000.sql`.
pub type Sequence = u64;

/// How the runner decides which migrations the ledger already covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackingMode {
    /// The first `latest` migrations of the ordered set count as applied.
    /// Assumes the migration directory is append-only with no gaps.
    #[default]
    Position,
    /// Migrations whose sequence is at most `latest` count as applied.
    Sequence,
}

/// SQL dialect of the ledger table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
}

impl fmt::Display for TrackingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackingMode::Position => f.write_str("position"),
            TrackingMode::Sequence => f.write_str("sequence"),
        }
    }
}

impl FromStr for TrackingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "position" => Ok(TrackingMode::Position),
            "sequence" => Ok(TrackingMode::Sequence),
            other => Err(format!("unknown tracking mode: {other}")),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Sqlite => f.write_str("sqlite"),
            Dialect::Postgres => f.write_str("postgres"),
        }
    }
}

impl FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => Err(format!("unknown dialect: {other}")),
        }
    }
}

/// Ledger table names are interpolated into SQL, so only plain identifiers
/// are accepted.
pub fn validate_table_name(name: &str) -> CrateResult<()> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::Config(format!(
            "invalid ledger table name {name:?}: expected [A-Za-z_][A-Za-z0-9_]*"
        )));
    }
    if name.len() > 63 {
        return Err(Error::Config(format!(
            "ledger table name {name:?} is longer than 63 characters"
        )));
    }
    Ok(())
}
