//! Dialect-specific SQL for the table that records applied migrations.
//!
//! The runner treats every string returned here as opaque text to execute.

use tidemark_common::{Dialect, Result, validate_table_name};

pub const DEFAULT_LEDGER_TABLE: &str = "migrations";

/// Ledger DDL/DML for one SQL dialect.
pub trait LedgerAdapter {
    /// Idempotent DDL ensuring the ledger table exists.
    fn create_table_statement(&self) -> String;

    /// Query yielding at most one row holding the highest recorded sequence.
    fn latest_sequence_query(&self) -> String;

    /// Statement recording one sequence, bound as its only parameter.
    fn insert_sequence_statement(&self) -> String;
}

/// Ledger for SQLite databases.
#[derive(Debug, Clone)]
pub struct SqliteLedger {
    table: String,
}

/// Ledger for PostgreSQL databases.
#[derive(Debug, Clone)]
pub struct PostgresLedger {
    table: String,
}

impl SqliteLedger {
    pub fn new() -> Self {
        Self {
            table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }

    pub fn with_table(table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl Default for SqliteLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerAdapter for SqliteLedger {
    fn create_table_statement(&self) -> String {
        format!("CREATE TABLE IF NOT EXISTS {} (number int)", self.table)
    }

    fn latest_sequence_query(&self) -> String {
        format!(
            "SELECT number FROM {} ORDER BY number DESC LIMIT 1",
            self.table
        )
    }

    fn insert_sequence_statement(&self) -> String {
        format!("INSERT INTO {} (number) VALUES (?)", self.table)
    }
}

impl PostgresLedger {
    pub fn new() -> Self {
        Self {
            table: DEFAULT_LEDGER_TABLE.to_string(),
        }
    }

    pub fn with_table(table: &str) -> Result<Self> {
        validate_table_name(table)?;
        Ok(Self {
            table: table.to_string(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl Default for PostgresLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl LedgerAdapter for PostgresLedger {
    fn create_table_statement(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (number bigint NOT NULL)",
            self.table
        )
    }

    fn latest_sequence_query(&self) -> String {
        format!(
            "SELECT number FROM {} ORDER BY number DESC LIMIT 1",
            self.table
        )
    }

    fn insert_sequence_statement(&self) -> String {
        format!("INSERT INTO {} (number) VALUES ($1)", self.table)
    }
}

/// Build the ledger adapter for `dialect` over `table`.
pub fn ledger_for(dialect: Dialect, table: &str) -> Result<Box<dyn LedgerAdapter>> {
    Ok(match dialect {
        Dialect::Sqlite => Box::new(SqliteLedger::with_table(table)?),
        Dialect::Postgres => Box::new(PostgresLedger::with_table(table)?),
    })
}
