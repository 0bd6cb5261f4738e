pub mod database;
pub mod ledger;
pub mod migrations;

pub use database::{Database, SqliteDatabase};
pub use ledger::{DEFAULT_LEDGER_TABLE, LedgerAdapter, PostgresLedger, SqliteLedger, ledger_for};
pub use migrations::{
    Migration, MigrationSet, MigrationStatus, Migrator, RunReport, SPLIT_MARKER, initialize, load,
    order,
};
