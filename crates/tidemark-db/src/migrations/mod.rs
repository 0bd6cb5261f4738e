//! Migration system for discovering and applying SQL schema changes.
//!
//! Each migration lives in its own file named `<sequence>.<ext>`, holding
//! the up body, the split marker, then the down body. Migrations are applied
//! in ascending sequence order and tracked in a ledger table.

mod order;
mod runner;
mod source;

pub use order::{MigrationSet, load, order};
pub use runner::{MigrationStatus, Migrator, RunReport, initialize};
pub use source::{
    Migration, SPLIT_MARKER, load_dir, parse_file, sequence_from_path, split_body,
};
