use std::path::PathBuf;

use thiserror::Error;

use crate::types::Sequence;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A migration file name whose stem is not an integer.
    #[error("malformed migration filename {}: expected <integer>.<ext>", path.display())]
    MalformedFilename { path: PathBuf },

    /// A migration file without the split marker between its up and down bodies.
    #[error("migration {} has no down section (missing split marker)", path.display())]
    MissingDownSection { path: PathBuf },

    #[error(
        "duplicate migration sequence {sequence}: {} and {}",
        first.display(),
        second.display()
    )]
    DuplicateSequence {
        sequence: Sequence,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("failed to read migration source {}: {source}", path.display())]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create migration ledger: {source}")]
    LedgerInit {
        #[source]
        source: Box<Error>,
    },

    #[error("failed to read latest applied migration: {source}")]
    LedgerRead {
        #[source]
        source: Box<Error>,
    },

    #[error("migration {sequence} ({}) failed: {source}", path.display())]
    MigrationExec {
        sequence: Sequence,
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },

    /// The up body ran but its ledger row was not written.
    #[error("migration {sequence} was applied but could not be recorded: {source}")]
    LedgerWrite {
        sequence: Sequence,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// True for failures raised by a cancelled or expired [`crate::Context`],
    /// including when they are wrapped by a run phase.
    pub fn is_cancellation(&self) -> bool {
        match self {
            Error::Cancelled | Error::DeadlineExceeded => true,
            Error::LedgerInit { source }
            | Error::LedgerRead { source }
            | Error::MigrationExec { source, .. }
            | Error::LedgerWrite { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }
}
