use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tidemark_common::{Context, Error, Result, Sequence, TrackingMode};
use tracing::{info, warn};

use super::order::{MigrationSet, load};
use crate::database::Database;
use crate::ledger::LedgerAdapter;

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Highest sequence in the ledger when the run started, `0` if none.
    pub latest_before: Sequence,
    pub skipped: Vec<Sequence>,
    pub applied: Vec<Sequence>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u128,
}

/// Applied or pending state of one migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationStatus {
    pub sequence: Sequence,
    pub path: PathBuf,
    pub applied: bool,
}

/// Applies pending migrations from a directory, one at a time.
#[derive(Debug, Clone, Default)]
pub struct Migrator {
    tracking: TrackingMode,
}

/// Apply every pending migration in `dir` with the default [`Migrator`].
pub fn initialize(
    ctx: &Context,
    dir: &Path,
    db: &dyn Database,
    ledger: &dyn LedgerAdapter,
) -> Result<RunReport> {
    Migrator::new().run(ctx, dir, db, ledger)
}

impl Migrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tracking(mut self, tracking: TrackingMode) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn tracking(&self) -> TrackingMode {
        self.tracking
    }

    /// Run all pending migrations in ascending order, recording each one in
    /// the ledger right after its up body succeeds.
    ///
    /// The directory is loaded before any statement is sent, so a bad
    /// migration file leaves the database untouched. The first failure stops
    /// the run; migrations applied before it stay applied.
    pub fn run(
        &self,
        ctx: &Context,
        dir: &Path,
        db: &dyn Database,
        ledger: &dyn LedgerAdapter,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        let set = load(dir)?;
        let latest = self.prepare_ledger(ctx, db, ledger)?;
        let (done, pending) = set.as_slice().split_at(self.applied_count(&set, latest));

        for migration in done {
            info!("already applied migration {}", migration.sequence);
        }

        let insert = ledger.insert_sequence_statement();
        let mut applied = Vec::with_capacity(pending.len());
        for migration in pending {
            info!("running migration {}", migration.sequence);

            let bound = i64::try_from(migration.sequence).map_err(|_| Error::LedgerWrite {
                sequence: migration.sequence,
                source: Box::new(Error::Database(format!(
                    "sequence {} exceeds the ledger's integer range",
                    migration.sequence
                ))),
            })?;
            db.execute_batch(ctx, &migration.up)
                .map_err(|e| Error::MigrationExec {
                    sequence: migration.sequence,
                    path: migration.path.clone(),
                    source: Box::new(e),
                })?;

            db.execute(ctx, &insert, &[bound])
                .map_err(|e| Error::LedgerWrite {
                    sequence: migration.sequence,
                    source: Box::new(e),
                })?;

            applied.push(migration.sequence);
        }

        info!(
            backend = db.backend(),
            applied = applied.len(),
            skipped = done.len(),
            "migrations complete"
        );

        Ok(RunReport {
            latest_before: latest.unwrap_or(0),
            skipped: done.iter().map(|m| m.sequence).collect(),
            applied,
            started_at,
            elapsed_ms: start.elapsed().as_millis(),
        })
    }

    /// Report which migrations in `dir` the ledger covers, without running
    /// any of them.
    ///
    /// This still executes the adapter's idempotent create-table statement,
    /// so a database with no ledger gets an empty ledger table (and, for a
    /// file-backed SQLite database, the file itself). No up body or ledger
    /// row is ever written.
    pub fn status(
        &self,
        ctx: &Context,
        dir: &Path,
        db: &dyn Database,
        ledger: &dyn LedgerAdapter,
    ) -> Result<Vec<MigrationStatus>> {
        let set = load(dir)?;
        let latest = self.prepare_ledger(ctx, db, ledger)?;
        let applied_count = self.applied_count(&set, latest);

        Ok(set
            .into_vec()
            .into_iter()
            .enumerate()
            .map(|(index, migration)| MigrationStatus {
                sequence: migration.sequence,
                path: migration.path,
                applied: index < applied_count,
            })
            .collect())
    }

    /// Ensure the ledger table exists and read the latest recorded sequence.
    fn prepare_ledger(
        &self,
        ctx: &Context,
        db: &dyn Database,
        ledger: &dyn LedgerAdapter,
    ) -> Result<Option<Sequence>> {
        db.execute_batch(ctx, &ledger.create_table_statement())
            .map_err(|e| Error::LedgerInit {
                source: Box::new(e),
            })?;

        let latest = db
            .query_optional_i64(ctx, &ledger.latest_sequence_query())
            .map_err(|e| Error::LedgerRead {
                source: Box::new(e),
            })?;

        latest
            .map(|value| {
                Sequence::try_from(value).map_err(|_| Error::LedgerRead {
                    source: Box::new(Error::Database(format!(
                        "ledger holds invalid sequence {value}"
                    ))),
                })
            })
            .transpose()
    }

    /// Length of the already-applied prefix of `set`.
    fn applied_count(&self, set: &MigrationSet, latest: Option<Sequence>) -> usize {
        match self.tracking {
            TrackingMode::Position => {
                let latest = latest.unwrap_or(0);
                let count = match usize::try_from(latest) {
                    Ok(count) if count <= set.len() => count,
                    _ => {
                        warn!(
                            "ledger records {latest} migrations but only {} exist; treating all as applied",
                            set.len()
                        );
                        return set.len();
                    }
                };
                if let Some(last) = count.checked_sub(1).map(|i| &set.as_slice()[i]) {
                    if last.sequence != latest {
                        warn!(
                            "ledger latest is {latest} but migration at that position is {}; \
                             positional tracking assumes gap-free sequences",
                            last.sequence
                        );
                    }
                }
                count
            }
            TrackingMode::Sequence => match latest {
                Some(latest) => set.as_slice().partition_point(|m| m.sequence <= latest),
                None => 0,
            },
        }
    }
}
