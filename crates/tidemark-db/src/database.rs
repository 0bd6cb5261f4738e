use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, params_from_iter};
use tidemark_common::{Context, Error, Result};
use tracing::{debug, info};

/// Number of SQLite VM instructions between context checks while a
/// statement is running.
const PROGRESS_OPS: i32 = 1_000;

/// Blocking execution capability the migration runner drives.
///
/// Every call takes a [`Context`]; an implementation must refuse to start
/// work on a done context and should abort in-flight work when it becomes
/// done.
pub trait Database {
    /// Execute one or more `;`-separated statements without parameters.
    fn execute_batch(&self, ctx: &Context, sql: &str) -> Result<()>;

    /// Execute a single parameterized statement, returning affected rows.
    fn execute(&self, ctx: &Context, sql: &str, params: &[i64]) -> Result<usize>;

    /// Run a query yielding at most one row with one integer column.
    /// No row, or a NULL value, yields `None`.
    fn query_optional_i64(&self, ctx: &Context, sql: &str) -> Result<Option<i64>>;

    /// Backend identifier for logging.
    fn backend(&self) -> &'static str;
}

/// SQLite-backed [`Database`].
pub struct SqliteDatabase {
    conn: Mutex<Connection>,
}

impl SqliteDatabase {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self::from_connection(conn))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self::from_connection(conn))
    }

    /// Wrap a connection the caller already configured.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Database("database lock poisoned".into()))
    }

    /// Run `op` with a progress handler that interrupts it once `ctx` is
    /// done. An interrupted statement reports the context's error rather
    /// than SQLite's.
    fn guarded<T>(
        &self,
        ctx: &Context,
        what: &str,
        op: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        ctx.check()?;
        let conn = self.connection()?;

        let watch = ctx.clone();
        conn.progress_handler(PROGRESS_OPS, Some(move || watch.is_done()));
        let result = op(&conn);
        conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|e| match ctx.check() {
            Err(done) => {
                debug!("{what} interrupted: {e}");
                done
            }
            Ok(()) => Error::Database(format!("{what}: {e}")),
        })
    }
}

impl Database for SqliteDatabase {
    fn execute_batch(&self, ctx: &Context, sql: &str) -> Result<()> {
        self.guarded(ctx, "failed to execute statements", |conn| {
            conn.execute_batch(sql)
        })
    }

    fn execute(&self, ctx: &Context, sql: &str, params: &[i64]) -> Result<usize> {
        self.guarded(ctx, "failed to execute statement", |conn| {
            conn.execute(sql, params_from_iter(params.iter()))
        })
    }

    fn query_optional_i64(&self, ctx: &Context, sql: &str) -> Result<Option<i64>> {
        let value = self.guarded(ctx, "failed to query", |conn| {
            conn.query_row(sql, [], |row| row.get::<_, Option<i64>>(0))
                .optional()
        })?;
        Ok(value.flatten())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn execute_binds_integer_parameters() {
        let db = SqliteDatabase::in_memory().unwrap();
        let ctx = Context::background();
        db.execute_batch(&ctx, "CREATE TABLE t (n int);").unwrap();

        let changed = db
            .execute(&ctx, "INSERT INTO t (n) VALUES (?)", &[42])
            .unwrap();
        assert_eq!(changed, 1);

        let n = db.query_optional_i64(&ctx, "SELECT n FROM t").unwrap();
        assert_eq!(n, Some(42));
    }

    #[test]
    fn query_without_rows_returns_none() {
        let db = SqliteDatabase::in_memory().unwrap();
        let ctx = Context::background();
        db.execute_batch(&ctx, "CREATE TABLE t (n int);").unwrap();

        assert_eq!(db.query_optional_i64(&ctx, "SELECT n FROM t").unwrap(), None);
        // Aggregates over an empty table produce a NULL row.
        assert_eq!(
            db.query_optional_i64(&ctx, "SELECT MAX(n) FROM t").unwrap(),
            None
        );
    }

    #[test]
    fn invalid_sql_is_a_database_error() {
        let db = SqliteDatabase::in_memory().unwrap();
        let err = db
            .execute_batch(&Context::background(), "NOT VALID SQL")
            .unwrap_err();
        assert!(matches!(err, Error::Database(_)), "got {err:?}");
    }

    #[test]
    fn done_context_refuses_to_start() {
        let db = SqliteDatabase::in_memory().unwrap();
        let ctx = Context::background();
        ctx.cancel_handle().cancel();

        let err = db.execute_batch(&ctx, "CREATE TABLE t (n int);").unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        let exists = db
            .query_optional_i64(
                &Context::background(),
                "SELECT count(*) FROM sqlite_master WHERE name = 't'",
            )
            .unwrap();
        assert_eq!(exists, Some(0));
    }

    #[test]
    fn deadline_interrupts_running_statement() {
        let db = SqliteDatabase::in_memory().unwrap();
        let ctx = Context::with_timeout(Duration::from_millis(50));

        let err = db
            .query_optional_i64(
                &ctx,
                "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c)
                 SELECT count(*) FROM c",
            )
            .unwrap_err();
        assert!(matches!(err, Error::DeadlineExceeded), "got {err:?}");

        // The handler is removed afterwards, so the connection stays usable.
        let one = db
            .query_optional_i64(&Context::background(), "SELECT 1")
            .unwrap();
        assert_eq!(one, Some(1));
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.db");
        let db = SqliteDatabase::open(&path).unwrap();
        db.execute_batch(&Context::background(), "CREATE TABLE t (n int);")
            .unwrap();
        assert!(path.exists());
        assert_eq!(db.backend(), "sqlite");
    }
}
