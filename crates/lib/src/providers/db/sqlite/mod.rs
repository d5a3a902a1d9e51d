use crate::errors::IntakeError;
use chrono::Utc;
use std::fmt::{self, Debug};
use tracing::{debug, warn};
use turso::{Connection, Database, Row, Value as TursoValue};

pub mod sql;

/// The format every timestamp column is written in. Lexical order equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A provider for interacting with a local SQLite database using Turso.
///
/// When cloned, it shares the same underlying database, allowing for concurrent and
/// shared access to the same database file or in-memory instance.
#[derive(Clone)]
pub struct SqliteProvider {
    /// The Turso database instance. It's cloneable and thread-safe.
    pub db: Database,
}

impl SqliteProvider {
    /// Creates a new `SqliteProvider` from a file path or in-memory.
    ///
    /// # Arguments
    ///
    /// * `db_path`: The path to the SQLite database file. Use ":memory:" for a unique,
    ///   isolated in-memory database. To share an in-memory database across several
    ///   handles (e.g., in tests), create one provider and then `.clone()` it.
    pub async fn new(db_path: &str) -> Result<Self, IntakeError> {
        let db = turso::Builder::new_local(db_path).build().await?;

        // Use `query` for PRAGMA statements that return a value to avoid "unexpected row" errors.
        let conn = db.connect()?;
        conn.query("PRAGMA journal_mode=WAL;", ()).await?;

        Ok(Self { db })
    }

    /// Ensures that all required application tables exist.
    /// This function is idempotent and safe to call on every application startup.
    pub async fn initialize_schema(&self) -> Result<(), IntakeError> {
        let conn = self.db.connect()?;
        for statement in sql::ALL_TABLE_CREATION_SQL {
            conn.execute(statement, ()).await?;
        }
        debug!("Database schema initialized.");
        Ok(())
    }
}

impl Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider").finish_non_exhaustive()
    }
}

impl AsRef<Database> for SqliteProvider {
    fn as_ref(&self) -> &Database {
        &self.db
    }
}

/// The current UTC time formatted for storage.
pub fn timestamp_now() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Opens a transaction on `conn`.
pub(crate) async fn begin(conn: &Connection) -> Result<(), IntakeError> {
    conn.execute("BEGIN TRANSACTION", ()).await?;
    Ok(())
}

/// Commits on success and rolls back on failure, passing the original result through.
pub(crate) async fn finish<T>(
    conn: &Connection,
    result: Result<T, IntakeError>,
) -> Result<T, IntakeError> {
    match result {
        Ok(value) => {
            conn.execute("COMMIT", ()).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = conn.execute("ROLLBACK", ()).await {
                warn!("Rollback failed after error '{e}': {rollback_err}");
            }
            Err(e)
        }
    }
}

// --- Value helpers ---

/// Binds an optional string as TEXT or NULL.
pub(crate) fn opt_text(value: Option<&str>) -> TursoValue {
    match value {
        Some(s) => TursoValue::Text(s.to_string()),
        None => TursoValue::Null,
    }
}

pub(crate) fn text(value: &str) -> TursoValue {
    TursoValue::Text(value.to_string())
}

pub(crate) fn int(value: i64) -> TursoValue {
    TursoValue::Integer(value)
}

pub(crate) fn get_i64(row: &Row, idx: usize) -> Result<i64, IntakeError> {
    match row.get_value(idx)? {
        TursoValue::Integer(i) => Ok(i),
        TursoValue::Real(f) => Ok(f as i64),
        TursoValue::Text(s) => s.trim().parse::<i64>().map_err(|_| {
            IntakeError::DataIntegrity(format!("Column {idx} is not an integer: '{s}'"))
        }),
        other => Err(IntakeError::DataIntegrity(format!(
            "Column {idx} is not an integer: {other:?}"
        ))),
    }
}

pub(crate) fn get_opt_text(row: &Row, idx: usize) -> Result<Option<String>, IntakeError> {
    Ok(match row.get_value(idx)? {
        TursoValue::Null => None,
        TursoValue::Text(s) => Some(s),
        TursoValue::Integer(i) => Some(i.to_string()),
        TursoValue::Real(f) => Some(f.to_string()),
        TursoValue::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    })
}

pub(crate) fn get_text(row: &Row, idx: usize) -> Result<String, IntakeError> {
    Ok(get_opt_text(row, idx)?.unwrap_or_default())
}

pub(crate) fn get_bool(row: &Row, idx: usize) -> Result<bool, IntakeError> {
    Ok(match row.get_value(idx)? {
        TursoValue::Integer(i) => i != 0,
        TursoValue::Text(s) => matches!(s.as_str(), "1" | "true" | "True"),
        _ => false,
    })
}
