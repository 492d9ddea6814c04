use thiserror::Error;

/// Errors surfaced by the library database.
///
/// Absence is never an error: lookups return `Ok(None)` or an empty list
/// when nothing matches, and error values are reserved for engine-level
/// failures.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
