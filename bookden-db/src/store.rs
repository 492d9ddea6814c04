//! Connection lifecycle and shared store state.
//!
//! A [`LibraryDb`] owns one SQLite connection plus the process-local
//! caches that keep repeated saves cheap: the identity cache of book
//! records and the name-to-id caches of the three dimension tables. The
//! store is not internally synchronized; callers serialize access to an
//! instance.

use std::collections::HashMap;
use std::path::Path;

use bookden_core::GenresCollection;
use rusqlite::Connection;

use crate::cache::RecordCache;
use crate::error::DbError;

const RECORD_CACHE_CAPACITY: usize = 3000;

pub struct LibraryDb {
    pub(crate) conn: Connection,
    pub(crate) genres: GenresCollection,
    pub(crate) record_cache: RecordCache,
    pub(crate) author_cache: HashMap<String, i64>,
    pub(crate) series_cache: HashMap<String, i64>,
    pub(crate) folder_cache: HashMap<String, i64>,
    pub(crate) changes_pending: bool,
    pub(crate) path_correction_required: bool,
}

impl LibraryDb {
    /// Open or create a library database at the given path, bring its
    /// schema up to date and sync the genre handbook.
    pub fn open(path: &Path) -> Result<LibraryDb, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database with the full schema. Useful for testing.
    pub fn open_memory() -> Result<LibraryDb, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<LibraryDb, DbError> {
        let mut db = LibraryDb {
            conn,
            genres: GenresCollection::builtin(),
            record_cache: RecordCache::new(RECORD_CACHE_CAPACITY),
            author_cache: HashMap::new(),
            series_cache: HashMap::new(),
            folder_cache: HashMap::new(),
            changes_pending: false,
            path_correction_required: false,
        };
        db.upgrade_schema()?;
        db.sync_genre_handbook()?;
        db.log_statistics();
        Ok(db)
    }

    /// The genre handbook this store was opened with.
    pub fn genres(&self) -> &GenresCollection {
        &self.genres
    }

    /// True when a ladder step rewired path semantics and the owner
    /// should run [`correct_file_paths`](Self::correct_file_paths).
    pub fn path_correction_required(&self) -> bool {
        self.path_correction_required
    }

    // ── Transaction brackets ────────────────────────────────────────────

    /// Start a read snapshot covering several queries.
    pub fn begin_reading(&self) -> Result<(), DbError> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    /// End a read snapshot. A snapshot with writes pending stays open
    /// until [`flush`](Self::flush).
    pub fn end_reading(&self) -> Result<(), DbError> {
        if !self.conn.is_autocommit() && !self.changes_pending {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    /// Open the write bracket. Subsequent statements share one
    /// transaction until [`flush`](Self::flush) commits it.
    pub fn begin_changes(&mut self) -> Result<(), DbError> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        self.changes_pending = true;
        Ok(())
    }

    /// Commit pending changes, drop the cached prepared statements and
    /// clear the in-memory caches.
    pub fn flush(&mut self) -> Result<(), DbError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        self.changes_pending = false;
        self.clear_caches();
        self.conn.flush_prepared_statement_cache();
        Ok(())
    }

    /// Flush and close the connection.
    pub fn close(mut self) -> Result<(), DbError> {
        self.flush()?;
        Ok(())
    }

    /// Drop every process-local cache. Required after any mutation that
    /// bypasses the caching code paths (migrations, path correction).
    pub fn clear_caches(&mut self) {
        self.record_cache.clear();
        self.author_cache.clear();
        self.series_cache.clear();
        self.folder_cache.clear();
    }

    // ── Raw SQL plumbing ────────────────────────────────────────────────

    /// Execute a statement, returning the number of affected rows.
    pub fn exec(&self, sql: &str) -> Result<usize, DbError> {
        Ok(self.conn.execute(sql, [])?)
    }

    /// Execute a statement whose failure is expected and harmless, such
    /// as re-adding a column an earlier partial migration already added.
    pub fn exec_ignore_errors(&self, sql: &str) {
        if let Err(e) = self.conn.execute_batch(sql) {
            log::debug!("ignoring failed statement: {sql}: {e}");
        }
    }

    /// Run a single-value query, `Ok(None)` when there is no row.
    pub fn query_long(&self, sql: &str) -> Result<Option<i64>, DbError> {
        use rusqlite::OptionalExtension;
        Ok(self
            .conn
            .query_row(sql, [], |row| row.get::<_, i64>(0))
            .optional()?)
    }

    /// Text twin of [`query_long`](Self::query_long).
    pub fn query_text(&self, sql: &str) -> Result<Option<String>, DbError> {
        use rusqlite::OptionalExtension;
        Ok(self
            .conn
            .query_row(sql, [], |row| row.get::<_, String>(0))
            .optional()?)
    }

    pub(crate) fn log_statistics(&self) {
        if let Ok(stats) = self.stats() {
            log::info!(
                "library: {} books, {} authors, {} series, {} folders, {} bookmarks",
                stats.books,
                stats.authors,
                stats.series,
                stats.folders,
                stats.bookmarks
            );
        }
    }
}
