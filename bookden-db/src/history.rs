//! Per-book search history logging.

use bookden_core::BookRecord;
use rusqlite::params;

use crate::error::DbError;
use crate::store::LibraryDb;

impl LibraryDb {
    /// Record a search string for a book, moving a repeated search to the
    /// front. Returns false for blank input or an unsaved book.
    pub fn save_search_history(
        &mut self,
        book: &BookRecord,
        search_text: &str,
    ) -> Result<bool, DbError> {
        let Some(book_id) = book.id else {
            return Ok(false);
        };
        let search_text = search_text.trim();
        if search_text.is_empty() {
            return Ok(false);
        }
        self.conn.execute(
            "DELETE FROM search_history WHERE book_fk = ?1 AND search_text = ?2",
            params![book_id, search_text],
        )?;
        self.conn.execute(
            "INSERT INTO search_history (book_fk, search_text) VALUES (?1, ?2)",
            params![book_id, search_text],
        )?;
        Ok(true)
    }

    /// Search strings for a book, most recent first.
    pub fn load_search_history(&self, book: &BookRecord) -> Result<Vec<String>, DbError> {
        let Some(book_id) = book.id else {
            return Ok(Vec::new());
        };
        let mut stmt = self.conn.prepare_cached(
            "SELECT search_text FROM search_history WHERE book_fk = ?1 ORDER BY id DESC",
        )?;
        let rows = stmt.query_map(params![book_id], |row| row.get::<_, String>(0))?;
        let mut list = Vec::new();
        for row in rows {
            list.push(row?);
        }
        Ok(list)
    }
}
