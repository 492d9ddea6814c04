//! Bookmark persistence and semantic-key reconciliation.
//!
//! Bookmarks are matched across saves by their semantic key rather than
//! their row id, so a caller holding a freshly parsed bookmark set still
//! updates the stored rows in place. Duplicate keys found on load mean a
//! corrupted set and are repaired destructively.

use std::collections::HashMap;

use bookden_core::{BookmarkKind, BookmarkRecord};
use rusqlite::params;

use crate::error::DbError;
use crate::patch::RowPatch;
use crate::store::LibraryDb;

const READ_BOOKMARK_SQL: &str = "SELECT \
    id, type, percent, shortcut, time_stamp, start_pos, end_pos, \
    title_text, pos_text, comment_text, time_elapsed \
    FROM bookmark";

/// Counts reported by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookmarkSyncStats {
    pub added: u32,
    pub updated: u32,
    pub removed: u32,
}

impl BookmarkSyncStats {
    pub fn total(&self) -> u32 {
        self.added + self.updated + self.removed
    }
}

fn bookmark_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookmarkRecord> {
    let opt_i64 = |row: &rusqlite::Row<'_>, idx: usize| -> rusqlite::Result<i64> {
        Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0))
    };
    Ok(BookmarkRecord {
        id: Some(row.get(0)?),
        kind: BookmarkKind::by_ordinal(opt_i64(row, 1)?),
        percent: opt_i64(row, 2)?,
        shortcut: opt_i64(row, 3)?,
        time_stamp: opt_i64(row, 4)?,
        start_pos: row.get(5)?,
        end_pos: row.get(6)?,
        title_text: row.get(7)?,
        pos_text: row.get(8)?,
        comment_text: row.get(9)?,
        time_elapsed: opt_i64(row, 10)?,
    })
}

impl LibraryDb {
    /// All bookmarks of a book, position marker first.
    pub fn load_bookmarks(&self, book_id: i64) -> Result<Vec<BookmarkRecord>, DbError> {
        let sql = format!("{READ_BOOKMARK_SQL} WHERE book_fk = ?1 ORDER BY type");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(params![book_id], bookmark_from_row)?;
        let mut list = Vec::new();
        for row in rows {
            list.push(row?);
        }
        Ok(list)
    }

    /// Load the bookmark set keyed by semantic key. Rows whose key is
    /// already taken are corrupt duplicates and are deleted on the spot.
    fn load_bookmark_map(
        &mut self,
        book_id: i64,
        path_key: &str,
    ) -> Result<HashMap<String, BookmarkRecord>, DbError> {
        let mut map = HashMap::new();
        for bookmark in self.load_bookmarks(book_id)? {
            let key = bookmark.semantic_key();
            if map.contains_key(&key) {
                log::warn!("removing non-unique bookmark {key} for {path_key}");
                self.delete_bookmark(&bookmark)?;
            } else {
                map.insert(key, bookmark);
            }
        }
        Ok(map)
    }

    /// Full outer-join reconciliation of a book's bookmark set: carry row
    /// ids over matching semantic keys, update in place when any field
    /// differs, insert the rest fresh, and delete stored bookmarks with
    /// no counterpart in the new set.
    pub(crate) fn reconcile_bookmarks(
        &mut self,
        book_id: i64,
        path_key: &str,
        bookmarks: &mut [BookmarkRecord],
    ) -> Result<BookmarkSyncStats, DbError> {
        let mut existing = self.load_bookmark_map(book_id, path_key)?;
        let mut stats = BookmarkSyncStats::default();
        for bookmark in bookmarks.iter_mut() {
            match existing.remove(&bookmark.semantic_key()) {
                Some(old) => {
                    bookmark.id = old.id;
                    if *bookmark != old {
                        self.save_bookmark(bookmark, book_id, Some(&old))?;
                        stats.updated += 1;
                    }
                }
                None => {
                    bookmark.id = None;
                    self.save_bookmark(bookmark, book_id, None)?;
                    stats.added += 1;
                }
            }
        }
        for stale in existing.values() {
            self.delete_bookmark(stale)?;
            stats.removed += 1;
        }
        if stats.total() > 0 {
            log::info!(
                "bookmarks added: {}, updated: {}, removed: {}",
                stats.added,
                stats.updated,
                stats.removed
            );
        }
        Ok(stats)
    }

    fn save_bookmark(
        &mut self,
        bookmark: &mut BookmarkRecord,
        book_id: i64,
        old: Option<&BookmarkRecord>,
    ) -> Result<(), DbError> {
        log::debug!(
            "saving bookmark id={:?}, book_id={book_id}, pos={}",
            bookmark.id,
            bookmark.start_pos
        );
        let default = BookmarkRecord::default();
        let old_value = old.unwrap_or(&default);
        let mut patch = RowPatch::new("bookmark");
        patch.add_opt_int(
            "book_fk",
            Some(book_id),
            old_value.id.map(|_| book_id),
        );
        patch.add_int("type", bookmark.kind.ordinal(), old_value.kind.ordinal());
        patch.add_int("percent", bookmark.percent, old_value.percent);
        patch.add_int("shortcut", bookmark.shortcut, old_value.shortcut);
        patch.add_text(
            "start_pos",
            Some(&bookmark.start_pos),
            old.map(|o| o.start_pos.as_str()),
        );
        patch.add_text(
            "end_pos",
            bookmark.end_pos.as_deref(),
            old_value.end_pos.as_deref(),
        );
        patch.add_text(
            "title_text",
            bookmark.title_text.as_deref(),
            old_value.title_text.as_deref(),
        );
        patch.add_text(
            "pos_text",
            bookmark.pos_text.as_deref(),
            old_value.pos_text.as_deref(),
        );
        patch.add_text(
            "comment_text",
            bookmark.comment_text.as_deref(),
            old_value.comment_text.as_deref(),
        );
        patch.add_int("time_stamp", bookmark.time_stamp, old_value.time_stamp);
        patch.add_int("time_elapsed", bookmark.time_elapsed, old_value.time_elapsed);

        self.begin_changes()?;
        match bookmark.id {
            Some(id) => {
                patch.update(&self.conn, id)?;
            }
            None => {
                bookmark.id = Some(patch.insert(&self.conn)?);
            }
        }
        Ok(())
    }

    /// Delete a single bookmark row. Bookmarks without an id were never
    /// stored and are ignored.
    pub fn delete_bookmark(&mut self, bookmark: &BookmarkRecord) -> Result<(), DbError> {
        let Some(id) = bookmark.id else {
            return Ok(());
        };
        self.begin_changes()?;
        self.conn
            .execute("DELETE FROM bookmark WHERE id = ?1", params![id])?;
        Ok(())
    }
}
