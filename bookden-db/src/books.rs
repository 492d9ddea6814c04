//! Change-tracked persistence of book records.
//!
//! A save locates the stored counterpart (identity cache, then pathname,
//! then id, then moved-file detection), writes a field-level diff through
//! [`RowPatch`](crate::patch::RowPatch), and refreshes the dimension
//! associations only when the corresponding text attribute changed.

use std::fs;

use bookden_core::{BookInfo, BookRecord, DocumentFormat};
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::params;

use crate::bookmarks::BookmarkSyncStats;
use crate::error::DbError;
use crate::patch::RowPatch;
use crate::store::LibraryDb;

pub(crate) const READ_BOOK_SQL: &str = "SELECT \
    b.id AS id, b.pathname, f.name AS path, b.filename, b.arcname, b.title, \
    (SELECT GROUP_CONCAT(a.name, '|') FROM author a \
       JOIN book_author ba ON a.id = ba.author_fk WHERE ba.book_fk = b.id) AS authors, \
    (SELECT GROUP_CONCAT(g.code, '|') FROM genre g \
       JOIN book_genre bg ON g.id = bg.genre_fk WHERE bg.book_fk = b.id) AS genres, \
    s.name AS series_name, b.series_number, b.format, b.filesize, b.arcsize, \
    b.create_time, b.last_access_time, b.flags, b.language, b.description, \
    b.crc32, b.dom_version, b.rend_flags \
    FROM book b \
    LEFT JOIN series s ON s.id = b.series_fk \
    LEFT JOIN folder f ON f.id = b.folder_fk";

pub(crate) fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BookRecord> {
    let path_key: String = row.get(1)?;
    let (_, pathname) = bookden_core::pathname::split_arc_path(&path_key);
    let opt_i64 = |row: &rusqlite::Row<'_>, idx: usize| -> rusqlite::Result<i64> {
        Ok(row.get::<_, Option<i64>>(idx)?.unwrap_or(0))
    };
    Ok(BookRecord {
        id: Some(row.get(0)?),
        pathname: pathname.to_string(),
        path: row.get(2)?,
        filename: row.get(3)?,
        arcname: row.get(4)?,
        title: row.get(5)?,
        authors: row.get(6)?,
        genres: row.get(7)?,
        series: row.get(8)?,
        series_number: opt_i64(row, 9)?,
        format: DocumentFormat::by_ordinal(opt_i64(row, 10)?),
        size: opt_i64(row, 11)?,
        arcsize: opt_i64(row, 12)?,
        create_time: opt_i64(row, 13)?,
        last_access_time: opt_i64(row, 14)?,
        flags: opt_i64(row, 15)?,
        language: row.get(16)?,
        description: row.get(17)?,
        crc32: row.get(18)?,
        dom_version: opt_i64(row, 19)?,
        rend_flags: opt_i64(row, 20)?,
    })
}

impl LibraryDb {
    // ── Saving ──────────────────────────────────────────────────────────

    /// Save a book and reconcile its bookmark set, returning the bookmark
    /// counts for observability.
    pub fn save_book_info(&mut self, book: &mut BookInfo) -> Result<BookmarkSyncStats, DbError> {
        self.save_record_inner(&mut book.file, true)?;
        self.record_cache.put(book.file.clone());
        let Some(book_id) = book.file.id else {
            return Ok(BookmarkSyncStats::default());
        };
        self.reconcile_bookmarks(book_id, &book.file.path_key(), &mut book.bookmarks)
    }

    /// Save a bare record without touching bookmarks. The record's id is
    /// filled in from the stored counterpart or the fresh insert.
    pub fn save_file_record(&mut self, record: &mut BookRecord) -> Result<(), DbError> {
        self.save_record_inner(record, true)
    }

    /// Save a batch of records. Individual failures are logged and
    /// skipped; returns the number of records actually saved.
    pub fn save_file_records(&mut self, records: &mut [BookRecord]) -> Result<usize, DbError> {
        log::debug!("saving collection of {} records", records.len());
        let mut saved = 0;
        for record in records.iter_mut() {
            match self.save_record_inner(record, true) {
                Ok(()) => saved += 1,
                Err(e) => log::error!("error while saving {}: {e}", record.path_key()),
            }
        }
        Ok(saved)
    }

    fn save_record_inner(
        &mut self,
        record: &mut BookRecord,
        detect_moved: bool,
    ) -> Result<(), DbError> {
        let mut old = self.find_record_by_path(&record.path_key(), detect_moved)?;
        if old.is_none() {
            if let Some(id) = record.id {
                old = self.find_record_by_id(id)?;
            }
        }
        let authors_changed;
        let genres_changed;
        match old {
            Some(old) => {
                if record.id.is_none() {
                    record.id = old.id;
                }
                let patch = self.book_patch(record, &old)?;
                if !patch.is_empty() {
                    log::debug!("updating file {}", record.path_key());
                    self.begin_changes()?;
                    if let Some(id) = record.id {
                        patch.update(&self.conn, id)?;
                    }
                }
                authors_changed = record.authors != old.authors;
                genres_changed = record.genres != old.genres;
            }
            None => {
                log::debug!("inserting new file {}", record.path_key());
                let patch = self.book_patch(record, &BookRecord::default())?;
                self.begin_changes()?;
                record.id = Some(patch.insert(&self.conn)?);
                authors_changed = true;
                genres_changed = true;
            }
        }
        self.record_cache.put(record.clone());
        if let Some(id) = record.id {
            if authors_changed {
                self.begin_changes()?;
                self.save_book_authors(id, record.authors.as_deref())?;
            }
            if genres_changed {
                self.begin_changes()?;
                self.save_book_genres(id, record.genres.as_deref())?;
            }
        }
        Ok(())
    }

    fn book_patch(&mut self, new: &BookRecord, old: &BookRecord) -> Result<RowPatch, DbError> {
        let new_folder = self.folder_id(new.path.as_deref())?;
        let old_folder = self.folder_id(old.path.as_deref())?;
        let new_series = self.series_id(new.series.as_deref())?;
        let old_series = self.series_id(old.series.as_deref())?;
        let new_key = new.path_key();
        let old_key = old.path_key();

        let mut patch = RowPatch::new("book");
        patch.add_text("pathname", Some(&new_key), Some(&old_key));
        patch.add_opt_int("folder_fk", new_folder, old_folder);
        patch.add_text("filename", Some(&new.filename), Some(&old.filename));
        patch.add_text("arcname", new.arcname.as_deref(), old.arcname.as_deref());
        patch.add_text("title", new.title.as_deref(), old.title.as_deref());
        patch.add_opt_int("series_fk", new_series, old_series);
        patch.add_int("series_number", new.series_number, old.series_number);
        patch.add_int("format", new.format.ordinal(), old.format.ordinal());
        patch.add_int("filesize", new.size, old.size);
        patch.add_int("arcsize", new.arcsize, old.arcsize);
        patch.add_int("last_access_time", new.last_access_time, old.last_access_time);
        patch.add_int("create_time", new.create_time, old.create_time);
        patch.add_int("flags", new.flags, old.flags);
        patch.add_text("language", new.language.as_deref(), old.language.as_deref());
        patch.add_text(
            "description",
            new.description.as_deref(),
            old.description.as_deref(),
        );
        patch.add_opt_int("crc32", new.crc32, old.crc32);
        patch.add_int("dom_version", new.dom_version, old.dom_version);
        patch.add_int("rend_flags", new.rend_flags, old.rend_flags);
        Ok(patch)
    }

    /// Replace the author association set for a book. Only additions are
    /// written; rows for authors no longer in the list are left in place.
    fn save_book_authors(&mut self, book_id: i64, authors: Option<&str>) -> Result<(), DbError> {
        let ids = self.author_ids(authors)?;
        if ids.is_empty() {
            return Ok(());
        }
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO book_author (book_fk, author_fk) VALUES (?1, ?2)")?;
        for author_id in ids {
            stmt.execute(params![book_id, author_id])?;
        }
        Ok(())
    }

    /// Replace the genre association set for a book, with the same
    /// add-only semantics as authors.
    fn save_book_genres(&mut self, book_id: i64, genres: Option<&str>) -> Result<(), DbError> {
        let ids = self.genre_ids(genres);
        if ids.is_empty() {
            return Ok(());
        }
        let mut stmt = self
            .conn
            .prepare_cached("INSERT OR IGNORE INTO book_genre (book_fk, genre_fk) VALUES (?1, ?2)")?;
        for genre_id in ids {
            stmt.execute(params![book_id, genre_id])?;
        }
        Ok(())
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    /// Load a book with its bookmarks by composite path key.
    pub fn load_book_info(&mut self, path_key: &str) -> Result<Option<BookInfo>, DbError> {
        let Some(record) = self.load_file_record(path_key)? else {
            return Ok(None);
        };
        let bookmarks = match record.id {
            Some(id) => self.load_bookmarks(id)?,
            None => Vec::new(),
        };
        Ok(Some(BookInfo { file: record, bookmarks }))
    }

    /// Load a bare record by composite path key, with moved-file
    /// detection as fallback.
    pub fn load_file_record(&mut self, path_key: &str) -> Result<Option<BookRecord>, DbError> {
        self.find_record_by_path(path_key, true)
    }

    /// Load records for a list of path keys in one read snapshot. Keys
    /// with no stored counterpart are skipped.
    pub fn load_file_records(
        &mut self,
        path_keys: &[String],
        detect_moved: bool,
    ) -> Result<Vec<BookRecord>, DbError> {
        self.begin_reading()?;
        let mut list = Vec::new();
        for path_key in path_keys {
            if let Some(record) = self.find_record_by_path(path_key, detect_moved)? {
                list.push(record);
            }
        }
        self.end_reading()?;
        Ok(list)
    }

    /// Load up to `max_count` most recently read books with their
    /// bookmarks, skipping entries whose file no longer exists.
    pub fn load_recent_books(&mut self, max_count: usize) -> Result<Vec<BookInfo>, DbError> {
        self.begin_reading()?;
        let sql = format!(
            "{READ_BOOK_SQL} WHERE last_access_time > 0 \
             ORDER BY last_access_time DESC LIMIT {}",
            max_count * 10
        );
        let records = self.find_books(&sql, &[])?;
        let mut result = Vec::new();
        for record in records.into_iter().take(max_count) {
            let bookmarks = match record.id {
                Some(id) => self.load_bookmarks(id)?,
                None => Vec::new(),
            };
            result.push(BookInfo { file: record, bookmarks });
        }
        self.end_reading()?;
        Ok(result)
    }

    pub(crate) fn find_record_by_path(
        &mut self,
        path_key: &str,
        detect_moved: bool,
    ) -> Result<Option<BookRecord>, DbError> {
        if let Some(cached) = self.record_cache.get(path_key) {
            return Ok(Some(cached));
        }
        if let Some(found) = self.query_record("b.pathname = ?1", &[&path_key])? {
            self.record_cache.put(found.clone());
            return Ok(Some(found));
        }
        if !detect_moved {
            return Ok(None);
        }
        self.find_moved_record(path_key)
    }

    fn find_record_by_id(&mut self, id: i64) -> Result<Option<BookRecord>, DbError> {
        if let Some(cached) = self.record_cache.get_by_id(id) {
            return Ok(Some(cached));
        }
        self.query_record("b.id = ?1", &[&id])
    }

    /// Fallback lookup for a record whose stored path no longer resolves:
    /// candidates share the filename, their own file must be gone, and
    /// the stored size must equal the size of the file at the new path.
    /// The first candidate in result order wins; the crc32 fingerprint is
    /// not consulted.
    fn find_moved_record(&mut self, path_key: &str) -> Result<Option<BookRecord>, DbError> {
        let probe = BookRecord::from_path_key(path_key);
        let on_disk = probe.arcname.as_deref().unwrap_or(&probe.pathname);
        let Ok(meta) = fs::metadata(on_disk) else {
            // Move detection only applies to files that exist at the
            // candidate path.
            return Ok(None);
        };
        let target_size = meta.len() as i64;
        let candidates =
            self.query_records(READ_BOOK_SQL, " WHERE b.filename = ?1", &[&probe.filename])?;
        for mut item in candidates {
            if item.file_exists() {
                continue;
            }
            if item.size == target_size {
                log::info!(
                    "found record for file of the same name and size, treating as moved: {} ({} bytes)",
                    item.filename,
                    item.size
                );
                item.pathname = probe.pathname.clone();
                item.arcname = probe.arcname.clone();
                item.arcsize = probe.arcsize;
                item.path = probe.path.clone();
                item.create_time = file_create_time(&meta);
                self.save_record_inner(&mut item, false)?;
                self.record_cache.put(item.clone());
                return Ok(Some(item));
            }
        }
        Ok(None)
    }

    pub(crate) fn query_record(
        &self,
        condition: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<BookRecord>, DbError> {
        use rusqlite::OptionalExtension;
        let sql = format!("{READ_BOOK_SQL} WHERE {condition}");
        let mut stmt = self.conn.prepare_cached(&sql)?;
        Ok(stmt.query_row(params, record_from_row).optional()?)
    }

    pub(crate) fn query_records(
        &self,
        base_sql: &str,
        suffix: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<BookRecord>, DbError> {
        let sql = format!("{base_sql}{suffix}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params, record_from_row)?;
        let mut list = Vec::new();
        for row in rows {
            list.push(row?);
        }
        Ok(list)
    }

    /// Shared bulk reader: run a full book query, skip stale rows whose
    /// file vanished from disk, and refresh the identity cache.
    pub(crate) fn find_books(
        &mut self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<BookRecord>, DbError> {
        let records = self.query_records(sql, "", params)?;
        let mut list = Vec::new();
        for record in records {
            if !record.file_exists() {
                continue;
            }
            self.record_cache.put(record.clone());
            list.push(record);
        }
        Ok(list)
    }

    pub(crate) fn book_id_for(&mut self, path_key: &str) -> Result<Option<i64>, DbError> {
        if let Some(cached) = self.record_cache.get(path_key) {
            if cached.id.is_some() {
                return Ok(cached.id);
            }
        }
        Ok(self
            .find_record_by_path(path_key, false)?
            .and_then(|r| r.id))
    }

    // ── Removal and repair ──────────────────────────────────────────────

    /// Delete a book with everything it owns: bookmarks, author and genre
    /// associations, and the cache entry. Returns the removed book id.
    pub fn delete_book(&mut self, path_key: &str) -> Result<Option<i64>, DbError> {
        let id = self.book_id_for(path_key)?;
        self.record_cache.remove(path_key);
        let Some(id) = id else {
            return Ok(None);
        };
        self.begin_changes()?;
        self.conn
            .execute("DELETE FROM search_history WHERE book_fk = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM bookmark WHERE book_fk = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM book_author WHERE book_fk = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM book_genre WHERE book_fk = ?1", params![id])?;
        self.conn
            .execute("DELETE FROM book WHERE id = ?1", params![id])?;
        Ok(Some(id))
    }

    /// Drop the last-read position of a book and take it out of the
    /// recent list.
    pub fn delete_recent_position(&mut self, path_key: &str) -> Result<(), DbError> {
        let Some(id) = self.book_id_for(path_key)? else {
            return Ok(());
        };
        self.begin_changes()?;
        self.conn.execute(
            "DELETE FROM bookmark WHERE book_fk = ?1 AND type = 0",
            params![id],
        )?;
        self.conn.execute(
            "UPDATE book SET last_access_time = 0 WHERE id = ?1",
            params![id],
        )?;
        // The cached copy is stale now.
        self.record_cache.remove(path_key);
        Ok(())
    }

    /// Rewrite stored pathnames through a caller-supplied normalizer.
    /// Returns the number of corrected rows. Used after ladder steps that
    /// flag [`path_correction_required`](Self::path_correction_required).
    pub fn correct_file_paths<F>(&mut self, corrector: F) -> Result<usize, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        log::info!("checking data for path correction");
        self.begin_reading()?;
        let mut changed: Vec<(i64, String)> = Vec::new();
        let mut row_count = 0usize;
        {
            let mut stmt = self.conn.prepare("SELECT id, pathname FROM book")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for row in rows {
                let (id, pathname) = row?;
                row_count += 1;
                match corrector(&pathname) {
                    Some(corrected) if corrected != pathname => changed.push((id, corrected)),
                    Some(_) => {}
                    None => log::warn!("database contains unknown path {pathname}"),
                }
            }
        }
        self.end_reading()?;
        log::info!(
            "total rows: {row_count}, {}",
            if changed.is_empty() {
                "no corrections required".to_string()
            } else {
                format!("need to correct {} items", changed.len())
            }
        );
        if changed.is_empty() {
            self.path_correction_required = false;
            return Ok(0);
        }
        self.begin_changes()?;
        {
            let mut stmt = self
                .conn
                .prepare("UPDATE book SET pathname = ?1 WHERE id = ?2")?;
            for (id, corrected) in &changed {
                stmt.execute(params![corrected, id])?;
            }
        }
        // The rewrites bypassed the identity cache; flush commits and
        // invalidates it.
        self.flush()?;
        self.path_correction_required = false;
        log::info!("finished, rows corrected: {}", changed.len());
        Ok(changed.len())
    }
}

fn file_create_time(meta: &fs::Metadata) -> i64 {
    meta.created()
        .or_else(|_| meta.modified())
        .map(|t| DateTime::<Utc>::from(t).timestamp())
        .unwrap_or(0)
}
