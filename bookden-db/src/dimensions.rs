//! Dimension resolution: author, series and folder names to row ids.
//!
//! Names are resolved get-or-create: an in-memory map is consulted first,
//! then an exact match in the store, and only then is a new row inserted.
//! The maps are write-through and live until the owning store flushes;
//! writes made around this code path (migrations, raw SQL) must clear
//! them via [`LibraryDb::clear_caches`].

use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DbError;
use crate::store::LibraryDb;

impl LibraryDb {
    /// Resolve an author name to its id, creating the row on first use.
    /// Empty or missing names resolve to `None`, not an error.
    pub fn author_id(&mut self, name: Option<&str>) -> Result<Option<i64>, DbError> {
        resolve_dimension(&self.conn, &mut self.author_cache, "author", name)
    }

    /// Resolve a series name to its id, creating the row on first use.
    pub fn series_id(&mut self, name: Option<&str>) -> Result<Option<i64>, DbError> {
        resolve_dimension(&self.conn, &mut self.series_cache, "series", name)
    }

    /// Resolve a folder path to its id, creating the row on first use.
    pub fn folder_id(&mut self, name: Option<&str>) -> Result<Option<i64>, DbError> {
        resolve_dimension(&self.conn, &mut self.folder_cache, "folder", name)
    }

    /// Resolve a `|`-joined author list to ids, skipping empty tokens.
    pub(crate) fn author_ids(&mut self, joined: Option<&str>) -> Result<Vec<i64>, DbError> {
        let mut ids = Vec::new();
        if let Some(joined) = joined {
            for name in joined.split('|') {
                if let Some(id) = self.author_id(Some(name))? {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Map a `|`-joined genre code list to taxonomy ids. Codes unknown to
    /// the handbook are dropped; genres are reference data, never created
    /// on demand.
    pub(crate) fn genre_ids(&self, joined: Option<&str>) -> Vec<i64> {
        let mut ids = Vec::new();
        if let Some(joined) = joined {
            for code in joined.split('|') {
                if let Some(id) = self.genres.genre_id(code.trim()) {
                    ids.push(id);
                }
            }
        }
        ids
    }
}

fn resolve_dimension(
    conn: &Connection,
    cache: &mut HashMap<String, i64>,
    table: &str,
    name: Option<&str>,
) -> Result<Option<i64>, DbError> {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if let Some(&id) = cache.get(name) {
        return Ok(Some(id));
    }
    let found = conn
        .prepare_cached(&format!("SELECT id FROM {table} WHERE name = ?1"))?
        .query_row(params![name], |row| row.get::<_, i64>(0))
        .optional()?;
    let id = match found {
        Some(id) => id,
        None => {
            conn.prepare_cached(&format!("INSERT INTO {table} (id, name) VALUES (NULL, ?1)"))?
                .execute(params![name])?;
            conn.last_insert_rowid()
        }
    };
    cache.insert(name.to_string(), id);
    Ok(Some(id))
}
