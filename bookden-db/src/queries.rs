//! Browse and search queries over the library.
//!
//! The list loaders feed the letter-prefix grouper to produce the trees
//! handed to the UI layer; the finders return flat record lists.

use bookden_core::types::{
    AUTHOR_GROUP_PREFIX, AUTHOR_PREFIX, GENRE_PREFIX, SERIES_GROUP_PREFIX, SERIES_PREFIX,
    TITLE_GROUP_PREFIX,
};
use bookden_core::util::{author_sort_name, match_pattern};
use bookden_core::{BookRecord, GenreEntry};
use rusqlite::params;

use crate::books::READ_BOOK_SQL;
use crate::error::DbError;
use crate::grouping::{group_items, CatalogTree};
use crate::store::LibraryDb;

/// A browsable dimension entry: an author, series or genre row with its
/// book count and a virtual path the UI can navigate into.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub book_count: i64,
    pub pathname: String,
}

/// Result of browsing a genre code: either the sub-entries of a group or
/// the books of a leaf genre.
#[derive(Debug)]
pub enum GenreListing {
    Groups(Vec<CatalogEntry>),
    Books(Vec<BookRecord>),
}

/// Row counts across the main tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct LibraryStats {
    pub books: i64,
    pub authors: i64,
    pub series: i64,
    pub folders: i64,
    pub bookmarks: i64,
}

impl LibraryDb {
    // ── Grouped browse lists ────────────────────────────────────────────

    /// All authors with at least one book, as a grouped tree sorted by
    /// file-as name (family name first).
    pub fn load_authors_list(&mut self) -> Result<CatalogTree<CatalogEntry>, DbError> {
        self.begin_reading()?;
        let list = self.load_item_list(
            "SELECT author.id, author.name, count(*) AS book_count FROM author \
             INNER JOIN book_author ON book_author.author_fk = author.id \
             GROUP BY author.name, author.id ORDER BY author.name",
            AUTHOR_PREFIX,
            true,
        )?;
        self.end_reading()?;
        Ok(group_items(list, AUTHOR_GROUP_PREFIX, |e| Some(&e.name)))
    }

    /// All series with at least one book, as a grouped tree.
    pub fn load_series_list(&mut self) -> Result<CatalogTree<CatalogEntry>, DbError> {
        self.begin_reading()?;
        let list = self.load_item_list(
            "SELECT series.id, series.name, count(*) AS book_count FROM series \
             INNER JOIN book ON book.series_fk = series.id \
             GROUP BY series.name, series.id ORDER BY series.name",
            SERIES_PREFIX,
            false,
        )?;
        self.end_reading()?;
        Ok(group_items(list, SERIES_GROUP_PREFIX, |e| Some(&e.name)))
    }

    /// All titled books as a grouped tree, with duplicate titles
    /// collapsed to their first occurrence.
    pub fn load_title_list(&mut self) -> Result<CatalogTree<BookRecord>, DbError> {
        self.begin_reading()?;
        let sql = format!(
            "{READ_BOOK_SQL} WHERE b.title IS NOT NULL AND b.title != '' ORDER BY b.title"
        );
        let mut records = self.find_books(&sql, &[])?;
        self.end_reading()?;
        records.sort_by(|a, b| {
            let l = a.title.as_deref().unwrap_or("").to_uppercase();
            let r = b.title.as_deref().unwrap_or("").to_uppercase();
            l.cmp(&r)
        });
        records.dedup_by(|a, b| a.title == b.title);
        Ok(group_items(records, TITLE_GROUP_PREFIX, |b| {
            b.title.as_deref()
        }))
    }

    /// Genre groups with their distinct-book counts. The result is flat;
    /// group fan-out is already bounded by the taxonomy.
    pub fn load_genres_list(&mut self, show_empty: bool) -> Result<Vec<CatalogEntry>, DbError> {
        self.begin_reading()?;
        let mut list = Vec::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT gg.code, \
                 (SELECT COUNT(DISTINCT book_fk) FROM book_genre bg \
                    JOIN genre g ON g.id = bg.genre_fk \
                    JOIN genre_hier gh ON gh.genre_fk = g.id \
                  WHERE gh.group_fk = gg.id) AS book_count \
                 FROM genre_group gg",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (code, book_count) = row?;
                if book_count > 0 || show_empty {
                    list.push(CatalogEntry {
                        id: -1,
                        name: self.genres.translate(&code).to_string(),
                        book_count,
                        pathname: format!("{GENRE_PREFIX}{code}"),
                    });
                }
            }
        }
        self.end_reading()?;
        list.sort_by(|a, b| a.name.to_uppercase().cmp(&b.name.to_uppercase()));
        Ok(list)
    }

    fn load_item_list(
        &self,
        sql: &str,
        prefix: &str,
        author_names: bool,
    ) -> Result<Vec<CatalogEntry>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut list = Vec::new();
        for row in rows {
            let (id, name, book_count) = row?;
            let name = if author_names {
                author_sort_name(&name)
            } else {
                name
            };
            list.push(CatalogEntry {
                id,
                name,
                book_count,
                pathname: format!("{prefix}{id}"),
            });
        }
        Ok(list)
    }

    // ── Book finders ────────────────────────────────────────────────────

    /// Books of one author, by title.
    pub fn find_author_books(&mut self, author_id: i64) -> Result<Vec<BookRecord>, DbError> {
        let sql = format!(
            "{READ_BOOK_SQL} INNER JOIN book_author ON book_author.book_fk = b.id \
             WHERE book_author.author_fk = {author_id} ORDER BY b.title"
        );
        self.find_books(&sql, &[])
    }

    /// Books of one series, by series position then title.
    pub fn find_series_books(&mut self, series_id: i64) -> Result<Vec<BookRecord>, DbError> {
        let sql = format!(
            "{READ_BOOK_SQL} WHERE b.series_fk = {series_id} \
             ORDER BY b.series_number, b.title"
        );
        self.find_books(&sql, &[])
    }

    /// Books whose rating nibble falls in `min..=max`, best first.
    pub fn find_books_by_rating(&mut self, min: u8, max: u8) -> Result<Vec<BookRecord>, DbError> {
        let sql = format!(
            "{READ_BOOK_SQL} WHERE ((b.flags>>20)&15) BETWEEN {} AND {} \
             ORDER BY ((b.flags>>20)&15) DESC, b.title LIMIT 1000",
            min, max
        );
        self.find_books(&sql, &[])
    }

    /// Books in one reading state.
    pub fn find_books_by_state(
        &mut self,
        state: bookden_core::ReadingState,
    ) -> Result<Vec<BookRecord>, DbError> {
        let sql = format!(
            "{READ_BOOK_SQL} WHERE ((b.flags>>16)&15) = {} ORDER BY b.title LIMIT 1000",
            state.ordinal()
        );
        self.find_books(&sql, &[])
    }

    /// Browse a genre code: a group code yields its children plus an
    /// `:all` pseudo entry with the combined count, while a leaf code
    /// (or a group code with the `:all` suffix) yields books.
    pub fn find_by_genre(
        &mut self,
        genre_code: &str,
        show_empty: bool,
    ) -> Result<GenreListing, DbError> {
        let (code, expand_children) = match genre_code.strip_suffix(":all") {
            Some(code) => (code, false),
            None => (genre_code, true),
        };
        let child_ids: Vec<i64>;
        let group_meta: Option<(i64, String, String)>;
        match self.genres.by_code(code) {
            Some(GenreEntry::Group(group)) => {
                child_ids = group.genres.iter().map(|g| g.id).collect();
                group_meta = Some((group.id, group.code.clone(), group.name.clone()));
            }
            Some(GenreEntry::Genre(genre)) => {
                child_ids = vec![genre.id];
                group_meta = None;
            }
            None => return Ok(GenreListing::Books(Vec::new())),
        }

        if let (Some((group_id, group_code, group_name)), true) = (&group_meta, expand_children) {
            self.begin_reading()?;
            let mut entries = Vec::new();
            // Pseudo entry covering every child genre of the group.
            let combined = self.count_genre_books(&child_ids)?;
            entries.push(CatalogEntry {
                id: -1,
                name: group_name.clone(),
                book_count: combined,
                pathname: format!("{GENRE_PREFIX}{group_code}:all"),
            });
            let group_id = *group_id;
            let children: Vec<(String, i64)> = {
                let mut stmt = self.conn.prepare(
                    "SELECT g.code, \
                     (SELECT COUNT(DISTINCT book_fk) FROM book_genre bg \
                      WHERE bg.genre_fk = g.id) AS book_count \
                     FROM genre g \
                     INNER JOIN genre_hier gh ON gh.genre_fk = g.id \
                     WHERE gh.group_fk = ?1",
                )?;
                let rows = stmt.query_map(params![group_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            for (code, book_count) in children {
                if book_count > 0 || show_empty {
                    entries.push(CatalogEntry {
                        id: -1,
                        name: self.genres.translate(&code).to_string(),
                        book_count,
                        pathname: format!("{GENRE_PREFIX}{code}"),
                    });
                }
            }
            self.end_reading()?;
            return Ok(GenreListing::Groups(entries));
        }

        if child_ids.is_empty() {
            return Ok(GenreListing::Books(Vec::new()));
        }
        let id_list = join_ids(&child_ids);
        let sql = format!(
            "{READ_BOOK_SQL} JOIN book_genre bg ON bg.book_fk = b.id \
             WHERE bg.genre_fk IN ({id_list})"
        );
        self.begin_reading()?;
        let books = self.find_books(&sql, &[])?;
        self.end_reading()?;
        Ok(GenreListing::Books(books))
    }

    fn count_genre_books(&self, genre_ids: &[i64]) -> Result<i64, DbError> {
        if genre_ids.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT count(DISTINCT book_fk) FROM book_genre WHERE genre_fk IN ({})",
            join_ids(genre_ids)
        );
        Ok(self.query_long(&sql)?.unwrap_or(0))
    }

    /// Search by author/title/series/filename patterns. Author and series
    /// patterns are resolved to dimension ids first; title and filename
    /// are filtered per row. Returns an empty list when no pattern was
    /// given at all.
    pub fn find_by_patterns(
        &mut self,
        max_count: usize,
        authors: Option<&str>,
        title: Option<&str>,
        series: Option<&str>,
        filename: Option<&str>,
    ) -> Result<Vec<BookRecord>, DbError> {
        let authors = authors.filter(|s| !s.is_empty());
        let title = title.filter(|s| !s.is_empty());
        let series = series.filter(|s| !s.is_empty());
        let filename = filename.filter(|s| !s.is_empty());

        self.begin_reading()?;
        let mut conditions = Vec::new();
        if let Some(authors) = authors {
            // A synced record may carry several authors joined by '|'.
            let mut author_ids = Vec::new();
            for pattern in authors.split('|') {
                author_ids.extend(self.match_dimension_ids("author", pattern, max_count)?);
            }
            if author_ids.is_empty() {
                self.end_reading()?;
                return Ok(Vec::new());
            }
            conditions.push(format!(
                "b.id IN (SELECT ba.book_fk FROM book_author ba \
                 WHERE ba.author_fk IN ({}))",
                join_ids(&author_ids)
            ));
        }
        if let Some(series) = series {
            let series_ids = self.match_dimension_ids("series", series, max_count)?;
            if series_ids.is_empty() {
                self.end_reading()?;
                return Ok(Vec::new());
            }
            conditions.push(format!("b.series_fk IN ({})", join_ids(&series_ids)));
        }
        if conditions.is_empty() && title.is_none() && filename.is_none() {
            self.end_reading()?;
            return Ok(Vec::new());
        }

        let sql = if conditions.is_empty() {
            READ_BOOK_SQL.to_string()
        } else {
            format!("{READ_BOOK_SQL} WHERE {}", conditions.join(" AND "))
        };
        let candidates = self.query_records(&sql, "", &[])?;
        let mut list = Vec::new();
        for record in candidates {
            if let Some(title) = title {
                if !match_pattern(record.title.as_deref().unwrap_or(""), title) {
                    continue;
                }
            }
            if let Some(filename) = filename {
                if !match_pattern(&record.filename, filename) {
                    continue;
                }
            }
            self.record_cache.put(record.clone());
            list.push(record);
            if list.len() >= max_count {
                break;
            }
        }
        self.end_reading()?;
        Ok(list)
    }

    /// Books whose stored content fingerprint matches any of the given
    /// values.
    pub fn find_by_fingerprints(
        &mut self,
        max_count: usize,
        fingerprints: &[i64],
    ) -> Result<Vec<BookRecord>, DbError> {
        if fingerprints.is_empty() {
            return Ok(Vec::new());
        }
        self.begin_reading()?;
        let sql = format!(
            "{READ_BOOK_SQL} WHERE b.crc32 IN ({})",
            join_ids(fingerprints)
        );
        let mut list = self.query_records(&sql, "", &[])?;
        list.truncate(max_count);
        for record in &list {
            self.record_cache.put(record.clone());
        }
        self.end_reading()?;
        Ok(list)
    }

    fn match_dimension_ids(
        &self,
        table: &str,
        pattern: &str,
        max_count: usize,
    ) -> Result<Vec<i64>, DbError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id, name FROM {table}"))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut ids = Vec::new();
        for row in rows {
            let (id, name) = row?;
            if match_pattern(&name, pattern) {
                ids.push(id);
                if ids.len() >= max_count {
                    break;
                }
            }
        }
        Ok(ids)
    }

    // ── Statistics ──────────────────────────────────────────────────────

    /// Row counts across the main tables.
    pub fn stats(&self) -> Result<LibraryStats, DbError> {
        Ok(LibraryStats {
            books: self.query_long("SELECT count(*) FROM book")?.unwrap_or(0),
            authors: self.query_long("SELECT count(*) FROM author")?.unwrap_or(0),
            series: self.query_long("SELECT count(*) FROM series")?.unwrap_or(0),
            folders: self.query_long("SELECT count(*) FROM folder")?.unwrap_or(0),
            bookmarks: self
                .query_long("SELECT count(*) FROM bookmark")?
                .unwrap_or(0),
        })
    }
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
