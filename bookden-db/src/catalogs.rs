//! OPDS catalog bookkeeping.

use bookden_core::types::OPDS_PREFIX;
use rusqlite::{params, OptionalExtension};

use crate::error::DbError;
use crate::store::LibraryDb;

/// Catalogs seeded into a fresh database.
pub(crate) const DEFAULT_OPDS_CATALOGS: &[(&str, &str)] = &[
    ("https://m.gutenberg.org/ebooks.opds/", "Project Gutenberg"),
    ("http://bookserver.archive.org/catalog/", "Internet Archive"),
    ("https://srv.manybooks.net/opds/index.php", "ManyBooks"),
    ("https://gallica.bnf.fr/opds", "Gallica (fr)"),
    ("https://wolnelektury.pl/opds/", "Wolne Lektury (pl)"),
];

/// Dead catalog URLs removed by the ladder.
pub(crate) const OBSOLETE_OPDS_URLS: &[&str] = &[
    "http://m.gutenberg.org/",
    "http://bookserver.revues.org/",
    "http://ebooksearch.webfactional.com/catalog.atom",
];

/// A saved OPDS catalog entry.
#[derive(Debug, Clone)]
pub struct OpdsCatalog {
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl OpdsCatalog {
    /// Virtual path of the catalog in the browse tree.
    pub fn pathname(&self) -> String {
        format!("{OPDS_PREFIX}{}", self.url)
    }
}

impl LibraryDb {
    /// Insert or update a catalog entry. Returns false for blank input or
    /// when the name and url each belong to a different existing row.
    pub fn save_opds_catalog(
        &mut self,
        id: Option<i64>,
        url: &str,
        name: &str,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<bool, DbError> {
        let url = url.trim();
        let name = name.trim();
        if url.is_empty() || name.is_empty() {
            return Ok(false);
        }
        let by_url: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM opds_catalog WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        let by_name: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM opds_catalog WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        if let (Some(by_url), Some(by_name)) = (by_url, by_name) {
            if by_url != by_name {
                return Ok(false); // duplicates detected
            }
        }
        let id = id.or(by_url).or(by_name);
        match id {
            None => {
                self.conn.execute(
                    "INSERT INTO opds_catalog (name, url, username, password) \
                     VALUES (?1, ?2, ?3, ?4)",
                    params![name, url, username, password],
                )?;
            }
            Some(id) => {
                self.conn.execute(
                    "UPDATE opds_catalog SET name = ?1, url = ?2, username = ?3, password = ?4 \
                     WHERE id = ?5",
                    params![name, url, username, password, id],
                )?;
            }
        }
        self.update_opds_catalog_last_usage(url)?;
        Ok(true)
    }

    /// Bump a catalog to the top of the most-recently-used order.
    pub fn update_opds_catalog_last_usage(&mut self, url: &str) -> Result<(), DbError> {
        let id: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM opds_catalog WHERE url = ?1",
                params![url],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = id else {
            return Ok(());
        };
        let last_usage = self
            .query_long("SELECT max(last_usage) FROM opds_catalog")?
            .unwrap_or(0)
            + 1;
        self.conn.execute(
            "UPDATE opds_catalog SET last_usage = ?1 WHERE id = ?2",
            params![last_usage, id],
        )?;
        Ok(())
    }

    /// All catalogs, most recently used first.
    pub fn load_opds_catalogs(&self) -> Result<Vec<OpdsCatalog>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, url, username, password FROM opds_catalog \
             ORDER BY last_usage DESC, name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(OpdsCatalog {
                id: Some(row.get(0)?),
                name: row.get(1)?,
                url: row.get(2)?,
                username: row.get(3)?,
                password: row.get(4)?,
            })
        })?;
        let mut list = Vec::new();
        for row in rows {
            list.push(row?);
        }
        Ok(list)
    }

    pub fn remove_opds_catalog(&mut self, id: i64) -> Result<(), DbError> {
        log::info!("removing OPDS catalog {id}");
        self.conn
            .execute("DELETE FROM opds_catalog WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub(crate) fn remove_opds_catalogs_by_urls(&mut self, urls: &[&str]) {
        for url in urls {
            if let Err(e) = self
                .conn
                .execute("DELETE FROM opds_catalog WHERE url = ?1", params![url])
            {
                log::debug!("ignoring failed catalog removal for {url}: {e}");
            }
        }
    }
}
