//! Schema creation and the forward-only migration ladder.
//!
//! The base schema is created idempotently, then every migration step
//! whose minimum version exceeds the stored version runs in ascending
//! order, and finally the target version is recorded. Each step must be
//! safe to re-run because a previous run may have been interrupted after
//! some of its statements; non-critical statements therefore go through
//! the ignore-errors helper. A database written by a newer, incompatible
//! fork (stored version above the target) is clamped back to a known safe
//! checkpoint and replayed forward rather than rejected.

use bookden_core::DocumentFormat;
use rusqlite::params;

use crate::catalogs::{DEFAULT_OPDS_CATALOGS, OBSOLETE_OPDS_URLS};
use crate::error::DbError;
use crate::store::LibraryDb;

/// Current schema version. Increment when appending migrations.
pub const DB_VERSION: i64 = 8;

/// Where an incompatibly-new database is clamped before replaying the
/// ladder. Everything at or below this version has kept its layout
/// across every known fork.
const SAFE_VERSION_CHECKPOINT: i64 = 4;

/// Document-model versions: rows stamped with the superseded value are
/// force-bumped to the current one by a ladder step.
pub const DOM_VERSION_CURRENT: i64 = 20200824;
const DOM_VERSION_SUPERSEDED: i64 = 20200223;

struct Migration {
    min_version: i64,
    name: &'static str,
    apply: fn(&mut LibraryDb) -> Result<(), DbError>,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        min_version: 1,
        name: "bookmark shortcut slots",
        apply: migrate_bookmark_shortcut,
    },
    Migration {
        min_version: 2,
        name: "book flags bitfield",
        apply: migrate_book_flags,
    },
    Migration {
        min_version: 3,
        name: "language column and OPDS catalogs",
        apply: migrate_opds_catalogs,
    },
    Migration {
        min_version: 4,
        name: "favorites, search history, catalog usage",
        apply: migrate_aux_tables,
    },
    Migration {
        min_version: 5,
        name: "fingerprints and format repair",
        apply: migrate_fingerprints_and_formats,
    },
    Migration {
        min_version: 6,
        name: "document model version bump",
        apply: migrate_dom_version,
    },
    Migration {
        min_version: 7,
        name: "genre classification tables",
        apply: migrate_genre_tables,
    },
    Migration {
        min_version: 8,
        name: "genre table rebuild",
        apply: migrate_genre_rebuild,
    },
];

impl LibraryDb {
    /// Bring the schema up to `DB_VERSION`.
    pub(crate) fn upgrade_schema(&mut self) -> Result<(), DbError> {
        let mut version = self.schema_version()?;
        if version > DB_VERSION {
            log::warn!(
                "incompatible database version {version} found, forced setting to \
                 {SAFE_VERSION_CHECKPOINT}"
            );
            version = SAFE_VERSION_CHECKPOINT;
        }
        if version < DB_VERSION {
            self.conn.execute_batch(BASE_SCHEMA_SQL)?;
            for migration in MIGRATIONS {
                if migration.min_version > version {
                    log::info!(
                        "applying schema step {}: {}",
                        migration.min_version,
                        migration.name
                    );
                    (migration.apply)(self)?;
                }
            }
            self.set_schema_version(DB_VERSION)?;
        }
        Ok(())
    }

    /// Stored schema version, or 0 for a database without one.
    pub fn schema_version(&self) -> Result<i64, DbError> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='metadata')",
            [],
            |row| row.get(0),
        )?;
        if !exists {
            return Ok(0);
        }
        let stored = self.query_text("SELECT value FROM metadata WHERE param='schema_version'")?;
        Ok(stored.and_then(|v| v.parse().ok()).unwrap_or(0))
    }

    fn set_schema_version(&self, version: i64) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (param, value) VALUES ('schema_version', ?1)",
            params![version.to_string()],
        )?;
        Ok(())
    }

    /// Mirror the genre handbook into the classification tables, skipped
    /// when the stored handbook version is already current.
    pub(crate) fn sync_genre_handbook(&mut self) -> Result<(), DbError> {
        let stored = self
            .query_text("SELECT value FROM metadata WHERE param='genre_version'")?
            .and_then(|v| v.parse::<i64>().ok());
        if stored == Some(self.genres.version()) {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut group_stmt =
                tx.prepare("INSERT OR IGNORE INTO genre_group (id, code) VALUES (?1, ?2)")?;
            let mut genre_stmt =
                tx.prepare("INSERT OR IGNORE INTO genre (id, code) VALUES (?1, ?2)")?;
            let mut hier_stmt =
                tx.prepare("INSERT OR IGNORE INTO genre_hier (group_fk, genre_fk) VALUES (?1, ?2)")?;
            for group in self.genres.groups() {
                group_stmt.execute(params![group.id, group.code])?;
                for genre in &group.genres {
                    genre_stmt.execute(params![genre.id, genre.code])?;
                    hier_stmt.execute(params![group.id, genre.id])?;
                }
            }
            tx.execute(
                "INSERT OR REPLACE INTO metadata (param, value) VALUES ('genre_version', ?1)",
                params![self.genres.version().to_string()],
            )?;
        }
        tx.commit()?;
        log::info!("genre handbook synced to version {}", self.genres.version());
        Ok(())
    }
}

// ── Migration steps ─────────────────────────────────────────────────────

fn migrate_bookmark_shortcut(db: &mut LibraryDb) -> Result<(), DbError> {
    db.exec_ignore_errors("ALTER TABLE bookmark ADD COLUMN shortcut INTEGER DEFAULT 0");
    Ok(())
}

fn migrate_book_flags(db: &mut LibraryDb) -> Result<(), DbError> {
    db.exec_ignore_errors("ALTER TABLE book ADD COLUMN flags INTEGER DEFAULT 0");
    Ok(())
}

fn migrate_opds_catalogs(db: &mut LibraryDb) -> Result<(), DbError> {
    db.exec_ignore_errors("ALTER TABLE book ADD COLUMN language VARCHAR DEFAULT NULL");
    db.exec_ignore_errors(
        "CREATE TABLE IF NOT EXISTS opds_catalog (\
         id INTEGER PRIMARY KEY AUTOINCREMENT, \
         name VARCHAR NOT NULL COLLATE NOCASE, \
         url VARCHAR NOT NULL COLLATE NOCASE, \
         last_usage INTEGER DEFAULT 0, \
         username VARCHAR DEFAULT NULL, \
         password VARCHAR DEFAULT NULL)",
    );
    for (url, name) in DEFAULT_OPDS_CATALOGS {
        db.save_opds_catalog(None, url, name, None, None)?;
    }
    Ok(())
}

fn migrate_aux_tables(db: &mut LibraryDb) -> Result<(), DbError> {
    db.exec_ignore_errors("ALTER TABLE opds_catalog ADD COLUMN last_usage INTEGER DEFAULT 0");
    db.exec_ignore_errors("ALTER TABLE bookmark ADD COLUMN time_elapsed INTEGER DEFAULT 0");
    db.exec_ignore_errors(
        "CREATE TABLE IF NOT EXISTS favorite_folders (\
         id INTEGER PRIMARY KEY AUTOINCREMENT, \
         path VARCHAR NOT NULL, \
         position INTEGER NOT NULL DEFAULT 0)",
    );
    db.exec_ignore_errors(
        "CREATE TABLE IF NOT EXISTS search_history (\
         id INTEGER PRIMARY KEY AUTOINCREMENT, \
         book_fk INTEGER NOT NULL REFERENCES book (id), \
         search_text VARCHAR)",
    );
    db.exec_ignore_errors(
        "CREATE INDEX IF NOT EXISTS search_history_index ON search_history (book_fk)",
    );
    db.remove_opds_catalogs_by_urls(OBSOLETE_OPDS_URLS);
    // Mount points may have moved since this version; the owner of the
    // store supplies the corrector.
    db.path_correction_required = true;
    Ok(())
}

fn migrate_fingerprints_and_formats(db: &mut LibraryDb) -> Result<(), DbError> {
    db.exec_ignore_errors("ALTER TABLE book ADD COLUMN description TEXT DEFAULT NULL");
    db.exec_ignore_errors("ALTER TABLE book ADD COLUMN crc32 INTEGER DEFAULT NULL");
    db.exec_ignore_errors("ALTER TABLE book ADD COLUMN dom_version INTEGER DEFAULT 0");
    db.exec_ignore_errors("ALTER TABLE book ADD COLUMN rend_flags INTEGER DEFAULT 0");
    repair_formats(db)
}

/// Recompute the stored format of every book from its path with the
/// current classification rules and rewrite only the rows whose value
/// changed. Ordinals 0 and 1 kept their meaning across the format-enum
/// change and are skipped.
fn repair_formats(db: &mut LibraryDb) -> Result<(), DbError> {
    log::info!("rechecking 'format' values in table 'book'");
    let mut updates: Vec<(i64, i64)> = Vec::new();
    {
        let mut stmt = db.conn.prepare("SELECT id, pathname, format FROM book")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<i64>>(2)?.unwrap_or(0),
            ))
        })?;
        for row in rows {
            let (id, pathname, old_format) = row?;
            if old_format > 1 {
                let new_format = DocumentFormat::by_extension(&pathname).ordinal();
                if new_format != old_format {
                    updates.push((id, new_format));
                }
            }
        }
    }
    if updates.is_empty() {
        return Ok(());
    }
    let tx = db.conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare("UPDATE book SET format = ?1 WHERE id = ?2")?;
        for (id, format) in &updates {
            stmt.execute(params![format, id])?;
        }
    }
    tx.commit()?;
    log::info!("updated {} records with an invalid format", updates.len());
    Ok(())
}

fn migrate_dom_version(db: &mut LibraryDb) -> Result<(), DbError> {
    db.exec_ignore_errors(&format!(
        "UPDATE book SET dom_version={DOM_VERSION_CURRENT} \
         WHERE dom_version={DOM_VERSION_SUPERSEDED}"
    ));
    Ok(())
}

fn migrate_genre_tables(db: &mut LibraryDb) -> Result<(), DbError> {
    db.exec_ignore_errors(
        "CREATE TABLE IF NOT EXISTS metadata (\
         param VARCHAR NOT NULL PRIMARY KEY, \
         value VARCHAR NOT NULL)",
    );
    db.exec_ignore_errors(
        "CREATE TABLE IF NOT EXISTS genre_group (\
         id INTEGER NOT NULL PRIMARY KEY, \
         code VARCHAR NOT NULL)",
    );
    // The first shape of the genre table carried the group in a composite
    // primary key; the rebuild step flattens it.
    db.exec_ignore_errors(
        "CREATE TABLE IF NOT EXISTS genre (\
         id INTEGER NOT NULL, \
         parent INTEGER NOT NULL REFERENCES genre_group(id), \
         code VARCHAR NOT NULL, \
         PRIMARY KEY (id, parent))",
    );
    db.exec_ignore_errors(
        "CREATE TABLE IF NOT EXISTS book_genre (\
         book_fk INTEGER NOT NULL REFERENCES book(id), \
         genre_fk INTEGER NOT NULL REFERENCES genre(id), \
         UNIQUE (book_fk, genre_fk))",
    );
    db.exec_ignore_errors("CREATE INDEX IF NOT EXISTS genre_group_code_index ON genre_group (code)");
    db.exec_ignore_errors(
        "CREATE UNIQUE INDEX IF NOT EXISTS book_genre_index ON book_genre (book_fk, genre_fk)",
    );
    Ok(())
}

/// Rebuild the genre table with a stricter uniqueness constraint from
/// deduplicated rows of the old one. The foreign-key pragma is suspended
/// only for the drop-and-rename swap and restored to its original value;
/// every statement goes through the ignore-errors helper so the restore
/// runs regardless of which statements fail.
fn migrate_genre_rebuild(db: &mut LibraryDb) -> Result<(), DbError> {
    db.exec_ignore_errors(
        "CREATE TABLE IF NOT EXISTS genre_hier (\
         group_fk INTEGER NOT NULL REFERENCES genre_group(id), \
         genre_fk INTEGER NOT NULL REFERENCES genre(id), \
         UNIQUE (group_fk, genre_fk))",
    );
    // Only succeeds against the old composite-key shape; the new shape
    // has no parent column and the statement is skipped.
    db.exec_ignore_errors(
        "INSERT OR IGNORE INTO genre_hier (group_fk, genre_fk) \
         SELECT parent AS group_fk, id AS genre_fk FROM genre ORDER BY parent, id",
    );
    db.exec_ignore_errors(
        "CREATE TABLE IF NOT EXISTS genre_new (\
         id INTEGER NOT NULL PRIMARY KEY, \
         code VARCHAR NOT NULL UNIQUE)",
    );
    db.exec_ignore_errors("INSERT OR IGNORE INTO genre_new (id, code) SELECT id, code FROM genre GROUP BY id");
    let foreign_keys_on = db
        .query_long("PRAGMA foreign_keys")
        .ok()
        .flatten()
        .unwrap_or(0)
        != 0;
    if foreign_keys_on {
        db.exec_ignore_errors("PRAGMA foreign_keys=OFF");
    }
    db.exec_ignore_errors("DROP TABLE genre");
    db.exec_ignore_errors("ALTER TABLE genre_new RENAME TO genre");
    if foreign_keys_on {
        db.exec_ignore_errors("PRAGMA foreign_keys=ON");
    }
    db.exec_ignore_errors("CREATE INDEX IF NOT EXISTS genre_code_index ON genre (code)");
    Ok(())
}

// ── Base schema ─────────────────────────────────────────────────────────

const BASE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS author (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR NOT NULL COLLATE NOCASE
);
CREATE INDEX IF NOT EXISTS author_name_index ON author (name);

CREATE TABLE IF NOT EXISTS series (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR NOT NULL COLLATE NOCASE
);
CREATE INDEX IF NOT EXISTS series_name_index ON series (name);

CREATE TABLE IF NOT EXISTS folder (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR NOT NULL
);
CREATE INDEX IF NOT EXISTS folder_name_index ON folder (name);

CREATE TABLE IF NOT EXISTS book (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pathname VARCHAR NOT NULL,
    folder_fk INTEGER REFERENCES folder (id),
    filename VARCHAR NOT NULL,
    arcname VARCHAR,
    title VARCHAR COLLATE NOCASE,
    series_fk INTEGER REFERENCES series (id),
    series_number INTEGER,
    format INTEGER,
    filesize INTEGER,
    arcsize INTEGER,
    create_time INTEGER,
    last_access_time INTEGER,
    flags INTEGER DEFAULT 0,
    language VARCHAR DEFAULT NULL,
    description TEXT DEFAULT NULL,
    crc32 INTEGER DEFAULT NULL,
    dom_version INTEGER DEFAULT 0,
    rend_flags INTEGER DEFAULT 0
);
CREATE INDEX IF NOT EXISTS book_folder_index ON book (folder_fk);
CREATE UNIQUE INDEX IF NOT EXISTS book_pathname_index ON book (pathname);
CREATE INDEX IF NOT EXISTS book_filename_index ON book (filename);
CREATE INDEX IF NOT EXISTS book_title_index ON book (title);
CREATE INDEX IF NOT EXISTS book_last_access_time_index ON book (last_access_time);

CREATE TABLE IF NOT EXISTS book_author (
    book_fk INTEGER NOT NULL REFERENCES book (id),
    author_fk INTEGER NOT NULL REFERENCES author (id),
    PRIMARY KEY (book_fk, author_fk)
);
CREATE UNIQUE INDEX IF NOT EXISTS author_book_index ON book_author (author_fk, book_fk);

CREATE TABLE IF NOT EXISTS bookmark (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_fk INTEGER NOT NULL REFERENCES book (id),
    type INTEGER NOT NULL DEFAULT 0,
    percent INTEGER DEFAULT 0,
    shortcut INTEGER DEFAULT 0,
    time_stamp INTEGER DEFAULT 0,
    start_pos VARCHAR NOT NULL,
    end_pos VARCHAR,
    title_text VARCHAR,
    pos_text VARCHAR,
    comment_text VARCHAR,
    time_elapsed INTEGER DEFAULT 0
);
CREATE INDEX IF NOT EXISTS bookmark_book_index ON bookmark (book_fk);

CREATE TABLE IF NOT EXISTS metadata (
    param VARCHAR NOT NULL PRIMARY KEY,
    value VARCHAR NOT NULL
);

CREATE TABLE IF NOT EXISTS genre_group (
    id INTEGER NOT NULL PRIMARY KEY,
    code VARCHAR NOT NULL
);
CREATE INDEX IF NOT EXISTS genre_group_code_index ON genre_group (code);

CREATE TABLE IF NOT EXISTS genre (
    id INTEGER NOT NULL PRIMARY KEY,
    code VARCHAR NOT NULL UNIQUE
);
CREATE INDEX IF NOT EXISTS genre_code_index ON genre (code);

CREATE TABLE IF NOT EXISTS genre_hier (
    group_fk INTEGER NOT NULL REFERENCES genre_group(id),
    genre_fk INTEGER NOT NULL REFERENCES genre(id),
    UNIQUE (group_fk, genre_fk)
);

CREATE TABLE IF NOT EXISTS book_genre (
    book_fk INTEGER NOT NULL REFERENCES book(id),
    genre_fk INTEGER NOT NULL REFERENCES genre(id),
    UNIQUE (book_fk, genre_fk)
);
CREATE UNIQUE INDEX IF NOT EXISTS book_genre_index ON book_genre (book_fk, genre_fk);

CREATE TABLE IF NOT EXISTS opds_catalog (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name VARCHAR NOT NULL COLLATE NOCASE,
    url VARCHAR NOT NULL COLLATE NOCASE,
    last_usage INTEGER DEFAULT 0,
    username VARCHAR DEFAULT NULL,
    password VARCHAR DEFAULT NULL
);

CREATE TABLE IF NOT EXISTS favorite_folders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path VARCHAR NOT NULL,
    position INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    book_fk INTEGER NOT NULL REFERENCES book (id),
    search_text VARCHAR
);
CREATE INDEX IF NOT EXISTS search_history_index ON search_history (book_fk);
"#;
