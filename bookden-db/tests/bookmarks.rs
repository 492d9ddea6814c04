use bookden_core::{BookInfo, BookRecord, BookmarkKind, BookmarkRecord};
use bookden_db::{BookmarkSyncStats, LibraryDb};

fn book_with(bookmarks: Vec<BookmarkRecord>) -> BookInfo {
    let mut record = BookRecord::from_path_key("/books/war.epub");
    record.title = Some("War and Peace".to_string());
    record.size = 1000;
    BookInfo { file: record, bookmarks }
}

fn comment_at(start: &str, text: &str) -> BookmarkRecord {
    BookmarkRecord {
        kind: BookmarkKind::Comment,
        start_pos: start.to_string(),
        end_pos: Some(format!("{start}/end")),
        comment_text: Some(text.to_string()),
        ..BookmarkRecord::default()
    }
}

fn position_at(start: &str) -> BookmarkRecord {
    BookmarkRecord {
        kind: BookmarkKind::Position,
        start_pos: start.to_string(),
        ..BookmarkRecord::default()
    }
}

#[test]
fn reconciliation_matches_by_semantic_key() {
    let mut db = LibraryDb::open_memory().unwrap();
    let mut book = book_with(vec![comment_at("/1/2", "first thoughts"), position_at("/3")]);
    let stats = db.save_book_info(&mut book).unwrap();
    assert_eq!(
        stats,
        BookmarkSyncStats { added: 2, updated: 0, removed: 0 }
    );
    let a_id = book.bookmarks[0].id.unwrap();

    // A' differs from A in its comment text, B is gone, C is new.
    let mut book = book_with(vec![comment_at("/1/2", "revised thoughts"), position_at("/5")]);
    let stats = db.save_book_info(&mut book).unwrap();
    assert_eq!(
        stats,
        BookmarkSyncStats { added: 1, updated: 1, removed: 1 }
    );
    // The updated bookmark kept its row id.
    assert_eq!(book.bookmarks[0].id, Some(a_id));

    db.flush().unwrap();
    let loaded = db.load_book_info("/books/war.epub").unwrap().unwrap();
    assert_eq!(loaded.bookmarks.len(), 2);
    let comment = loaded
        .bookmarks
        .iter()
        .find(|b| b.kind == BookmarkKind::Comment)
        .unwrap();
    assert_eq!(comment.id, Some(a_id));
    assert_eq!(comment.comment_text.as_deref(), Some("revised thoughts"));
    let position = loaded
        .bookmarks
        .iter()
        .find(|b| b.kind == BookmarkKind::Position)
        .unwrap();
    assert_eq!(position.start_pos, "/5");
}

#[test]
fn unchanged_bookmark_set_issues_no_writes() {
    let mut db = LibraryDb::open_memory().unwrap();
    let mut book = book_with(vec![comment_at("/1/2", "note"), position_at("/3")]);
    db.save_book_info(&mut book).unwrap();
    db.flush().unwrap();

    let mut reloaded = db.load_book_info("/books/war.epub").unwrap().unwrap();
    let before = db.query_long("SELECT total_changes()").unwrap().unwrap();
    let stats = db.save_book_info(&mut reloaded).unwrap();
    assert_eq!(stats, BookmarkSyncStats::default());
    let after = db.query_long("SELECT total_changes()").unwrap().unwrap();
    assert_eq!(before, after);
}

#[test]
fn last_position_is_a_singleton() {
    let mut db = LibraryDb::open_memory().unwrap();
    let mut book = book_with(vec![BookmarkRecord {
        kind: BookmarkKind::LastPosition,
        start_pos: "/10".to_string(),
        percent: 1000,
        ..BookmarkRecord::default()
    }]);
    db.save_book_info(&mut book).unwrap();
    let first_id = book.bookmarks[0].id;

    // A later position replaces the marker row in place.
    let mut book = book_with(vec![BookmarkRecord {
        kind: BookmarkKind::LastPosition,
        start_pos: "/20".to_string(),
        percent: 2000,
        ..BookmarkRecord::default()
    }]);
    let stats = db.save_book_info(&mut book).unwrap();
    assert_eq!(
        stats,
        BookmarkSyncStats { added: 0, updated: 1, removed: 0 }
    );
    assert_eq!(book.bookmarks[0].id, first_id);

    let rows = db
        .query_long("SELECT count(*) FROM bookmark")
        .unwrap()
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn corrupt_duplicate_bookmarks_are_repaired_on_save() {
    let mut db = LibraryDb::open_memory().unwrap();
    let mut book = book_with(vec![comment_at("/1/2", "kept")]);
    db.save_book_info(&mut book).unwrap();
    let book_id = book.file.id.unwrap();

    // Forge a duplicate row with the same semantic key behind the
    // store's back.
    db.exec(&format!(
        "INSERT INTO bookmark (book_fk, type, start_pos, comment_text) \
         VALUES ({book_id}, 2, '/1/2', 'duplicate')"
    ))
    .unwrap();
    db.flush().unwrap();

    let mut book = book_with(vec![comment_at("/1/2", "kept")]);
    db.save_book_info(&mut book).unwrap();

    let rows = db
        .query_long("SELECT count(*) FROM bookmark")
        .unwrap()
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn bookmarks_load_in_kind_order() {
    let mut db = LibraryDb::open_memory().unwrap();
    let mut book = book_with(vec![
        comment_at("/7", "c"),
        position_at("/3"),
        BookmarkRecord {
            kind: BookmarkKind::LastPosition,
            start_pos: "/1".to_string(),
            ..BookmarkRecord::default()
        },
    ]);
    db.save_book_info(&mut book).unwrap();
    db.flush().unwrap();

    let loaded = db.load_book_info("/books/war.epub").unwrap().unwrap();
    let kinds: Vec<BookmarkKind> = loaded.bookmarks.iter().map(|b| b.kind).collect();
    assert_eq!(
        kinds,
        vec![
            BookmarkKind::LastPosition,
            BookmarkKind::Position,
            BookmarkKind::Comment,
        ]
    );
}
