use bookden_db::LibraryDb;

#[test]
fn resolution_is_idempotent_and_inserts_once() {
    let mut db = LibraryDb::open_memory().unwrap();
    let first = db.author_id(Some("Leo Tolstoy")).unwrap().unwrap();
    let second = db.author_id(Some("Leo Tolstoy")).unwrap().unwrap();
    assert_eq!(first, second);
    let rows = db
        .query_long("SELECT count(*) FROM author")
        .unwrap()
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn empty_names_resolve_to_nothing() {
    let mut db = LibraryDb::open_memory().unwrap();
    assert_eq!(db.author_id(None).unwrap(), None);
    assert_eq!(db.author_id(Some("")).unwrap(), None);
    assert_eq!(db.series_id(Some("   ")).unwrap(), None);
    let rows = db
        .query_long("SELECT count(*) FROM series")
        .unwrap()
        .unwrap();
    assert_eq!(rows, 0);
}

#[test]
fn names_are_trimmed_before_resolution() {
    let mut db = LibraryDb::open_memory().unwrap();
    let first = db.series_id(Some("Foundation")).unwrap().unwrap();
    let second = db.series_id(Some("  Foundation  ")).unwrap().unwrap();
    assert_eq!(first, second);
}

#[test]
fn case_insensitive_match_reuses_the_stored_row() {
    let mut db = LibraryDb::open_memory().unwrap();
    let first = db.author_id(Some("Leo Tolstoy")).unwrap().unwrap();
    db.flush().unwrap(); // drop the cache so the store answers
    let second = db.author_id(Some("LEO TOLSTOY")).unwrap().unwrap();
    assert_eq!(first, second);
}

#[test]
fn each_dimension_has_its_own_namespace() {
    let mut db = LibraryDb::open_memory().unwrap();
    let author = db.author_id(Some("Solo")).unwrap().unwrap();
    let series = db.series_id(Some("Solo")).unwrap().unwrap();
    let folder = db.folder_id(Some("Solo")).unwrap().unwrap();
    // Ids come from separate tables; each table got exactly one row.
    for table in ["author", "series", "folder"] {
        let rows = db
            .query_long(&format!("SELECT count(*) FROM {table}"))
            .unwrap()
            .unwrap();
        assert_eq!(rows, 1, "{table}");
    }
    let _ = (author, series, folder);
}

#[test]
fn flush_clears_the_cache_and_store_wins() {
    let mut db = LibraryDb::open_memory().unwrap();
    let stale = db.author_id(Some("Ghost")).unwrap().unwrap();

    // A raw delete bypasses the cache, which keeps answering until the
    // owning store is flushed.
    db.exec("DELETE FROM author WHERE name='Ghost'").unwrap();
    let cached = db.author_id(Some("Ghost")).unwrap().unwrap();
    assert_eq!(cached, stale);

    db.flush().unwrap();
    let fresh = db.author_id(Some("Ghost")).unwrap().unwrap();
    let rows = db
        .query_long("SELECT count(*) FROM author")
        .unwrap()
        .unwrap();
    assert_eq!(rows, 1);
    assert!(fresh >= stale);
}
