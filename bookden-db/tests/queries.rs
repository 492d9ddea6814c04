use std::fs;
use std::path::Path;

use bookden_core::{BookRecord, ReadingState};
use bookden_db::{CatalogTree, GenreListing, LibraryDb};
use tempfile::TempDir;

/// Create a real file and a record pointing at it; the bulk readers skip
/// rows whose file is gone from disk.
fn record_on_disk(dir: &Path, name: &str, title: &str, author: &str) -> BookRecord {
    let path = dir.join(name);
    fs::write(&path, b"content").unwrap();
    let mut record = BookRecord::from_path_key(&path.to_string_lossy());
    record.size = 7;
    record.title = Some(title.to_string());
    record.authors = Some(author.to_string());
    record
}

#[test]
fn authors_list_groups_and_sorts_by_family_name() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();
    let authors = [
        "Leo Tolstoy",
        "Anton Chekhov",
        "Arthur Conan Doyle",
        "Plato",
    ];
    for (i, author) in authors.iter().enumerate() {
        let mut record =
            record_on_disk(dir.path(), &format!("b{i}.epub"), &format!("Book {i}"), author);
        db.save_file_record(&mut record).unwrap();
    }

    let tree = db.load_authors_list().unwrap();
    let leaves = tree.leaves();
    assert_eq!(leaves.len(), 4);
    let names: Vec<&str> = leaves.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Chekhov Anton", "Doyle Arthur Conan", "Plato", "Tolstoy Leo"]
    );
    for leaf in leaves {
        assert_eq!(leaf.book_count, 1);
        assert!(leaf.pathname.starts_with("@author:"));
    }
}

#[test]
fn author_books_are_existence_filtered() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();

    let mut present = record_on_disk(dir.path(), "here.epub", "Here", "Leo Tolstoy");
    db.save_file_record(&mut present).unwrap();
    let mut gone = BookRecord::from_path_key("/nowhere/gone.epub");
    gone.title = Some("Gone".to_string());
    gone.authors = Some("Leo Tolstoy".to_string());
    db.save_file_record(&mut gone).unwrap();

    let tree = db.load_authors_list().unwrap();
    let author_id = tree.leaves()[0].id;

    let books = db.find_author_books(author_id).unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0].title.as_deref(), Some("Here"));
}

#[test]
fn title_list_collapses_duplicates_and_skips_stale_rows() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();

    let mut a1 = record_on_disk(dir.path(), "alpha1.epub", "Alpha", "X");
    let mut a2 = record_on_disk(dir.path(), "alpha2.epub", "Alpha", "X");
    db.save_file_record(&mut a1).unwrap();
    db.save_file_record(&mut a2).unwrap();
    let mut stale = BookRecord::from_path_key("/nowhere/beta.epub");
    stale.title = Some("Beta".to_string());
    db.save_file_record(&mut stale).unwrap();

    let tree = db.load_title_list().unwrap();
    let titles: Vec<&str> = tree
        .leaves()
        .iter()
        .map(|b| b.title.as_deref().unwrap())
        .collect();
    assert_eq!(titles, vec!["Alpha"]);
}

#[test]
fn series_books_come_back_in_series_order() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();
    for (i, (name, number)) in [("second.epub", 2), ("first.epub", 1), ("third.epub", 3)]
        .iter()
        .enumerate()
    {
        let mut record = record_on_disk(dir.path(), name, &format!("Vol {i}"), "X");
        record.series = Some("Foundation".to_string());
        record.series_number = *number;
        db.save_file_record(&mut record).unwrap();
    }

    let tree = db.load_series_list().unwrap();
    assert_eq!(tree.leaves().len(), 1);
    let series_id = tree.leaves()[0].id;
    assert_eq!(tree.leaves()[0].book_count, 3);

    let books = db.find_series_books(series_id).unwrap();
    let numbers: Vec<i64> = books.iter().map(|b| b.series_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn rating_and_state_filters_read_the_flags_bitfield() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();

    let mut liked = record_on_disk(dir.path(), "liked.epub", "Liked", "X");
    liked.set_rating(5);
    liked.set_reading_state(ReadingState::Finished);
    db.save_file_record(&mut liked).unwrap();

    let mut meh = record_on_disk(dir.path(), "meh.epub", "Meh", "X");
    meh.set_rating(2);
    meh.set_reading_state(ReadingState::Reading);
    db.save_file_record(&mut meh).unwrap();

    let best = db.find_books_by_rating(4, 5).unwrap();
    assert_eq!(best.len(), 1);
    assert_eq!(best[0].title.as_deref(), Some("Liked"));

    let reading = db.find_books_by_state(ReadingState::Reading).unwrap();
    assert_eq!(reading.len(), 1);
    assert_eq!(reading[0].title.as_deref(), Some("Meh"));
}

#[test]
fn pattern_search_spans_author_title_and_filename() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();
    let mut record = record_on_disk(dir.path(), "war.epub", "War and Peace", "Leo Tolstoy");
    db.save_file_record(&mut record).unwrap();
    let mut other = record_on_disk(dir.path(), "hound.epub", "The Hound", "Arthur Conan Doyle");
    db.save_file_record(&mut other).unwrap();

    let hits = db
        .find_by_patterns(10, Some("tolst*"), None, None, None)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title.as_deref(), Some("War and Peace"));

    let hits = db
        .find_by_patterns(10, None, Some("hound"), None, None)
        .unwrap();
    assert_eq!(hits.len(), 1);

    let hits = db
        .find_by_patterns(10, Some("tolst*"), Some("hound"), None, None)
        .unwrap();
    assert!(hits.is_empty());

    let hits = db
        .find_by_patterns(10, None, None, None, Some("war.*"))
        .unwrap();
    assert_eq!(hits.len(), 1);

    // No pattern at all means no result, not a full scan.
    let hits = db.find_by_patterns(10, None, None, None, None).unwrap();
    assert!(hits.is_empty());
}

#[test]
fn fingerprint_lookup_matches_stored_crc() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();
    let mut record = record_on_disk(dir.path(), "war.epub", "War", "X");
    record.crc32 = Some(0xCAFE);
    db.save_file_record(&mut record).unwrap();

    let hits = db.find_by_fingerprints(10, &[0xCAFE, 0xBEEF]).unwrap();
    assert_eq!(hits.len(), 1);
    assert!(db.find_by_fingerprints(10, &[0xBEEF]).unwrap().is_empty());
    assert!(db.find_by_fingerprints(10, &[]).unwrap().is_empty());
}

#[test]
fn genre_browse_descends_from_group_to_books() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();
    let mut record = record_on_disk(dir.path(), "dune.epub", "Dune", "X");
    record.genres = Some("sf_space".to_string());
    db.save_file_record(&mut record).unwrap();

    // Top level: only the SF group has books.
    let groups = db.load_genres_list(false).unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].pathname, "@genre:sf");
    assert_eq!(groups[0].book_count, 1);

    // Inside the group: the pseudo "all" entry plus the populated child.
    let listing = db.find_by_genre("sf", false).unwrap();
    let GenreListing::Groups(entries) = listing else {
        panic!("expected group entries");
    };
    assert_eq!(entries[0].pathname, "@genre:sf:all");
    assert_eq!(entries[0].book_count, 1);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].pathname, "@genre:sf_space");

    // Leaf genre and group:all both resolve to books.
    for code in ["sf_space", "sf:all"] {
        let listing = db.find_by_genre(code, false).unwrap();
        let GenreListing::Books(books) = listing else {
            panic!("expected books for {code}");
        };
        assert_eq!(books.len(), 1, "{code}");
        assert_eq!(books[0].title.as_deref(), Some("Dune"));
    }

    // Unknown codes are absence, not errors.
    let listing = db.find_by_genre("no_such", false).unwrap();
    let GenreListing::Books(books) = listing else {
        panic!("expected empty listing");
    };
    assert!(books.is_empty());
}

#[test]
fn recent_books_are_ordered_and_capped() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();
    for i in 0..5 {
        let mut record =
            record_on_disk(dir.path(), &format!("r{i}.epub"), &format!("R{i}"), "X");
        record.last_access_time = 1_600_000_000 + i;
        db.save_file_record(&mut record).unwrap();
    }
    let mut unread = record_on_disk(dir.path(), "unread.epub", "Unread", "X");
    db.save_file_record(&mut unread).unwrap();

    let recent = db.load_recent_books(3).unwrap();
    assert_eq!(recent.len(), 3);
    let titles: Vec<&str> = recent
        .iter()
        .map(|b| b.file.title.as_deref().unwrap())
        .collect();
    assert_eq!(titles, vec!["R4", "R3", "R2"]);
}

#[test]
fn grouping_scales_to_a_large_author_population() {
    let dir = TempDir::new().unwrap();
    let mut db = LibraryDb::open_memory().unwrap();
    // 60 authors whose family names spread over three initials; the
    // file-as transform sorts by family name.
    let surnames = ["Abbot", "Acker", "Banks", "Bosch", "Cane", "Cole"];
    let mut count = 0;
    for surname in surnames {
        for i in 0..10 {
            let author = format!("Writer{count:02} {surname}{i}");
            let mut record = record_on_disk(
                dir.path(),
                &format!("g{count}.epub"),
                &format!("G{count}"),
                &author,
            );
            db.save_file_record(&mut record).unwrap();
            count += 1;
        }
    }

    let tree = db.load_authors_list().unwrap();
    assert_eq!(tree.leaves().len(), 60);
    let root = tree.node(CatalogTree::<bookden_db::CatalogEntry>::ROOT);
    // The root shows the three letter groups, not sixty flat entries.
    assert_eq!(root.children.len(), 3);
    let labels: Vec<&str> = root
        .children
        .iter()
        .map(|&c| tree.node(c).label.as_str())
        .collect();
    assert_eq!(labels, vec!["A...", "B...", "C..."]);
}
