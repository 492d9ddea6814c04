//! bookden CLI
//!
//! Command-line interface for the bookden library database: import books
//! from a folder, browse the grouped author/series/title indexes, search,
//! and inspect the store.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use bookden_core::{BookInfo, BookRecord, DocumentFormat};
use bookden_db::{CatalogEntry, CatalogTree, LibraryDb};

#[derive(Parser)]
#[command(name = "bookden")]
#[command(about = "Personal e-book library database", long_about = None)]
struct Cli {
    /// Path to the library database file
    #[arg(short, long, global = true, default_value = "bookden.sqlite")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a folder for e-books and add them to the library
    Import {
        /// Folder to scan recursively
        folder: PathBuf,

        /// Skip computing content fingerprints (faster on slow storage)
        #[arg(long)]
        no_fingerprint: bool,
    },

    /// Browse authors as a grouped tree
    Authors,

    /// Browse series as a grouped tree
    Series,

    /// Browse titles as a grouped tree
    Titles,

    /// List genre groups with book counts
    Genres {
        /// Include genres without any books
        #[arg(long)]
        all: bool,
    },

    /// Search the library
    Search {
        /// Author name pattern (substring, or glob with * and ?)
        #[arg(short, long)]
        author: Option<String>,

        /// Title pattern
        #[arg(short, long)]
        title: Option<String>,

        /// Series pattern
        #[arg(short, long)]
        series: Option<String>,

        /// Filename pattern
        #[arg(short, long)]
        filename: Option<String>,

        /// Maximum number of results
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Show the most recently read books
    Recent {
        /// Maximum number of entries
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Show library statistics
    Stats,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let mut db = match LibraryDb::open(&cli.db) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to open {}: {e}", cli.db.display());
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Import {
            folder,
            no_fingerprint,
        } => cmd_import(&mut db, &folder, !no_fingerprint),
        Commands::Authors => cmd_authors(&mut db),
        Commands::Series => cmd_series(&mut db),
        Commands::Titles => cmd_titles(&mut db),
        Commands::Genres { all } => cmd_genres(&mut db, all),
        Commands::Search {
            author,
            title,
            series,
            filename,
            limit,
        } => cmd_search(
            &mut db,
            author.as_deref(),
            title.as_deref(),
            series.as_deref(),
            filename.as_deref(),
            limit,
        ),
        Commands::Recent { limit } => cmd_recent(&mut db, limit),
        Commands::Stats => cmd_stats(&db),
    };

    let flushed = db.close();
    if let Err(e) = result.and(flushed) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

type CmdResult = Result<(), bookden_db::DbError>;

// ── Import ──────────────────────────────────────────────────────────────

fn cmd_import(db: &mut LibraryDb, folder: &Path, fingerprint: bool) -> CmdResult {
    let mut files = Vec::new();
    collect_book_files(folder, &mut files)?;
    if files.is_empty() {
        println!("no e-book files found under {}", folder.display());
        return Ok(());
    }

    let bar = ProgressBar::new(files.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
            .expect("static progress template"),
    );

    let mut records = Vec::new();
    for path in &files {
        bar.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        match build_record(path, fingerprint) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("skipping {}: {e}", path.display()),
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    let saved = db.save_file_records(&mut records)?;
    db.flush()?;
    println!(
        "{} {} of {} files",
        "imported".if_supports_color(Stdout, |t| t.green()),
        saved,
        files.len()
    );
    Ok(())
}

fn collect_book_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_book_files(&path, out)?;
        } else if DocumentFormat::by_extension(&path.to_string_lossy()) != DocumentFormat::Unknown {
            out.push(path);
        }
    }
    Ok(())
}

fn build_record(path: &Path, fingerprint: bool) -> std::io::Result<BookRecord> {
    let meta = std::fs::metadata(path)?;
    let mut record = BookRecord::from_path_key(&path.to_string_lossy());
    record.size = meta.len() as i64;
    record.create_time = meta
        .created()
        .or_else(|_| meta.modified())
        .map(|t| DateTime::<Utc>::from(t).timestamp())
        .unwrap_or(0);
    record.title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned());
    if fingerprint {
        record.crc32 = Some(i64::from(file_crc32(path)?));
    }
    Ok(record)
}

fn file_crc32(path: &Path) -> std::io::Result<u32> {
    let mut file = File::open(path)?;
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

// ── Browse ──────────────────────────────────────────────────────────────

fn cmd_authors(db: &mut LibraryDb) -> CmdResult {
    let tree = db.load_authors_list()?;
    print_entry_tree(&tree);
    Ok(())
}

fn cmd_series(db: &mut LibraryDb) -> CmdResult {
    let tree = db.load_series_list()?;
    print_entry_tree(&tree);
    Ok(())
}

fn cmd_titles(db: &mut LibraryDb) -> CmdResult {
    let tree = db.load_title_list()?;
    print_tree(&tree, CatalogTree::<BookRecord>::ROOT, 0, &|record| {
        format!(
            "{} ({})",
            record.title.as_deref().unwrap_or(&record.filename),
            record.filename
        )
    });
    Ok(())
}

fn cmd_genres(db: &mut LibraryDb, show_empty: bool) -> CmdResult {
    for entry in db.load_genres_list(show_empty)? {
        println!("{}  {}", entry.name, count_tag(entry.book_count));
    }
    Ok(())
}

fn print_entry_tree(tree: &CatalogTree<CatalogEntry>) {
    print_tree(tree, CatalogTree::<CatalogEntry>::ROOT, 0, &|entry| {
        format!("{}  {}", entry.name, count_tag(entry.book_count))
    });
}

fn print_tree<T>(
    tree: &CatalogTree<T>,
    node_index: usize,
    depth: usize,
    describe: &dyn Fn(&T) -> String,
) {
    let node = tree.node(node_index);
    if depth > 0 {
        let indent = "  ".repeat(depth - 1);
        match &node.item {
            Some(item) => println!("{indent}{}", describe(item)),
            None => println!(
                "{indent}{}",
                node.label.if_supports_color(Stdout, |t| t.cyan())
            ),
        }
    }
    for &child in &node.children {
        print_tree(tree, child, depth + 1, describe);
    }
}

fn count_tag(count: i64) -> String {
    format!("[{count}]")
}

// ── Search and stats ────────────────────────────────────────────────────

fn cmd_search(
    db: &mut LibraryDb,
    author: Option<&str>,
    title: Option<&str>,
    series: Option<&str>,
    filename: Option<&str>,
    limit: usize,
) -> CmdResult {
    if author.is_none() && title.is_none() && series.is_none() && filename.is_none() {
        println!("give at least one of --author, --title, --series, --filename");
        return Ok(());
    }
    let results = db.find_by_patterns(limit, author, title, series, filename)?;
    if results.is_empty() {
        println!("no matches");
        return Ok(());
    }
    for record in &results {
        print_record(record);
    }
    Ok(())
}

fn cmd_recent(db: &mut LibraryDb, limit: usize) -> CmdResult {
    let recent = db.load_recent_books(limit)?;
    if recent.is_empty() {
        println!("no reading history");
        return Ok(());
    }
    for BookInfo { file, bookmarks } in &recent {
        print_record(file);
        if let Some(position) = bookmarks.iter().find(|b| {
            b.kind == bookden_core::BookmarkKind::LastPosition
        }) {
            println!(
                "    {} {}%",
                "at".if_supports_color(Stdout, |t| t.dimmed()),
                position.percent / 100
            );
        }
    }
    Ok(())
}

fn print_record(record: &BookRecord) {
    let title = record.title.as_deref().unwrap_or(&record.filename);
    let authors = record.authors.as_deref().unwrap_or("unknown author");
    println!(
        "{}  {}  {}",
        title.if_supports_color(Stdout, |t| t.bold()),
        authors,
        record
            .path_key()
            .if_supports_color(Stdout, |t| t.dimmed())
    );
}

fn cmd_stats(db: &LibraryDb) -> CmdResult {
    let stats = db.stats()?;
    println!("books:     {}", stats.books);
    println!("authors:   {}", stats.authors);
    println!("series:    {}", stats.series);
    println!("folders:   {}", stats.folders);
    println!("bookmarks: {}", stats.bookmarks);
    println!("schema:    v{}", db.schema_version()?);
    Ok(())
}
