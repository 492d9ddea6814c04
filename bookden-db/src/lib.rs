//! SQLite persistence layer for the bookden e-book library.
//!
//! Provides the schema version ladder, change-tracked book and bookmark
//! persistence, dimension (author/series/folder) resolution, moved-file
//! detection, and the letter-prefix grouping used to build browsable
//! catalog trees. Backed by SQLite via rusqlite with the bundled feature.

pub mod books;
pub mod bookmarks;
pub mod catalogs;
pub mod dimensions;
pub mod error;
pub mod favorites;
pub mod grouping;
pub mod history;
pub mod queries;
pub mod schema;
pub mod store;

mod cache;
mod patch;

pub use bookmarks::BookmarkSyncStats;
pub use catalogs::OpdsCatalog;
pub use error::DbError;
pub use favorites::FavoriteFolder;
pub use grouping::{group_items, CatalogNode, CatalogTree};
pub use queries::{CatalogEntry, GenreListing, LibraryStats};
pub use schema::DB_VERSION;
pub use store::LibraryDb;
