//! Core domain types for the bookden library database.
//!
//! Everything here is independent of the storage engine: document format
//! classification, the flags bitfield, archive-aware path handling, the
//! book/bookmark models, and the built-in genre taxonomy.

pub mod flags;
pub mod format;
pub mod genres;
pub mod pathname;
pub mod types;
pub mod util;

pub use flags::ReadingState;
pub use format::DocumentFormat;
pub use genres::{GenreEntry, GenreGroup, GenreRecord, GenresCollection};
pub use types::{BookInfo, BookRecord, BookmarkKind, BookmarkRecord};
