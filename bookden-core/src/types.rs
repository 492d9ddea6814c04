//! Book and bookmark models as persisted by the store.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::format::DocumentFormat;
use crate::pathname;
use crate::{flags, ReadingState};

/// Virtual path prefixes for synthetic browse nodes. These never collide
/// with real filesystem paths because they start with `@`.
pub const AUTHOR_PREFIX: &str = "@author:";
pub const AUTHOR_GROUP_PREFIX: &str = "@authorGroup:";
pub const SERIES_PREFIX: &str = "@series:";
pub const SERIES_GROUP_PREFIX: &str = "@seriesGroup:";
pub const TITLE_GROUP_PREFIX: &str = "@titleGroup:";
pub const GENRE_PREFIX: &str = "@genre:";
pub const OPDS_PREFIX: &str = "@opds:";

/// One row of the `book` table, plus the dimension attributes resolved to
/// text. `authors` and `genres` are not columns of `book`: they are
/// materialized at read time from the association tables as
/// `|`-separated lists, and split back into tokens on save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: Option<i64>,
    /// Path of the file, or of the member inside `arcname`.
    pub pathname: String,
    /// Folder the file lives in; resolved to `folder_fk` on save.
    pub path: Option<String>,
    pub filename: String,
    pub arcname: Option<String>,
    pub title: Option<String>,
    /// `|`-separated author names.
    pub authors: Option<String>,
    /// `|`-separated genre codes.
    pub genres: Option<String>,
    /// Series name; resolved to `series_fk` on save.
    pub series: Option<String>,
    pub series_number: i64,
    pub format: DocumentFormat,
    pub size: i64,
    pub arcsize: i64,
    pub create_time: i64,
    pub last_access_time: i64,
    pub flags: i64,
    pub language: Option<String>,
    pub description: Option<String>,
    /// Content fingerprint of the file, when the engine has computed one.
    pub crc32: Option<i64>,
    pub dom_version: i64,
    pub rend_flags: i64,
}

impl BookRecord {
    /// Build a fresh record from a composite path key, filling in the
    /// parts derivable from the path itself. Size and timestamps are left
    /// for the caller.
    pub fn from_path_key(path_key: &str) -> BookRecord {
        let (arcname, inner) = pathname::split_arc_path(path_key);
        BookRecord {
            pathname: inner.to_string(),
            arcname: arcname.map(str::to_string),
            filename: pathname::file_name_of(inner).to_string(),
            path: match arcname {
                // Members sort under the archive's folder.
                Some(arc) => Some(pathname::folder_of(arc).to_string()),
                None => Some(pathname::folder_of(inner).to_string()),
            }
            .filter(|p| !p.is_empty()),
            format: DocumentFormat::by_extension(inner),
            ..BookRecord::default()
        }
    }

    /// The composite identity key stored in the `pathname` column.
    pub fn path_key(&self) -> String {
        pathname::arc_path_key(self.arcname.as_deref(), &self.pathname)
    }

    /// Whether the backing file (the archive, for archive members) still
    /// exists on disk.
    pub fn file_exists(&self) -> bool {
        let on_disk = self.arcname.as_deref().unwrap_or(&self.pathname);
        Path::new(on_disk).exists()
    }

    pub fn rating(&self) -> u8 {
        flags::rating(self.flags)
    }

    pub fn set_rating(&mut self, rating: u8) {
        self.flags = flags::with_rating(self.flags, rating);
    }

    pub fn reading_state(&self) -> ReadingState {
        flags::reading_state(self.flags)
    }

    pub fn set_reading_state(&mut self, state: ReadingState) {
        self.flags = flags::with_reading_state(self.flags, state);
    }
}

/// What a bookmark row represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookmarkKind {
    /// The single last-read position of the book.
    #[default]
    LastPosition,
    /// A user-placed bookmark.
    Position,
    /// A user comment attached to a range.
    Comment,
    /// A text correction attached to a range.
    Correction,
}

impl BookmarkKind {
    pub fn ordinal(&self) -> i64 {
        match self {
            Self::LastPosition => 0,
            Self::Position => 1,
            Self::Comment => 2,
            Self::Correction => 3,
        }
    }

    pub fn by_ordinal(ordinal: i64) -> BookmarkKind {
        match ordinal {
            1 => Self::Position,
            2 => Self::Comment,
            3 => Self::Correction,
            _ => Self::LastPosition,
        }
    }
}

/// One row of the `bookmark` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkRecord {
    pub id: Option<i64>,
    pub kind: BookmarkKind,
    pub percent: i64,
    pub shortcut: i64,
    pub time_stamp: i64,
    pub start_pos: String,
    pub end_pos: Option<String>,
    pub title_text: Option<String>,
    pub pos_text: Option<String>,
    pub comment_text: Option<String>,
    pub time_elapsed: i64,
}

impl BookmarkRecord {
    /// Identity used to match logically-equivalent bookmarks across saves,
    /// independent of the row id. There is exactly one last-position
    /// marker per book; every other bookmark is identified by its kind
    /// and start position.
    pub fn semantic_key(&self) -> String {
        match self.kind {
            BookmarkKind::LastPosition => "@last".to_string(),
            kind => format!("{}:{}", kind.ordinal(), self.start_pos),
        }
    }
}

/// A book together with its full bookmark set, as loaded and saved in one
/// operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookInfo {
    pub file: BookRecord,
    pub bookmarks: Vec<BookmarkRecord>,
}

impl BookInfo {
    pub fn new(file: BookRecord) -> BookInfo {
        BookInfo {
            file,
            bookmarks: Vec::new(),
        }
    }
}
