//! Document format identification.
//!
//! The format of a book is stored in the database as a small integer, so
//! the mapping between variants and ordinals is part of the persistent
//! contract: ordinals must never be reassigned, only appended.

use serde::{Deserialize, Serialize};

/// Supported e-book document formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentFormat {
    #[default]
    Unknown,
    Fb2,
    Fb3,
    Txt,
    Rtf,
    Epub,
    Html,
    Chm,
    Doc,
    Docx,
    Pdb,
    Mobi,
}

/// All format variants in ordinal order.
const ALL_FORMATS: &[DocumentFormat] = &[
    DocumentFormat::Unknown,
    DocumentFormat::Fb2,
    DocumentFormat::Fb3,
    DocumentFormat::Txt,
    DocumentFormat::Rtf,
    DocumentFormat::Epub,
    DocumentFormat::Html,
    DocumentFormat::Chm,
    DocumentFormat::Doc,
    DocumentFormat::Docx,
    DocumentFormat::Pdb,
    DocumentFormat::Mobi,
];

impl DocumentFormat {
    /// The integer stored in the `book.format` column.
    pub fn ordinal(&self) -> i64 {
        match self {
            Self::Unknown => 0,
            Self::Fb2 => 1,
            Self::Fb3 => 2,
            Self::Txt => 3,
            Self::Rtf => 4,
            Self::Epub => 5,
            Self::Html => 6,
            Self::Chm => 7,
            Self::Doc => 8,
            Self::Docx => 9,
            Self::Pdb => 10,
            Self::Mobi => 11,
        }
    }

    /// Reverse of [`ordinal`](Self::ordinal). Unrecognized values map to
    /// `Unknown` rather than failing, since old databases may carry
    /// ordinals written by newer versions.
    pub fn by_ordinal(ordinal: i64) -> DocumentFormat {
        ALL_FORMATS
            .iter()
            .copied()
            .find(|f| f.ordinal() == ordinal)
            .unwrap_or(DocumentFormat::Unknown)
    }

    /// File extensions recognized for this format, lowercase, with the
    /// leading dot.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Unknown => &[],
            Self::Fb2 => &[".fb2", ".fb2.zip"],
            Self::Fb3 => &[".fb3"],
            Self::Txt => &[".txt"],
            Self::Rtf => &[".rtf"],
            Self::Epub => &[".epub"],
            Self::Html => &[".htm", ".html", ".shtml", ".xhtml"],
            Self::Chm => &[".chm"],
            Self::Doc => &[".doc"],
            Self::Docx => &[".docx"],
            Self::Pdb => &[".pdb", ".prc"],
            Self::Mobi => &[".mobi", ".azw"],
        }
    }

    /// Human-readable format name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Fb2 => "FictionBook 2",
            Self::Fb3 => "FictionBook 3",
            Self::Txt => "Plain text",
            Self::Rtf => "Rich Text",
            Self::Epub => "EPUB",
            Self::Html => "HTML",
            Self::Chm => "CHM",
            Self::Doc => "MS Word DOC",
            Self::Docx => "MS Word DOCX",
            Self::Pdb => "PalmDoc",
            Self::Mobi => "Mobipocket",
        }
    }

    /// Classify a path by its extension. The longest matching extension
    /// wins, so `book.fb2.zip` is FB2 rather than unclassified.
    pub fn by_extension(path: &str) -> DocumentFormat {
        let lower = path.to_lowercase();
        let mut best = DocumentFormat::Unknown;
        let mut best_len = 0;
        for &format in ALL_FORMATS {
            for ext in format.extensions() {
                if lower.ends_with(ext) && ext.len() > best_len {
                    best = format;
                    best_len = ext.len();
                }
            }
        }
        best
    }

    /// All variants in ordinal order.
    pub fn all() -> &'static [DocumentFormat] {
        ALL_FORMATS
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
