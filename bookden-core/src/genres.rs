//! The built-in genre taxonomy.
//!
//! A two-level classification tree (groups containing genre codes) with
//! stable numeric ids and display labels, loaded from an embedded JSON
//! handbook. The store mirrors this tree into its `genre_group` /
//! `genre` / `genre_hier` tables and records the handbook version so the
//! sync is skipped when nothing changed.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;

const BUILTIN_GENRES_JSON: &str = include_str!("genres.json");

#[derive(Debug, Error)]
pub enum GenresError {
    #[error("malformed genre handbook: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("duplicate genre code '{0}' in handbook")]
    DuplicateCode(String),
}

/// A leaf genre: a classification code under exactly one group.
#[derive(Debug, Clone, Deserialize)]
pub struct GenreRecord {
    pub id: i64,
    pub code: String,
    pub name: String,
}

/// A top-level genre group and its children.
#[derive(Debug, Clone, Deserialize)]
pub struct GenreGroup {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub genres: Vec<GenreRecord>,
}

#[derive(Debug, Deserialize)]
struct Handbook {
    version: i64,
    groups: Vec<GenreGroup>,
}

/// Either level of the taxonomy, as returned by code lookup.
#[derive(Debug, Clone, Copy)]
pub enum GenreEntry<'a> {
    Group(&'a GenreGroup),
    Genre(&'a GenreRecord),
}

/// The loaded taxonomy with a code index over both levels.
#[derive(Debug)]
pub struct GenresCollection {
    version: i64,
    groups: Vec<GenreGroup>,
    // (group index, Some(child index) for leaves)
    by_code: HashMap<String, (usize, Option<usize>)>,
}

impl GenresCollection {
    /// Load the embedded handbook. The embedded data is validated by
    /// tests, so failures here mean a corrupted build.
    pub fn builtin() -> GenresCollection {
        Self::from_json(BUILTIN_GENRES_JSON)
            .unwrap_or_else(|e| panic!("embedded genre handbook is invalid: {e}"))
    }

    /// Parse a handbook from JSON and build the code index.
    pub fn from_json(json: &str) -> Result<GenresCollection, GenresError> {
        let handbook: Handbook = serde_json::from_str(json)?;
        let mut by_code = HashMap::new();
        for (gi, group) in handbook.groups.iter().enumerate() {
            if by_code.insert(group.code.clone(), (gi, None)).is_some() {
                return Err(GenresError::DuplicateCode(group.code.clone()));
            }
            for (ci, genre) in group.genres.iter().enumerate() {
                if by_code.insert(genre.code.clone(), (gi, Some(ci))).is_some() {
                    return Err(GenresError::DuplicateCode(genre.code.clone()));
                }
            }
        }
        Ok(GenresCollection {
            version: handbook.version,
            groups: handbook.groups,
            by_code,
        })
    }

    /// Handbook version, persisted to skip redundant re-syncs.
    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn groups(&self) -> &[GenreGroup] {
        &self.groups
    }

    /// Look up a group or leaf genre by code.
    pub fn by_code(&self, code: &str) -> Option<GenreEntry<'_>> {
        let &(gi, ci) = self.by_code.get(code)?;
        Some(match ci {
            None => GenreEntry::Group(&self.groups[gi]),
            Some(ci) => GenreEntry::Genre(&self.groups[gi].genres[ci]),
        })
    }

    /// Numeric id for a leaf genre code, if known.
    pub fn genre_id(&self, code: &str) -> Option<i64> {
        match self.by_code(code)? {
            GenreEntry::Genre(genre) => Some(genre.id),
            GenreEntry::Group(_) => None,
        }
    }

    /// Display label for any known code; falls back to the code itself so
    /// unknown codes stay visible rather than disappearing.
    pub fn translate<'a>(&'a self, code: &'a str) -> &'a str {
        match self.by_code(code) {
            Some(GenreEntry::Group(group)) => &group.name,
            Some(GenreEntry::Genre(genre)) => &genre.name,
            None => code,
        }
    }
}
