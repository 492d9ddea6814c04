//! Archive-aware path handling.
//!
//! A book either lives directly on disk (`/books/war.epub`) or inside an
//! archive (`/books/tolstoy.zip@/war.fb2`). The composite form is the
//! book's identity key in the database, so splitting and joining must be
//! lossless.

/// Separator between an archive path and the member path inside it.
pub const ARC_SEPARATOR: &str = "@/";

/// Split a composite path key into `(archive, inner path)`.
///
/// A path with no separator is a plain file: `(None, path)`.
pub fn split_arc_path(path_key: &str) -> (Option<&str>, &str) {
    match path_key.find(ARC_SEPARATOR) {
        Some(pos) => (
            Some(&path_key[..pos]),
            &path_key[pos + ARC_SEPARATOR.len()..],
        ),
        None => (None, path_key),
    }
}

/// Build the composite path key from an optional archive and inner path.
pub fn arc_path_key(arcname: Option<&str>, pathname: &str) -> String {
    match arcname {
        Some(arc) => format!("{arc}{ARC_SEPARATOR}{pathname}"),
        None => pathname.to_string(),
    }
}

/// Final component of a slash-separated path.
pub fn file_name_of(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Directory part of a slash-separated path, without the trailing slash.
/// Empty when the path has no directory component.
pub fn folder_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(pos) => &path[..pos],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_plain_path() {
        assert_eq!(split_arc_path("/books/war.epub"), (None, "/books/war.epub"));
    }

    #[test]
    fn split_archive_member() {
        assert_eq!(
            split_arc_path("/books/t.zip@/war.fb2"),
            (Some("/books/t.zip"), "war.fb2")
        );
    }

    #[test]
    fn join_is_inverse_of_split() {
        for key in ["/books/war.epub", "/books/t.zip@/war.fb2"] {
            let (arc, inner) = split_arc_path(key);
            assert_eq!(arc_path_key(arc, inner), key);
        }
    }

    #[test]
    fn file_name_and_folder() {
        assert_eq!(file_name_of("/books/ru/war.epub"), "war.epub");
        assert_eq!(folder_of("/books/ru/war.epub"), "/books/ru");
        assert_eq!(file_name_of("war.epub"), "war.epub");
        assert_eq!(folder_of("war.epub"), "");
        assert_eq!(folder_of("/war.epub"), "/");
    }
}
