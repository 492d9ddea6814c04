//! Small string helpers shared by the store and the CLI.

/// Match a name against a user-supplied pattern, case-insensitively.
///
/// Patterns may contain `*` (any run of characters) and `?` (any single
/// character). A pattern without wildcards matches as a substring, which
/// is what search fields expect.
pub fn match_pattern(name: &str, pattern: &str) -> bool {
    if pattern.is_empty() {
        return true;
    }
    let name: Vec<char> = name.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();
    if !pattern.iter().any(|&c| c == '*' || c == '?') {
        return contains(&name, &pattern);
    }
    glob_match(&name, &pattern)
}

fn contains(haystack: &[char], needle: &[char]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

fn glob_match(name: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => name.is_empty(),
        Some('*') => {
            (0..=name.len()).any(|skip| glob_match(&name[skip..], &pattern[1..]))
        }
        Some('?') => !name.is_empty() && glob_match(&name[1..], &pattern[1..]),
        Some(&c) => name.first() == Some(&c) && glob_match(&name[1..], &pattern[1..]),
    }
}

/// Rearrange an author name for file-as sorting: the last word moves to
/// the front, so "Leo Tolstoy" sorts as "Tolstoy Leo". Single-word names
/// pass through unchanged.
pub fn author_sort_name(name: &str) -> String {
    let trimmed = name.trim();
    match trimmed.rsplit_once(' ') {
        Some((given, family)) if !given.is_empty() => {
            format!("{} {}", family, given.trim_end())
        }
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_match_is_case_insensitive() {
        assert!(match_pattern("War and Peace", "peace"));
        assert!(match_pattern("War and Peace", "WAR"));
        assert!(!match_pattern("War and Peace", "hobbit"));
    }

    #[test]
    fn wildcard_match() {
        assert!(match_pattern("War and Peace", "war*peace"));
        assert!(match_pattern("book1.fb2", "book?.fb2"));
        assert!(!match_pattern("book12.fb2", "book?.fb2"));
        assert!(match_pattern("anything", "*"));
    }

    #[test]
    fn empty_pattern_matches_everything() {
        assert!(match_pattern("anything", ""));
    }

    #[test]
    fn author_file_as() {
        assert_eq!(author_sort_name("Leo Tolstoy"), "Tolstoy Leo");
        assert_eq!(author_sort_name("Plato"), "Plato");
        assert_eq!(
            author_sort_name("Arthur Conan Doyle"),
            "Doyle Arthur Conan"
        );
        assert_eq!(author_sort_name("  Leo Tolstoy  "), "Tolstoy Leo");
    }
}
