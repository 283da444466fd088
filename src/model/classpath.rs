//! Classpath string handling.

use std::fmt;
use std::path::{Path, PathBuf};

/// Ordered list of classpath entries.
///
/// Parsed from a platform path-separated string (`:` on Unix, `;` on
/// Windows). Empty segments and duplicates are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassPath {
    entries: Vec<PathBuf>,
}

#[cfg(windows)]
const SEPARATOR: char = ';';
#[cfg(not(windows))]
const SEPARATOR: char = ':';

impl ClassPath {
    /// Parse a separator-joined classpath string
    pub fn parse(classpath: &str) -> Self {
        let mut entries: Vec<PathBuf> = Vec::new();
        for segment in classpath.split(SEPARATOR).map(str::trim) {
            if segment.is_empty() {
                continue;
            }
            let entry = PathBuf::from(segment);
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        Self { entries }
    }

    /// Entries in order
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry's text satisfies the predicate
    pub fn contains(&self, predicate: impl Fn(&str) -> bool) -> bool {
        self.entries
            .iter()
            .any(|entry| predicate(&entry.to_string_lossy()))
    }

    /// Entries that do not exist on disk
    pub fn missing_entries(&self) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|entry| !entry.exists())
            .map(PathBuf::as_path)
            .collect()
    }

    /// Whether the classpath pulls in the UI toolkit
    pub fn uses_ui_toolkit(&self) -> bool {
        self.contains(|entry| entry.contains("javafx"))
    }
}

impl fmt::Display for ClassPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{}", entry.display())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(parts: &[&str]) -> String {
        parts.join(&SEPARATOR.to_string())
    }

    #[test]
    fn parse_drops_empty_and_duplicate_entries() {
        let cp = ClassPath::parse(&joined(&["aaa", "", "bbb", "aaa", "ccc"]));
        assert_eq!(
            cp.entries(),
            &[PathBuf::from("aaa"), PathBuf::from("bbb"), PathBuf::from("ccc")]
        );
        assert_eq!(cp.to_string(), joined(&["aaa", "bbb", "ccc"]));
    }

    #[test]
    fn contains_matches_entry_text() {
        let cp = ClassPath::parse(&joined(&["aaa", "bbb", "ccc"]));
        assert!(cp.contains(|e| e == "bbb"));
        assert!(!cp.contains(|e| e == "xxx"));
    }

    #[test]
    fn ui_toolkit_detected_from_jar_names() {
        let cp = ClassPath::parse(&joined(&["app.jar", "/repo/javafx-base-15.jar"]));
        assert!(cp.uses_ui_toolkit());
        assert!(!ClassPath::parse("app.jar").uses_ui_toolkit());
    }

    #[test]
    fn blank_classpath_is_empty() {
        assert!(ClassPath::parse("  ").is_empty());
    }
}
