//! The file cache: the authoritative source of truth for file contents
//! and for position arithmetic.
//!
//! Files the editor has opened are `put` here; files it has not (parents
//! or children of an include graph that are only on disk) are read once
//! and memoized, including the negative result. A property side-channel
//! carries per-file metadata that survives content replacement but not
//! `forget`.

use crate::error::CacheError;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use vellum_parser::LineIndex;

#[derive(Debug)]
struct Entry {
    text: Arc<str>,
    lines: LineIndex,
}

/// Per-file metadata. Survives `put`, dropped by `forget`.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    /// Format identifier the editor announced, e.g. `latex`.
    pub format: Option<String>,
    /// Editor document version.
    pub version: Option<i64>,
    /// Configured root file; queries on this file run against that root's
    /// manuscript graph.
    pub root: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct FileCache {
    entries: HashMap<PathBuf, Entry>,
    properties: HashMap<PathBuf, Properties>,
    /// Disk reads that failed; probed at most once until invalidated.
    missing: HashSet<PathBuf>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored text, falling back to a one-shot disk read for files
    /// the editor has not opened. Both outcomes are memoized.
    pub fn get(&mut self, path: &Path) -> Option<Arc<str>> {
        if let Some(entry) = self.entries.get(path) {
            return Some(entry.text.clone());
        }
        if self.missing.contains(path) {
            return None;
        }
        match std::fs::read_to_string(path) {
            Ok(text) => {
                self.insert(path.to_path_buf(), text);
                self.entries.get(path).map(|entry| entry.text.clone())
            }
            Err(_) => {
                self.missing.insert(path.to_path_buf());
                None
            }
        }
    }

    /// Replace the contents of `path`, rebuilding the line index.
    pub fn put(&mut self, path: PathBuf, text: String) {
        self.missing.remove(&path);
        self.insert(path, text);
    }

    /// Drop the entry and its properties entirely.
    pub fn forget(&mut self, path: &Path) {
        self.entries.remove(path);
        self.properties.remove(path);
        self.missing.remove(path);
    }

    pub fn properties(&self, path: &Path) -> Option<&Properties> {
        self.properties.get(path)
    }

    pub fn properties_mut(&mut self, path: &Path) -> &mut Properties {
        self.properties.entry(path.to_path_buf()).or_default()
    }

    /// The configured root of `path`, if any. Callers treat an absent
    /// root as "the file is its own root".
    pub fn rootname(&self, path: &Path) -> Option<PathBuf> {
        self.properties.get(path)?.root.clone()
    }

    /// Convert a 0-based `(line, character)` pair to a byte offset;
    /// `character` counts codepoints. Out-of-range positions clamp.
    pub fn position(
        &mut self,
        path: &Path,
        line: usize,
        character: usize,
    ) -> Result<usize, CacheError> {
        let entry = self.entry_or_load(path)?;
        Ok(entry.lines.offset(&entry.text, line, character))
    }

    /// Convert a byte offset back to a 0-based `(line, character)` pair.
    pub fn line_col(&mut self, path: &Path, offset: usize) -> Result<(usize, usize), CacheError> {
        let entry = self.entry_or_load(path)?;
        Ok(entry.lines.line_col(&entry.text, offset))
    }

    /// Apply an incremental edit replacing the text between two 0-based
    /// positions. `declared_len` is the byte length the editor claims for
    /// the replaced range; a disagreement with the indexed length rejects
    /// the change and leaves the text untouched.
    pub fn edit(
        &mut self,
        path: &Path,
        start: (usize, usize),
        end: (usize, usize),
        declared_len: Option<usize>,
        new_text: &str,
    ) -> Result<(), CacheError> {
        let entry = self.entry_or_load(path)?;
        let start_offset = entry.lines.offset(&entry.text, start.0, start.1);
        let end_offset = entry.lines.offset(&entry.text, end.0, end.1);
        let actual = end_offset.saturating_sub(start_offset);
        if let Some(declared) = declared_len {
            if declared != actual {
                return Err(CacheError::RangeMismatch { declared, actual });
            }
        }
        let mut text = String::with_capacity(entry.text.len() + new_text.len());
        text.push_str(&entry.text[..start_offset]);
        text.push_str(new_text);
        text.push_str(&entry.text[end_offset..]);
        self.insert(path.to_path_buf(), text);
        Ok(())
    }

    fn insert(&mut self, path: PathBuf, text: String) {
        let lines = LineIndex::new(&text);
        self.entries.insert(
            path,
            Entry {
                text: text.into(),
                lines,
            },
        );
    }

    fn entry_or_load(&mut self, path: &Path) -> Result<&Entry, CacheError> {
        if !self.entries.contains_key(path) {
            self.get(path)
                .ok_or_else(|| CacheError::UnknownFile(path.to_path_buf()))?;
        }
        Ok(&self.entries[path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn put_get_forget() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/t/a.tex");
        cache.put(path.clone(), "hello".to_string());
        assert_eq!(cache.get(&path).as_deref(), Some("hello"));
        cache.forget(&path);
        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn disk_fallback_memoizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ondisk.tex");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "from disk").unwrap();

        let mut cache = FileCache::new();
        assert_eq!(cache.get(&path).as_deref(), Some("from disk"));

        // A later disk change is not observed; the first read won.
        std::fs::write(&path, "changed").unwrap();
        assert_eq!(cache.get(&path).as_deref(), Some("from disk"));
    }

    #[test]
    fn missing_file_is_negative_cached_until_put() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/no/such/file.tex");
        assert!(cache.get(&path).is_none());
        assert!(cache.get(&path).is_none());
        cache.put(path.clone(), "now present".to_string());
        assert_eq!(cache.get(&path).as_deref(), Some("now present"));
    }

    #[test]
    fn properties_survive_put_but_not_forget() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/t/a.tex");
        cache.put(path.clone(), "one".to_string());
        cache.properties_mut(&path).format = Some("latex".to_string());
        cache.put(path.clone(), "two".to_string());
        assert_eq!(
            cache.properties(&path).and_then(|p| p.format.as_deref()),
            Some("latex")
        );
        cache.forget(&path);
        assert!(cache.properties(&path).is_none());
    }

    #[test]
    fn position_queries_fail_for_unknown_files() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/no/such/file.tex");
        assert!(matches!(
            cache.position(&path, 0, 0),
            Err(CacheError::UnknownFile(_))
        ));
    }

    #[test]
    fn position_round_trip() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/t/a.tex");
        cache.put(path.clone(), "ab\ncdé f\n".to_string());
        let offset = cache.position(&path, 1, 3).unwrap();
        assert_eq!(cache.line_col(&path, offset).unwrap(), (1, 3));
    }

    #[test]
    fn edit_applies_when_declared_length_matches() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/t/a.tex");
        cache.put(path.clone(), "\\section{Intro}\\label{x}".to_string());
        cache
            .edit(&path, (0, 9), (0, 14), Some(5), "Overview")
            .unwrap();
        assert_eq!(
            cache.get(&path).as_deref(),
            Some("\\section{Overview}\\label{x}")
        );
    }

    #[test]
    fn edit_rejects_mismatched_declared_length() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/t/a.tex");
        cache.put(path.clone(), "\\section{Intro}".to_string());
        let err = cache
            .edit(&path, (0, 9), (0, 14), Some(4), "Overview")
            .unwrap_err();
        assert_eq!(
            err,
            CacheError::RangeMismatch {
                declared: 4,
                actual: 5
            }
        );
        // src unchanged
        assert_eq!(cache.get(&path).as_deref(), Some("\\section{Intro}"));
    }

    #[test]
    fn edit_without_declared_length_is_not_verified() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/t/a.tex");
        cache.put(path.clone(), "abcdef".to_string());
        cache.edit(&path, (0, 1), (0, 3), None, "X").unwrap();
        assert_eq!(cache.get(&path).as_deref(), Some("aXdef"));
    }
}
