//! Error types surfaced to the protocol shell.
//!
//! Only two conditions are errors at all: a position query against a file
//! the cache has never seen, and an incremental edit whose declared length
//! disagrees with the indexed one. Everything else inside the query layer
//! degrades to an absent result.

use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The file was never opened and is not present on disk.
    UnknownFile(PathBuf),
    /// An incremental edit's `rangeLength` disagrees with the byte length
    /// of the indexed range. The change is rejected; the shell should
    /// resynchronize the document.
    RangeMismatch { declared: usize, actual: usize },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::UnknownFile(path) => {
                write!(f, "unknown file: {}", path.display())
            }
            CacheError::RangeMismatch { declared, actual } => {
                write!(
                    f,
                    "edit range mismatch: declared {} bytes, indexed {}",
                    declared, actual
                )
            }
        }
    }
}

impl std::error::Error for CacheError {}
