//! Error types for record parsing.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from turning a deposit file into a [`Record`](super::Record).
///
/// Missing elements or attributes are not errors; they default to empty
/// strings or zero. Only a document that cannot be read as XML at all fails.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Malformed XML document: {reason}")]
    Structural { reason: String },

    #[error("Cannot decode document as {encoding}")]
    Encoding { encoding: String },

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<roxmltree::Error> for ParseError {
    fn from(e: roxmltree::Error) -> Self {
        ParseError::Structural {
            reason: e.to_string(),
        }
    }
}

impl ParseError {
    /// Whether the file content itself is unusable, as opposed to an I/O failure.
    pub fn is_structural(&self) -> bool {
        matches!(self, ParseError::Structural { .. } | ParseError::Encoding { .. })
    }
}
