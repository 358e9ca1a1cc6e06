//! NZB error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading, validating, serializing or editing NZB documents
#[derive(Error, Debug)]
pub enum NzbError {
    /// IO error in one of the file based entry points
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generated markup that is not UTF-8
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Encoding label that names no known encoding
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    /// Error reported by the XML writer
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Input is not well-formed XML
    #[error("XML parse error at byte {position}: {message}")]
    Parse {
        /// Byte offset into the input where the problem was detected
        position: u64,
        /// What went wrong
        message: String,
    },

    /// Well-formed input that violates the NZB schema
    #[error("Invalid NZB at {path}: {message}")]
    Validation {
        /// Field path of the offending value, e.g. `files[2].segments[0].number`
        path: String,
        /// Human readable cause
        message: String,
    },

    /// A metadata edit that cannot be applied to this document
    #[error("Edit conflict: {0}")]
    EditConflict(String),

    /// Refused to overwrite an existing file
    #[error("File already exists: {}", .0.display())]
    FileExists(PathBuf),
}

impl NzbError {
    pub(crate) fn parse(position: u64, message: impl Into<String>) -> Self {
        NzbError::Parse {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        NzbError::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Prefix the field path of a validation error with `prefix`
    ///
    /// Other variants are returned unchanged.
    ///
    /// ```
    /// use nzb_rs::NzbError;
    ///
    /// let err = NzbError::Validation {
    ///     path: "number".to_string(),
    ///     message: "missing".to_string(),
    /// };
    /// let err = err.at("segments[0]").at("files[2]");
    /// assert_eq!(err.path(), Some("files[2].segments[0].number"));
    /// ```
    #[must_use]
    pub fn at(self, prefix: impl AsRef<str>) -> Self {
        match self {
            NzbError::Validation { path, message } => {
                let prefix = prefix.as_ref();
                let path = if path.is_empty() {
                    prefix.to_string()
                } else if path.starts_with('[') {
                    format!("{prefix}{path}")
                } else {
                    format!("{prefix}.{path}")
                };
                NzbError::Validation { path, message }
            }
            other => other,
        }
    }

    /// Field path for validation errors
    pub fn path(&self) -> Option<&str> {
        match self {
            NzbError::Validation { path, .. } => Some(path),
            _ => None,
        }
    }

    /// True for errors caused by malformed markup
    pub fn is_parse(&self) -> bool {
        matches!(self, NzbError::Parse { .. })
    }

    /// True for schema violations
    pub fn is_validation(&self) -> bool {
        matches!(self, NzbError::Validation { .. })
    }
}

/// Result type alias using NzbError
pub type Result<T> = std::result::Result<T, NzbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_at_builds_dotted_path() {
        let err = NzbError::invalid("size", "missing attribute").at("segments[1]");
        let err = err.at("files[0]");
        assert_eq!(err.path(), Some("files[0].segments[1].size"));
        assert_eq!(
            err.to_string(),
            "Invalid NZB at files[0].segments[1].size: missing attribute"
        );
    }

    #[test]
    fn test_at_on_empty_path() {
        let err = NzbError::invalid("", "no segments").at("files[3]");
        assert_eq!(err.path(), Some("files[3]"));
    }

    #[test]
    fn test_at_ignores_other_variants() {
        let err = NzbError::parse(12, "unexpected end").at("files[0]");
        assert!(err.is_parse());
        assert_eq!(err.path(), None);
        assert_eq!(err.to_string(), "XML parse error at byte 12: unexpected end");
    }

    #[test]
    fn test_edit_conflict_display() {
        let err = NzbError::EditConflict("cannot append to title".to_string());
        assert_eq!(err.to_string(), "Edit conflict: cannot append to title");
    }
}
