//! Parser configuration
//!
//! Policies the model builder and the JSON decoder apply where the NZB format
//! leaves room for interpretation.

use crate::nzb::{File, largest_file, subject};

/// What to do when one file lists the same segment number twice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateSegments {
    /// Fail with a validation error pointing at the second occurrence
    #[default]
    Reject,
    /// Keep the first occurrence in document order, drop the rest
    KeepFirst,
}

/// Policy hook deriving a file name from a subject line
pub type ExtractName = fn(&str) -> Option<String>;

/// Policy hook choosing the primary file; receives files in sorted order
/// and returns an index into that slice
pub type SelectPrimary = fn(&[File]) -> usize;

/// Options for building an [`Nzb`](crate::Nzb)
///
/// # Example
///
/// ```
/// use nzb_rs::{DuplicateSegments, ParserConfig};
///
/// // Strict (default): duplicate segment numbers are an error
/// let strict = ParserConfig::strict();
/// assert_eq!(strict.duplicate_segments, DuplicateSegments::Reject);
///
/// // Lenient: the first copy of a duplicated segment wins
/// let lenient = ParserConfig::lenient();
/// assert_eq!(lenient.duplicate_segments, DuplicateSegments::KeepFirst);
///
/// // Custom naming policy
/// let custom = ParserConfig {
///     extract_name: |subject| Some(subject.to_uppercase()),
///     ..ParserConfig::default()
/// };
/// assert_eq!((custom.extract_name)("abc").as_deref(), Some("ABC"));
/// ```
#[must_use]
#[derive(Debug, Clone, Copy)]
pub struct ParserConfig {
    /// Duplicate segment number handling
    pub duplicate_segments: DuplicateSegments,

    /// Derives [`File::name`] from the subject. `None` makes the whole
    /// (trimmed) subject the name.
    ///
    /// Default: [`subject::extract_filename`]
    pub extract_name: ExtractName,

    /// Picks [`Nzb::file`](crate::Nzb::file).
    ///
    /// Default: [`largest_file`], the largest file, earliest in sorted order
    /// on ties
    pub select_primary: SelectPrimary,
}

impl ParserConfig {
    /// Strict configuration
    ///
    /// - Duplicate segment numbers rejected
    /// - Default naming and primary file policies
    pub fn strict() -> Self {
        Self {
            duplicate_segments: DuplicateSegments::Reject,
            extract_name: subject::extract_filename,
            select_primary: largest_file,
        }
    }

    /// Lenient configuration
    ///
    /// - Duplicate segment numbers tolerated, first occurrence kept
    /// - Default naming and primary file policies
    pub fn lenient() -> Self {
        Self {
            duplicate_segments: DuplicateSegments::KeepFirst,
            ..Self::strict()
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self::strict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_strict() {
        let config = ParserConfig::default();
        assert_eq!(config.duplicate_segments, DuplicateSegments::Reject);
        assert_eq!(
            (config.extract_name)(r#"[1/1] - "a.bin" yEnc (1/1) 10"#).as_deref(),
            Some("a.bin")
        );
    }

    #[test]
    fn test_lenient_keeps_policies() {
        let config = ParserConfig::lenient();
        assert_eq!(config.duplicate_segments, DuplicateSegments::KeepFirst);
        assert_eq!((config.extract_name)("no name here"), None);
    }
}
