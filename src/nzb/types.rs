//! NZB domain model
//!
//! Values are validated when they are built and never change afterwards.
//! Derived data (file names, sizes, the primary file) is computed once at
//! construction.

use super::natsort::{natural_cmp, sort_natural_by_key};
use super::subject;
use crate::config::{DuplicateSegments, ParserConfig};
use crate::{NzbError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Kind of a `<meta>` entry in the `<head>` block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaField {
    /// `title`, singular
    Title,
    /// `category`, singular
    Category,
    /// `password`, repeatable
    Passwords,
    /// `tag`, repeatable
    Tags,
}

impl MetaField {
    /// All fields, in the order they are written to a `<head>` block
    pub const ALL: [MetaField; 4] = [
        MetaField::Title,
        MetaField::Category,
        MetaField::Passwords,
        MetaField::Tags,
    ];

    /// Value of the `type` attribute for this field
    pub fn xml_type(self) -> &'static str {
        match self {
            MetaField::Title => "title",
            MetaField::Category => "category",
            MetaField::Passwords => "password",
            MetaField::Tags => "tag",
        }
    }

    /// Field for a `type` attribute value (trimmed, case-insensitive)
    pub fn from_xml_type(value: &str) -> Option<MetaField> {
        let value = value.trim();
        MetaField::ALL
            .into_iter()
            .find(|field| field.xml_type().eq_ignore_ascii_case(value))
    }

    /// Whether the field may appear more than once
    pub fn is_repeatable(self) -> bool {
        matches!(self, MetaField::Passwords | MetaField::Tags)
    }
}

impl fmt::Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MetaField::Title => "title",
            MetaField::Category => "category",
            MetaField::Passwords => "passwords",
            MetaField::Tags => "tags",
        })
    }
}

impl FromStr for MetaField {
    type Err = NzbError;

    /// Accepts both the `type` attribute value and the plural field name
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(MetaField::Title),
            "category" => Ok(MetaField::Category),
            "password" | "passwords" => Ok(MetaField::Passwords),
            "tag" | "tags" => Ok(MetaField::Tags),
            other => Err(NzbError::EditConflict(format!(
                "unknown meta field {other:?}"
            ))),
        }
    }
}

/// Descriptive metadata from the `<head>` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Meta {
    /// Title, last entry wins
    pub title: Option<String>,
    /// Passwords in document order, duplicates kept
    pub passwords: Vec<String>,
    /// Tags in document order, duplicates kept
    pub tags: Vec<String>,
    /// Category, last entry wins
    pub category: Option<String>,
}

impl Meta {
    /// True if no field carries a value
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.passwords.is_empty()
            && self.tags.is_empty()
            && self.category.is_none()
    }

    /// Fold one `<meta>` entry into the collection
    ///
    /// Values are trimmed. An empty title or category clears the field,
    /// empty passwords and tags are skipped.
    pub(crate) fn collect(&mut self, field: MetaField, value: &str) {
        let value = value.trim();
        let single = (!value.is_empty()).then(|| value.to_string());
        match field {
            MetaField::Title => self.title = single,
            MetaField::Category => self.category = single,
            MetaField::Passwords => self.passwords.extend(single),
            MetaField::Tags => self.tags.extend(single),
        }
    }

    /// Re-apply the collection rules to values set directly on the struct
    pub(crate) fn normalized(self) -> Meta {
        let mut meta = Meta::default();
        for (field, value) in self.entries() {
            meta.collect(field, value);
        }
        meta
    }

    /// Entries in canonical `<head>` order: title, category, passwords, tags
    pub fn entries(&self) -> Vec<(MetaField, &str)> {
        let mut entries = Vec::new();
        entries.extend(self.title.as_deref().map(|v| (MetaField::Title, v)));
        entries.extend(self.category.as_deref().map(|v| (MetaField::Category, v)));
        entries.extend(self.passwords.iter().map(|v| (MetaField::Passwords, v.as_str())));
        entries.extend(self.tags.iter().map(|v| (MetaField::Tags, v.as_str())));
        entries
    }
}

/// A segment (part) of a file
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Segment {
    size: u64,
    number: u32,
    message_id: String,
}

impl Segment {
    /// Create a segment
    ///
    /// `number` must be at least 1 and `message_id` must not be blank
    /// (surrounding whitespace is dropped).
    pub fn new(size: u64, number: u32, message_id: impl Into<String>) -> Result<Segment> {
        if number < 1 {
            return Err(NzbError::invalid("number", "segment numbers start at 1"));
        }

        let message_id = message_id.into();
        let message_id = message_id.trim();
        if message_id.is_empty() {
            return Err(NzbError::invalid("message_id", "empty message-id"));
        }

        Ok(Segment {
            size,
            number,
            message_id: message_id.to_string(),
        })
    }

    /// Size of this segment in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Segment number (1-based)
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Message-ID for retrieving this segment, without angle brackets
    pub fn message_id(&self) -> &str {
        &self.message_id
    }
}

/// A single file entry in an NZB
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct File {
    poster: String,
    posted_at: DateTime<Utc>,
    subject: String,
    groups: Vec<String>,
    segments: Vec<Segment>,

    #[serde(skip)]
    name: String,
    #[serde(skip)]
    stem_len: usize,
    #[serde(skip)]
    size: u64,
    #[serde(skip)]
    par2: bool,
    #[serde(skip)]
    rar: bool,
    #[serde(skip)]
    obfuscated: bool,
}

impl File {
    /// Create a file with the default [`ParserConfig`]
    ///
    /// `posted_at` must fall on a whole second. Segments are sorted by number
    /// and groups by natural order. Errors carry paths relative to the file,
    /// e.g. `segments[1].number`.
    pub fn new(
        poster: impl Into<String>,
        posted_at: DateTime<Utc>,
        subject: impl Into<String>,
        groups: Vec<String>,
        segments: Vec<Segment>,
    ) -> Result<File> {
        File::build(
            poster.into(),
            posted_at,
            subject.into(),
            groups,
            segments,
            &ParserConfig::default(),
        )
    }

    pub(crate) fn build(
        poster: String,
        posted_at: DateTime<Utc>,
        subject: String,
        groups: Vec<String>,
        segments: Vec<Segment>,
        config: &ParserConfig,
    ) -> Result<File> {
        if poster.trim().is_empty() {
            return Err(NzbError::invalid("poster", "empty poster"));
        }

        if posted_at.timestamp_subsec_nanos() != 0 {
            return Err(NzbError::invalid(
                "posted_at",
                format!("{posted_at} is not a whole second"),
            ));
        }

        if groups.is_empty() {
            return Err(NzbError::invalid("groups", "file has no groups"));
        }
        let mut groups: Vec<String> = groups
            .into_iter()
            .enumerate()
            .map(|(i, group)| {
                let group = group.trim();
                if group.is_empty() {
                    Err(NzbError::invalid(format!("groups[{i}]"), "empty group name"))
                } else {
                    Ok(group.to_string())
                }
            })
            .collect::<Result<_>>()?;
        sort_natural_by_key(&mut groups, |group| group.as_str());

        if segments.is_empty() {
            return Err(NzbError::invalid("segments", "file has no segments"));
        }
        let mut seen = HashSet::with_capacity(segments.len());
        let mut kept = Vec::with_capacity(segments.len());
        for (i, segment) in segments.into_iter().enumerate() {
            if seen.insert(segment.number) {
                kept.push(segment);
                continue;
            }
            match config.duplicate_segments {
                DuplicateSegments::Reject => {
                    return Err(NzbError::invalid(
                        format!("segments[{i}].number"),
                        format!("duplicate segment number {}", segment.number),
                    ));
                }
                DuplicateSegments::KeepFirst => {
                    warn!(
                        "Dropping duplicate segment {} ({}) of {:?}",
                        segment.number, segment.message_id, subject
                    );
                }
            }
        }
        let mut segments = kept;
        segments.sort_by_key(|segment| segment.number);

        let name = (config.extract_name)(&subject).unwrap_or_else(|| subject.trim().to_string());
        let (stem, _) = subject::split_extension(&name);
        let stem_len = stem.len();

        Ok(File {
            size: segments.iter().map(|s| s.size).sum(),
            par2: subject::name_is_par2(&name),
            rar: subject::name_is_rar(&name),
            obfuscated: subject::stem_is_obfuscated(stem),
            poster,
            posted_at,
            subject,
            groups,
            segments,
            name,
            stem_len,
        })
    }

    /// Poster name/email
    pub fn poster(&self) -> &str {
        &self.poster
    }

    /// Time of posting
    pub fn posted_at(&self) -> DateTime<Utc> {
        self.posted_at
    }

    /// Subject line as written by the poster
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Newsgroups, natural-sorted
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Segments sorted by number
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// File name derived from the subject
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name without its extension
    pub fn stem(&self) -> &str {
        &self.name[..self.stem_len]
    }

    /// Extension without the leading dot
    pub fn extension(&self) -> Option<&str> {
        (self.stem_len < self.name.len()).then(|| &self.name[self.stem_len + 1..])
    }

    /// Case-insensitive extension check; the leading dot is optional
    pub fn has_extension(&self, ext: &str) -> bool {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        self.extension()
            .is_some_and(|own| own.eq_ignore_ascii_case(ext))
    }

    /// Total size of all segments
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether this is a PAR2 recovery file
    pub fn is_par2(&self) -> bool {
        self.par2
    }

    /// Whether this is a RAR volume
    pub fn is_rar(&self) -> bool {
        self.rar
    }

    /// Whether the name looks obfuscated
    pub fn is_obfuscated(&self) -> bool {
        self.obfuscated
    }

    /// Segment numbers between 1 and the highest number that are not listed
    pub fn missing_segments(&self) -> Vec<u32> {
        let Some(max_number) = self.segments.last().map(|s| s.number) else {
            return vec![];
        };

        let seen: HashSet<u32> = self.segments.iter().map(|s| s.number).collect();
        (1..=max_number).filter(|i| !seen.contains(i)).collect()
    }
}

/// Default primary file policy: the largest file, earliest on ties
pub fn largest_file(files: &[File]) -> usize {
    let mut best = 0;
    for (i, file) in files.iter().enumerate() {
        if file.size > files[best].size {
            best = i;
        }
    }
    best
}

/// A parsed and validated NZB document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Nzb {
    meta: Meta,
    files: Vec<File>,

    #[serde(skip)]
    size: u64,
    #[serde(skip)]
    primary: usize,
}

impl Nzb {
    /// Create an NZB with the default [`ParserConfig`]
    ///
    /// Files are sorted by the natural order of their names. Metadata goes
    /// through the same rules as a parsed `<head>`: values are trimmed,
    /// blank ones dropped.
    pub fn new(meta: Meta, files: Vec<File>) -> Result<Nzb> {
        Nzb::build(meta, files, &ParserConfig::default())
    }

    pub(crate) fn build(meta: Meta, mut files: Vec<File>, config: &ParserConfig) -> Result<Nzb> {
        if files.is_empty() {
            return Err(NzbError::invalid("files", "NZB has no files"));
        }

        let meta = meta.normalized();

        sort_natural_by_key(&mut files, |file| file.name.as_str());
        let primary = (config.select_primary)(&files).min(files.len() - 1);

        Ok(Nzb {
            size: files.iter().map(|f| f.size).sum(),
            meta,
            files,
            primary,
        })
    }

    /// Metadata from the `<head>` block
    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Files in natural order of their names
    pub fn files(&self) -> &[File] {
        &self.files
    }

    /// The primary file
    pub fn file(&self) -> &File {
        &self.files[self.primary]
    }

    /// Total size of all files
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Unique file names, natural-sorted
    pub fn filenames(&self) -> Vec<&str> {
        unique_sorted(self.files.iter().map(|f| f.name.as_str()))
    }

    /// Unique posters, natural-sorted
    pub fn posters(&self) -> Vec<&str> {
        unique_sorted(self.files.iter().map(|f| f.poster.as_str()))
    }

    /// Unique groups across all files, natural-sorted
    pub fn groups(&self) -> Vec<&str> {
        unique_sorted(
            self.files
                .iter()
                .flat_map(|f| f.groups.iter().map(String::as_str)),
        )
    }

    /// Combined size of the PAR2 files
    pub fn par2_size(&self) -> u64 {
        self.files.iter().filter(|f| f.par2).map(|f| f.size).sum()
    }

    /// PAR2 size as a percentage of the total size
    pub fn par2_percentage(&self) -> f64 {
        if self.size == 0 {
            return 0.0;
        }
        self.par2_size() as f64 / self.size as f64 * 100.0
    }

    /// Whether any file is a RAR volume
    pub fn has_rar(&self) -> bool {
        self.files.iter().any(|f| f.rar)
    }

    /// Whether every file is a RAR volume
    pub fn is_rar(&self) -> bool {
        self.files.iter().all(|f| f.rar)
    }

    /// Whether any file is a PAR2 file
    pub fn has_par2(&self) -> bool {
        self.files.iter().any(|f| f.par2)
    }

    /// Whether any file name looks obfuscated
    pub fn is_obfuscated(&self) -> bool {
        self.files.iter().any(|f| f.obfuscated)
    }
}

fn unique_sorted<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    let mut unique: Vec<&str> = values.filter(|v| seen.insert(*v)).collect();
    unique.sort_by(|a, b| natural_cmp(a, b));
    unique
}
