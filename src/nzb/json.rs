//! Canonical JSON form of an [`Nzb`]
//!
//! ```json
//! {
//!   "meta": { "title": null, "passwords": [], "tags": [], "category": "TV" },
//!   "files": [
//!     {
//!       "poster": "...",
//!       "posted_at": "2024-01-28T11:18:28Z",
//!       "subject": "...",
//!       "groups": ["..."],
//!       "segments": [{ "size": 739067, "number": 1, "message_id": "..." }]
//!     }
//!   ]
//! }
//! ```
//!
//! Decoding never trusts the input: every record goes through the same
//! validation as parsed markup. The text is read into a [`Value`] tree first
//! and each record field is decoded on its own, so a wrongly typed value is
//! reported at its path (`files[0].segments[1].size`) rather than at `$`.

use super::types::{File, Meta, Nzb, Segment};
use crate::config::ParserConfig;
use crate::{NzbError, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decode `value`, reporting failures at `path`
fn decode<T: DeserializeOwned>(value: Value, path: &str) -> Result<T> {
    serde_json::from_value(value).map_err(|e| NzbError::invalid(path, e.to_string()))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NzbRecord {
    meta: Value,
    files: Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct MetaRecord {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    passwords: Vec<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    category: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct FileRecord {
    poster: Value,
    posted_at: Value,
    subject: Value,
    groups: Value,
    segments: Value,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct SegmentRecord {
    size: Value,
    number: Value,
    message_id: Value,
}

impl SegmentRecord {
    fn into_segment(self) -> Result<Segment> {
        Segment::new(
            decode(self.size, "size")?,
            decode(self.number, "number")?,
            decode::<String>(self.message_id, "message_id")?,
        )
    }
}

impl FileRecord {
    fn into_file(self, config: &ParserConfig) -> Result<File> {
        let posted_at: DateTime<Utc> = decode(self.posted_at, "posted_at")?;
        let segments = decode::<Vec<Value>>(self.segments, "segments")?
            .into_iter()
            .enumerate()
            .map(|(i, segment)| {
                decode::<SegmentRecord>(segment, "")
                    .and_then(SegmentRecord::into_segment)
                    .map_err(|e| e.at(format!("segments[{i}]")))
            })
            .collect::<Result<Vec<_>>>()?;

        File::build(
            decode::<String>(self.poster, "poster")?,
            posted_at,
            decode::<String>(self.subject, "subject")?,
            decode::<Vec<String>>(self.groups, "groups")?,
            segments,
            config,
        )
    }
}

impl Nzb {
    /// Encode as JSON, optionally pretty-printed
    ///
    /// Value-equal models always encode to the same text.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let encoded = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        encoded.map_err(|e| NzbError::invalid("$", e.to_string()))
    }

    /// Decode from JSON produced by [`Nzb::to_json`]
    ///
    /// # Example
    /// ```
    /// use nzb_rs::Nzb;
    ///
    /// let json = r#"{
    ///   "meta": {"title": null, "passwords": [], "tags": ["HD"], "category": null},
    ///   "files": [{
    ///     "poster": "user@example.com",
    ///     "posted_at": "2024-01-28T11:18:28Z",
    ///     "subject": "\"movie.mkv\" yEnc (1/1)",
    ///     "groups": ["alt.binaries.test"],
    ///     "segments": [{"size": 100, "number": 1, "message_id": "a@example.com"}]
    ///   }]
    /// }"#;
    ///
    /// let nzb = Nzb::from_json(json).unwrap();
    /// assert_eq!(nzb.file().name(), "movie.mkv");
    /// assert_eq!(Nzb::from_json(&nzb.to_json(false).unwrap()).unwrap(), nzb);
    /// ```
    pub fn from_json(json: &str) -> Result<Nzb> {
        Nzb::from_json_with(json, &ParserConfig::default())
    }

    /// Decode from JSON with explicit policies
    pub fn from_json_with(json: &str, config: &ParserConfig) -> Result<Nzb> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| NzbError::invalid("$", e.to_string()))?;
        let record: NzbRecord = decode(value, "$")?;

        let meta: MetaRecord = decode(record.meta, "meta")?;
        let meta = Meta {
            title: meta.title,
            passwords: meta.passwords,
            tags: meta.tags,
            category: meta.category,
        };

        let files = decode::<Vec<Value>>(record.files, "files")?
            .into_iter()
            .enumerate()
            .map(|(i, file)| {
                decode::<FileRecord>(file, "")
                    .and_then(|file| file.into_file(config))
                    .map_err(|e| e.at(format!("files[{i}]")))
            })
            .collect::<Result<Vec<_>>>()?;

        Nzb::build(meta, files, config)
    }
}
