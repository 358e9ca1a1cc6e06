//! Building a validated [`Nzb`] from markup

use super::types::{File, Meta, MetaField, Nzb, Segment};
use crate::config::ParserConfig;
use crate::tree::{Document, NodeId};
use crate::{NzbError, Result};
use chrono::{DateTime, Utc};
use encoding_rs::{Encoding, UTF_8};
use regex::bytes::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, trace};

static DECLARED_ENCODING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?-u)^\s*<\?xml[^>]*?\sencoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("valid regex")
});

/// Parse an NZB document from a string
///
/// Malformed markup fails with [`NzbError::Parse`]; markup that is not a
/// valid NZB fails with [`NzbError::Validation`].
///
/// # Example
/// ```
/// use nzb_rs::parse_nzb;
///
/// let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
/// <!DOCTYPE nzb PUBLIC "-//newzBin//DTD NZB 1.1//EN" "http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd">
/// <nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
///   <head>
///     <meta type="title">Example File</meta>
///   </head>
///   <file poster="user@example.com" date="1234567890" subject="Example [1/1]">
///     <groups>
///       <group>alt.binaries.test</group>
///     </groups>
///     <segments>
///       <segment bytes="768000" number="1">part1of1@example.com</segment>
///     </segments>
///   </file>
/// </nzb>"#;
///
/// let nzb = parse_nzb(xml).unwrap();
/// assert_eq!(nzb.meta().title.as_deref(), Some("Example File"));
/// assert_eq!(nzb.files().len(), 1);
/// assert_eq!(nzb.file().segments().len(), 1);
/// ```
pub fn parse_nzb(xml: &str) -> Result<Nzb> {
    parse_nzb_with(xml, &ParserConfig::default())
}

/// Parse an NZB document from a string with explicit policies
pub fn parse_nzb_with(xml: &str, config: &ParserConfig) -> Result<Nzb> {
    let doc = Document::parse(xml)?;
    build(&doc, config)
}

impl Nzb {
    /// Parse an NZB document from a string
    pub fn parse(xml: &str) -> Result<Nzb> {
        parse_nzb(xml)
    }

    /// Parse an NZB document from a string with explicit policies
    pub fn parse_with(xml: &str, config: &ParserConfig) -> Result<Nzb> {
        parse_nzb_with(xml, config)
    }

    /// Build from an already parsed tree
    pub fn from_document(doc: &Document) -> Result<Nzb> {
        build(doc, &ParserConfig::default())
    }

    /// Build from an already parsed tree with explicit policies
    pub fn from_document_with(doc: &Document, config: &ParserConfig) -> Result<Nzb> {
        build(doc, config)
    }

    /// Read and parse an `.nzb` (or gzipped `.nzb.gz`) file
    ///
    /// The text encoding comes from a byte order mark or the XML
    /// declaration (`encoding="iso-8859-1"`), UTF-8 otherwise.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Nzb> {
        Nzb::from_file_with(path, &ParserConfig::default())
    }

    /// Read and parse a file with explicit policies
    pub fn from_file_with(path: impl AsRef<Path>, config: &ParserConfig) -> Result<Nzb> {
        let (xml, _) = read_text(path.as_ref(), None)?;
        parse_nzb_with(&xml, config)
    }

    /// Read and parse a file stored in the encoding named by `encoding`
    ///
    /// Takes WHATWG labels such as `"latin1"` or `"windows-1252"` and
    /// overrides whatever the XML declaration says. A byte order mark still
    /// wins.
    ///
    /// # Errors
    ///
    /// [`NzbError::UnknownEncoding`] for a label no encoding answers to,
    /// [`NzbError::Parse`] for bytes that are invalid in that encoding.
    pub fn from_file_with_encoding(
        path: impl AsRef<Path>,
        encoding: &str,
        config: &ParserConfig,
    ) -> Result<Nzb> {
        let encoding = encoding_for_label(encoding.as_bytes())?;
        let (xml, _) = read_text(path.as_ref(), Some(encoding))?;
        parse_nzb_with(&xml, config)
    }
}

/// Look up an encoding by its WHATWG label
pub(crate) fn encoding_for_label(label: &[u8]) -> Result<&'static Encoding> {
    Encoding::for_label(label)
        .ok_or_else(|| NzbError::UnknownEncoding(String::from_utf8_lossy(label).into_owned()))
}

/// Encoding named by the XML declaration, UTF-8 without one
///
/// A declaration readable as ASCII cannot be UTF-16, so those labels fall
/// back to UTF-8.
fn declared_encoding(bytes: &[u8]) -> Result<&'static Encoding> {
    match DECLARED_ENCODING.captures(bytes) {
        Some(captures) => Ok(encoding_for_label(&captures[1])?.output_encoding()),
        None => Ok(UTF_8),
    }
}

/// Decode document bytes
///
/// A byte order mark takes precedence over `encoding`; the encoding that
/// was actually used is returned alongside the text.
pub(crate) fn decode_text(
    bytes: &[u8],
    encoding: Option<&'static Encoding>,
) -> Result<(String, &'static Encoding)> {
    let (encoding, body) = match Encoding::for_bom(bytes) {
        Some((bom, len)) => (bom, &bytes[len..]),
        None => match encoding {
            Some(encoding) => (encoding, bytes),
            None => (declared_encoding(bytes)?, bytes),
        },
    };

    if encoding == UTF_8 {
        let text = std::str::from_utf8(body).map_err(|e| {
            NzbError::parse(e.valid_up_to() as u64, format!("invalid UTF-8: {e}"))
        })?;
        return Ok((text.to_string(), encoding));
    }

    let text = encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| NzbError::parse(0, format!("input is not valid {}", encoding.name())))?;
    trace!("Decoded {} bytes as {}", body.len(), encoding.name());
    Ok((text.into_owned(), encoding))
}

/// Read and decode a file, inflating it first if it is gzip compressed
pub(crate) fn read_text(
    path: &Path,
    encoding: Option<&'static Encoding>,
) -> Result<(String, &'static Encoding)> {
    let bytes = std::fs::read(path)?;
    let bytes = maybe_decompress(bytes)?;
    decode_text(&bytes, encoding)
}

#[cfg(feature = "gzip")]
fn maybe_decompress(data: Vec<u8>) -> Result<Vec<u8>> {
    use flate2::read::GzDecoder;
    use std::io::Read;

    if !data.starts_with(&[0x1f, 0x8b]) {
        return Ok(data);
    }

    let mut decoder = GzDecoder::new(data.as_slice());
    let mut decompressed = Vec::with_capacity(data.len() * 4);
    decoder.read_to_end(&mut decompressed)?;
    trace!(
        "Decompressed {} bytes to {} bytes (gzip)",
        data.len(),
        decompressed.len()
    );
    Ok(decompressed)
}

#[cfg(not(feature = "gzip"))]
fn maybe_decompress(data: Vec<u8>) -> Result<Vec<u8>> {
    Ok(data)
}

/// Collect the metadata of every `<head>` block under `root`
pub(crate) fn collect_meta(doc: &Document, root: NodeId) -> Meta {
    let mut meta = Meta::default();
    for head in doc.child_elements(root, "head") {
        for entry in doc.child_elements(head, "meta") {
            let kind = doc.attribute(entry, "type").unwrap_or_default();
            match MetaField::from_xml_type(kind) {
                Some(field) => meta.collect(field, &doc.text(entry)),
                None => trace!("Ignoring meta entry of unknown type {:?}", kind),
            }
        }
    }
    meta
}

fn build(doc: &Document, config: &ParserConfig) -> Result<Nzb> {
    let root = doc.root();
    let root_name = doc
        .element(root)
        .map(|element| element.local_name())
        .unwrap_or_default();
    if root_name != "nzb" {
        return Err(NzbError::invalid(
            "nzb",
            format!("root element is <{root_name}>, expected <nzb>"),
        ));
    }

    let meta = collect_meta(doc, root);

    let files = doc
        .child_elements(root, "file")
        .enumerate()
        .map(|(i, file)| {
            build_file(doc, file, config).map_err(|e| e.at(format!("files[{i}]")))
        })
        .collect::<Result<Vec<_>>>()?;

    let nzb = Nzb::build(meta, files, config)?;
    debug!(
        "Parsed NZB with {} files, {} bytes",
        nzb.files().len(),
        nzb.size()
    );
    Ok(nzb)
}

/// Attribute `attribute` of element `id`; errors name the model `field`
fn required<'a>(doc: &'a Document, id: NodeId, attribute: &str, field: &str) -> Result<&'a str> {
    doc.attribute(id, attribute)
        .ok_or_else(|| NzbError::invalid(field, format!("missing attribute {attribute:?}")))
}

fn parse_posted_at(value: &str) -> Result<DateTime<Utc>> {
    let secs: i64 = value
        .trim()
        .parse()
        .map_err(|_| NzbError::invalid("posted_at", format!("invalid date {value:?}")))?;
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| NzbError::invalid("posted_at", format!("date {secs} out of range")))
}

fn build_file(doc: &Document, file: NodeId, config: &ParserConfig) -> Result<File> {
    let poster = required(doc, file, "poster", "poster")?.to_string();
    let posted_at = parse_posted_at(required(doc, file, "date", "posted_at")?)?;
    let subject = required(doc, file, "subject", "subject")?.to_string();

    let groups: Vec<String> = doc
        .child_elements(file, "groups")
        .flat_map(|groups| doc.child_elements(groups, "group"))
        .map(|group| doc.text(group))
        .collect();

    let segments = doc
        .child_elements(file, "segments")
        .flat_map(|segments| doc.child_elements(segments, "segment"))
        .enumerate()
        .map(|(i, segment)| {
            build_segment(doc, segment).map_err(|e| e.at(format!("segments[{i}]")))
        })
        .collect::<Result<Vec<_>>>()?;

    for child in doc.children(file) {
        if let Some(element) = doc.element(*child) {
            let name = element.local_name();
            if name != "groups" && name != "segments" {
                trace!("Ignoring unknown element <{}> in <file>", element.name());
            }
        }
    }

    File::build(poster, posted_at, subject, groups, segments, config)
}

fn build_segment(doc: &Document, segment: NodeId) -> Result<Segment> {
    let bytes = required(doc, segment, "bytes", "size")?;
    let size: u64 = bytes
        .trim()
        .parse()
        .map_err(|_| NzbError::invalid("size", format!("invalid byte count {bytes:?}")))?;

    let number = required(doc, segment, "number", "number")?;
    let number: u32 = number
        .trim()
        .parse()
        .map_err(|_| NzbError::invalid("number", format!("invalid segment number {number:?}")))?;

    Segment::new(size, number, doc.text(segment))
}
