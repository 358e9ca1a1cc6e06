//! NZB file format parser, validator and generator
//!
//! NZB is an XML-based file format used to describe Usenet binary posts.
//! It contains metadata and segment references for efficient binary downloads.
//!
//! Reference: https://sabnzbd.org/wiki/extra/nzb-spec

mod json;
/// Natural string ordering
pub mod natsort;
mod parsing;
/// File name heuristics for subject lines
pub mod subject;
mod types;

pub use natsort::natural_cmp;
pub use parsing::{parse_nzb, parse_nzb_with};
pub(crate) use parsing::{collect_meta, encoding_for_label, read_text};
pub use types::{File, Meta, MetaField, Nzb, Segment, largest_file};

use crate::Result;
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

/// Namespace of NZB 1.1 documents
pub const NZB_NAMESPACE: &str = "http://www.newzbin.com/DTD/2003/nzb";

const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<!DOCTYPE nzb PUBLIC \"-//newzBin//DTD NZB 1.1//EN\" \"http://www.newzbin.com/DTD/nzb/nzb-1.1.dtd\">\n";

impl Nzb {
    /// Generate canonical NZB 1.1 markup
    ///
    /// The `<head>` block is only written when there is metadata, with
    /// entries in the order title, category, passwords, tags.
    ///
    /// # Example
    /// ```
    /// use chrono::DateTime;
    /// use nzb_rs::{File, Meta, Nzb, Segment};
    ///
    /// let meta = Meta {
    ///     title: Some("Test File".to_string()),
    ///     ..Meta::default()
    /// };
    /// let file = File::new(
    ///     "user@example.com",
    ///     DateTime::from_timestamp(1234567890, 0).unwrap(),
    ///     "Test [1/1]",
    ///     vec!["alt.binaries.test".to_string()],
    ///     vec![Segment::new(768000, 1, "part1@example.com").unwrap()],
    /// )
    /// .unwrap();
    /// let nzb = Nzb::new(meta, vec![file]).unwrap();
    ///
    /// let xml = nzb.to_xml().unwrap();
    /// assert!(xml.contains("<nzb"));
    /// assert!(xml.contains("Test File"));
    /// assert_eq!(Nzb::parse(&xml).unwrap(), nzb);
    /// ```
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut nzb_elem = BytesStart::new("nzb");
        nzb_elem.push_attribute(("xmlns", NZB_NAMESPACE));
        writer.write_event(Event::Start(nzb_elem))?;

        let entries = self.meta().entries();
        if !entries.is_empty() {
            writer.write_event(Event::Start(BytesStart::new("head")))?;

            for (field, value) in entries {
                let mut meta_elem = BytesStart::new("meta");
                meta_elem.push_attribute(("type", field.xml_type()));
                writer.write_event(Event::Start(meta_elem))?;
                // BytesText escapes on its own
                writer.write_event(Event::Text(BytesText::new(value)))?;
                writer.write_event(Event::End(BytesEnd::new("meta")))?;
            }

            writer.write_event(Event::End(BytesEnd::new("head")))?;
        }

        for file in self.files() {
            let mut file_elem = BytesStart::new("file");
            file_elem.push_attribute(("poster", file.poster()));
            file_elem.push_attribute(("date", file.posted_at().timestamp().to_string().as_str()));
            file_elem.push_attribute(("subject", file.subject()));
            writer.write_event(Event::Start(file_elem))?;

            writer.write_event(Event::Start(BytesStart::new("groups")))?;
            for group in file.groups() {
                writer.write_event(Event::Start(BytesStart::new("group")))?;
                writer.write_event(Event::Text(BytesText::new(group)))?;
                writer.write_event(Event::End(BytesEnd::new("group")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("groups")))?;

            writer.write_event(Event::Start(BytesStart::new("segments")))?;
            for segment in file.segments() {
                let mut seg_elem = BytesStart::new("segment");
                seg_elem.push_attribute(("bytes", segment.size().to_string().as_str()));
                seg_elem.push_attribute(("number", segment.number().to_string().as_str()));
                writer.write_event(Event::Start(seg_elem))?;
                writer.write_event(Event::Text(BytesText::new(segment.message_id())))?;
                writer.write_event(Event::End(BytesEnd::new("segment")))?;
            }
            writer.write_event(Event::End(BytesEnd::new("segments")))?;

            writer.write_event(Event::End(BytesEnd::new("file")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("nzb")))?;

        let body = String::from_utf8(writer.into_inner().into_inner())?;
        Ok(format!("{XML_HEADER}{body}\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn sample() -> Nzb {
        let file = |subject: &str, segments: Vec<Segment>| {
            File::new(
                "Poster <poster@example.com>",
                DateTime::from_timestamp(1706440708, 0).unwrap(),
                subject,
                vec!["alt.binaries.test".to_string(), "alt.binaries.b&w".to_string()],
                segments,
            )
            .unwrap()
        };
        let meta = Meta {
            title: Some("Fish & Chips".to_string()),
            passwords: vec!["a<b".to_string(), "c".to_string()],
            tags: vec!["HD".to_string()],
            category: Some("TV".to_string()),
        };
        Nzb::new(
            meta,
            vec![
                file(
                    r#"[2/2] - "My Show.par2" yEnc (1/1) 10"#,
                    vec![Segment::new(10, 1, "p@x").unwrap()],
                ),
                file(
                    r#"[1/2] - "My Show.mkv" yEnc (1/2) 30"#,
                    vec![
                        Segment::new(20, 2, "m2@x").unwrap(),
                        Segment::new(10, 1, "m1@x").unwrap(),
                    ],
                ),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_to_xml_round_trip() {
        let nzb = sample();
        let xml = nzb.to_xml().unwrap();
        assert_eq!(Nzb::parse(&xml).unwrap(), nzb);
    }

    #[test]
    fn test_to_xml_layout() {
        let xml = sample().to_xml().unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<!DOCTYPE nzb"));
        assert!(xml.contains(r#"<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">"#));
        assert!(xml.contains(r#"<meta type="title">Fish &amp; Chips</meta>"#));
        assert!(xml.contains(r#"<meta type="password">a&lt;b</meta>"#));
        assert!(xml.contains("<group>alt.binaries.b&amp;w</group>"));
        assert!(xml.contains(r#"<segment bytes="10" number="1">m1@x</segment>"#));

        let title = xml.find(r#"type="title""#).unwrap();
        let category = xml.find(r#"type="category""#).unwrap();
        let password = xml.find(r#"type="password""#).unwrap();
        let tag = xml.find(r#"type="tag""#).unwrap();
        assert!(title < category && category < password && password < tag);

        let mkv = xml.find("My Show.mkv").unwrap();
        let par2 = xml.find("My Show.par2").unwrap();
        assert!(mkv < par2);
    }

    #[test]
    fn test_to_xml_without_meta_has_no_head() {
        let nzb = sample();
        let bare = Nzb::new(Meta::default(), nzb.files().to_vec()).unwrap();
        let xml = bare.to_xml().unwrap();
        assert!(!xml.contains("<head>"));
        assert_eq!(Nzb::parse(&xml).unwrap(), bare);
    }

    #[test]
    fn test_aggregates() {
        let nzb = sample();
        assert_eq!(nzb.size(), 40);
        assert_eq!(nzb.file().name(), "My Show.mkv");
        assert_eq!(nzb.filenames(), vec!["My Show.mkv", "My Show.par2"]);
        assert_eq!(nzb.posters(), vec!["Poster <poster@example.com>"]);
        assert_eq!(nzb.groups(), vec!["alt.binaries.b&w", "alt.binaries.test"]);
        assert_eq!(nzb.par2_size(), 10);
        assert!((nzb.par2_percentage() - 25.0).abs() < f64::EPSILON);
        assert!(nzb.has_par2());
        assert!(!nzb.has_rar());
        assert!(!nzb.is_rar());
        assert!(!nzb.is_obfuscated());
    }
}
