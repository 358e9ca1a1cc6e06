//! NZB metadata editor
//!
//! [`MetaEditor`] rewrites the `<head>` block of an NZB document and leaves
//! everything else alone: the `<file>` elements are rendered from the
//! original bytes, not regenerated from the model. This keeps edits to huge
//! NZBs cheap and diff-friendly.
//!
//! After any change the known entries are written in a fixed order (title,
//! category, passwords, tags), after whatever unknown entries the block
//! already held. Entries that survive an edit keep their original bytes, and
//! an edit that leaves every field's values as they were does not touch the
//! document at all, wherever the entries sit, so applying the same edit twice
//! renders the same markup.
//!
//! The editor mutates its document in place; share it between threads only
//! behind a lock.
//!
//! # Example
//! ```
//! use nzb_rs::{MetaEditor, Nzb};
//!
//! let xml = r#"<nzb xmlns="http://www.newzbin.com/DTD/2003/nzb">
//!   <head>
//!     <meta type="tag">HD</meta>
//!   </head>
//!   <file poster="p" date="1" subject="&quot;a.bin&quot;">
//!     <groups><group>alt.binaries.test</group></groups>
//!     <segments><segment bytes="10" number="1">a@example.com</segment></segments>
//!   </file>
//! </nzb>"#;
//!
//! let mut editor = MetaEditor::new(xml).unwrap();
//! editor.set_title("Example").unwrap().append_tags(["1080p"]).unwrap();
//!
//! let edited = editor.render();
//! assert!(edited.ends_with(&xml[xml.find("<file").unwrap()..]));
//!
//! let nzb = Nzb::parse(&edited).unwrap();
//! assert_eq!(nzb.meta().title.as_deref(), Some("Example"));
//! assert_eq!(nzb.meta().tags, vec!["HD", "1080p"]);
//! ```

use crate::nzb::{Meta, MetaField, collect_meta, encoding_for_label, read_text};
use crate::tree::{Document, NodeId};
use crate::{NzbError, Result};
use encoding_rs::{Encoding, UTF_8};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// In-place editor for the `<head>` block of an NZB document
#[derive(Debug, Clone)]
pub struct MetaEditor {
    doc: Document,
    /// Encoding [`MetaEditor::to_file`] writes
    encoding: &'static Encoding,
}

/// Current content of the `<head>` block
#[derive(Default)]
struct Head {
    id: Option<NodeId>,
    /// Non-whitespace children in order
    content: Vec<NodeId>,
    /// Children other than known meta entries
    others: Vec<NodeId>,
    entries: Vec<(MetaField, String, NodeId)>,
}

impl Head {
    /// Known entries as (field, value) pairs in document order
    fn pairs(&self) -> Vec<(MetaField, String)> {
        self.entries
            .iter()
            .map(|(field, value, _)| (*field, value.clone()))
            .collect()
    }
}

enum Planned {
    Keep(NodeId),
    New(MetaField, String),
}

fn clean<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    values
        .into_iter()
        .map(Into::into)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn field_values(entries: &[(MetaField, String)], field: MetaField) -> Vec<&str> {
    entries
        .iter()
        .filter(|(f, _)| *f == field)
        .map(|(_, value)| value.as_str())
        .collect()
}

/// Whether both lists hold the same values per field, in the same order
fn same_values(a: &[(MetaField, String)], b: &[(MetaField, String)]) -> bool {
    MetaField::ALL
        .into_iter()
        .all(|field| field_values(a, field) == field_values(b, field))
}

fn prefix(name: &str) -> &str {
    name.rsplit_once(':').map_or("", |(prefix, _)| &name[..prefix.len() + 1])
}

/// Whitespace one level deeper than `ws`
fn indented(ws: &str) -> String {
    match ws.rsplit_once('\n') {
        Some((_, "")) => format!("{ws}  "),
        Some((_, unit)) => format!("{ws}{unit}"),
        None => ws.to_string(),
    }
}

impl MetaEditor {
    /// Parse `xml` for editing
    ///
    /// Only well-formedness is checked; the document does not have to be a
    /// valid NZB.
    pub fn new(xml: &str) -> Result<MetaEditor> {
        Ok(MetaEditor::from_document(Document::parse(xml)?))
    }

    /// Edit an already parsed tree
    pub fn from_document(doc: Document) -> MetaEditor {
        MetaEditor {
            doc,
            encoding: UTF_8,
        }
    }

    /// Read a (possibly gzipped) file for editing
    ///
    /// The encoding is detected the way [`Nzb::from_file`](crate::Nzb::from_file)
    /// detects it and [`MetaEditor::to_file`] writes the same one back.
    pub fn from_file(path: impl AsRef<Path>) -> Result<MetaEditor> {
        MetaEditor::read(path.as_ref(), None)
    }

    /// Read a file stored in the encoding labelled `encoding`
    pub fn from_file_with_encoding(path: impl AsRef<Path>, encoding: &str) -> Result<MetaEditor> {
        let encoding = encoding_for_label(encoding.as_bytes())?;
        MetaEditor::read(path.as_ref(), Some(encoding))
    }

    fn read(path: &Path, encoding: Option<&'static Encoding>) -> Result<MetaEditor> {
        let (xml, encoding) = read_text(path, encoding)?;
        Ok(MetaEditor {
            doc: Document::parse(xml)?,
            encoding: encoding.output_encoding(),
        })
    }

    /// Encoding the edited document is written in
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// The document being edited
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// Take the edited document
    pub fn into_document(self) -> Document {
        self.doc
    }

    /// Current metadata, collected the same way the parser does
    pub fn meta(&self) -> Meta {
        collect_meta(&self.doc, self.doc.root())
    }

    /// Replace every entry of `field` with `values`
    ///
    /// Values are trimmed and blank ones dropped, so an empty list (or a
    /// single empty string) removes the field. Singular fields accept at
    /// most one value.
    pub fn set<I, S>(&mut self, field: MetaField, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = clean(values);
        if !field.is_repeatable() && values.len() > 1 {
            return Err(NzbError::EditConflict(format!(
                "{field} takes a single value, got {}",
                values.len()
            )));
        }

        debug!("Setting meta {} to {:?}", field, values);
        self.edit(|entries| {
            entries.retain(|(f, _)| *f != field);
            entries.extend(values.into_iter().map(|value| (field, value)));
        })
    }

    /// Add `values` after the existing entries of a repeatable field
    pub fn append<I, S>(&mut self, field: MetaField, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !field.is_repeatable() {
            return Err(NzbError::EditConflict(format!(
                "cannot append to singular field {field}"
            )));
        }

        let values = clean(values);
        debug!("Appending {:?} to meta {}", values, field);
        self.edit(|entries| {
            entries.extend(values.into_iter().map(|value| (field, value)));
        })
    }

    /// Remove every entry of `field`
    pub fn remove(&mut self, field: MetaField) -> Result<&mut Self> {
        debug!("Removing meta {}", field);
        self.edit(|entries| entries.retain(|(f, _)| *f != field))
    }

    /// Remove the entries of `field` whose value is `value`
    pub fn remove_value(&mut self, field: MetaField, value: &str) -> Result<&mut Self> {
        let value = value.trim();
        debug!("Removing {:?} from meta {}", value, field);
        self.edit(|entries| entries.retain(|(f, v)| !(*f == field && v == value)))
    }

    /// Remove every `<meta>` entry whose `type` is `kind`
    ///
    /// Also reaches kinds outside [`MetaField`], which edits otherwise keep
    /// untouched. Matching is trimmed and case-insensitive.
    pub fn remove_kind(&mut self, kind: &str) -> Result<&mut Self> {
        if let Some(field) = MetaField::from_xml_type(kind) {
            return self.remove(field);
        }

        let root = self.root()?;
        let mut head = self.head(root)?;
        let kind = kind.trim();
        let before = head.others.len();
        head.others.retain(|&id| !self.is_meta_of_kind(id, kind));
        if head.others.len() == before {
            return Ok(self);
        }

        debug!("Removing meta entries of kind {:?}", kind);
        let mut entries = head.pairs();
        entries.sort_by_key(|(field, _)| *field);
        self.write_head(root, head, entries)?;
        Ok(self)
    }

    /// Drop the whole `<head>` block, unknown entries included
    pub fn clear(&mut self) -> Result<&mut Self> {
        let root = self.root()?;
        let head = self.head(root)?;
        if let Some(id) = head.id {
            debug!("Removing <head> block");
            self.remove_head(root, id);
        }
        Ok(self)
    }

    /// Set or (with an empty string) remove the title
    pub fn set_title(&mut self, title: &str) -> Result<&mut Self> {
        self.set(MetaField::Title, [title])
    }

    /// Set or (with an empty string) remove the category
    pub fn set_category(&mut self, category: &str) -> Result<&mut Self> {
        self.set(MetaField::Category, [category])
    }

    /// Replace all passwords
    pub fn set_passwords<I, S>(&mut self, passwords: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(MetaField::Passwords, passwords)
    }

    /// Replace all tags
    pub fn set_tags<I, S>(&mut self, tags: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set(MetaField::Tags, tags)
    }

    /// Add passwords after the existing ones
    pub fn append_passwords<I, S>(&mut self, passwords: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append(MetaField::Passwords, passwords)
    }

    /// Add tags after the existing ones
    pub fn append_tags<I, S>(&mut self, tags: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.append(MetaField::Tags, tags)
    }

    /// Serialize the edited document
    pub fn render(&self) -> String {
        self.doc.render()
    }

    /// Write the edited document to `path`
    ///
    /// Parent directories are created as needed. An existing file is only
    /// replaced when `overwrite` is set. Text goes out in
    /// [`MetaEditor::encoding`]; characters it cannot represent become
    /// numeric character references.
    pub fn to_file(&self, path: impl AsRef<Path>, overwrite: bool) -> Result<PathBuf> {
        let path = path.as_ref();
        if path.exists() && !overwrite {
            return Err(NzbError::FileExists(path.to_path_buf()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let rendered = self.render();
        let (bytes, _, _) = self.encoding.encode(&rendered);
        std::fs::write(path, bytes)?;
        Ok(path.to_path_buf())
    }

    fn root(&self) -> Result<NodeId> {
        let root = self.doc.root();
        match self.doc.element(root) {
            Some(element) if element.local_name() == "nzb" => Ok(root),
            Some(element) => Err(NzbError::EditConflict(format!(
                "root element is <{}>, expected <nzb>",
                element.name()
            ))),
            None => Err(NzbError::EditConflict("document has no root element".to_string())),
        }
    }

    fn head(&self, root: NodeId) -> Result<Head> {
        let heads: Vec<NodeId> = self.doc.child_elements(root, "head").collect();
        if heads.len() > 1 {
            return Err(NzbError::EditConflict(format!(
                "document has {} <head> blocks",
                heads.len()
            )));
        }
        let Some(&id) = heads.first() else {
            return Ok(Head::default());
        };

        let mut head = Head {
            id: Some(id),
            ..Head::default()
        };
        for &child in self.doc.children(id) {
            if self.doc.is_whitespace(child) {
                continue;
            }
            head.content.push(child);

            let field = self
                .doc
                .element(child)
                .filter(|element| element.local_name() == "meta")
                .and_then(|element| element.attribute("type"))
                .and_then(MetaField::from_xml_type);
            match field {
                Some(field) => {
                    let value = self.doc.text(child).trim().to_string();
                    head.entries.push((field, value, child));
                }
                None => head.others.push(child),
            }
        }
        Ok(head)
    }

    fn edit(&mut self, change: impl FnOnce(&mut Vec<(MetaField, String)>)) -> Result<&mut Self> {
        let root = self.root()?;
        let head = self.head(root)?;

        let current = head.pairs();
        let mut entries = current.clone();
        change(&mut entries);
        if same_values(&current, &entries) {
            return Ok(self);
        }
        entries.sort_by_key(|(field, _)| *field);

        self.write_head(root, head, entries)?;
        Ok(self)
    }

    fn write_head(
        &mut self,
        root: NodeId,
        head: Head,
        entries: Vec<(MetaField, String)>,
    ) -> Result<()> {
        let mut pool = head.entries;
        let planned: Vec<Planned> = entries
            .into_iter()
            .map(|(field, value)| {
                match pool.iter().position(|(f, v, _)| *f == field && *v == value) {
                    Some(i) => Planned::Keep(pool.remove(i).2),
                    None => Planned::New(field, value),
                }
            })
            .collect();

        if head.others.is_empty() && planned.is_empty() {
            if let Some(id) = head.id {
                debug!("No meta entries left, removing <head> block");
                self.remove_head(root, id);
            }
            return Ok(());
        }

        let (head_id, existing) = match head.id {
            Some(id) => (id, !head.content.is_empty()),
            None => (self.insert_head(root)?, false),
        };

        let head_ws = self.leading_whitespace(root, head_id);
        let child_ws = match head.content.first() {
            Some(&first) => self.leading_whitespace(head_id, first),
            None => indented(&head_ws),
        };
        let close_ws = match self.doc.children(head_id).last() {
            Some(&last) if self.doc.is_whitespace(last) => {
                self.doc.text_value(last).unwrap_or_default().to_string()
            }
            _ if existing => String::new(),
            _ => head_ws,
        };

        let meta_name = match self.doc.element(head_id) {
            Some(element) => format!("{}meta", prefix(element.name())),
            None => "meta".to_string(),
        };

        let mut nodes = head.others;
        for plan in planned {
            let id = match plan {
                Planned::Keep(id) => id,
                Planned::New(field, value) => {
                    let meta = self
                        .doc
                        .create_element(meta_name.as_str(), [("type", field.xml_type())]);
                    let text = self.doc.create_text(value);
                    self.doc.append_child(meta, text)?;
                    meta
                }
            };
            nodes.push(id);
        }

        let mut children = Vec::with_capacity(nodes.len() * 2 + 1);
        for node in nodes {
            if !child_ws.is_empty() {
                children.push(self.doc.create_text(child_ws.as_str()));
            }
            children.push(node);
        }
        if !close_ws.is_empty() {
            children.push(self.doc.create_text(close_ws));
        }
        self.doc.set_children(head_id, children)
    }

    /// Create an empty `<head>` in front of the first `<file>`
    fn insert_head(&mut self, root: NodeId) -> Result<NodeId> {
        let children = self.doc.children(root).to_vec();
        let first_file = self.doc.child_elements(root, "file").next();
        let index = first_file
            .and_then(|file| children.iter().position(|&child| child == file))
            .unwrap_or(children.len());
        let ws = match index.checked_sub(1).map(|i| children[i]) {
            Some(prev) if self.doc.is_whitespace(prev) => {
                self.doc.text_value(prev).unwrap_or_default().to_string()
            }
            _ => String::new(),
        };

        let name = match self.doc.element(root) {
            Some(element) => format!("{}head", prefix(element.name())),
            None => "head".to_string(),
        };
        let head = self
            .doc
            .create_element(name, std::iter::empty::<(String, String)>());
        self.doc.insert_child(root, index, head)?;

        if first_file.is_some() && !ws.is_empty() {
            let separator = self.doc.create_text(ws);
            self.doc.insert_child(root, index + 1, separator)?;
        }
        debug!("Inserted <head> block");
        Ok(head)
    }

    fn is_meta_of_kind(&self, id: NodeId, kind: &str) -> bool {
        self.doc
            .element(id)
            .filter(|element| element.local_name() == "meta")
            .and_then(|element| element.attribute("type"))
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(kind))
    }

    fn previous_whitespace(&self, parent: NodeId, child: NodeId) -> Option<NodeId> {
        let siblings = self.doc.children(parent);
        let index = siblings.iter().position(|&id| id == child)?;
        let prev = siblings.get(index.checked_sub(1)?)?;
        self.doc.is_whitespace(*prev).then_some(*prev)
    }

    fn leading_whitespace(&self, parent: NodeId, child: NodeId) -> String {
        self.previous_whitespace(parent, child)
            .and_then(|id| self.doc.text_value(id))
            .unwrap_or_default()
            .to_string()
    }

    fn remove_head(&mut self, root: NodeId, head: NodeId) {
        if let Some(ws) = self.previous_whitespace(root, head) {
            self.doc.remove_child(root, ws);
        }
        self.doc.remove_child(root, head);
    }
}

impl FromStr for MetaEditor {
    type Err = NzbError;

    fn from_str(s: &str) -> Result<Self> {
        MetaEditor::new(s)
    }
}
