#![doc = include_str!("../README.md")]

/// Parser policies
pub mod config;
/// Metadata editor for NZB documents
pub mod editor;
mod error;
/// NZB domain model, parser, generator and JSON form
pub mod nzb;
/// Addressable XML element tree
pub mod tree;

pub use config::{DuplicateSegments, ParserConfig};
pub use editor::MetaEditor;
pub use error::{NzbError, Result};
pub use nzb::{File, Meta, MetaField, Nzb, Segment, parse_nzb, parse_nzb_with};
pub use tree::Document;
