//! Capabilities consumed from the host.
//!
//! The panels never analyse source themselves; everything about symbols comes
//! through [`Host`]. Implementations must be shareable across threads because
//! the session loop runs host queries off the loop thread.

use anyhow::Result;
use url::Url;

use crate::model::{Location, Position, Range};

/// Read access to one opened document.
pub trait TextDocument {
    /// Text of the 0-indexed `line`, without its line terminator.
    fn line_text(&self, line: u32) -> Option<&str>;
}

/// A document held fully in memory, split into lines.
#[derive(Debug, Clone, Default)]
pub struct SourceText {
    lines: Vec<String>,
}

impl SourceText {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
        }
    }
}

impl TextDocument for SourceText {
    fn line_text(&self, line: u32) -> Option<&str> {
        self.lines.get(line as usize).map(String::as_str)
    }
}

/// Document access plus workspace-relative display paths.
pub trait DocumentAccess {
    fn open_document(&self, uri: &Url) -> Result<Box<dyn TextDocument>>;

    /// Path shown to the user for `uri`, relative to the workspace root when possible.
    fn display_path(&self, uri: &Url) -> String {
        match uri.to_file_path() {
            Ok(p) => p.to_string_lossy().replace('\\', "/"),
            Err(_) => uri.to_string(),
        }
    }
}

/// What the panels need to know about a host call-hierarchy handle.
pub trait CallHierarchyHandle: Clone + Send + 'static {
    fn name(&self) -> &str;
    fn uri(&self) -> &Url;
    /// Range that selects just the symbol's name.
    fn selection_range(&self) -> Range;
}

/// One caller of a call-hierarchy item, with the ranges of its call sites.
#[derive(Debug, Clone)]
pub struct IncomingCall<I> {
    pub from: I,
    pub from_ranges: Vec<Range>,
}

pub trait Host: DocumentAccess + Send + Sync + 'static {
    type Item: CallHierarchyHandle;

    fn find_references(&self, uri: &Url, position: Position) -> Result<Vec<Location>>;

    fn prepare_call_hierarchy(&self, uri: &Url, position: Position) -> Result<Vec<Self::Item>>;

    fn provide_incoming_calls(&self, item: &Self::Item) -> Result<Vec<IncomingCall<Self::Item>>>;

    fn reveal_location(&self, location: &Location) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_text_lines_are_zero_indexed() {
        let doc = SourceText::new("first\r\nsecond\nthird");
        assert_eq!(doc.line_text(0), Some("first"));
        assert_eq!(doc.line_text(2), Some("third"));
        assert_eq!(doc.line_text(3), None);
    }
}
