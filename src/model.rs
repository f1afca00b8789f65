use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use url::Url;

/// A position in a document (0-indexed line, 0-indexed column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn from_coords(start_line: u32, start_char: u32, end_line: u32, end_char: u32) -> Self {
        Self {
            start: Position::new(start_line, start_char),
            end: Position::new(end_line, end_char),
        }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uri: Url,
    pub range: Range,
}

impl Location {
    pub fn new(uri: Url, range: Range) -> Self {
        Self { uri, range }
    }
}

/// Opaque client-visible identifier of a call-hierarchy node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One call-hierarchy entry as the surface sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyNode {
    pub id: NodeId,
    pub name: String,
    /// Workspace-relative path of the symbol's file.
    pub detail: String,
    pub location: Location,
    /// 1-based lines where this caller invokes its parent. Empty for the root.
    pub call_site_lines: Vec<u32>,
    pub icon: String,
}

/// Icon name for call-hierarchy nodes.
pub const HIERARCHY_NODE_ICON: &str = "symbol-method";

/// Display category of a file, derived only from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCategory {
    Source,
    Header,
    Other,
}

const SOURCE_EXTENSIONS: &[&str] = &["c", "cpp", "cxx", "cc", "m", "mm"];
const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "hxx"];

impl FileCategory {
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.to_lowercase();
        if SOURCE_EXTENSIONS.contains(&ext.as_str()) {
            FileCategory::Source
        } else if HEADER_EXTENSIONS.contains(&ext.as_str()) {
            FileCategory::Header
        } else {
            FileCategory::Other
        }
    }

    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        Self::from_extension(ext)
    }

    /// Icon name the surface renders for this category.
    pub fn icon(self) -> &'static str {
        match self {
            FileCategory::Source => "file-code",
            FileCategory::Header => "file-text",
            FileCategory::Other => "file",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceItem {
    /// 1-based line number for display.
    pub line: u32,
    /// Trimmed source line; empty when the file could not be read.
    pub text: String,
    pub uri: Url,
    pub range: Range,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceGroup {
    pub uri: Url,
    pub file_path: String,
    pub category: FileCategory,
    pub icon: String,
    pub items: Vec<ReferenceItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionState {
    Collapsed,
    Expanding,
    Expanded,
}
