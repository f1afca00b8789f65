//! A [`Host`] backed by syntax trees of the files under one directory.
//!
//! This makes the binary usable without an editor: references are identifier
//! matches outside comments and strings, callers are call expressions whose
//! trailing identifier matches, attributed to their enclosing function.
//! Resolution is by name only, so overloads and shadowing are not told apart.

use anyhow::{anyhow, Context, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use url::Url;

use crate::config::Config;
use crate::host::{CallHierarchyHandle, DocumentAccess, Host, IncomingCall, SourceText, TextDocument};
use crate::model::{Location, Position, Range};
use crate::scanner::{read_source, scan_sources, FileEntry};
use crate::syntax::{enclosing_function, FunctionDef, ParsedFile};

#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceItem {
    pub name: String,
    pub uri: Url,
    /// Whole definition.
    pub range: Range,
    pub selection_range: Range,
}

impl WorkspaceItem {
    fn from_def(def: &FunctionDef, uri: &Url) -> Self {
        Self {
            name: def.name.clone(),
            uri: uri.clone(),
            range: def.range,
            selection_range: def.selection_range,
        }
    }
}

impl CallHierarchyHandle for WorkspaceItem {
    fn name(&self) -> &str {
        &self.name
    }

    fn uri(&self) -> &Url {
        &self.uri
    }

    fn selection_range(&self) -> Range {
        self.selection_range
    }
}

pub struct WorkspaceHost {
    root: PathBuf,
    config: Config,
}

impl WorkspaceHost {
    pub fn new(root: &Path, config: Config) -> Result<Self> {
        let root = std::fs::canonicalize(root)
            .with_context(|| format!("Workspace root does not exist: {}", root.display()))?;
        Ok(Self { root, config })
    }

    /// `file://` URI for `path`, resolved against the workspace root when relative.
    pub fn uri_for_path(&self, path: &Path) -> Result<Url> {
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let abs = std::fs::canonicalize(&abs).with_context(|| format!("No such file: {}", abs.display()))?;
        Url::from_file_path(&abs).map_err(|_| anyhow!("Cannot build a file URI for {}", abs.display()))
    }

    fn path_for_uri(&self, uri: &Url) -> Result<PathBuf> {
        uri.to_file_path()
            .map_err(|_| anyhow!("Not a file URI: {uri}"))
    }

    fn parse_uri(&self, uri: &Url) -> Result<ParsedFile> {
        let path = self.path_for_uri(uri)?;
        let source = read_source(&path)?;
        ParsedFile::parse(&path, source)
    }

    fn sources(&self) -> Result<Vec<FileEntry>> {
        scan_sources(&self.root, &self.config.scan)
    }

    /// Parse every workspace file that mentions `needle` and run `f` on it, keeping path order.
    fn for_each_mentioning<T, F>(&self, needle: &str, f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(&Url, &ParsedFile) -> Vec<T> + Sync,
    {
        let files = self.sources()?;
        let per_file: Vec<Vec<T>> = files
            .par_iter()
            .filter_map(|entry| {
                let source = read_source(&entry.abs_path).ok()?;
                // Cheap substring check before paying for a parse.
                if !source.contains(needle) {
                    return None;
                }
                let parsed = ParsedFile::parse(&entry.abs_path, source).ok()?;
                let uri = Url::from_file_path(&entry.abs_path).ok()?;
                Some(f(&uri, &parsed))
            })
            .collect();
        Ok(per_file.into_iter().flatten().collect())
    }

    fn reveal_with_command(&self, template: &[String], path: &Path, position: Position) -> Result<()> {
        let args: Vec<String> = template
            .iter()
            .map(|arg| {
                arg.replace("{path}", &path.to_string_lossy())
                    .replace("{line}", &(position.line + 1).to_string())
                    .replace("{column}", &(position.character + 1).to_string())
            })
            .collect();
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| anyhow!("reveal_command is empty"))?;

        let status = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .with_context(|| format!("Failed to run {program}"))?;
        if !status.success() {
            anyhow::bail!("{program} exited with {status}");
        }
        Ok(())
    }
}

/// Byte offset of `position` in `text`, clamped to the line.
fn byte_offset(text: &str, position: Position) -> Option<usize> {
    let mut offset = 0usize;
    for (i, line) in text.split_inclusive('\n').enumerate() {
        if i == position.line as usize {
            let col = (position.character as usize).min(line.len());
            return Some(offset + col);
        }
        offset += line.len();
    }
    None
}

impl DocumentAccess for WorkspaceHost {
    fn open_document(&self, uri: &Url) -> Result<Box<dyn TextDocument>> {
        let path = self.path_for_uri(uri)?;
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Box::new(SourceText::new(&text)))
    }

    fn display_path(&self, uri: &Url) -> String {
        let Ok(path) = uri.to_file_path() else { return uri.to_string() };
        let shown = path.strip_prefix(&self.root).unwrap_or(&path);
        shown.to_string_lossy().replace('\\', "/")
    }
}

impl Host for WorkspaceHost {
    type Item = WorkspaceItem;

    fn find_references(&self, uri: &Url, position: Position) -> Result<Vec<Location>> {
        let parsed = self.parse_uri(uri)?;
        let Some(ident) = parsed.identifier_at(position) else {
            tracing::debug!(%uri, ?position, "no identifier under cursor");
            return Ok(Vec::new());
        };
        let name = parsed.text(ident).to_string();
        tracing::debug!(%name, "finding references");

        self.for_each_mentioning(&name, |file_uri, file| {
            file.identifier_refs(&name)
                .into_iter()
                .map(|range| Location::new(file_uri.clone(), range))
                .collect()
        })
    }

    fn prepare_call_hierarchy(&self, uri: &Url, position: Position) -> Result<Vec<WorkspaceItem>> {
        let parsed = self.parse_uri(uri)?;
        let defs = parsed.functions();

        if let Some(ident) = parsed.identifier_at(position) {
            let name = parsed.text(ident).to_string();

            // Cursor on a definition's own name.
            if let Some(def) = defs
                .iter()
                .find(|d| d.name == name && d.selection_range.contains(position))
            {
                return Ok(vec![WorkspaceItem::from_def(def, uri)]);
            }

            // Cursor on a use of a function defined somewhere in the workspace.
            let found = self.for_each_mentioning(&name, |file_uri, file| {
                file.functions()
                    .iter()
                    .filter(|d| d.name == name)
                    .map(|d| WorkspaceItem::from_def(d, file_uri))
                    .collect()
            })?;
            if !found.is_empty() {
                return Ok(found);
            }
        }

        // Fall back to the function the cursor sits in.
        let item = byte_offset(&parsed.source, position)
            .and_then(|byte| enclosing_function(&defs, byte))
            .map(|def| WorkspaceItem::from_def(def, uri));
        Ok(item.into_iter().collect())
    }

    fn provide_incoming_calls(&self, item: &WorkspaceItem) -> Result<Vec<IncomingCall<WorkspaceItem>>> {
        let name = item.name.clone();
        self.for_each_mentioning(&name, |file_uri, file| {
            let defs = file.functions();
            let mut calls: Vec<(usize, IncomingCall<WorkspaceItem>)> = Vec::new();
            for (range, byte) in file.call_sites(&name) {
                let Some(caller) = enclosing_function(&defs, byte) else {
                    tracing::debug!(uri = %file_uri, line = range.start.line + 1, "skipping top-level call");
                    continue;
                };
                let key = caller.range.start;
                match calls.iter_mut().find(|(_, c)| c.from.range.start == key) {
                    Some((_, call)) => call.from_ranges.push(range),
                    None => calls.push((
                        byte,
                        IncomingCall {
                            from: WorkspaceItem::from_def(caller, file_uri),
                            from_ranges: vec![range],
                        },
                    )),
                }
            }
            calls.sort_by_key(|(first_byte, _)| *first_byte);
            calls.into_iter().map(|(_, call)| call).collect()
        })
    }

    fn reveal_location(&self, location: &Location) -> Result<()> {
        let path = self.path_for_uri(&location.uri)?;
        let start = location.range.start;
        if self.config.panel.reveal_command.is_empty() {
            tracing::info!(
                "reveal {}:{}:{}",
                path.display(),
                start.line + 1,
                start.character + 1
            );
            return Ok(());
        }
        self.reveal_with_command(&self.config.panel.reveal_command, &path, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> (TempDir, WorkspaceHost) {
        let tmp = TempDir::new().unwrap();
        let files = [
            (
                "src/a.cpp",
                "int helper(int v) { return v; }\n\nint draw() {\n    int x = helper(1);\n    return helper(x) + helper(2);\n}\n",
            ),
            ("src/b.h", "int helper(int v);\n"),
            (
                "src/c.cpp",
                "#include \"b.h\"\nint paint() {\n    return helper(3);\n}\nint g = helper(4);\n",
            ),
            ("notes/readme.txt", "helper helper"),
        ];
        for (rel, content) in files {
            let p = tmp.path().join(rel);
            std::fs::create_dir_all(p.parent().unwrap()).unwrap();
            std::fs::write(p, content).unwrap();
        }
        let host = WorkspaceHost::new(tmp.path(), Config::default()).unwrap();
        (tmp, host)
    }

    fn uri(host: &WorkspaceHost, rel: &str) -> Url {
        host.uri_for_path(Path::new(rel)).unwrap()
    }

    #[test]
    fn references_span_files_in_path_order() {
        let (_tmp, host) = workspace();
        let locs = host
            .find_references(&uri(&host, "src/a.cpp"), Position::new(0, 6))
            .unwrap();
        let shown: Vec<(String, u32)> = locs
            .iter()
            .map(|l| (host.display_path(&l.uri), l.range.start.line))
            .collect();
        assert_eq!(
            shown,
            vec![
                ("src/a.cpp".to_string(), 0),
                ("src/a.cpp".to_string(), 3),
                ("src/a.cpp".to_string(), 4),
                ("src/a.cpp".to_string(), 4),
                ("src/b.h".to_string(), 0),
                ("src/c.cpp".to_string(), 2),
                ("src/c.cpp".to_string(), 4),
            ]
        );
    }

    #[test]
    fn no_identifier_means_no_references() {
        let (_tmp, host) = workspace();
        let locs = host
            .find_references(&uri(&host, "src/a.cpp"), Position::new(1, 0))
            .unwrap();
        assert!(locs.is_empty());
    }

    #[test]
    fn prepare_on_definition_name() {
        let (_tmp, host) = workspace();
        let items = host
            .prepare_call_hierarchy(&uri(&host, "src/a.cpp"), Position::new(2, 5))
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "draw");
        assert_eq!(items[0].selection_range.start, Position::new(2, 4));
    }

    #[test]
    fn prepare_on_call_finds_definition() {
        let (_tmp, host) = workspace();
        let items = host
            .prepare_call_hierarchy(&uri(&host, "src/c.cpp"), Position::new(2, 12))
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "helper");
        assert_eq!(host.display_path(&items[0].uri), "src/a.cpp");
    }

    #[test]
    fn prepare_falls_back_to_enclosing_function() {
        let (_tmp, host) = workspace();
        let items = host
            .prepare_call_hierarchy(&uri(&host, "src/c.cpp"), Position::new(2, 4))
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "paint");
    }

    #[test]
    fn incoming_calls_group_call_sites_by_caller() {
        let (_tmp, host) = workspace();
        let items = host
            .prepare_call_hierarchy(&uri(&host, "src/a.cpp"), Position::new(0, 5))
            .unwrap();
        let calls = host.provide_incoming_calls(&items[0]).unwrap();

        let summary: Vec<(String, Vec<u32>)> = calls
            .iter()
            .map(|c| (c.from.name.clone(), c.from_ranges.iter().map(|r| r.start.line).collect()))
            .collect();
        // the top-level initializer in c.cpp has no enclosing function
        assert_eq!(
            summary,
            vec![("draw".to_string(), vec![3, 4, 4]), ("paint".to_string(), vec![2])]
        );
    }

    #[test]
    fn leaf_function_has_no_callers() {
        let (_tmp, host) = workspace();
        let items = host
            .prepare_call_hierarchy(&uri(&host, "src/c.cpp"), Position::new(1, 5))
            .unwrap();
        assert_eq!(items[0].name, "paint");
        assert!(host.provide_incoming_calls(&items[0]).unwrap().is_empty());
    }

    #[test]
    fn open_document_reads_lines() {
        let (_tmp, host) = workspace();
        let doc = host.open_document(&uri(&host, "src/b.h")).unwrap();
        assert_eq!(doc.line_text(0), Some("int helper(int v);"));
    }

    #[test]
    fn byte_offset_clamps_to_line() {
        let text = "ab\ncdef\n";
        assert_eq!(byte_offset(text, Position::new(1, 2)), Some(5));
        assert_eq!(byte_offset(text, Position::new(0, 99)), Some(3));
        assert_eq!(byte_offset(text, Position::new(5, 0)), None);
    }
}
