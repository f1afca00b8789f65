//! Entry points that open a panel for a cursor position.

use std::sync::Arc;
use url::Url;

use crate::error::PanelError;
use crate::grouper::group_references;
use crate::host::Host;
use crate::model::Position;
use crate::presenter::{CallHierarchyPanel, ReferencePanel};

/// Query references at `position` and build a grouped reference panel.
pub fn find_references_at<H: Host>(
    host: &H,
    uri: &Url,
    position: Position,
) -> Result<ReferencePanel<H::Item>, PanelError> {
    let word = symbol_label(host, uri, position);
    let locations = host
        .find_references(uri, position)
        .map_err(PanelError::host)?;
    if locations.is_empty() {
        return Err(PanelError::NoResult(format!("No references found for '{word}'")));
    }

    let groups = group_references(&locations, host);
    let title = format!("References: {word} ({})", locations.len());
    tracing::debug!(%title, files = groups.len(), "reference panel built");
    Ok(ReferencePanel::new(title, groups))
}

/// Prepare the call hierarchy at `position` and build a panel rooted at the first item.
pub fn call_hierarchy_at<H: Host>(
    host: Arc<H>,
    uri: &Url,
    position: Position,
) -> Result<CallHierarchyPanel<H>, PanelError> {
    let mut items = host
        .prepare_call_hierarchy(uri, position)
        .map_err(PanelError::host)?;
    if items.is_empty() {
        return Err(PanelError::NoResult(
            "No call hierarchy information at this position".to_string(),
        ));
    }
    if items.len() > 1 {
        tracing::debug!(candidates = items.len(), "several roots; using the first");
    }
    let root = items.swap_remove(0);
    Ok(CallHierarchyPanel::new(host, root))
}

fn symbol_label<H: Host>(host: &H, uri: &Url, position: Position) -> String {
    host.open_document(uri)
        .ok()
        .and_then(|doc| doc.line_text(position.line).and_then(|l| word_at(l, position.character)))
        .unwrap_or_else(|| "Symbol".to_string())
}

/// The identifier-like word covering byte column `character`, or ending right before it.
pub fn word_at(line: &str, character: u32) -> Option<String> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut col = (character as usize).min(line.len());
    while !line.is_char_boundary(col) {
        col -= 1;
    }

    let start = line[..col]
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_word(*c))
        .last()
        .map(|(i, _)| i)
        .unwrap_or(col);
    let end = line[col..]
        .char_indices()
        .find(|(_, c)| !is_word(*c))
        .map(|(i, _)| col + i)
        .unwrap_or(line.len());

    (start < end).then(|| line[start..end].to_string())
}
