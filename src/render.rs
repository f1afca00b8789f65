//! Plain-text rendering for `--print`, where no surface is attached.

use crate::hierarchy::CallHierarchyController;
use crate::host::Host;
use crate::model::{HierarchyNode, ReferenceGroup};

pub fn render_references(title: &str, groups: &[ReferenceGroup]) -> String {
    let mut out = format!("## {title}\n");
    for group in groups {
        out.push_str(&format!("\n{}  ({})\n", group.file_path, group.items.len()));
        for item in &group.items {
            out.push_str(&format!("{:>5}: {}\n", item.line, item.text));
        }
    }
    out
}

/// Expand `root` depth-first down to `depth` levels and render the tree.
///
/// Uses the controller's synchronous expand; a failed level is shown inline.
pub fn render_call_tree<H: Host>(
    controller: &mut CallHierarchyController<H>,
    root: &HierarchyNode,
    depth: usize,
) -> String {
    let mut out = format!("## Calls: {}\n\n", root.name);
    render_node(controller, root, 0, depth, &mut out);
    out
}

fn render_node<H: Host>(
    controller: &mut CallHierarchyController<H>,
    node: &HierarchyNode,
    level: usize,
    depth: usize,
    out: &mut String,
) {
    let indent = "  ".repeat(level);
    out.push_str(&format!("{indent}{}  {}", node.name, node.detail));
    if !node.call_site_lines.is_empty() {
        let lines: Vec<String> = node.call_site_lines.iter().map(|l| format!("L{l}")).collect();
        out.push_str(&format!("  [{}]", lines.join(", ")));
    }
    out.push('\n');

    if level >= depth {
        return;
    }
    match controller.expand(&node.id) {
        Ok(children) if children.is_empty() && level == 0 => {
            out.push_str("  (no callers)\n");
        }
        Ok(children) => {
            for child in &children {
                render_node(controller, child, level + 1, depth, out);
            }
        }
        Err(e) => out.push_str(&format!("{indent}  (error: {e})\n")),
    }
}
