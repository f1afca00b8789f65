use std::collections::HashMap;
use url::Url;

use crate::error::PanelError;
use crate::host::{DocumentAccess, TextDocument};
use crate::model::{FileCategory, Location, ReferenceGroup, ReferenceItem};

/// Group reference locations by file.
///
/// Groups come out in first-seen order and items keep the host's order inside
/// each group. A file that cannot be opened still yields its group, with empty
/// text for every item.
pub fn group_references(locations: &[Location], docs: &dyn DocumentAccess) -> Vec<ReferenceGroup> {
    let mut order: Vec<&Url> = Vec::new();
    let mut by_uri: HashMap<&Url, Vec<&Location>> = HashMap::new();
    for loc in locations {
        let bucket = by_uri.entry(&loc.uri).or_default();
        if bucket.is_empty() {
            order.push(&loc.uri);
        }
        bucket.push(loc);
    }

    order
        .into_iter()
        .map(|uri| {
            let locs = by_uri.remove(uri).unwrap_or_default();
            build_group(uri, &locs, docs)
        })
        .collect()
}

fn build_group(uri: &Url, locs: &[&Location], docs: &dyn DocumentAccess) -> ReferenceGroup {
    let file_path = docs.display_path(uri);
    let category = FileCategory::from_path(uri.path());

    let doc = match docs.open_document(uri) {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(%uri, error = %format!("{e:#}"), "cannot open document; showing references without text");
            None
        }
    };

    let items = locs
        .iter()
        .map(|loc| {
            let line = loc.range.start.line;
            let text = match line_text(doc.as_deref(), uri, line) {
                Ok(t) => t,
                Err(e) => {
                    tracing::debug!("{e}");
                    String::new()
                }
            };
            ReferenceItem {
                line: line + 1,
                text,
                uri: loc.uri.clone(),
                range: loc.range,
            }
        })
        .collect();

    ReferenceGroup {
        uri: uri.clone(),
        file_path,
        category,
        icon: category.icon().to_string(),
        items,
    }
}

fn line_text(doc: Option<&dyn TextDocument>, uri: &Url, line: u32) -> Result<String, PanelError> {
    doc.and_then(|d| d.line_text(line))
        .map(|t| t.trim().to_string())
        .ok_or_else(|| PanelError::TextUnavailable {
            uri: uri.clone(),
            line,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SourceText;
    use crate::model::Range;
    use anyhow::anyhow;

    struct FakeDocs {
        files: HashMap<Url, String>,
    }

    impl DocumentAccess for FakeDocs {
        fn open_document(&self, uri: &Url) -> anyhow::Result<Box<dyn TextDocument>> {
            let text = self.files.get(uri).ok_or_else(|| anyhow!("no such file: {uri}"))?;
            Ok(Box::new(SourceText::new(text)))
        }

        fn display_path(&self, uri: &Url) -> String {
            uri.path().trim_start_matches("/w/").to_string()
        }
    }

    fn uri(name: &str) -> Url {
        Url::parse(&format!("file:///w/{name}")).unwrap()
    }

    fn loc(name: &str, line: u32, col: u32) -> Location {
        Location::new(uri(name), Range::from_coords(line, col, line, col + 3))
    }

    fn docs() -> FakeDocs {
        let mut files = HashMap::new();
        files.insert(uri("a.cpp"), "int foo();\n  foo();  \nreturn foo();\n".to_string());
        files.insert(uri("b.h"), "void foo();\n".to_string());
        files.insert(uri("c.py"), "foo()\n".to_string());
        FakeDocs { files }
    }

    #[test]
    fn groups_by_file_in_first_seen_order() {
        let locations = vec![loc("a.cpp", 1, 2), loc("b.h", 0, 5), loc("a.cpp", 2, 7)];
        let groups = group_references(&locations, &docs());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].file_path, "a.cpp");
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[0].category, FileCategory::Source);
        assert_eq!(groups[1].file_path, "b.h");
        assert_eq!(groups[1].items.len(), 1);
        assert_eq!(groups[1].category, FileCategory::Header);
        assert_eq!(groups[1].icon, "file-text");
    }

    #[test]
    fn items_keep_host_order_and_trim_text() {
        let locations = vec![loc("a.cpp", 2, 7), loc("a.cpp", 1, 2)];
        let groups = group_references(&locations, &docs());
        let items = &groups[0].items;
        assert_eq!(items[0].line, 3);
        assert_eq!(items[0].text, "return foo();");
        assert_eq!(items[1].line, 2);
        assert_eq!(items[1].text, "foo();");
    }

    #[test]
    fn every_item_lands_in_exactly_one_group() {
        let locations = vec![
            loc("c.py", 0, 0),
            loc("a.cpp", 0, 4),
            loc("c.py", 0, 0),
            loc("b.h", 0, 5),
            loc("a.cpp", 1, 2),
        ];
        let groups = group_references(&locations, &docs());
        let total: usize = groups.iter().map(|g| g.items.len()).sum();
        assert_eq!(total, locations.len());
        let order: Vec<&str> = groups.iter().map(|g| g.file_path.as_str()).collect();
        assert_eq!(order, vec!["c.py", "a.cpp", "b.h"]);
        for g in &groups {
            assert!(g.items.iter().all(|i| i.uri == g.uri));
        }
    }

    #[test]
    fn unreadable_file_keeps_its_group_with_blank_text() {
        let locations = vec![loc("gone.hpp", 4, 0), loc("b.h", 0, 5)];
        let groups = group_references(&locations, &docs());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].file_path, "gone.hpp");
        assert_eq!(groups[0].category, FileCategory::Header);
        assert_eq!(groups[0].items[0].text, "");
        assert_eq!(groups[0].items[0].line, 5);
        assert_eq!(groups[1].items[0].text, "void foo();");
    }

    #[test]
    fn line_past_end_of_file_is_blank() {
        let locations = vec![loc("b.h", 40, 0)];
        let groups = group_references(&locations, &docs());
        assert_eq!(groups[0].items[0].text, "");
    }

    #[test]
    fn empty_input_gives_no_groups() {
        assert!(group_references(&[], &docs()).is_empty());
    }
}
