//! Call-hierarchy controller: id ↔ handle translation around host queries.

use std::sync::Arc;

use crate::error::PanelError;
use crate::host::{CallHierarchyHandle, Host, IncomingCall};
use crate::model::{HierarchyNode, Location, NodeId, HIERARCHY_NODE_ICON};
use crate::registry::SessionRegistry;

pub struct CallHierarchyController<H: Host> {
    host: Arc<H>,
    registry: SessionRegistry<H::Item>,
}

impl<H: Host> CallHierarchyController<H> {
    pub fn new(host: Arc<H>) -> Self {
        Self {
            host,
            registry: SessionRegistry::new(),
        }
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    pub fn registry(&self) -> &SessionRegistry<H::Item> {
        &self.registry
    }

    /// Register the host's initial item as the root node.
    pub fn prepare_root(&mut self, item: H::Item) -> HierarchyNode {
        let location = Location::new(item.uri().clone(), item.selection_range());
        self.node_for(item, location, Vec::new())
    }

    /// Look up the host handle behind `id`.
    pub fn resolve(&self, id: &NodeId) -> Result<H::Item, PanelError> {
        self.registry
            .resolve(id)
            .cloned()
            .ok_or_else(|| PanelError::StaleNode(id.clone()))
    }

    /// Register every caller in `calls` as a node, keeping the host's order.
    pub fn register_incoming(&mut self, calls: Vec<IncomingCall<H::Item>>) -> Vec<HierarchyNode> {
        calls
            .into_iter()
            .map(|call| {
                let mut lines: Vec<u32> = call.from_ranges.iter().map(|r| r.start.line + 1).collect();
                lines.sort_unstable();
                let range = call
                    .from_ranges
                    .first()
                    .copied()
                    .unwrap_or_else(|| call.from.selection_range());
                let location = Location::new(call.from.uri().clone(), range);
                self.node_for(call.from, location, lines)
            })
            .collect()
    }

    /// Fetch and register the callers of `id`. Always queries the host.
    pub fn expand(&mut self, id: &NodeId) -> Result<Vec<HierarchyNode>, PanelError> {
        let item = self.resolve(id)?;
        let calls = self
            .host
            .provide_incoming_calls(&item)
            .map_err(PanelError::host)?;
        Ok(self.register_incoming(calls))
    }

    pub fn dispose(&mut self) {
        self.registry.dispose();
    }

    fn node_for(&mut self, item: H::Item, location: Location, call_site_lines: Vec<u32>) -> HierarchyNode {
        let name = item.name().to_string();
        let detail = self.host.display_path(item.uri());
        let id = self.registry.register(item);
        HierarchyNode {
            id,
            name,
            detail,
            location,
            call_site_lines,
            icon: HIERARCHY_NODE_ICON.to_string(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory host shared by the controller and presenter tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use url::Url;

    use crate::host::{CallHierarchyHandle, DocumentAccess, Host, IncomingCall, SourceText, TextDocument};
    use crate::model::{Location, Position, Range};

    #[derive(Debug, Clone, PartialEq)]
    pub struct FakeItem {
        pub name: String,
        pub uri: Url,
        pub range: Range,
    }

    impl CallHierarchyHandle for FakeItem {
        fn name(&self) -> &str {
            &self.name
        }
        fn uri(&self) -> &Url {
            &self.uri
        }
        fn selection_range(&self) -> Range {
            self.range
        }
    }

    pub fn item(name: &str, file: &str, line: u32) -> FakeItem {
        FakeItem {
            name: name.to_string(),
            uri: Url::parse(&format!("file:///w/{file}")).unwrap(),
            range: Range::from_coords(line, 4, line, 4 + name.len() as u32),
        }
    }

    /// Incoming calls keyed by callee name; a `None` entry makes the query fail.
    #[derive(Default)]
    pub struct FakeHost {
        pub callers: HashMap<String, Option<Vec<(FakeItem, Vec<u32>)>>>,
        pub references: Vec<Location>,
        pub roots: Vec<FakeItem>,
        pub files: HashMap<Url, String>,
        pub incoming_queries: AtomicUsize,
        pub revealed: Mutex<Vec<Location>>,
        /// How long `reveal_location` blocks before returning.
        pub reveal_delay: Option<Duration>,
        /// Makes `reveal_location` fail with this message.
        pub reveal_error: Option<String>,
    }

    impl FakeHost {
        pub fn with_callers(mut self, callee: &str, callers: Vec<(FakeItem, Vec<u32>)>) -> Self {
            self.callers.insert(callee.to_string(), Some(callers));
            self
        }

        pub fn failing_for(mut self, callee: &str) -> Self {
            self.callers.insert(callee.to_string(), None);
            self
        }

        pub fn queries(&self) -> usize {
            self.incoming_queries.load(Ordering::SeqCst)
        }
    }

    impl DocumentAccess for FakeHost {
        fn open_document(&self, uri: &Url) -> Result<Box<dyn TextDocument>> {
            let text = self.files.get(uri).ok_or_else(|| anyhow!("cannot open {uri}"))?;
            Ok(Box::new(SourceText::new(text)))
        }

        fn display_path(&self, uri: &Url) -> String {
            uri.path().trim_start_matches("/w/").to_string()
        }
    }

    impl Host for FakeHost {
        type Item = FakeItem;

        fn find_references(&self, _uri: &Url, _position: Position) -> Result<Vec<Location>> {
            Ok(self.references.clone())
        }

        fn prepare_call_hierarchy(&self, _uri: &Url, _position: Position) -> Result<Vec<FakeItem>> {
            Ok(self.roots.clone())
        }

        fn provide_incoming_calls(&self, item: &FakeItem) -> Result<Vec<IncomingCall<FakeItem>>> {
            self.incoming_queries.fetch_add(1, Ordering::SeqCst);
            match self.callers.get(&item.name) {
                Some(Some(callers)) => Ok(callers
                    .iter()
                    .map(|(from, lines)| IncomingCall {
                        from: from.clone(),
                        from_ranges: lines.iter().map(|l| Range::from_coords(*l, 2, *l, 8)).collect(),
                    })
                    .collect()),
                Some(None) => Err(anyhow!("index unavailable")),
                None => Ok(Vec::new()),
            }
        }

        fn reveal_location(&self, location: &Location) -> Result<()> {
            if let Some(delay) = self.reveal_delay {
                std::thread::sleep(delay);
            }
            if let Some(msg) = &self.reveal_error {
                return Err(anyhow!("{msg}"));
            }
            self.revealed.lock().unwrap().push(location.clone());
            Ok(())
        }
    }
}
