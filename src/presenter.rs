//! Panel presenters: per-panel state machines behind the surface protocol.
//!
//! A presenter does no I/O. Inbound surface messages and host completions go
//! in; [`Effect`]s come out for the session loop to carry out. That keeps the
//! ordering rules (node-scoped expansion, discard after dispose) testable
//! without a runtime.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use url::Url;

use crate::hierarchy::CallHierarchyController;
use crate::host::{CallHierarchyHandle, Host, IncomingCall};
use crate::model::{ExpansionState, HierarchyNode, Location, NodeId, Range, ReferenceGroup};

/// Surface → core.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Inbound {
    Ready,
    Expand {
        id: NodeId,
    },
    Collapse {
        id: NodeId,
    },
    #[serde(rename_all = "camelCase")]
    Open {
        uri: Url,
        start_line: u32,
        start_char: u32,
        end_line: u32,
        end_char: u32,
    },
    Close,
}

/// Core → surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum Outbound {
    SetRoot {
        title: String,
        node: HierarchyNode,
    },
    #[serde(rename_all = "camelCase")]
    AppendChildren {
        parent_id: NodeId,
        children: Vec<HierarchyNode>,
    },
    SetReferences {
        title: String,
        groups: Vec<ReferenceGroup>,
    },
    ShowMessage {
        level: MessageLevel,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Error,
}

/// Work a presenter asks the session loop to perform.
#[derive(Debug)]
pub enum Effect<I> {
    Post(Outbound),
    QueryIncoming { parent: NodeId, item: I },
    Reveal(Location),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Initializing,
    Ready,
    Disposed,
}

pub trait Panel {
    type Item: Send + 'static;

    fn title(&self) -> &str;

    fn state(&self) -> PanelState;

    fn on_message(&mut self, msg: Inbound) -> Vec<Effect<Self::Item>>;

    /// Apply a finished incoming-calls query for `parent`.
    fn on_incoming_calls(
        &mut self,
        parent: NodeId,
        result: anyhow::Result<Vec<IncomingCall<Self::Item>>>,
    ) -> Vec<Effect<Self::Item>>;

    fn dispose(&mut self);

    fn is_disposed(&self) -> bool {
        self.state() == PanelState::Disposed
    }
}

fn reveal_effect<I>(uri: Url, start_line: u32, start_char: u32, end_line: u32, end_char: u32) -> Effect<I> {
    Effect::Reveal(Location::new(
        uri,
        Range::from_coords(start_line, start_char, end_line, end_char),
    ))
}

// ---------------------------------------------------------------------------
// Call hierarchy panel
// ---------------------------------------------------------------------------

pub struct CallHierarchyPanel<H: Host> {
    title: String,
    root: HierarchyNode,
    controller: CallHierarchyController<H>,
    state: PanelState,
    expansion: HashMap<NodeId, ExpansionState>,
}

impl<H: Host> CallHierarchyPanel<H> {
    pub fn new(host: Arc<H>, root_item: H::Item) -> Self {
        let mut controller = CallHierarchyController::new(host);
        let root = controller.prepare_root(root_item);
        Self {
            title: format!("Calls: {}", root.name),
            root,
            controller,
            state: PanelState::Initializing,
            expansion: HashMap::new(),
        }
    }

    pub fn root(&self) -> &HierarchyNode {
        &self.root
    }

    pub fn controller(&self) -> &CallHierarchyController<H> {
        &self.controller
    }

    /// Give up the panel and keep its controller and root, for driving expansion directly.
    pub fn into_parts(self) -> (CallHierarchyController<H>, HierarchyNode) {
        (self.controller, self.root)
    }

    /// Expansion state of `id`; nodes never touched are collapsed.
    pub fn expansion_state(&self, id: &NodeId) -> ExpansionState {
        self.expansion
            .get(id)
            .copied()
            .unwrap_or(ExpansionState::Collapsed)
    }

    fn expand(&mut self, id: NodeId) -> Vec<Effect<H::Item>> {
        let item = match self.controller.resolve(&id) {
            Ok(item) => item,
            Err(e) => {
                tracing::debug!("ignoring expand: {e}");
                return Vec::new();
            }
        };
        if self.expansion_state(&id) == ExpansionState::Expanding {
            tracing::debug!(%id, "expand already in flight");
            return Vec::new();
        }
        self.expansion.insert(id.clone(), ExpansionState::Expanding);
        vec![Effect::QueryIncoming { parent: id, item }]
    }

    fn collapse(&mut self, id: NodeId) {
        if self.controller.registry().resolve(&id).is_none() {
            tracing::debug!(%id, "ignoring collapse of unknown node");
            return;
        }
        self.expansion.insert(id, ExpansionState::Collapsed);
    }
}

impl<H: Host> Panel for CallHierarchyPanel<H> {
    type Item = H::Item;

    fn title(&self) -> &str {
        &self.title
    }

    fn state(&self) -> PanelState {
        self.state
    }

    fn on_message(&mut self, msg: Inbound) -> Vec<Effect<H::Item>> {
        match (self.state, msg) {
            (PanelState::Disposed, msg) => {
                tracing::debug!(?msg, "panel disposed; dropping message");
                Vec::new()
            }
            (_, Inbound::Ready) => {
                // A reloaded surface has lost its rendered subtrees.
                self.expansion.clear();
                self.state = PanelState::Ready;
                vec![Effect::Post(Outbound::SetRoot {
                    title: self.title.clone(),
                    node: self.root.clone(),
                })]
            }
            (_, Inbound::Close) => {
                self.dispose();
                Vec::new()
            }
            (PanelState::Initializing, msg) => {
                tracing::debug!(?msg, "surface not ready yet; dropping message");
                Vec::new()
            }
            (PanelState::Ready, Inbound::Expand { id }) => self.expand(id),
            (PanelState::Ready, Inbound::Collapse { id }) => {
                self.collapse(id);
                Vec::new()
            }
            (
                PanelState::Ready,
                Inbound::Open {
                    uri,
                    start_line,
                    start_char,
                    end_line,
                    end_char,
                },
            ) => vec![reveal_effect(uri, start_line, start_char, end_line, end_char)],
        }
    }

    fn on_incoming_calls(
        &mut self,
        parent: NodeId,
        result: anyhow::Result<Vec<IncomingCall<H::Item>>>,
    ) -> Vec<Effect<H::Item>> {
        if self.state == PanelState::Disposed {
            tracing::debug!(%parent, "discarding late incoming calls after dispose");
            return Vec::new();
        }
        match result {
            Ok(calls) => {
                let children = self.controller.register_incoming(calls);
                tracing::debug!(%parent, count = children.len(), "incoming calls resolved");
                self.expansion.insert(parent.clone(), ExpansionState::Expanded);
                vec![Effect::Post(Outbound::AppendChildren {
                    parent_id: parent,
                    children,
                })]
            }
            Err(e) => {
                // The node stays `expanding`; collapsing and expanding again retries.
                let name = self
                    .controller
                    .resolve(&parent)
                    .map(|item| item.name().to_string())
                    .unwrap_or_else(|_| parent.to_string());
                tracing::warn!(%parent, error = %format!("{e:#}"), "incoming calls query failed");
                vec![Effect::Post(Outbound::ShowMessage {
                    level: MessageLevel::Error,
                    message: format!("Failed to load incoming calls for '{name}': {e:#}"),
                })]
            }
        }
    }

    fn dispose(&mut self) {
        self.state = PanelState::Disposed;
        self.controller.dispose();
        self.expansion.clear();
    }
}

// ---------------------------------------------------------------------------
// Reference panel
// ---------------------------------------------------------------------------

/// A reference panel. `I` only ties it to the host's item type; it never queries.
pub struct ReferencePanel<I> {
    title: String,
    groups: Vec<ReferenceGroup>,
    state: PanelState,
    _item: PhantomData<fn() -> I>,
}

impl<I> ReferencePanel<I> {
    pub fn new(title: String, groups: Vec<ReferenceGroup>) -> Self {
        Self {
            title,
            groups,
            state: PanelState::Initializing,
            _item: PhantomData,
        }
    }

    pub fn groups(&self) -> &[ReferenceGroup] {
        &self.groups
    }
}

impl<I: Send + 'static> Panel for ReferencePanel<I> {
    type Item = I;

    fn title(&self) -> &str {
        &self.title
    }

    fn state(&self) -> PanelState {
        self.state
    }

    fn on_message(&mut self, msg: Inbound) -> Vec<Effect<I>> {
        match (self.state, msg) {
            (PanelState::Disposed, _) => Vec::new(),
            (_, Inbound::Ready) => {
                self.state = PanelState::Ready;
                vec![Effect::Post(Outbound::SetReferences {
                    title: self.title.clone(),
                    groups: self.groups.clone(),
                })]
            }
            (_, Inbound::Close) => {
                self.dispose();
                Vec::new()
            }
            (
                PanelState::Ready,
                Inbound::Open {
                    uri,
                    start_line,
                    start_char,
                    end_line,
                    end_char,
                },
            ) => vec![reveal_effect(uri, start_line, start_char, end_line, end_char)],
            (_, msg) => {
                tracing::debug!(?msg, "reference panel ignores message");
                Vec::new()
            }
        }
    }

    fn on_incoming_calls(
        &mut self,
        parent: NodeId,
        _result: anyhow::Result<Vec<IncomingCall<I>>>,
    ) -> Vec<Effect<I>> {
        tracing::debug!(%parent, "reference panel has no call hierarchy");
        Vec::new()
    }

    fn dispose(&mut self) {
        self.state = PanelState::Disposed;
        self.groups.clear();
    }
}
