use std::collections::HashMap;
use uuid::Uuid;

use crate::model::NodeId;

/// Maps client-visible node ids to host handles for the life of one panel.
#[derive(Debug)]
pub struct SessionRegistry<I> {
    items: HashMap<NodeId, I>,
}

impl<I> Default for SessionRegistry<I> {
    fn default() -> Self {
        Self {
            items: HashMap::new(),
        }
    }
}

impl<I> SessionRegistry<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `item` under a fresh random id and return the id.
    pub fn register(&mut self, item: I) -> NodeId {
        let id = loop {
            // 122 random bits; the loop only guards the astronomically unlikely repeat.
            let candidate = NodeId::new(format!("id_{}", Uuid::new_v4().simple()));
            if !self.items.contains_key(&candidate) {
                break candidate;
            }
        };
        self.items.insert(id.clone(), item);
        id
    }

    pub fn resolve(&self, id: &NodeId) -> Option<&I> {
        self.items.get(id)
    }

    /// Drop every association. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
