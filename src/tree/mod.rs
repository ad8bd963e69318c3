//! Node tree model: the `ConfigNode` structure and pure operations over it.
//!
//! Trees are `Arc<ConfigNode>` and are never mutated in place. An edit copies
//! the path from the root down to the target and shares every other subtree,
//! so `Arc::ptr_eq` on an untouched subtree stays true across edits.

pub mod ops;

pub use ops::{
    attach, depends_on, find, find_parent, ids, node_count, relevel, remove, rename_id,
    reparent, required_by, strip_connections, subtree_ids, update,
};

use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Node kind as it appears in envelopes (`"main"`, `"injector"`, ...).
///
/// The shell-flavored root kinds behave exactly like `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Main,
    Zsh,
    Bash,
    Fish,
    Injector,
    Partial,
}

/// Structural role of a kind; composition rules are written against roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Root,
    Injector,
    Partial,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Main,
        NodeKind::Zsh,
        NodeKind::Bash,
        NodeKind::Fish,
        NodeKind::Injector,
        NodeKind::Partial,
    ];

    pub fn role(self) -> Role {
        match self {
            NodeKind::Main | NodeKind::Zsh | NodeKind::Bash | NodeKind::Fish => Role::Root,
            NodeKind::Injector => Role::Injector,
            NodeKind::Partial => Role::Partial,
        }
    }

    pub fn is_root(self) -> bool {
        self.role() == Role::Root
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Main => "main",
            NodeKind::Zsh => "zsh",
            NodeKind::Bash => "bash",
            NodeKind::Fish => "fish",
            NodeKind::Injector => "injector",
            NodeKind::Partial => "partial",
        }
    }

    /// Parse the envelope spelling of a kind.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One script fragment in the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigNode {
    pub id: NodeId,
    /// Display name and logical script file name.
    pub title: String,
    pub content: String,
    pub kind: NodeKind,
    /// Cached depth; always equals the distance from the tree root.
    pub level: u32,
    pub children: Vec<Arc<ConfigNode>>,
    /// Cross references ("depends on"); not ownership.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connections: Option<Vec<NodeId>>,
}

impl ConfigNode {
    pub fn new(
        id: impl Into<NodeId>,
        kind: NodeKind,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: content.into(),
            kind,
            level: 0,
            children: Vec::new(),
            connections: None,
        }
    }

    /// A lone `main` root, the state every canvas starts from.
    pub fn main_root() -> Self {
        Self::new("main", NodeKind::Main, ".zshrc", "")
    }

    pub fn with_children(mut self, children: Vec<ConfigNode>) -> Self {
        self.children = children.into_iter().map(Arc::new).collect();
        self
    }

    pub fn with_connections(mut self, connections: Vec<NodeId>) -> Self {
        self.connections = Some(connections);
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Shallow merge applied by [`update`]. `None` leaves a field as it is.
///
/// Identity, kind, level and children are not patchable; those change only
/// through [`rename_id`], [`reparent`] and the add/remove operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub connections: Option<Vec<NodeId>>,
}

impl NodePatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn connections(connections: Vec<NodeId>) -> Self {
        Self {
            connections: Some(connections),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.connections.is_none()
    }

    pub(crate) fn apply_to(&self, node: &ConfigNode) -> ConfigNode {
        let mut out = node.clone();
        if let Some(title) = &self.title {
            out.title = title.clone();
        }
        if let Some(content) = &self.content {
            out.content = content.clone();
        }
        if let Some(connections) = &self.connections {
            out.connections = Some(connections.clone());
        }
        out
    }
}
