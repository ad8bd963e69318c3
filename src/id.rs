//! Node identifiers.
//!
//! Ids are opaque strings. Generated ids carry the node kind as a prefix so a
//! raw envelope stays readable: `injector-0b6f...`.

use crate::tree::NodeKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Source of fresh node ids.
pub trait IdSource {
    fn next_id(&mut self, kind: NodeKind) -> NodeId;
}

/// Random v4 UUID ids. Collision-resistant across sessions and machines.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&mut self, kind: NodeKind) -> NodeId {
        NodeId(format!("{}-{}", kind, Uuid::new_v4().simple()))
    }
}

/// Deterministic `<kind>-<n>` ids. Only unique within one source instance.
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting after `n` (useful when resuming a loaded tree).
    pub fn starting_at(n: u64) -> Self {
        Self { next: n }
    }
}

impl IdSource for SequentialIds {
    fn next_id(&mut self, kind: NodeKind) -> NodeId {
        self.next += 1;
        NodeId(format!("{}-{}", kind, self.next))
    }
}
