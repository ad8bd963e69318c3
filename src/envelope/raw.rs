//! Raw envelope shape as it appears on disk or in the snippet store.
//!
//! Every field is optional here so that a missing key is reported by the
//! validator with a readable message instead of a serde error.
//!
//! JSON shape:
//! {
//!   "version": "1.0.0",
//!   "timestamp": 1718000000000,
//!   "nodes": [ { "id", "title", "kind", "content", "level", "children": [...],
//!                "connections"?: [...] } ],
//!   "positions": { "<id>": { "x": 100, "y": 100 } },
//!   "metadata": { "name"?, "description"?, "author"? },
//!   "orientation"?: "normal" | "horizontal" | "vertical"
//! }

use crate::layout::{Orientation, Positions};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub timestamp: Option<u64>,

    #[serde(default)]
    pub nodes: Option<Vec<RawNode>>,

    #[serde(default)]
    pub positions: Option<Positions>,

    #[serde(default)]
    pub metadata: Option<Metadata>,

    #[serde(default)]
    pub orientation: Option<Orientation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// Kept as text so an unknown kind is a validation error, not a parse error.
    #[serde(default)]
    pub kind: Option<String>,

    #[serde(default)]
    pub content: Option<String>,

    // `level` is accepted and ignored; levels are always recomputed.
    #[serde(default)]
    pub children: Option<Vec<RawNode>>,

    #[serde(default)]
    pub connections: Option<Vec<String>>,
}

/// Free-form description attached to a saved configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}
