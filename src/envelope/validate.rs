//! Envelope validation: raw serde shape in, validated tree out.
//!
//! Validation is all-or-nothing. The first violation aborts the import and no
//! partial tree is ever produced.

use super::raw::{Metadata, RawEnvelope, RawNode};
use crate::error::{EngineError, Result};
use crate::id::NodeId;
use crate::layout::{Orientation, Positions};
use crate::link::can_attach;
use crate::tree::{ConfigNode, NodeKind};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Major envelope version this build reads and writes.
pub const SUPPORTED_MAJOR: u64 = 1;

/// Envelope that passed validation, with levels recomputed from structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Imported {
    pub tree: Arc<ConfigNode>,
    pub positions: Positions,
    pub metadata: Option<Metadata>,
    pub orientation: Orientation,
    pub timestamp: u64,
}

impl RawEnvelope {
    /// Validate and build an [`Imported`]:
    /// - required top-level keys are present
    /// - the version's major component is supported
    /// - every node has id, title and a recognized kind
    /// - ids are unique across the tree
    /// - the single top-level node is a root kind and every edge obeys the kind table
    pub fn validate_and_build(&self) -> Result<Imported> {
        // Phase 1: required keys.
        let version = self
            .version
            .as_deref()
            .ok_or_else(|| EngineError::malformed("missing required key `version`"))?;
        let timestamp = self
            .timestamp
            .ok_or_else(|| EngineError::malformed("missing required key `timestamp`"))?;
        let nodes = self
            .nodes
            .as_ref()
            .ok_or_else(|| EngineError::malformed("missing required key `nodes`"))?;
        let positions = self
            .positions
            .as_ref()
            .ok_or_else(|| EngineError::malformed("missing required key `positions`"))?;

        // Phase 2: version gate.
        check_version(version)?;

        // Phase 3: exactly one top-level node, and it must be a root kind.
        let root = match nodes.as_slice() {
            [root] => root,
            [] => return Err(EngineError::malformed("`nodes` is empty")),
            more => {
                return Err(EngineError::malformed(format!(
                    "`nodes` must hold a single root tree (found {} top-level nodes)",
                    more.len()
                )));
            }
        };

        // Phase 4: per-node fields, uniqueness and composition.
        let mut seen = BTreeSet::new();
        let tree = build_node(root, None, 0, &mut seen)?;

        Ok(Imported {
            tree: Arc::new(tree),
            positions: positions.clone(),
            metadata: self.metadata.clone(),
            orientation: self.orientation.unwrap_or_default(),
            timestamp,
        })
    }
}

fn check_version(version: &str) -> Result<()> {
    const VERSION_RE: &str = r"^\s*(\d+)\.(\d+)(?:\.(\d+))?\s*$";
    let re = Regex::new(VERSION_RE)
        .map_err(|e| EngineError::malformed(format!("version pattern: {}", e)))?;

    let caps = re
        .captures(version)
        .ok_or_else(|| EngineError::malformed(format!("unparseable version {:?}", version)))?;
    let major: u64 = caps
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .parse()
        .map_err(|_| EngineError::malformed(format!("unparseable version {:?}", version)))?;

    if major != SUPPORTED_MAJOR {
        return Err(EngineError::malformed(format!(
            "unsupported envelope version {} (supported major version is {})",
            version, SUPPORTED_MAJOR
        )));
    }
    Ok(())
}

fn build_node(
    raw: &RawNode,
    parent: Option<(&NodeId, NodeKind)>,
    level: u32,
    seen: &mut BTreeSet<NodeId>,
) -> Result<ConfigNode> {
    let id = raw
        .id
        .as_deref()
        .map(NodeId::from)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| node_error(parent, "node is missing `id`"))?;
    let title = raw
        .title
        .clone()
        .ok_or_else(|| EngineError::malformed(format!("node `{}` is missing `title`", id)))?;
    let kind_text = raw
        .kind
        .as_deref()
        .ok_or_else(|| EngineError::malformed(format!("node `{}` is missing `kind`", id)))?;
    let kind = NodeKind::parse(kind_text).ok_or_else(|| {
        EngineError::malformed(format!("node `{}` has unknown kind {:?}", id, kind_text))
    })?;

    if !seen.insert(id.clone()) {
        return Err(EngineError::malformed(format!("duplicate node id `{}`", id)));
    }

    match parent {
        None if !kind.is_root() => {
            return Err(EngineError::malformed(format!(
                "top-level node `{}` must be a root kind, found {}",
                id, kind
            )));
        }
        Some((pid, pkind)) if !can_attach(kind, pkind) => {
            return Err(EngineError::malformed(format!(
                "{} node `{}` cannot be a child of {} node `{}`",
                kind, id, pkind, pid
            )));
        }
        _ => {}
    }

    let mut children = Vec::new();
    for child in raw.children.iter().flatten() {
        children.push(Arc::new(build_node(child, Some((&id, kind)), level + 1, seen)?));
    }

    Ok(ConfigNode {
        id: id.clone(),
        title,
        content: raw.content.clone().unwrap_or_default(),
        kind,
        level,
        children,
        connections: raw
            .connections
            .as_ref()
            .map(|c| c.iter().map(|s| NodeId::from(s.as_str())).collect()),
    })
}

fn node_error(parent: Option<(&NodeId, NodeKind)>, msg: &str) -> EngineError {
    match parent {
        Some((pid, _)) => EngineError::malformed(format!("{} (child of `{}`)", msg, pid)),
        None => EngineError::malformed(format!("{} (top-level node)", msg)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawEnvelope {
        serde_json::from_value(value).unwrap()
    }

    fn err(value: serde_json::Value) -> String {
        raw(value).validate_and_build().unwrap_err().to_string()
    }

    fn envelope(nodes: serde_json::Value) -> serde_json::Value {
        json!({ "version": "1.0.0", "timestamp": 1, "nodes": nodes, "positions": {} })
    }

    #[test]
    fn builds_levels_from_structure_not_stored_values() {
        let imported = raw(envelope(json!([{
            "id": "m", "title": ".zshrc", "kind": "zsh", "level": 9,
            "children": [{ "id": "i", "title": "env", "kind": "injector", "level": 0,
                           "children": [{ "id": "p", "title": "path", "kind": "partial" }] }]
        }])))
        .validate_and_build()
        .unwrap();

        let inj = &imported.tree.children[0];
        assert_eq!(imported.tree.level, 0);
        assert_eq!(inj.level, 1);
        assert_eq!(inj.children[0].level, 2);
        assert_eq!(imported.orientation, Orientation::Normal);
    }

    #[test]
    fn missing_keys_are_named() {
        assert!(err(json!({ "timestamp": 1, "nodes": [], "positions": {} })).contains("`version`"));
        assert!(
            err(json!({ "version": "1.0.0", "nodes": [], "positions": {} })).contains("`timestamp`")
        );
        assert!(err(json!({ "version": "1.0.0", "timestamp": 1, "nodes": [] })).contains("`positions`"));
    }

    #[test]
    fn version_gate() {
        let mut v = envelope(json!([{ "id": "m", "title": "m", "kind": "main" }]));
        v["version"] = json!("2.0.0");
        assert!(err(v.clone()).contains("unsupported envelope version"));
        v["version"] = json!("one");
        assert!(err(v.clone()).contains("unparseable version"));
        v["version"] = json!("1.4");
        assert!(raw(v).validate_and_build().is_ok());
    }

    #[test]
    fn unknown_kind_and_missing_fields() {
        assert!(err(envelope(json!([{ "id": "m", "title": "m", "kind": "script" }])))
            .contains("unknown kind"));
        assert!(err(envelope(json!([{ "id": "m", "kind": "main" }]))).contains("missing `title`"));
        assert!(err(envelope(json!([{ "title": "m", "kind": "main" }]))).contains("missing `id`"));
    }

    #[test]
    fn duplicate_ids_rejected() {
        let e = err(envelope(json!([{
            "id": "m", "title": "m", "kind": "main",
            "children": [
                { "id": "x", "title": "a", "kind": "injector" },
                { "id": "x", "title": "b", "kind": "injector" }
            ]
        }])));
        assert_eq!(e, "malformed envelope: duplicate node id `x`");
    }

    #[test]
    fn composition_enforced() {
        let e = err(envelope(json!([{
            "id": "m", "title": "m", "kind": "main",
            "children": [{ "id": "p", "title": "p", "kind": "partial" }]
        }])));
        assert!(e.contains("partial node `p` cannot be a child of main node `m`"));

        assert!(err(envelope(json!([{ "id": "i", "title": "i", "kind": "injector" }])))
            .contains("must be a root kind"));
        assert!(err(envelope(json!([]))).contains("empty"));
    }
}
