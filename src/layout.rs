//! Auto-layout for whole-tree loads and the orientation render transform.
//!
//! Depth runs left to right: every child sits `depth_spacing` to the right of
//! its parent. Vertically each depth column keeps a cursor, so the first child
//! lines up with its parent and later nodes in the same column stack
//! `sibling_spacing` apart. For the root's children this is exactly
//! `origin_y + index * sibling_spacing`, and no two nodes in one column overlap.

use crate::id::NodeId;
use crate::tree::ConfigNode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

pub type Positions = BTreeMap<NodeId, Position>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub origin_x: f64,
    pub origin_y: f64,
    pub depth_spacing: f64,
    pub sibling_spacing: f64,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: 100.0,
            origin_y: 100.0,
            depth_spacing: 300.0,
            sibling_spacing: 200.0,
        }
    }
}

impl LayoutConfig {
    pub fn origin(&self) -> Position {
        Position::new(self.origin_x, self.origin_y)
    }
}

/// Fresh positions for every node in the tree.
pub fn layout_tree(root: &ConfigNode, config: &LayoutConfig) -> Positions {
    let mut out = Positions::new();
    let mut cursors: Vec<f64> = Vec::new();
    place(root, config.origin(), 0, config, &mut cursors, &mut out);
    out
}

fn place(
    node: &ConfigNode,
    at: Position,
    depth: usize,
    config: &LayoutConfig,
    cursors: &mut Vec<f64>,
    out: &mut Positions,
) {
    out.insert(node.id.clone(), at);

    let column = depth + 1;
    if cursors.len() <= column {
        cursors.resize(column + 1, f64::NEG_INFINITY);
    }
    let x = at.x + config.depth_spacing;
    for child in &node.children {
        let y = cursors[column].max(at.y);
        cursors[column] = y + config.sibling_spacing;
        place(child, Position::new(x, y), column, config, cursors, out);
    }
}

/// Slot for a node added without a pointer location: next to its parent,
/// below the siblings already there.
pub fn place_child(parent: Position, sibling_index: usize, config: &LayoutConfig) -> Position {
    Position::new(
        parent.x + config.depth_spacing,
        parent.y + sibling_index as f64 * config.sibling_spacing,
    )
}

/// Positions for a freshly loaded tree: stored entries win for nodes that
/// exist, missing nodes get auto-layout, entries for unknown ids are dropped.
pub fn reconcile(root: &ConfigNode, stored: &Positions, config: &LayoutConfig) -> Positions {
    layout_tree(root, config)
        .into_iter()
        .map(|(id, auto)| {
            let pos = stored.get(&id).copied().unwrap_or(auto);
            (id, pos)
        })
        .collect()
}

/// How stored positions are drawn. Never written back to [`Positions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// Positions as stored; depth grows to the right.
    #[default]
    Normal,
    /// Mirrored around the origin column; depth grows to the left.
    Horizontal,
    /// Axes swapped around the origin; depth grows downward.
    Vertical,
}

/// Project a stored position for drawing.
pub fn project(pos: Position, orientation: Orientation, config: &LayoutConfig) -> Position {
    let dx = pos.x - config.origin_x;
    let dy = pos.y - config.origin_y;
    match orientation {
        Orientation::Normal => pos,
        Orientation::Horizontal => Position::new(config.origin_x - dx, pos.y),
        Orientation::Vertical => Position::new(config.origin_x + dy, config.origin_y + dx),
    }
}

pub fn project_all(
    positions: &Positions,
    orientation: Orientation,
    config: &LayoutConfig,
) -> Positions {
    positions
        .iter()
        .map(|(id, p)| (id.clone(), project(*p, orientation, config)))
        .collect()
}
