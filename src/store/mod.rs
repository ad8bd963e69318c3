//! Canvas state and the pure reducer that mutates it.
//!
//! [`apply`] takes the current [`CanvasState`] and a [`Command`] and returns the
//! next state, or an error with the input state left untouched. It never
//! generates ids or talks to the outside; [`CanvasStore`] does that.

pub mod shell;

pub use shell::{CanvasStore, ContentEditor, PendingSave, SaveSnapshot, Signal};

use crate::error::{PolicyViolation, Result};
use crate::id::NodeId;
use crate::layout::{self, LayoutConfig, Orientation, Position, Positions};
use crate::link::{CompositionPolicy, LinkDirection, LinkEvent, LinkState, can_attach};
use crate::tree::{self, ConfigNode, NodeKind, NodePatch};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct CanvasState {
    pub tree: Arc<ConfigNode>,
    pub positions: Positions,
    pub orientation: Orientation,
    pub zen_mode: bool,
    pub link: LinkState,
    pub has_unsaved_changes: bool,
    pub last_saved_tree: Arc<ConfigNode>,
    pub last_saved_positions: Positions,
    pub layout: LayoutConfig,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new(ConfigNode::main_root(), LayoutConfig::default())
    }
}

impl CanvasState {
    /// A clean canvas holding `root` (and whatever it already contains).
    pub fn new(root: ConfigNode, layout: LayoutConfig) -> Self {
        let tree = tree::relevel(&Arc::new(root), 0);
        let positions = layout::layout_tree(&tree, &layout);
        Self {
            last_saved_tree: Arc::clone(&tree),
            last_saved_positions: positions.clone(),
            tree,
            positions,
            orientation: Orientation::Normal,
            zen_mode: false,
            link: LinkState::Idle,
            has_unsaved_changes: false,
            layout,
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&Arc<ConfigNode>> {
        tree::find(&self.tree, id)
    }

    pub fn position(&self, id: &NodeId) -> Option<Position> {
        self.positions.get(id).copied()
    }

    /// Stored positions as they should be drawn in the current orientation.
    pub fn projected_positions(&self) -> Positions {
        layout::project_all(&self.positions, self.orientation, &self.layout)
    }
}

/// A node about to be added; the id is chosen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Attach a new node as the last child of `parent` (the root if `None`).
    /// `at` is the pointer location; without one the node gets a layout slot.
    AddNode {
        node: NewNode,
        parent: Option<NodeId>,
        at: Option<Position>,
    },
    UpdateNode {
        id: NodeId,
        patch: NodePatch,
    },
    RemoveNode {
        id: NodeId,
    },
    MoveNode {
        id: NodeId,
        position: Position,
    },
    RenameId {
        from: NodeId,
        to: NodeId,
    },
    StartLink {
        source: NodeId,
        direction: LinkDirection,
    },
    ResolveLink {
        target: NodeId,
    },
    CancelLink,
    /// Whole-tree load. `saved` marks the tree as matching persisted state.
    SetTree {
        tree: Arc<ConfigNode>,
        positions: Positions,
        saved: bool,
    },
    SetOrientation(Orientation),
    SetZenMode(bool),
    /// A save of this snapshot succeeded.
    MarkSaved {
        tree: Arc<ConfigNode>,
        positions: Positions,
    },
    Reset,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::AddNode { .. } => "add_node",
            Command::UpdateNode { .. } => "update_node",
            Command::RemoveNode { .. } => "remove_node",
            Command::MoveNode { .. } => "move_node",
            Command::RenameId { .. } => "rename_id",
            Command::StartLink { .. } => "start_link",
            Command::ResolveLink { .. } => "resolve_link",
            Command::CancelLink => "cancel_link",
            Command::SetTree { .. } => "set_tree",
            Command::SetOrientation(_) => "set_orientation",
            Command::SetZenMode(_) => "set_zen_mode",
            Command::MarkSaved { .. } => "mark_saved",
            Command::Reset => "reset",
        }
    }
}

/// Apply one command. On error the caller keeps its current state.
pub fn apply(state: &CanvasState, command: Command) -> Result<CanvasState> {
    debug!(command = command.name(), "apply");
    let policy = CompositionPolicy::default();
    let mut next = state.clone();

    match command {
        Command::AddNode { node, parent, at } => {
            let parent_id = parent.unwrap_or_else(|| state.tree.id.clone());
            let parent_node = state
                .node(&parent_id)
                .ok_or_else(|| PolicyViolation::UnknownNode(parent_id.clone()))?;
            let sibling_index = parent_node.children.len();

            let child = Arc::new(ConfigNode::new(
                node.id.clone(),
                node.kind,
                node.title,
                node.content,
            ));
            next.tree = tree::attach(&state.tree, &parent_id, child, &policy)?;

            let position = at.unwrap_or_else(|| {
                let anchor = state
                    .position(&parent_id)
                    .unwrap_or_else(|| state.layout.origin());
                layout::place_child(anchor, sibling_index, &state.layout)
            });
            next.positions.insert(node.id, position);
            next.has_unsaved_changes = true;
        }

        Command::UpdateNode { id, patch } => {
            let updated = tree::update(&state.tree, &id, &patch);
            if Arc::ptr_eq(&updated, &state.tree) {
                return Ok(next);
            }
            next.tree = updated;
            next.has_unsaved_changes = true;
        }

        Command::RemoveNode { id } => {
            let removed: BTreeSet<NodeId> =
                tree::subtree_ids(&state.tree, &id).into_iter().collect();
            let pruned = tree::remove(&state.tree, &id);
            if Arc::ptr_eq(&pruned, &state.tree) {
                return Ok(next);
            }
            next.tree = tree::strip_connections(&pruned, &removed);
            next.positions.retain(|k, _| !removed.contains(k));
            if state.link.source().is_some_and(|s| removed.contains(s)) {
                next.link = state.link.next(LinkEvent::Cancel);
            }
            next.has_unsaved_changes = true;
        }

        Command::MoveNode { id, position } => {
            if state.node(&id).is_none() {
                return Err(PolicyViolation::UnknownNode(id).into());
            }
            next.positions.insert(id, position);
            next.has_unsaved_changes = true;
        }

        Command::RenameId { from, to } => {
            let renamed = tree::rename_id(&state.tree, &from, &to)?;
            if Arc::ptr_eq(&renamed, &state.tree) {
                return Ok(next);
            }
            next.tree = renamed;
            if let Some(pos) = next.positions.remove(&from) {
                next.positions.insert(to.clone(), pos);
            }
            if let LinkState::AwaitingTarget { source, direction } = &state.link {
                if source == &from {
                    next.link = LinkState::AwaitingTarget {
                        source: to,
                        direction: *direction,
                    };
                }
            }
            next.has_unsaved_changes = true;
        }

        Command::StartLink { source, direction } => {
            if state.node(&source).is_none() {
                return Err(PolicyViolation::UnknownNode(source).into());
            }
            next.link = state.link.start(source, direction);
        }

        Command::ResolveLink { target } => {
            let Some(proposal) = state.link.proposal(&target) else {
                return Ok(next);
            };
            // A refusal is an error; the pending request survives in `state`.
            next.tree = tree::reparent(&state.tree, &proposal.child, &proposal.parent, &policy)?;
            next.link = state.link.next(LinkEvent::Accepted);
            next.has_unsaved_changes = true;
        }

        Command::CancelLink => {
            next.link = state.link.cancel();
        }

        Command::SetTree {
            tree: incoming,
            positions,
            saved,
        } => {
            let incoming = tree::relevel(&incoming, 0);
            check_structure(&incoming)?;
            next.positions = layout::reconcile(&incoming, &positions, &state.layout);
            next.tree = incoming;
            next.link = LinkState::Idle;
            if saved {
                next.last_saved_tree = Arc::clone(&next.tree);
                next.last_saved_positions = next.positions.clone();
                next.has_unsaved_changes = false;
            } else {
                next.has_unsaved_changes = true;
            }
        }

        Command::SetOrientation(orientation) => {
            next.orientation = orientation;
        }

        Command::SetZenMode(on) => {
            next.zen_mode = on;
        }

        Command::MarkSaved { tree, positions } => {
            next.has_unsaved_changes =
                !(Arc::ptr_eq(&tree, &state.tree) && positions == state.positions);
            next.last_saved_tree = tree;
            next.last_saved_positions = positions;
        }

        Command::Reset => {
            next.tree = Arc::clone(&state.last_saved_tree);
            next.positions = state.last_saved_positions.clone();
            next.link = LinkState::Idle;
            next.has_unsaved_changes = false;
        }
    }

    Ok(next)
}

/// Whole-tree invariants: root kind on top, unique ids, kind table on every edge.
fn check_structure(root: &Arc<ConfigNode>) -> std::result::Result<(), PolicyViolation> {
    if !root.kind.is_root() {
        return Err(PolicyViolation::IncompatibleKinds {
            child: root.kind,
            parent: NodeKind::Main,
        });
    }
    let mut seen = BTreeSet::new();
    check_node(root, &mut seen)
}

fn check_node(
    node: &ConfigNode,
    seen: &mut BTreeSet<NodeId>,
) -> std::result::Result<(), PolicyViolation> {
    if node.id.is_empty() {
        return Err(PolicyViolation::EmptyId);
    }
    if !seen.insert(node.id.clone()) {
        return Err(PolicyViolation::DuplicateId(node.id.clone()));
    }
    for child in &node.children {
        if child.kind.is_root() {
            return Err(PolicyViolation::SecondRoot(child.id.clone()));
        }
        if !can_attach(child.kind, node.kind) {
            return Err(PolicyViolation::IncompatibleKinds {
                child: child.kind,
                parent: node.kind,
            });
        }
        check_node(child, seen)?;
    }
    Ok(())
}
