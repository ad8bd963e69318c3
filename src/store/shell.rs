//! Subscription shell around the reducer.
//!
//! [`CanvasStore`] owns the one live [`CanvasState`], generates ids, and tells
//! listeners what happened. Every entry point runs to completion before the
//! next; a rejected command leaves the state exactly as it was.

use super::{CanvasState, Command, NewNode, apply};
use crate::envelope::{self, Envelope, Metadata};
use crate::error::{EngineError, PersistenceError, PolicyViolation, Result};
use crate::id::{IdSource, NodeId, UuidIds};
use crate::layout::{LayoutConfig, Orientation, Position, Positions};
use crate::link::LinkDirection;
use crate::persist::{
    Credential, PersistenceTarget, SaveReceipt, SnippetStore, SnippetSummary, StoreId,
};
use crate::render::ShellType;
use crate::template::Template;
use crate::tree::{self, ConfigNode, NodeKind, NodePatch};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// What listeners are told after each entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Changed,
    /// An edit was refused; nothing changed.
    Rejected(PolicyViolation),
    /// A link target was refused; the link request is still pending.
    LinkRejected(PolicyViolation),
    Saved(SaveReceipt),
    /// Verbatim message from the persistence target.
    PersistenceFailed(String),
}

pub type Listener = Box<dyn FnMut(&Signal, &CanvasState)>;

/// Editor for a node's script text. `None` means the edit was abandoned.
pub trait ContentEditor {
    fn edit(&mut self, title: &str, content: &str) -> Option<String>;
}

/// What a save captures; the store compares it against the live tree when the
/// save completes.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveSnapshot {
    pub tree: Arc<ConfigNode>,
    pub positions: Positions,
    pub orientation: Orientation,
}

/// A save that has been handed out but not yet confirmed.
#[derive(Debug, Clone)]
pub struct PendingSave {
    snapshot: SaveSnapshot,
    envelope: Envelope,
}

impl PendingSave {
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn snapshot(&self) -> &SaveSnapshot {
        &self.snapshot
    }
}

pub struct CanvasStore {
    state: CanvasState,
    ids: Box<dyn IdSource>,
    listeners: Vec<Listener>,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl CanvasStore {
    /// A store holding only a `main` root, with random ids.
    pub fn new(layout: LayoutConfig) -> Self {
        Self::with_ids(layout, Box::new(UuidIds))
    }

    pub fn with_ids(layout: LayoutConfig, ids: Box<dyn IdSource>) -> Self {
        Self {
            state: CanvasState::new(ConfigNode::main_root(), layout),
            ids,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &CanvasState {
        &self.state
    }

    pub fn tree(&self) -> &Arc<ConfigNode> {
        &self.state.tree
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&Signal, &CanvasState) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self, signal: Signal) {
        for listener in &mut self.listeners {
            listener(&signal, &self.state);
        }
    }

    /// Run one command through the reducer and notify listeners.
    pub fn dispatch(&mut self, command: Command) -> Result<()> {
        let is_link = matches!(command, Command::ResolveLink { .. });
        let name = command.name();
        match apply(&self.state, command) {
            Ok(next) => {
                if next != self.state {
                    self.state = next;
                    self.notify(Signal::Changed);
                }
                Ok(())
            }
            Err(e) => {
                warn!(command = name, error = %e, "command rejected");
                if let Some(v) = e.as_policy() {
                    let signal = if is_link {
                        Signal::LinkRejected(v.clone())
                    } else {
                        Signal::Rejected(v.clone())
                    };
                    self.notify(signal);
                }
                Err(e)
            }
        }
    }

    /// Add a node under `parent` (the root if `None`) and return its new id.
    pub fn add_node(
        &mut self,
        kind: NodeKind,
        title: impl Into<String>,
        parent: Option<&NodeId>,
        at: Option<Position>,
    ) -> Result<NodeId> {
        let id = self.ids.next_id(kind);
        self.dispatch(Command::AddNode {
            node: NewNode {
                id: id.clone(),
                kind,
                title: title.into(),
                content: String::new(),
            },
            parent: parent.cloned(),
            at,
        })?;
        Ok(id)
    }

    pub fn update_node(&mut self, id: &NodeId, patch: NodePatch) -> Result<()> {
        self.dispatch(Command::UpdateNode {
            id: id.clone(),
            patch,
        })
    }

    pub fn remove_node(&mut self, id: &NodeId) -> Result<()> {
        self.dispatch(Command::RemoveNode { id: id.clone() })
    }

    pub fn move_node(&mut self, id: &NodeId, position: Position) -> Result<()> {
        self.dispatch(Command::MoveNode {
            id: id.clone(),
            position,
        })
    }

    pub fn rename_id(&mut self, from: &NodeId, to: impl Into<NodeId>) -> Result<()> {
        self.dispatch(Command::RenameId {
            from: from.clone(),
            to: to.into(),
        })
    }

    pub fn start_link(&mut self, source: &NodeId, direction: LinkDirection) -> Result<()> {
        self.dispatch(Command::StartLink {
            source: source.clone(),
            direction,
        })
    }

    /// A click on `target` while a link request may be pending.
    pub fn click_target(&mut self, target: &NodeId) -> Result<()> {
        self.dispatch(Command::ResolveLink {
            target: target.clone(),
        })
    }

    pub fn cancel_link(&mut self) -> Result<()> {
        self.dispatch(Command::CancelLink)
    }

    pub fn set_tree(&mut self, tree: Arc<ConfigNode>, positions: Positions, saved: bool) -> Result<()> {
        self.dispatch(Command::SetTree {
            tree,
            positions,
            saved,
        })
    }

    pub fn set_orientation(&mut self, orientation: Orientation) -> Result<()> {
        self.dispatch(Command::SetOrientation(orientation))
    }

    pub fn toggle_zen(&mut self) -> Result<()> {
        self.dispatch(Command::SetZenMode(!self.state.zen_mode))
    }

    pub fn reset(&mut self) -> Result<()> {
        self.dispatch(Command::Reset)
    }

    /// Validate `value` and install it as the saved tree.
    pub fn import_envelope(&mut self, value: &Value) -> Result<()> {
        let imported = envelope::import_from_envelope(value)?;
        self.set_tree(imported.tree, imported.positions, true)?;
        self.set_orientation(imported.orientation)
    }

    /// Replace the canvas with a fresh template. The result is unsaved.
    pub fn apply_template(&mut self, template: Template, shell: ShellType) -> Result<()> {
        let root = template.build(self.ids.as_mut(), shell);
        info!(template = %template, shell = %shell, "applying template");
        self.set_tree(Arc::new(root), Positions::new(), false)
    }

    /// Open `id` in `editor` and store the returned text.
    /// Returns whether the content changed.
    pub fn edit_content(&mut self, id: &NodeId, editor: &mut dyn ContentEditor) -> Result<bool> {
        let node = self
            .state
            .node(id)
            .ok_or_else(|| PolicyViolation::UnknownNode(id.clone()))?;
        let Some(content) = editor.edit(&node.title, &node.content) else {
            return Ok(false);
        };
        if content == node.content {
            return Ok(false);
        }
        self.update_node(id, NodePatch::content(content))?;
        Ok(true)
    }

    /// Snapshot the current tree for an asynchronous save.
    pub fn prepare_save(&self, metadata: Option<Metadata>) -> PendingSave {
        let snapshot = SaveSnapshot {
            tree: Arc::clone(&self.state.tree),
            positions: self.state.positions.clone(),
            orientation: self.state.orientation,
        };
        let mut envelope = envelope::export_to_envelope(&snapshot.tree, &snapshot.positions)
            .with_orientation(snapshot.orientation);
        if let Some(metadata) = metadata {
            envelope = envelope.with_metadata(metadata);
        }
        PendingSave { snapshot, envelope }
    }

    /// Record the outcome of a save started with [`prepare_save`](Self::prepare_save).
    ///
    /// Edits made while the save was in flight stay dirty. A failed save
    /// changes nothing.
    pub fn finish_save(
        &mut self,
        pending: PendingSave,
        outcome: std::result::Result<SaveReceipt, PersistenceError>,
    ) -> Result<SaveReceipt> {
        match outcome {
            Ok(receipt) => {
                self.state = apply(
                    &self.state,
                    Command::MarkSaved {
                        tree: pending.snapshot.tree,
                        positions: pending.snapshot.positions,
                    },
                )?;
                self.notify(Signal::Saved(receipt.clone()));
                Ok(receipt)
            }
            Err(e) => {
                warn!(error = %e, "save failed");
                self.notify(Signal::PersistenceFailed(e.to_string()));
                Err(e.into())
            }
        }
    }

    /// Save synchronously to `target`.
    pub fn save_config(
        &mut self,
        target: &mut dyn PersistenceTarget,
        metadata: Option<Metadata>,
    ) -> Result<SaveReceipt> {
        let pending = self.prepare_save(metadata);
        let outcome = target.persist(pending.envelope());
        self.finish_save(pending, outcome)
    }

    /// Fetch an envelope from a snippet store and install it as saved.
    pub fn load_remote(
        &mut self,
        store: &dyn SnippetStore,
        id: &StoreId,
        credential: &Credential,
    ) -> Result<()> {
        let value = self.remote(|| store.load(id, credential))?;
        info!(store_id = %id, "loaded envelope from snippet store");
        self.import_envelope(&value)
    }

    pub fn list_remote(
        &mut self,
        store: &dyn SnippetStore,
        credential: &Credential,
    ) -> Result<Vec<SnippetSummary>> {
        self.remote(|| store.list(credential))
    }

    pub fn delete_remote(
        &mut self,
        store: &mut dyn SnippetStore,
        id: &StoreId,
        credential: &Credential,
    ) -> Result<()> {
        self.remote(|| store.delete(id, credential))?;
        info!(store_id = %id, "deleted snippet");
        Ok(())
    }

    fn remote<T>(
        &mut self,
        call: impl FnOnce() -> std::result::Result<T, PersistenceError>,
    ) -> Result<T> {
        call().map_err(|e| {
            warn!(error = %e, "snippet store call failed");
            self.notify(Signal::PersistenceFailed(e.to_string()));
            EngineError::from(e)
        })
    }

    /// Number of nodes in the live tree.
    pub fn node_count(&self) -> usize {
        tree::node_count(&self.state.tree)
    }
}
