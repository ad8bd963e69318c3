//! Composition rules and the point-to-link state machine.
//!
//! Which kinds may sit under which:
//!
//! | parent    | accepted children       |
//! |-----------|-------------------------|
//! | root kind | `injector`              |
//! | injector  | `injector`, `partial`   |
//! | partial   | nothing                 |
//!
//! Rules are small [`AttachRule`] values composed by a [`CompositionPolicy`],
//! first failure wins. The link flow itself is a two-state machine,
//! [`LinkState`], driven by [`LinkEvent`]s; it never touches the tree.

use crate::error::PolicyViolation;
use crate::id::NodeId;
use crate::tree::{self, ConfigNode, NodeKind, Role};
use std::sync::Arc;

/// Whether a node of kind `child` may be attached directly under `parent`.
pub fn can_attach(child: NodeKind, parent: NodeKind) -> bool {
    matches!(
        (child.role(), parent.role()),
        (Role::Injector, Role::Root) | (Role::Injector | Role::Partial, Role::Injector)
    )
}

/// One composition rule, checked before any edit that creates a parent/child edge.
pub trait AttachRule {
    fn check(&self, child: &Arc<ConfigNode>, parent: &Arc<ConfigNode>)
    -> Result<(), PolicyViolation>;
}

/// Enforces the kind table.
#[derive(Debug, Clone, Copy, Default)]
pub struct KindRule;

impl AttachRule for KindRule {
    fn check(
        &self,
        child: &Arc<ConfigNode>,
        parent: &Arc<ConfigNode>,
    ) -> Result<(), PolicyViolation> {
        if child.kind.is_root() {
            return Err(PolicyViolation::RootNotMovable(child.id.clone()));
        }
        if !can_attach(child.kind, parent.kind) {
            return Err(PolicyViolation::IncompatibleKinds {
                child: child.kind,
                parent: parent.kind,
            });
        }
        Ok(())
    }
}

/// Rejects attaching a node under itself or under one of its descendants.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcyclicRule;

impl AttachRule for AcyclicRule {
    fn check(
        &self,
        child: &Arc<ConfigNode>,
        parent: &Arc<ConfigNode>,
    ) -> Result<(), PolicyViolation> {
        if tree::find(child, &parent.id).is_some() {
            return Err(PolicyViolation::Cycle {
                node: child.id.clone(),
                parent: parent.id.clone(),
            });
        }
        Ok(())
    }
}

/// Ordered set of rules; all must pass.
pub struct CompositionPolicy {
    rules: Vec<Box<dyn AttachRule>>,
}

impl Default for CompositionPolicy {
    fn default() -> Self {
        Self::new().with(AcyclicRule).with(KindRule)
    }
}

impl CompositionPolicy {
    /// A policy with no rules. Accepts everything.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with<R: AttachRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn check(
        &self,
        child: &Arc<ConfigNode>,
        parent: &Arc<ConfigNode>,
    ) -> Result<(), PolicyViolation> {
        self.rules.iter().try_for_each(|r| r.check(child, parent))
    }

    /// Resolve both ids in `root` and check the edge `child -> parent`.
    pub fn check_ids(
        &self,
        root: &Arc<ConfigNode>,
        child: &NodeId,
        parent: &NodeId,
    ) -> Result<(), PolicyViolation> {
        let child = tree::find(root, child)
            .ok_or_else(|| PolicyViolation::UnknownNode(child.clone()))?;
        let parent = tree::find(root, parent)
            .ok_or_else(|| PolicyViolation::UnknownNode(parent.clone()))?;
        self.check(child, parent)
    }
}

/// Which end of the relationship the link source takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDirection {
    /// The source becomes the parent of the clicked target.
    AsParent,
    /// The source becomes a child of the clicked target.
    AsChild,
}

/// Parent/child edge proposed by resolving a link request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub child: NodeId,
    pub parent: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Idle,
    AwaitingTarget {
        source: NodeId,
        direction: LinkDirection,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Begin linking from `source`. Replaces any pending request.
    Start {
        source: NodeId,
        direction: LinkDirection,
    },
    /// Escape key or a click on empty canvas.
    Cancel,
    /// The target was accepted and the tree was rewired.
    Accepted,
    /// The target was refused; the request stays open.
    Refused,
}

impl LinkState {
    /// Transition table.
    pub fn next(&self, event: LinkEvent) -> LinkState {
        match (self, event) {
            (_, LinkEvent::Start { source, direction }) => {
                LinkState::AwaitingTarget { source, direction }
            }
            (_, LinkEvent::Cancel) => LinkState::Idle,
            (LinkState::AwaitingTarget { .. }, LinkEvent::Accepted) => LinkState::Idle,
            (state, LinkEvent::Refused) => state.clone(),
            (LinkState::Idle, LinkEvent::Accepted) => LinkState::Idle,
        }
    }

    pub fn start(&self, source: NodeId, direction: LinkDirection) -> LinkState {
        self.next(LinkEvent::Start { source, direction })
    }

    pub fn cancel(&self) -> LinkState {
        self.next(LinkEvent::Cancel)
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, LinkState::AwaitingTarget { .. })
    }

    pub fn source(&self) -> Option<&NodeId> {
        match self {
            LinkState::AwaitingTarget { source, .. } => Some(source),
            LinkState::Idle => None,
        }
    }

    /// The edge a click on `target` would create, if a request is pending.
    pub fn proposal(&self, target: &NodeId) -> Option<Proposal> {
        match self {
            LinkState::Idle => None,
            LinkState::AwaitingTarget { source, direction } => Some(match direction {
                LinkDirection::AsParent => Proposal {
                    child: target.clone(),
                    parent: source.clone(),
                },
                LinkDirection::AsChild => Proposal {
                    child: source.clone(),
                    parent: target.clone(),
                },
            }),
        }
    }
}
