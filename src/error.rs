//! Error taxonomy for the engine.
//!
//! Three recoverable classes: a rejected tree edit, a malformed envelope, and a
//! failed remote/local persistence call. None of them leave the tree partially
//! mutated.

use crate::id::NodeId;
use crate::persist::StoreId;
use crate::tree::NodeKind;
use thiserror::Error;

/// A proposed tree edit that would break a composition invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("node `{0}` not found")]
    UnknownNode(NodeId),
    #[error("cannot attach `{node}` under `{parent}`: would create a cycle")]
    Cycle { node: NodeId, parent: NodeId },
    #[error("a {child} node cannot be a child of a {parent} node")]
    IncompatibleKinds { child: NodeKind, parent: NodeKind },
    #[error("node id `{0}` is already in use")]
    DuplicateId(NodeId),
    #[error("tree already has a root; `{0}` cannot be added as another one")]
    SecondRoot(NodeId),
    #[error("root node `{0}` cannot be moved")]
    RootNotMovable(NodeId),
    #[error("node id cannot be empty")]
    EmptyId,
}

/// Failure talking to a persistence target. Messages are surfaced verbatim.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("network error: {0}")]
    Network(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("snippet `{0}` not found")]
    NotFound(StoreId),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Unified error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("policy violation: {0}")]
    Policy(#[from] PolicyViolation),
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),
    #[error("persistence failure: {0}")]
    Persistence(#[from] PersistenceError),
}

impl EngineError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedEnvelope(msg.into())
    }

    /// The policy violation behind this error, if it is one.
    pub fn as_policy(&self) -> Option<&PolicyViolation> {
        match self {
            Self::Policy(v) => Some(v),
            _ => None,
        }
    }
}

/// Result type alias using [`EngineError`].
pub type Result<T> = std::result::Result<T, EngineError>;
