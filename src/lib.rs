//! # rcgraph
//!
//! Node-graph engine for a modular shell startup configuration: a typed tree of
//! script fragments with strict parent/child rules, auto-layout for drawing it,
//! a point-to-link protocol for rewiring it, and a versioned JSON envelope for
//! saving and restoring it.
//!
//! ## Node kinds
//!
//! - `main` (or a shell flavor `zsh`/`bash`/`fish`) - the single root
//! - `injector` - sources other injectors and partials
//! - `partial` - a leaf fragment of script text
//!
//! ## Layers
//!
//! - [`tree`] - `ConfigNode` and pure copy-on-write operations
//! - [`link`] - composition rules and the link state machine
//! - [`layout`] - positions for whole-tree loads and the orientation transform
//! - [`store`] - `apply(state, command)` and the [`CanvasStore`] shell around it
//! - [`envelope`] / [`persist`] - export, validated import, save targets
//! - [`render`] / [`template`] - shell scripts out, starter trees in

pub mod config;
pub mod envelope;
pub mod error;
pub mod id;
pub mod layout;
pub mod link;
pub mod persist;
pub mod render;
pub mod store;
pub mod template;
pub mod tree;

pub use config::EngineConfig;
pub use envelope::{Envelope, Imported, Metadata, export_to_envelope, import_from_envelope};
pub use error::{EngineError, PersistenceError, PolicyViolation, Result};
pub use id::{IdSource, NodeId, SequentialIds, UuidIds};
pub use layout::{LayoutConfig, Orientation, Position, Positions};
pub use link::{LinkDirection, LinkState, can_attach};
pub use render::ShellType;
pub use store::{CanvasState, CanvasStore, Command, Signal, apply};
pub use template::Template;
pub use tree::{ConfigNode, NodeKind, NodePatch};
