//! Export/import codec for the versioned JSON envelope.
//!
//! Export writes the tree and the position map as they are. Import goes
//! through [`RawEnvelope::validate_and_build`] and fails fast; the caller
//! installs the result with a whole-tree load.

pub mod raw;
pub mod validate;

pub use raw::{Metadata, RawEnvelope, RawNode};
pub use validate::{Imported, SUPPORTED_MAJOR};

use crate::error::{EngineError, PersistenceError, Result};
use crate::layout::{Orientation, Positions};
use crate::tree::ConfigNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Version string written by this build.
pub const ENVELOPE_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    pub version: String,
    pub timestamp: u64,
    pub nodes: Vec<Arc<ConfigNode>>,
    pub positions: Positions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
}

impl Envelope {
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = (orientation != Orientation::Normal).then_some(orientation);
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(encode_error)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(encode_error)
    }
}

/// Export failures are persistence errors, not malformed input.
fn encode_error(e: serde_json::Error) -> EngineError {
    EngineError::Persistence(PersistenceError::Encode(e))
}

/// Wrap a tree and its positions in a current-version envelope.
pub fn export_to_envelope(tree: &Arc<ConfigNode>, positions: &Positions) -> Envelope {
    Envelope {
        version: ENVELOPE_VERSION.to_string(),
        timestamp: now_ms(),
        nodes: vec![Arc::clone(tree)],
        positions: positions.clone(),
        metadata: None,
        orientation: None,
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub error: Option<String>,
}

/// Check an envelope without installing anything.
pub fn validate(value: &Value) -> Validation {
    match import_from_envelope(value) {
        Ok(_) => Validation {
            valid: true,
            error: None,
        },
        Err(e) => Validation {
            valid: false,
            error: Some(e.to_string()),
        },
    }
}

/// Validate and decode an envelope. Never returns a partially built tree.
pub fn import_from_envelope(value: &Value) -> Result<Imported> {
    if !value.is_object() {
        return Err(EngineError::malformed("envelope must be a JSON object"));
    }
    let raw: RawEnvelope = serde_json::from_value(value.clone())
        .map_err(|e| EngineError::malformed(e.to_string()))?;
    let imported = raw.validate_and_build()?;
    debug!(
        root = %imported.tree.id,
        positions = imported.positions.len(),
        "envelope imported"
    );
    Ok(imported)
}

/// Parse envelope text into a JSON value.
///
/// Nesting follows tree depth, so serde_json's default recursion limit of
/// 128 would refuse chains this crate can export.
pub fn parse_value(text: &str) -> Result<Value> {
    let invalid = |e: serde_json::Error| EngineError::malformed(format!("invalid JSON: {}", e));
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(&mut de).map_err(invalid)?;
    de.end().map_err(invalid)?;
    Ok(value)
}

/// Parse envelope text and import it.
pub fn parse_envelope(text: &str) -> Result<Imported> {
    import_from_envelope(&parse_value(text)?)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
