//! Persistence targets: a local envelope file or a remote snippet store.
//!
//! The remote HTTP client lives outside this crate; it plugs in by
//! implementing [`SnippetStore`]. Errors are surfaced as they come and never
//! retried here.

use crate::envelope::Envelope;
use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Identifier assigned by a snippet store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Access token for a snippet store. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetSummary {
    pub store_id: StoreId,
    pub description: String,
    /// Epoch milliseconds.
    pub updated_at: u64,
}

/// Remote snippet store contract.
pub trait SnippetStore {
    fn save(
        &mut self,
        envelope: &Envelope,
        credential: &Credential,
    ) -> Result<StoreId, PersistenceError>;

    /// Returns the raw envelope; the caller validates it.
    fn load(&self, id: &StoreId, credential: &Credential) -> Result<Value, PersistenceError>;

    fn list(&self, credential: &Credential) -> Result<Vec<SnippetSummary>, PersistenceError>;

    fn delete(&mut self, id: &StoreId, credential: &Credential) -> Result<(), PersistenceError>;
}

/// Where a save went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveReceipt {
    File(PathBuf),
    Remote(StoreId),
}

/// Destination for `CanvasStore::save_config`.
pub trait PersistenceTarget {
    fn persist(&mut self, envelope: &Envelope) -> Result<SaveReceipt, PersistenceError>;
}

/// Writes the envelope as pretty JSON to a file.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceTarget for LocalFile {
    fn persist(&mut self, envelope: &Envelope) -> Result<SaveReceipt, PersistenceError> {
        let text = serde_json::to_string_pretty(envelope)?;
        fs::write(&self.path, text)?;
        info!(path = %self.path.display(), "envelope written");
        Ok(SaveReceipt::File(self.path.clone()))
    }
}

/// Saves into a [`SnippetStore`] with a credential.
pub struct RemoteTarget<'a, S: SnippetStore + ?Sized> {
    store: &'a mut S,
    credential: Credential,
}

impl<'a, S: SnippetStore + ?Sized> RemoteTarget<'a, S> {
    pub fn new(store: &'a mut S, credential: Credential) -> Self {
        Self { store, credential }
    }
}

impl<S: SnippetStore + ?Sized> PersistenceTarget for RemoteTarget<'_, S> {
    fn persist(&mut self, envelope: &Envelope) -> Result<SaveReceipt, PersistenceError> {
        let id = self.store.save(envelope, &self.credential)?;
        info!(store_id = %id, "envelope saved to snippet store");
        Ok(SaveReceipt::Remote(id))
    }
}

/// In-process snippet store keyed by a single access token.
#[derive(Debug)]
pub struct MemorySnippetStore {
    token: Credential,
    next: u64,
    entries: BTreeMap<StoreId, (Value, SnippetSummary)>,
}

impl MemorySnippetStore {
    pub fn new(token: Credential) -> Self {
        Self {
            token,
            next: 0,
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn authorize(&self, credential: &Credential) -> Result<(), PersistenceError> {
        if credential.expose() != self.token.expose() {
            return Err(PersistenceError::Auth("invalid token".to_string()));
        }
        Ok(())
    }
}

impl SnippetStore for MemorySnippetStore {
    fn save(
        &mut self,
        envelope: &Envelope,
        credential: &Credential,
    ) -> Result<StoreId, PersistenceError> {
        self.authorize(credential)?;
        self.next += 1;
        let id = StoreId(format!("snippet-{}", self.next));
        let description = envelope
            .metadata
            .as_ref()
            .and_then(|m| m.description.clone().or_else(|| m.name.clone()))
            .unwrap_or_default();
        let summary = SnippetSummary {
            store_id: id.clone(),
            description,
            updated_at: envelope.timestamp,
        };
        self.entries
            .insert(id.clone(), (serde_json::to_value(envelope)?, summary));
        Ok(id)
    }

    fn load(&self, id: &StoreId, credential: &Credential) -> Result<Value, PersistenceError> {
        self.authorize(credential)?;
        self.entries
            .get(id)
            .map(|(v, _)| v.clone())
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))
    }

    fn list(&self, credential: &Credential) -> Result<Vec<SnippetSummary>, PersistenceError> {
        self.authorize(credential)?;
        Ok(self.entries.values().map(|(_, s)| s.clone()).collect())
    }

    fn delete(&mut self, id: &StoreId, credential: &Credential) -> Result<(), PersistenceError> {
        self.authorize(credential)?;
        self.entries
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| PersistenceError::NotFound(id.clone()))
    }
}
