//! Content-addressed resource storage.
//!
//! Observation payloads are stored once per distinct byte content and
//! referenced everywhere by [`ResourceId`]. The core only consumes the
//! [`ResourceStore`] trait; [`InMemoryStore`] is the reference
//! implementation used by the capture codec and tests.

#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// 20-byte content hash identifying a resource.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub [u8; 20]);

impl ResourceId {
    pub const SIZE: usize = 20;

    /// The all-zero sentinel; reserved, never produced by [`ResourceId::of`].
    pub const ZERO: ResourceId = ResourceId([0; 20]);

    /// Content hash of `bytes` (truncated SHA-256).
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut id = [0u8; 20];
        id.copy_from_slice(&digest[..20]);
        ResourceId(id)
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId(")?;
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("resource {0} unavailable")]
    Unavailable(ResourceId),

    #[error("resource store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque content-addressed blob store.
///
/// `put` is idempotent: identical bytes yield identical ids and do not
/// duplicate storage. Implementations must be safe for concurrent
/// `put`/`get`.
pub trait ResourceStore: Send + Sync {
    fn put(&self, bytes: &[u8]) -> Result<ResourceId, StoreError>;
    fn get(&self, id: ResourceId) -> Result<Vec<u8>, StoreError>;
}

/// Reference store keeping every blob in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    blobs: Mutex<HashMap<ResourceId, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResourceStore for InMemoryStore {
    fn put(&self, bytes: &[u8]) -> Result<ResourceId, StoreError> {
        let id = ResourceId::of(bytes);
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert_with(|| bytes.to_vec());
        Ok(id)
    }

    fn get(&self, id: ResourceId) -> Result<Vec<u8>, StoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(StoreError::Unavailable(id))
    }
}
