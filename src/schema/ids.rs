//! Stable schema object identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identity of a schema object, stable across serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaObjectId(Uuid);

impl SchemaObjectId {
    /// Create a fresh random ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil ID
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SchemaObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SchemaObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
