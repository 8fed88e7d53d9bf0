// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutations awaiting remote persistence and the entity allow-list

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of write a mutation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl OperationType {
    pub const ALL: [OperationType; 3] = [
        OperationType::Create,
        OperationType::Update,
        OperationType::Delete,
    ];
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationType::Create => "CREATE",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Record kind a mutation targets (`mood_entry`, `voice_checkin`, ...)
///
/// Kept as a string rather than an enum: persisted mutations may name an
/// entity type that a later build no longer accepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(pub String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Entity types the engine accepts out of the box
pub const DEFAULT_ENTITY_TYPES: &[&str] = &[
    "mood_entry",
    "cbt_thought_record",
    "voice_checkin",
    "achievement",
];

/// The set of `(entity, operation)` pairs the engine will process
///
/// One instance is shared by the mutation queue and the dead letter queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllowList {
    entries: BTreeMap<EntityType, BTreeSet<OperationType>>,
}

impl AllowList {
    /// An allow-list that accepts nothing
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Allow the given operations on an entity type
    pub fn with_entity(mut self, entity: impl Into<EntityType>, ops: &[OperationType]) -> Self {
        self.entries
            .entry(entity.into())
            .or_default()
            .extend(ops.iter().copied());
        self
    }

    /// Whether the entity type is accepted for any operation
    pub fn allows_entity(&self, entity: &EntityType) -> bool {
        self.entries.get(entity).is_some_and(|ops| !ops.is_empty())
    }

    /// Whether the specific operation on the entity type is accepted
    pub fn allows(&self, op: OperationType, entity: &EntityType) -> bool {
        self.entries.get(entity).is_some_and(|ops| ops.contains(&op))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.entries.keys()
    }
}

impl Default for AllowList {
    fn default() -> Self {
        DEFAULT_ENTITY_TYPES
            .iter()
            .fold(Self::empty(), |list, entity| {
                list.with_entity(EntityType::new(*entity), &OperationType::ALL)
            })
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A pending write waiting to be applied remotely
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMutation {
    pub id: String,
    pub operation_type: OperationType,
    pub entity_type: EntityType,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
    pub device_id: String,
    /// Message of the most recent failed attempt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedMutation {
    pub fn new(
        id: impl Into<String>,
        operation_type: OperationType,
        entity_type: EntityType,
        payload: serde_json::Value,
        device_id: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            operation_type,
            entity_type,
            payload,
            created_at,
            retry_count: 0,
            device_id: device_id.into(),
            last_error: None,
        }
    }
}

#[cfg(test)]
#[path = "mutation_tests.rs"]
mod tests;
