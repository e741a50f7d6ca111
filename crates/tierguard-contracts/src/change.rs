//! Change-feed events for the replicated collections.
//!
//! Three collections are mirrored to observing consoles: level states,
//! transition requests, and violations. Each record has a primary key and an
//! `updated_at` stamp used for last-write-wins merging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    state::AgentLevelState, transition::LevelTransitionRequest, violation::GuardrailViolation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    LevelStates,
    TransitionRequests,
    Violations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "collection", content = "record", rename_all = "snake_case")]
pub enum ChangeRecord {
    LevelState(AgentLevelState),
    Transition(LevelTransitionRequest),
    Violation(GuardrailViolation),
}

impl ChangeRecord {
    pub fn collection(&self) -> Collection {
        match self {
            ChangeRecord::LevelState(_) => Collection::LevelStates,
            ChangeRecord::Transition(_) => Collection::TransitionRequests,
            ChangeRecord::Violation(_) => Collection::Violations,
        }
    }

    /// Primary key within the record's collection.
    pub fn key(&self) -> String {
        match self {
            ChangeRecord::LevelState(s) => s.agent_id.0.clone(),
            ChangeRecord::Transition(t) => t.id.to_string(),
            ChangeRecord::Violation(v) => v.id.to_string(),
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            ChangeRecord::LevelState(s) => s.updated_at,
            ChangeRecord::Transition(t) => t.updated_at,
            ChangeRecord::Violation(v) => v.created_at,
        }
    }
}

/// One insert/update/delete delivered by the change feed.
///
/// Delete events carry the last version of the record with a fresh
/// `updated_at`, so they merge under the same rule as updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub record: ChangeRecord,
}

impl ChangeEvent {
    pub fn insert(record: ChangeRecord) -> Self {
        Self { kind: ChangeKind::Insert, record }
    }

    pub fn update(record: ChangeRecord) -> Self {
        Self { kind: ChangeKind::Update, record }
    }

    pub fn delete(record: ChangeRecord) -> Self {
        Self { kind: ChangeKind::Delete, record }
    }
}
