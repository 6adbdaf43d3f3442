//! Short-term conversational memory: the last resolved intent per session.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

use crate::classifier::IntentLabel;
use crate::IntentError;

/// Boost applies only above this confidence.
pub const STICKINESS_FLOOR: f32 = 0.4;
pub const STICKINESS_BOOST: f32 = 0.15;
pub const STICKINESS_CAP: f32 = 0.95;

// ============================================================================
// Session ID - Newtype to prevent mixing with other IDs
// ============================================================================

/// Conversation identifier (UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = IntentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| IntentError::InvalidSession(format!("{}: {}", s, e)))
    }
}

/// Confidence after the repeat-intent boost.
pub fn apply_stickiness(last: Option<IntentLabel>, label: IntentLabel, confidence: f32) -> f32 {
    if last == Some(label) && confidence > STICKINESS_FLOOR {
        (confidence + STICKINESS_BOOST).min(STICKINESS_CAP)
    } else {
        confidence
    }
}

/// Last intent per session. Callers without a session id share one slot.
#[derive(Debug, Default)]
pub struct SessionMemory {
    slots: Mutex<HashMap<Option<SessionId>, IntentLabel>>,
}

impl SessionMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_intent(&self, session: Option<SessionId>) -> Option<IntentLabel> {
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.get(&session).copied()
    }

    /// Boost `confidence` against the session's previous intent and record
    /// `label` as the new one, under a single lock acquisition.
    pub fn observe(&self, session: Option<SessionId>, label: IntentLabel, confidence: f32) -> f32 {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let previous = slots.insert(session, label);
        apply_stickiness(previous, label, confidence)
    }

    pub fn session_count(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
