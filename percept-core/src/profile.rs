use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Experimental arm a participant is assigned to.
///
/// Serialized as its integer code (`0` = AI, `1` = human, `2` = mixed) so persisted
/// profiles and uploaded records stay compatible with the backend.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum ConditionId {
    Ai,
    Human,
    Mixed,
}

impl ConditionId {
    pub const ALL: [ConditionId; 3] = [ConditionId::Ai, ConditionId::Human, ConditionId::Mixed];

    /// Condition used when a code outside the fixed set shows up.
    pub const FALLBACK: ConditionId = ConditionId::Mixed;

    pub fn code(self) -> i64 {
        match self {
            ConditionId::Ai => 0,
            ConditionId::Human => 1,
            ConditionId::Mixed => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(ConditionId::Ai),
            1 => Some(ConditionId::Human),
            2 => Some(ConditionId::Mixed),
            _ => None,
        }
    }

    /// Maps a raw code onto the fixed set, logging and falling back to
    /// [`ConditionId::FALLBACK`] for anything unknown.
    pub fn resolve(code: i64) -> Self {
        Self::from_code(code).unwrap_or_else(|| {
            warn!(
                code,
                fallback = %Self::FALLBACK,
                "unknown condition id, using fallback condition"
            );
            Self::FALLBACK
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            ConditionId::Ai => "AI",
            ConditionId::Human => "Human",
            ConditionId::Mixed => "Mixed",
        }
    }
}

impl From<ConditionId> for i64 {
    fn from(c: ConditionId) -> Self {
        c.code()
    }
}

impl From<i64> for ConditionId {
    fn from(code: i64) -> Self {
        ConditionId::resolve(code)
    }
}

impl fmt::Display for ConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Created once per participant and immutable for the rest of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantProfile {
    pub participant_id: String,
    pub art_background: bool,
    pub condition_id: ConditionId,
    pub condition_label: String,
}

impl ParticipantProfile {
    pub fn new(participant_id: impl Into<String>, art_background: bool, condition_id: ConditionId) -> Self {
        Self {
            participant_id: participant_id.into(),
            art_background,
            condition_id,
            condition_label: condition_id.label().to_string(),
        }
    }
}
