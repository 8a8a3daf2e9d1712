use serde::{Deserialize, Serialize};

/// Per-trial states of the sequencer.
///
/// `Idle` is the state before the first trial is started; `Done` is terminal.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialPhase {
    #[default]
    Idle,
    Fixation,
    Stimulus,
    Rating,
    AttentionQuestion,
    Rest,
    AttentionBreak,
    Done,
}

impl TrialPhase {
    /// Pauses after a response; their exit runs the advance-then-check step.
    pub fn is_pause(&self) -> bool {
        matches!(self, Self::Rest | Self::AttentionBreak)
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
