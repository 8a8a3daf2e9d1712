use percept_core::{FormError, RatingField, TrialPhase};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("images_per_condition must be at least 1")]
    NoTrials,
    #[error("at least one image category is required")]
    NoCategories,
    #[error("attention cadence {0} is too small; checks would sit next to each other")]
    CadenceTooSmall(usize),
    #[error("rating scale maximum must be at least 1")]
    EmptyScale,
    #[error("jitter offset {max_offset} is too wide for cadence {cadence}")]
    JitterTooWide { max_offset: usize, cadence: usize },
}

/// Input refused by the state machine. Nothing is recorded and no transition fires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("please answer every rating question ({} unanswered)", missing.len())]
    Incomplete { missing: Vec<RatingField> },
    #[error("{field} must be between 1 and {max}, got {value}")]
    OutOfRange { field: RatingField, value: u8, max: u8 },
    #[error("please select an option")]
    NoSelection,
    #[error("`{answer}` is not one of the options")]
    NotAnOption { answer: String },
    #[error("no response is expected during {phase:?}")]
    NotAccepting { phase: TrialPhase },
}

impl From<FormError> for Rejection {
    fn from(err: FormError) -> Self {
        match err {
            FormError::Missing(missing) => Rejection::Incomplete { missing },
            FormError::OutOfRange { field, value, max } => {
                Rejection::OutOfRange { field, value, max }
            }
        }
    }
}
