pub mod phase;
pub mod profile;
pub mod stimulus;
pub mod trial;

pub use phase::TrialPhase;
pub use profile::{ConditionId, ParticipantProfile};
pub use stimulus::{StimulusItem, StimulusKind};
pub use trial::{
    AttentionRecord, DeviceClass, FormError, RatingField, RatingForm, RatingRecord, RatingScores,
};
