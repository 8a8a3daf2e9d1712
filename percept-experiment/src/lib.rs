pub mod assignment;
pub mod attention;
pub mod config;
pub mod error;
pub mod finalize;
pub mod randomizer;
pub mod record;
pub mod sequence;
pub mod state;

pub use assignment::{ProfileHints, assign_condition};
pub use attention::{attention_pool, insert_checks};
pub use config::{ExperimentConfig, MixedStrategy, PlacementPolicy};
pub use error::{ConfigError, Rejection};
pub use finalize::{Finalizer, Navigator, UploadError, Uploader};
pub use record::{ProgressCheckpoint, RecordStore, SessionRecord, SessionState};
pub use sequence::{TrialSequence, build_sequence};
pub use state::{Completion, DisplaySignal, ExperimentEvent, TrialStateMachine};
