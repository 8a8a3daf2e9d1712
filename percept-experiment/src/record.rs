use chrono::{DateTime, Utc};
use percept_core::{AttentionRecord, ConditionId, ParticipantProfile, RatingRecord, StimulusItem};
use percept_store::{KeyValueStore, StoreError, load_json, save_json};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::assignment::ProfileHints;
use crate::sequence::TrialSequence;

/// Points at the participant this browser/device last ran.
pub const CURRENT_PARTICIPANT_KEY: &str = "percept:current";

pub fn participant_key(participant_id: &str) -> String {
    format!("percept:participant:{participant_id}")
}

/// Mutable per-session progress. Only the trial state machine writes to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub condition_id: ConditionId,
    pub cursor: usize,
    pub ratings: Vec<RatingRecord>,
    pub attention_results: Vec<AttentionRecord>,
    pub pending_attention_check: bool,
    /// The trial at `cursor` has its response recorded and waits for the
    /// advance at the end of its rest or break.
    #[serde(default)]
    pub response_recorded: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new(condition_id: ConditionId, started_at: DateTime<Utc>) -> Self {
        Self {
            condition_id,
            cursor: 0,
            ratings: Vec::new(),
            attention_results: Vec::new(),
            pending_attention_check: false,
            response_recorded: false,
            started_at,
            ended_at: None,
        }
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressCheckpoint {
    pub condition_id: ConditionId,
    pub cursor: usize,
    pub total: usize,
}

/// Everything stored for one participant under [`participant_key`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantRecord {
    pub participant_id: String,
    pub basic_info: Option<ProfileHints>,
    pub profile: Option<ParticipantProfile>,
    #[serde(default)]
    pub sequence: TrialSequence,
    pub session: Option<SessionState>,
    pub progress: Option<ProgressCheckpoint>,
}

fn take_field<T: DeserializeOwned>(fields: &mut Map<String, Value>, name: &str, participant: &str) -> Option<T> {
    let value = fields.remove(name).filter(|v| !v.is_null())?;
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(err) => {
            warn!(participant, field = name, error = %err, "discarding malformed stored field");
            None
        }
    }
}

impl ParticipantRecord {
    /// Loads the record field by field so one malformed part (say, a profile missing
    /// its condition) reads as absent without losing the rest.
    pub fn load<S: KeyValueStore + ?Sized>(store: &S, participant_id: &str) -> Result<Self, StoreError> {
        let mut record = Self {
            participant_id: participant_id.to_string(),
            ..Self::default()
        };
        let Some(Value::Object(mut fields)) = load_json::<Value, _>(store, &participant_key(participant_id))? else {
            return Ok(record);
        };
        record.basic_info = take_field(&mut fields, "basicInfo", participant_id);
        record.profile = take_field(&mut fields, "profile", participant_id);
        record.sequence = take_field(&mut fields, "sequence", participant_id).unwrap_or_default();
        record.session = take_field(&mut fields, "session", participant_id);
        record.progress = take_field(&mut fields, "progress", participant_id);
        Ok(record)
    }

    pub fn save<S: KeyValueStore + ?Sized>(&self, store: &mut S) -> Result<(), StoreError> {
        save_json(store, &participant_key(&self.participant_id), self)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordView<'a> {
    participant_id: &'a str,
    basic_info: &'a Option<ProfileHints>,
    profile: &'a ParticipantProfile,
    sequence: &'a [StimulusItem],
    session: &'a SessionState,
    progress: ProgressCheckpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentData {
    pub condition_id: ConditionId,
    pub ratings: Vec<RatingRecord>,
    pub attention_results: Vec<AttentionRecord>,
    pub experiment_start_time: DateTime<Utc>,
    pub experiment_end_time: Option<DateTime<Utc>>,
    pub current_progress: ProgressCheckpoint,
}

/// Upload body: the full session as the backend stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub participant_id: String,
    pub profile: ParticipantProfile,
    pub basic_info: Option<ProfileHints>,
    pub experiment_data: ExperimentData,
}

/// Append-only session records, written through to `S` after every mutation.
///
/// Mutators update memory first; an `Err` means only the write-through failed.
#[derive(Debug)]
pub struct RecordStore<S: KeyValueStore> {
    store: S,
    profile: ParticipantProfile,
    basic_info: Option<ProfileHints>,
    sequence: TrialSequence,
    session: SessionState,
    resumed: bool,
}

impl<S: KeyValueStore> RecordStore<S> {
    /// Resumes the participant's unfinished session when one is stored for the same
    /// condition; otherwise starts a new one over `fresh_sequence()`.
    pub fn open<F>(store: S, profile: ParticipantProfile, fresh_sequence: F) -> Result<Self, StoreError>
    where
        F: FnOnce() -> TrialSequence,
    {
        let mut record = ParticipantRecord::load(&store, &profile.participant_id)?;
        let resumable = record.session.take().filter(|s| {
            s.ended_at.is_none()
                && s.condition_id == profile.condition_id
                && !record.sequence.is_empty()
                && s.cursor <= record.sequence.len()
        });

        let (sequence, session, resumed) = match resumable {
            Some(session) => {
                info!(
                    participant = %profile.participant_id,
                    cursor = session.cursor,
                    total = record.sequence.len(),
                    "resuming unfinished session"
                );
                (record.sequence, session, true)
            }
            None => (
                fresh_sequence(),
                SessionState::new(profile.condition_id, Utc::now()),
                false,
            ),
        };

        let mut this = Self {
            store,
            profile,
            basic_info: record.basic_info,
            sequence,
            session,
            resumed,
        };
        this.session.pending_attention_check = this.current().is_some_and(StimulusItem::is_attention);
        this.persist()?;
        Ok(this)
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        let view = RecordView {
            participant_id: &self.profile.participant_id,
            basic_info: &self.basic_info,
            profile: &self.profile,
            sequence: &self.sequence,
            session: &self.session,
            progress: self.progress(),
        };
        save_json(&mut self.store, &participant_key(&self.profile.participant_id), &view)
    }

    pub fn profile(&self) -> &ParticipantProfile {
        &self.profile
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn sequence(&self) -> &[StimulusItem] {
        &self.sequence
    }

    pub fn resumed(&self) -> bool {
        self.resumed
    }

    pub fn cursor(&self) -> usize {
        self.session.cursor
    }

    pub fn current(&self) -> Option<&StimulusItem> {
        self.sequence.get(self.session.cursor)
    }

    pub fn progress(&self) -> ProgressCheckpoint {
        ProgressCheckpoint {
            condition_id: self.session.condition_id,
            cursor: self.session.cursor,
            total: self.sequence.len(),
        }
    }

    pub fn append_rating(&mut self, record: RatingRecord) -> Result<(), StoreError> {
        self.session.ratings.push(record);
        self.session.response_recorded = true;
        self.persist()
    }

    pub fn append_attention_result(&mut self, record: AttentionRecord) -> Result<(), StoreError> {
        self.session.attention_results.push(record);
        self.session.response_recorded = true;
        self.persist()
    }

    /// Moves the cursor past the trial whose response was recorded. Without a
    /// recorded response this is a no-op, so repeated calls never skip a trial.
    pub fn advance(&mut self) -> Result<bool, StoreError> {
        if !self.session.response_recorded {
            return Ok(false);
        }
        self.session.cursor += 1;
        self.session.response_recorded = false;
        self.session.pending_attention_check = self.current().is_some_and(StimulusItem::is_attention);
        self.persist()?;
        Ok(true)
    }

    /// Stamps the end time once.
    pub fn finish(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        if self.session.ended_at.is_none() {
            self.session.ended_at = Some(now);
        }
        self.session.pending_attention_check = false;
        self.persist()
    }

    /// Read-only copy for handoff.
    pub fn snapshot(&self) -> SessionState {
        self.session.clone()
    }

    pub fn session_record(&self) -> SessionRecord {
        SessionRecord {
            participant_id: self.profile.participant_id.clone(),
            profile: self.profile.clone(),
            basic_info: self.basic_info.clone(),
            experiment_data: ExperimentData {
                condition_id: self.session.condition_id,
                ratings: self.session.ratings.clone(),
                attention_results: self.session.attention_results.clone(),
                experiment_start_time: self.session.started_at,
                experiment_end_time: self.session.ended_at,
                current_progress: self.progress(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use percept_core::{DeviceClass, RatingScores, StimulusKind};
    use percept_store::MemoryStore;

    fn profile() -> ParticipantProfile {
        ParticipantProfile::new("p1", false, ConditionId::Ai)
    }

    fn items(n: usize) -> TrialSequence {
        (1..=n)
            .map(|i| StimulusItem::image("images/", StimulusKind::Ai, "food", i))
            .collect()
    }

    fn rating(item: &StimulusItem) -> RatingRecord {
        RatingRecord::new(
            &profile(),
            item,
            RatingScores::from([1, 2, 3, 4, 5, 6]),
            DeviceClass::Desktop,
            Utc::now(),
        )
    }

    #[test]
    fn every_mutation_is_written_through() {
        let store = MemoryStore::new();
        let mut records = RecordStore::open(store.clone(), profile(), || items(3)).unwrap();
        let item = records.current().unwrap().clone();
        records.append_rating(rating(&item)).unwrap();

        let stored = ParticipantRecord::load(&store, "p1").unwrap();
        let session = stored.session.unwrap();
        assert_eq!(session.ratings.len(), 1);
        assert!(session.response_recorded);
        assert_eq!(stored.progress.unwrap().total, 3);

        records.advance().unwrap();
        let stored = ParticipantRecord::load(&store, "p1").unwrap();
        assert_eq!(stored.session.unwrap().cursor, 1);
        assert_eq!(stored.progress.unwrap().cursor, 1);
    }

    #[test]
    fn advance_without_response_is_a_no_op() {
        let mut records = RecordStore::open(MemoryStore::new(), profile(), || items(3)).unwrap();
        assert!(!records.advance().unwrap());
        assert_eq!(records.cursor(), 0);
        let item = records.current().unwrap().clone();
        records.append_rating(rating(&item)).unwrap();
        assert!(records.advance().unwrap());
        assert!(!records.advance().unwrap());
        assert_eq!(records.cursor(), 1);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut records = RecordStore::open(MemoryStore::new(), profile(), || items(2)).unwrap();
        let before = records.snapshot();
        let item = records.current().unwrap().clone();
        records.append_rating(rating(&item)).unwrap();
        assert!(before.ratings.is_empty());
        assert_eq!(records.snapshot().ratings.len(), 1);
    }

    #[test]
    fn unfinished_session_is_resumed() {
        let store = MemoryStore::new();
        {
            let mut records = RecordStore::open(store.clone(), profile(), || items(4)).unwrap();
            let item = records.current().unwrap().clone();
            records.append_rating(rating(&item)).unwrap();
            records.advance().unwrap();
        }
        let records = RecordStore::open(store.clone(), profile(), || panic!("should resume")).unwrap();
        assert!(records.resumed());
        assert_eq!(records.cursor(), 1);
        assert_eq!(records.session().ratings.len(), 1);
        assert_eq!(records.sequence().len(), 4);
    }

    #[test]
    fn finished_session_starts_over() {
        let store = MemoryStore::new();
        {
            let mut records = RecordStore::open(store.clone(), profile(), || items(1)).unwrap();
            records.finish(Utc::now()).unwrap();
        }
        let records = RecordStore::open(store, profile(), || items(2)).unwrap();
        assert!(!records.resumed());
        assert_eq!(records.sequence().len(), 2);
        assert_eq!(records.cursor(), 0);
    }

    #[test]
    fn session_record_carries_timestamps() {
        let mut records = RecordStore::open(MemoryStore::new(), profile(), || items(1)).unwrap();
        assert_eq!(records.session_record().experiment_data.experiment_end_time, None);
        let end = Utc::now();
        records.finish(end).unwrap();
        records.finish(end + chrono::Duration::seconds(5)).unwrap();
        let body = records.session_record();
        assert_eq!(body.experiment_data.experiment_end_time, Some(end));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json["experimentData"]["experimentStartTime"].is_string());
        assert_eq!(json["participantId"], "p1");
    }
}
