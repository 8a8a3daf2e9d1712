use chrono::{DateTime, Utc};
use percept_core::{ConditionId, ParticipantProfile};
use percept_store::{KeyValueStore, StoreError, load_json, save_json};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::randomizer::uniform_int;
use crate::record::{CURRENT_PARTICIPANT_KEY, ParticipantRecord};

/// Occupations that count as an art background.
pub const ART_OCCUPATIONS: [&str; 2] = ["art student", "art industry practitioner"];
/// Art education answers that count as an art background.
pub const ART_EDUCATION: [&str; 1] = ["systematic art education / art degree"];

/// Self-reported background plus optional overrides, as collected before the
/// experiment page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    pub occupation: Option<String>,
    pub art_education: Option<String>,
    pub art_experience: Option<String>,
    /// Raw condition code for lab-run assignment; unknown codes fall back to mixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forced_condition: Option<i64>,
}

/// Exact-match art background test. All three fields must be answered.
pub fn is_art_background(hints: &ProfileHints) -> bool {
    let (Some(occupation), Some(education), Some(_experience)) = (
        hints.occupation.as_deref(),
        hints.art_education.as_deref(),
        hints.art_experience.as_deref(),
    ) else {
        return false;
    };
    ART_OCCUPATIONS.contains(&occupation) || ART_EDUCATION.contains(&education)
}

/// `user_<unix millis>_<9 base-36 characters>`.
pub fn generate_participant_id<R: Rng + ?Sized>(rng: &mut R, now: DateTime<Utc>) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect();
    format!("user_{}_{}", now.timestamp_millis(), suffix)
}

fn resolve_participant_id<S, R>(hints: &ProfileHints, store: &mut S, rng: &mut R) -> Result<String, StoreError>
where
    S: KeyValueStore + ?Sized,
    R: Rng + ?Sized,
{
    if let Some(id) = hints.participant_id.as_ref().filter(|id| !id.is_empty()) {
        return Ok(id.clone());
    }
    if let Some(id) = load_json::<String, _>(store, CURRENT_PARTICIPANT_KEY)? {
        return Ok(id);
    }
    let id = generate_participant_id(rng, Utc::now());
    save_json(store, CURRENT_PARTICIPANT_KEY, &id)?;
    info!(participant = %id, "generated participant id");
    Ok(id)
}

/// Returns the participant's existing profile, or assigns one and writes it through
/// to `store`. A stored profile that does not parse is treated as absent.
pub fn assign_condition<S, R>(hints: &ProfileHints, store: &mut S, rng: &mut R) -> Result<ParticipantProfile, StoreError>
where
    S: KeyValueStore + ?Sized,
    R: Rng + ?Sized,
{
    let id = resolve_participant_id(hints, store, rng)?;
    let mut record = ParticipantRecord::load(store, &id)?;

    if let Some(mut profile) = record.profile {
        // labels follow the (possibly fallen-back) condition
        profile.condition_label = profile.condition_id.label().to_string();
        info!(participant = %id, condition = %profile.condition_id, "reusing assigned condition");
        return Ok(profile);
    }

    let art_background = is_art_background(hints);
    let condition = match hints.forced_condition {
        Some(code) => ConditionId::resolve(code),
        None => uniform_int(ConditionId::ALL.len(), rng)
            .map(|i| ConditionId::ALL[i])
            .unwrap_or(ConditionId::FALLBACK),
    };
    let profile = ParticipantProfile::new(id.clone(), art_background, condition);

    record.profile = Some(profile.clone());
    record.basic_info = Some(hints.clone());
    record.save(store)?;
    info!(participant = %id, condition = %condition, art_background, "assigned condition");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::participant_key;
    use percept_store::MemoryStore;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::cell::Cell;

    /// Counts writes per key prefix.
    struct CountingStore {
        inner: MemoryStore,
        profile_writes: Cell<usize>,
    }

    impl KeyValueStore for CountingStore {
        fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.load(key)
        }
        fn save(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            if key.starts_with("percept:participant:") {
                self.profile_writes.set(self.profile_writes.get() + 1);
            }
            self.inner.save(key, value)
        }
    }

    fn art_student() -> ProfileHints {
        ProfileHints {
            occupation: Some("art student".into()),
            art_education: Some("none".into()),
            art_experience: Some("some".into()),
            ..ProfileHints::default()
        }
    }

    #[test]
    fn art_background_is_exact_membership() {
        assert!(is_art_background(&art_student()));

        let degree = ProfileHints {
            occupation: Some("engineer".into()),
            art_education: Some("systematic art education / art degree".into()),
            art_experience: Some("none".into()),
            ..ProfileHints::default()
        };
        assert!(is_art_background(&degree));

        let partial = ProfileHints {
            occupation: Some("art student (former)".into()),
            ..art_student()
        };
        assert!(!is_art_background(&partial));

        let unanswered = ProfileHints {
            art_experience: None,
            ..art_student()
        };
        assert!(!is_art_background(&unanswered));
    }

    #[test]
    fn participant_id_shape() {
        let mut rng = StdRng::seed_from_u64(1);
        let now = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let id = generate_participant_id(&mut rng, now);
        let rest = id.strip_prefix("user_1700000000123_").unwrap();
        assert_eq!(rest.len(), 9);
        assert!(rest.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn assignment_is_idempotent_and_written_once() {
        let mut store = CountingStore {
            inner: MemoryStore::new(),
            profile_writes: Cell::new(0),
        };
        let mut rng = StdRng::seed_from_u64(2);
        let first = assign_condition(&art_student(), &mut store, &mut rng).unwrap();
        assert!(first.art_background);
        assert_eq!(store.profile_writes.get(), 1);

        for _ in 0..5 {
            let again = assign_condition(&ProfileHints::default(), &mut store, &mut rng).unwrap();
            assert_eq!(again, first);
        }
        assert_eq!(store.profile_writes.get(), 1);
    }

    #[test]
    fn all_conditions_get_assigned() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = std::collections::HashSet::new();
        for i in 0..60 {
            let mut store = MemoryStore::new();
            let hints = ProfileHints {
                participant_id: Some(format!("p{i}")),
                ..ProfileHints::default()
            };
            seen.insert(assign_condition(&hints, &mut store, &mut rng).unwrap().condition_id);
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn forced_unknown_condition_falls_back_to_mixed() {
        let mut store = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(4);
        let hints = ProfileHints {
            forced_condition: Some(5),
            ..ProfileHints::default()
        };
        let profile = assign_condition(&hints, &mut store, &mut rng).unwrap();
        assert_eq!(profile.condition_id, ConditionId::Mixed);
        assert_eq!(profile.condition_label, "Mixed");
    }

    #[test]
    fn malformed_profile_triggers_fresh_assignment() {
        let mut store = MemoryStore::new();
        store.insert_raw(
            &participant_key("p1"),
            r#"{"participantId":"p1","profile":{"participantId":"p1","artBackground":true}}"#,
        );
        let mut rng = StdRng::seed_from_u64(5);
        let hints = ProfileHints {
            participant_id: Some("p1".into()),
            ..ProfileHints::default()
        };
        let profile = assign_condition(&hints, &mut store, &mut rng).unwrap();
        assert_eq!(profile.participant_id, "p1");
        assert!(!profile.art_background);

        let reloaded = ParticipantRecord::load(&store, "p1").unwrap();
        assert_eq!(reloaded.profile, Some(profile));
    }

    #[test]
    fn generated_id_is_remembered() {
        let mut store = MemoryStore::new();
        let mut rng = StdRng::seed_from_u64(6);
        let a = assign_condition(&ProfileHints::default(), &mut store, &mut rng).unwrap();
        let b = assign_condition(&ProfileHints::default(), &mut store, &mut rng).unwrap();
        assert_eq!(a.participant_id, b.participant_id);
        assert!(a.participant_id.starts_with("user_"));
    }
}
