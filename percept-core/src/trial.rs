use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::{ParticipantProfile, StimulusItem, StimulusKind};

/// The six Likert items every rated image must answer.
#[derive(Copy, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingField {
    MoralDisgust,
    TechnicalFlaws,
    Originality,
    Emotional,
    ArtistValue,
    VisualAppeal,
}

impl RatingField {
    pub const ALL: [RatingField; 6] = [
        RatingField::MoralDisgust,
        RatingField::TechnicalFlaws,
        RatingField::Originality,
        RatingField::Emotional,
        RatingField::ArtistValue,
        RatingField::VisualAppeal,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Form field name as the questionnaire submits it.
    pub fn name(self) -> &'static str {
        match self {
            RatingField::MoralDisgust => "moral_disgust",
            RatingField::TechnicalFlaws => "technical_flaws",
            RatingField::Originality => "originality",
            RatingField::Emotional => "emotional",
            RatingField::ArtistValue => "artist_value",
            RatingField::VisualAppeal => "visual_appeal",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for RatingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("unanswered rating fields: {0:?}")]
    Missing(Vec<RatingField>),
    #[error("{field} score {value} outside 1..={max}")]
    OutOfRange { field: RatingField, value: u8, max: u8 },
}

/// Partially or fully answered rating questionnaire.
#[derive(Copy, Debug, Clone, Default, PartialEq, Eq)]
pub struct RatingForm {
    scores: [Option<u8>; 6],
}

impl RatingForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scores(scores: [u8; 6]) -> Self {
        Self {
            scores: scores.map(Some),
        }
    }

    pub fn set(&mut self, field: RatingField, value: Option<u8>) {
        self.scores[field.index()] = value;
    }

    pub fn get(&self, field: RatingField) -> Option<u8> {
        self.scores[field.index()]
    }

    pub fn missing(&self) -> Vec<RatingField> {
        RatingField::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_none())
            .collect()
    }

    pub fn validate(&self, scale_max: u8) -> Result<RatingScores, FormError> {
        let missing = self.missing();
        if !missing.is_empty() {
            return Err(FormError::Missing(missing));
        }
        let mut values = [0u8; 6];
        for field in RatingField::ALL {
            let value = self.get(field).unwrap_or_default();
            if value == 0 || value > scale_max {
                return Err(FormError::OutOfRange {
                    field,
                    value,
                    max: scale_max,
                });
            }
            values[field.index()] = value;
        }
        Ok(RatingScores::from(values))
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingScores {
    pub moral_disgust: u8,
    pub technical_flaws: u8,
    pub originality: u8,
    pub emotional: u8,
    pub artist_value: u8,
    pub visual_appeal: u8,
}

impl From<[u8; 6]> for RatingScores {
    fn from(v: [u8; 6]) -> Self {
        Self {
            moral_disgust: v[0],
            technical_flaws: v[1],
            originality: v[2],
            emotional: v[3],
            artist_value: v[4],
            visual_appeal: v[5],
        }
    }
}

#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    #[default]
    Desktop,
    Tablet,
    Mobile,
}

/// One per rated (non-attention) trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingRecord {
    pub participant_id: String,
    pub stimulus_id: String,
    pub timestamp: DateTime<Utc>,
    pub condition_id: crate::ConditionId,
    pub condition_label: String,
    pub art_background: bool,
    pub stimulus_kind: StimulusKind,
    pub category: String,
    #[serde(flatten)]
    pub scores: RatingScores,
    pub device_class: DeviceClass,
}

impl RatingRecord {
    pub fn new(
        profile: &ParticipantProfile,
        item: &StimulusItem,
        scores: RatingScores,
        device_class: DeviceClass,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            participant_id: profile.participant_id.clone(),
            stimulus_id: item.id.clone(),
            timestamp,
            condition_id: profile.condition_id,
            condition_label: profile.condition_label.clone(),
            art_background: profile.art_background,
            stimulus_kind: item.kind,
            category: item.category.clone(),
            scores,
            device_class,
        }
    }
}

/// One per attention-check trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionRecord {
    pub participant_id: String,
    pub stimulus_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_answer: String,
    pub expected_answer: String,
    pub correct: bool,
}

impl AttentionRecord {
    pub fn new(
        profile: &ParticipantProfile,
        item: &StimulusItem,
        answer: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let expected = item.expected_answer();
        Self {
            participant_id: profile.participant_id.clone(),
            stimulus_id: item.id.clone(),
            timestamp,
            user_answer: answer.to_string(),
            expected_answer: expected.to_string(),
            correct: answer == expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConditionId;

    #[test]
    fn empty_form_reports_every_field_missing() {
        let form = RatingForm::new();
        assert_eq!(form.missing(), RatingField::ALL.to_vec());
    }

    #[test]
    fn one_blank_field_blocks_validation() {
        let mut form = RatingForm::from_scores([1, 2, 3, 4, 5, 6]);
        form.set(RatingField::ArtistValue, None);
        assert_eq!(
            form.validate(7),
            Err(FormError::Missing(vec![RatingField::ArtistValue]))
        );
    }

    #[test]
    fn scores_outside_the_scale_are_rejected() {
        let form = RatingForm::from_scores([1, 2, 3, 4, 5, 8]);
        assert_eq!(
            form.validate(7),
            Err(FormError::OutOfRange {
                field: RatingField::VisualAppeal,
                value: 8,
                max: 7
            })
        );
        let zero = RatingForm::from_scores([0, 2, 3, 4, 5, 6]);
        assert!(zero.validate(7).is_err());
    }

    #[test]
    fn complete_form_maps_fields_in_order() {
        let scores = RatingForm::from_scores([1, 2, 3, 4, 5, 6]).validate(7).unwrap();
        assert_eq!(scores.moral_disgust, 1);
        assert_eq!(scores.technical_flaws, 2);
        assert_eq!(scores.originality, 3);
        assert_eq!(scores.emotional, 4);
        assert_eq!(scores.artist_value, 5);
        assert_eq!(scores.visual_appeal, 6);
    }

    #[test]
    fn field_names_round_trip() {
        for field in RatingField::ALL {
            assert_eq!(RatingField::from_name(field.name()), Some(field));
        }
        assert_eq!(RatingField::from_name("beauty"), None);
    }

    #[test]
    fn attention_record_scores_exact_match() {
        let profile = ParticipantProfile::new("p", false, ConditionId::Ai);
        let mut item = StimulusItem::image("images/", StimulusKind::Attention, "landscape", 2);
        item.expected_response = Some("landscape".into());
        let now = Utc::now();

        let hit = AttentionRecord::new(&profile, &item, "landscape", now);
        assert!(hit.correct);
        let miss = AttentionRecord::new(&profile, &item, "Landscape", now);
        assert!(!miss.correct);
        assert_eq!(miss.expected_answer, "landscape");
    }

    #[test]
    fn rating_record_flattens_scores() {
        let profile = ParticipantProfile::new("p", true, ConditionId::Mixed);
        let item = StimulusItem::image("images/", StimulusKind::Human, "food", 1);
        let scores = RatingScores::from([7, 6, 5, 4, 3, 2]);
        let record = RatingRecord::new(&profile, &item, scores, DeviceClass::Tablet, Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["moralDisgust"], 7);
        assert_eq!(json["visualAppeal"], 2);
        assert_eq!(json["stimulusKind"], "human");
        assert_eq!(json["deviceClass"], "tablet");
        assert_eq!(json["conditionLabel"], "Mixed");
    }
}
