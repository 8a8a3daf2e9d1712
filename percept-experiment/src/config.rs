use percept_core::{DeviceClass, StimulusItem};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigError;

/// How attention checks are placed into the base sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PlacementPolicy {
    /// Overwrite the item at every `cadence`-th position; length is unchanged.
    FixedSlot,
    /// Insert after every `cadence`-th item, shifted by up to `max_offset` positions.
    Jittered { max_offset: usize },
}

/// How the mixed condition draws its images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MixedStrategy {
    /// Half AI, half human, each half balanced across categories.
    #[default]
    SplitSources,
    /// One balanced list from the pre-mixed `mix/` folder.
    PooledFolder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub fixation_ms: u64,
    pub stimulus_ms: u64,
    /// Exposure for attention images; `stimulus_ms` when unset.
    pub attention_stimulus_ms: Option<u64>,
    pub rest_ms: u64,
    pub attention_break_secs: u64,
    pub images_per_condition: usize,
    pub categories: Vec<String>,
    pub attention_cadence: usize,
    pub attention_images_per_category: usize,
    pub image_base_path: String,
    pub scale_max: u8,
    pub placement: PlacementPolicy,
    pub mixed_strategy: MixedStrategy,
    pub device_class: DeviceClass,
    pub completion_route: String,
    pub upload_endpoint: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            fixation_ms: 500,
            stimulus_ms: 100,
            attention_stimulus_ms: None,
            rest_ms: 200,
            attention_break_secs: 60,
            images_per_condition: 20,
            categories: ["people", "objects", "food", "buildings", "landscape"]
                .into_iter()
                .map(String::from)
                .collect(),
            attention_cadence: 5,
            attention_images_per_category: 4,
            image_base_path: "images/".to_string(),
            scale_max: 7,
            placement: PlacementPolicy::FixedSlot,
            mixed_strategy: MixedStrategy::SplitSources,
            device_class: DeviceClass::Desktop,
            completion_route: "feedback.html".to_string(),
            upload_endpoint: "http://127.0.0.1:8080/result".to_string(),
        }
    }
}

impl ExperimentConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.images_per_condition == 0 {
            return Err(ConfigError::NoTrials);
        }
        if self.categories.is_empty() {
            return Err(ConfigError::NoCategories);
        }
        if self.attention_cadence < 2 {
            return Err(ConfigError::CadenceTooSmall(self.attention_cadence));
        }
        if self.scale_max == 0 {
            return Err(ConfigError::EmptyScale);
        }
        if let PlacementPolicy::Jittered { max_offset } = self.placement {
            if max_offset * 2 >= self.attention_cadence {
                return Err(ConfigError::JitterTooWide {
                    max_offset,
                    cadence: self.attention_cadence,
                });
            }
        }
        Ok(())
    }

    pub fn fixation(&self) -> Duration {
        Duration::from_millis(self.fixation_ms)
    }

    pub fn stimulus_for(&self, item: &StimulusItem) -> Duration {
        let ms = if item.is_attention() {
            self.attention_stimulus_ms.unwrap_or(self.stimulus_ms)
        } else {
            self.stimulus_ms
        };
        Duration::from_millis(ms)
    }

    pub fn rest(&self) -> Duration {
        Duration::from_millis(self.rest_ms)
    }

    pub fn attention_break(&self) -> Duration {
        Duration::from_secs(self.attention_break_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use percept_core::StimulusKind;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(ExperimentConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_degenerate_settings() {
        let mut cfg = ExperimentConfig::default();
        cfg.attention_cadence = 1;
        assert_eq!(cfg.validate(), Err(ConfigError::CadenceTooSmall(1)));

        let mut cfg = ExperimentConfig::default();
        cfg.categories.clear();
        assert_eq!(cfg.validate(), Err(ConfigError::NoCategories));

        let mut cfg = ExperimentConfig::default();
        cfg.placement = PlacementPolicy::Jittered { max_offset: 3 };
        assert_matches!(cfg.validate(), Err(ConfigError::JitterTooWide { .. }));
        cfg.placement = PlacementPolicy::Jittered { max_offset: 2 };
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn attention_items_can_have_their_own_exposure() {
        let mut cfg = ExperimentConfig::default();
        let art = StimulusItem::image("images/", StimulusKind::Ai, "food", 1);
        let check = StimulusItem::image("images/", StimulusKind::Attention, "food", 1);
        assert_eq!(cfg.stimulus_for(&check), Duration::from_millis(100));
        cfg.attention_stimulus_ms = Some(1500);
        assert_eq!(cfg.stimulus_for(&check), Duration::from_millis(1500));
        assert_eq!(cfg.stimulus_for(&art), Duration::from_millis(100));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ExperimentConfig = serde_json::from_str(
            r#"{"images_per_condition": 10, "placement": {"policy": "jittered", "max_offset": 1}}"#,
        )
        .unwrap();
        assert_eq!(cfg.images_per_condition, 10);
        assert_eq!(cfg.placement, PlacementPolicy::Jittered { max_offset: 1 });
        assert_eq!(cfg.fixation_ms, 500);
        assert_eq!(cfg.categories.len(), 5);
    }
}
