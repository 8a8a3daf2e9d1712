use percept_core::{ConditionId, StimulusItem, StimulusKind};
use rand::Rng;
use tracing::info;

use crate::config::{ExperimentConfig, MixedStrategy};
use crate::randomizer::shuffle;

/// Ordered stimuli for one session, attention checks included once inserted.
pub type TrialSequence = Vec<StimulusItem>;

/// `count` images of `kind` spread over `categories`.
///
/// The first `count % categories.len()` categories take one image more than the rest,
/// so no category is more than one image away from `ceil(count / categories)` and the
/// total is exactly `count`.
pub fn balanced_items(
    base_path: &str,
    kind: StimulusKind,
    count: usize,
    categories: &[String],
) -> Vec<StimulusItem> {
    if categories.is_empty() {
        return Vec::new();
    }
    let per = count / categories.len();
    let extra = count % categories.len();
    let mut items = Vec::with_capacity(count);
    for (idx, category) in categories.iter().enumerate() {
        let n = per + usize::from(idx < extra);
        items.extend((1..=n).map(|i| StimulusItem::image(base_path, kind, category, i)));
    }
    items
}

/// Balanced, shuffled base sequence for `condition`.
pub fn build_sequence<R: Rng + ?Sized>(
    condition: ConditionId,
    config: &ExperimentConfig,
    rng: &mut R,
) -> TrialSequence {
    let base = config.image_base_path.as_str();
    let count = config.images_per_condition;
    let categories = &config.categories;

    let mut items = match (condition, config.mixed_strategy) {
        (ConditionId::Ai, _) => balanced_items(base, StimulusKind::Ai, count, categories),
        (ConditionId::Human, _) => balanced_items(base, StimulusKind::Human, count, categories),
        (ConditionId::Mixed, MixedStrategy::SplitSources) => {
            // odd totals give the extra image to the AI half
            let human = count / 2;
            let mut items = balanced_items(base, StimulusKind::Ai, count - human, categories);
            items.extend(balanced_items(base, StimulusKind::Human, human, categories));
            items
        }
        (ConditionId::Mixed, MixedStrategy::PooledFolder) => {
            balanced_items(base, StimulusKind::Mix, count, categories)
        }
    };
    shuffle(&mut items, rng);
    info!(condition = %condition, len = items.len(), "built stimulus sequence");
    items
}
