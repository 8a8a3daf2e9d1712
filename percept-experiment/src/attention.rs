use percept_core::{StimulusItem, StimulusKind};
use rand::Rng;
use tracing::{debug, warn};

use crate::config::PlacementPolicy;
use crate::randomizer::take_random;
use crate::sequence::TrialSequence;

/// Every attention image available for one session.
pub fn attention_pool(base_path: &str, categories: &[String], per_category: usize) -> Vec<StimulusItem> {
    categories
        .iter()
        .flat_map(|category| {
            (1..=per_category)
                .map(move |n| StimulusItem::image(base_path, StimulusKind::Attention, category, n))
        })
        .collect()
}

fn draw_check<R: Rng + ?Sized>(pool: &mut Vec<StimulusItem>, rng: &mut R) -> Option<StimulusItem> {
    let mut check = take_random(pool, rng)?;
    check.expected_response = Some(check.category.clone());
    Some(check)
}

/// Places one attention check per `cadence` base items, drawing from `pool` without
/// replacement. Placement stops when the pool runs dry; checks are never adjacent and
/// never land past the end of the sequence.
pub fn insert_checks<R: Rng + ?Sized>(
    mut sequence: TrialSequence,
    cadence: usize,
    mut pool: Vec<StimulusItem>,
    policy: PlacementPolicy,
    rng: &mut R,
) -> TrialSequence {
    if cadence < 2 {
        warn!(cadence, "attention cadence below 2, no checks inserted");
        return sequence;
    }
    match policy {
        PlacementPolicy::FixedSlot => {
            let mut placed = 0;
            for slot in (cadence - 1..sequence.len()).step_by(cadence) {
                let Some(check) = draw_check(&mut pool, rng) else {
                    warn!(placed, "attention pool exhausted");
                    break;
                };
                sequence[slot] = check;
                placed += 1;
            }
            debug!(placed, len = sequence.len(), "overwrote fixed attention slots");
            sequence
        }
        PlacementPolicy::Jittered { max_offset } => {
            let n = sequence.len();
            let jitter = max_offset.min((cadence - 1) / 2) as i64;
            // 1-based count of base items after which a check goes; strictly increasing
            // because boundaries are `cadence` apart and each moves by at most `jitter`.
            let mut after: Vec<usize> = (cadence..=n)
                .step_by(cadence)
                .map(|b| {
                    let offset = rng.random_range(-jitter..=jitter);
                    (b as i64 + offset).clamp(1, n as i64) as usize
                })
                .collect();
            after.reverse();

            let mut out = Vec::with_capacity(n + after.len());
            for (idx, item) in sequence.into_iter().enumerate() {
                out.push(item);
                if after.last() == Some(&(idx + 1)) {
                    after.pop();
                    match draw_check(&mut pool, rng) {
                        Some(check) => out.push(check),
                        None => {
                            warn!("attention pool exhausted");
                            after.clear();
                        }
                    }
                }
            }
            debug!(len = out.len(), base = n, "inserted jittered attention checks");
            out
        }
    }
}
