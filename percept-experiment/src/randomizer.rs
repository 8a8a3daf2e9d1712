use rand::Rng;

/// In-place Fisher–Yates shuffle. Every permutation is equally likely given a
/// uniform `rng`.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// Uniform integer in `0..max_exclusive`, or `None` for an empty range.
pub fn uniform_int<R: Rng + ?Sized>(max_exclusive: usize, rng: &mut R) -> Option<usize> {
    (max_exclusive > 0).then(|| rng.random_range(0..max_exclusive))
}

/// Removes and returns a uniformly chosen element; drawing repeatedly samples
/// without replacement.
pub fn take_random<T, R: Rng + ?Sized>(pool: &mut Vec<T>, rng: &mut R) -> Option<T> {
    uniform_int(pool.len(), rng).map(|i| pool.swap_remove(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashMap;

    #[test]
    fn shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        let original: Vec<u32> = (0..50).collect();
        let mut shuffled = original.clone();
        shuffle(&mut shuffled, &mut rng);
        assert_ne!(shuffled, original);
        shuffled.sort_unstable();
        assert_eq!(shuffled, original);
    }

    #[test]
    fn shuffle_handles_tiny_inputs() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: Vec<u8> = vec![];
        shuffle(&mut empty, &mut rng);
        let mut one = vec![9];
        shuffle(&mut one, &mut rng);
        assert_eq!(one, vec![9]);
    }

    #[test]
    fn shuffle_is_unbiased_over_three_elements() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut counts: HashMap<[u8; 3], u32> = HashMap::new();
        let rounds = 60_000;
        for _ in 0..rounds {
            let mut v = [0u8, 1, 2];
            shuffle(&mut v, &mut rng);
            *counts.entry(v).or_default() += 1;
        }
        assert_eq!(counts.len(), 6);
        for (perm, n) in counts {
            // expected 10_000 each; five standard deviations is ~456
            assert!((9_400..=10_600).contains(&n), "{perm:?} drawn {n} times");
        }
    }

    #[test]
    fn uniform_int_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(uniform_int(0, &mut rng), None);
        for _ in 0..1_000 {
            let v = uniform_int(5, &mut rng).unwrap();
            assert!(v < 5);
        }
    }

    #[test]
    fn take_random_drains_without_replacement() {
        let mut rng = StdRng::seed_from_u64(4);
        let mut pool: Vec<u32> = (0..10).collect();
        let mut drawn = Vec::new();
        while let Some(v) = take_random(&mut pool, &mut rng) {
            drawn.push(v);
        }
        drawn.sort_unstable();
        assert_eq!(drawn, (0..10).collect::<Vec<_>>());
    }
}
