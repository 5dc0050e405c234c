//! Random-action helpers for randomized tests. Everything draws from a caller-supplied [Rng] so a
//! seeded generator replays the same run.

use rand::Rng;

/// Value in `[0, 1)` whose density falls linearly towards 1, so small values are favoured.
pub fn linear_falling<R: Rng>(rng: &mut R) -> f64 {
    (rng.gen::<f64>() + rng.gen::<f64>() - 1.0).abs()
}

/// Integer in `[0, end)` drawn with [linear_falling].
pub fn linear_falling_int<R: Rng>(rng: &mut R, end: u64) -> u64 {
    ((linear_falling(rng) * end as f64) as u64).min(end.saturating_sub(1))
}

/// `true` with probability `p`.
pub fn coin_flip<R: Rng>(rng: &mut R, p: f64) -> bool {
    rng.gen::<f64>() < p
}

pub fn random_choice<'a, R: Rng, T>(rng: &mut R, choices: &'a [T]) -> &'a T {
    assert!(!choices.is_empty(), "random choice from empty slice");
    &choices[rng.gen_range(0..choices.len())]
}

/// Pick one of `choices` with probability proportional to its weight.
pub fn weighted_choice<'a, R: Rng, T>(
    rng: &mut R, choices: &'a [(T, u32)],
) -> &'a T {
    let total: u32 = choices.iter().map(|(_, w)| *w).sum();
    assert!(total > 0, "weighted choice without weight");
    let mut pick = rng.gen_range(0..total);
    for (c, w) in choices.iter() {
        if pick < *w {
            return c
        }
        pick -= *w;
    }
    unreachable!()
}

#[test]
fn test_weighted_choice_respects_zero_weights() {
    use rand::SeedableRng;
    let mut rng = rand::rngs::StdRng::from_seed([0; 32]);
    let choices = [("a", 0), ("b", 3), ("c", 0)];
    for _ in 0..100 {
        assert_eq!(*weighted_choice(&mut rng, &choices), "b");
        assert!(linear_falling_int(&mut rng, 10) < 10);
    }
}
