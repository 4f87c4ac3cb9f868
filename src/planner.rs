//! Splitting a batch into per-tier difficulty counts.
//!
//! Without an override the batch is divided evenly across the three tiers and
//! the remainder goes to easy, then medium; hard never receives a remainder
//! unit. With an override the counts are rescaled to the requested batch size
//! using largest-remainder allocation so the plan sum is always exact.

use crate::domain::{Difficulty, DifficultyOverride};

/// One planned tier. Plans omit tiers whose final count is zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TierCount {
  pub tier: Difficulty,
  pub count: u32,
}

/// Produce the tier plan for a batch. Total: never fails, and for
/// `batch_size >= 1` the counts always sum to `batch_size`.
pub fn plan(batch_size: u32, override_counts: Option<&DifficultyOverride>) -> Vec<TierCount> {
  let counts = match override_counts {
    // A zero-sum override carries no information; treat as absent.
    Some(o) if o.total() > 0 => rescale([o.easy, o.medium, o.hard], batch_size),
    _ => default_split(batch_size),
  };

  Difficulty::ALL
    .iter()
    .zip(counts)
    .filter(|(_, c)| *c > 0)
    .map(|(tier, count)| TierCount { tier: *tier, count })
    .collect()
}

fn default_split(batch_size: u32) -> [u32; 3] {
  let base = batch_size / 3;
  let remainder = batch_size % 3;
  [
    base + u32::from(remainder >= 1),
    base + u32::from(remainder >= 2),
    base,
  ]
}

/// Largest-remainder allocation: floor each rescaled count, then hand the
/// leftover units to the tiers with the largest fractional parts, ties broken
/// in easy -> medium -> hard order.
fn rescale(counts: [u32; 3], batch_size: u32) -> [u32; 3] {
  let total: u32 = counts.iter().sum();
  let mut out = [0u32; 3];
  let mut fractions: Vec<(usize, f64)> = Vec::with_capacity(3);

  for (i, c) in counts.iter().enumerate() {
    let exact = f64::from(*c) * f64::from(batch_size) / f64::from(total);
    out[i] = exact.floor() as u32;
    fractions.push((i, exact - exact.floor()));
  }

  let mut leftover = batch_size - out.iter().sum::<u32>();
  fractions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
  for (i, _) in fractions {
    if leftover == 0 {
      break;
    }
    out[i] += 1;
    leftover -= 1;
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  fn counts(plan: &[TierCount]) -> Vec<(Difficulty, u32)> {
    plan.iter().map(|t| (t.tier, t.count)).collect()
  }

  #[test]
  fn default_plans_for_minimal_batches() {
    assert_eq!(counts(&plan(1, None)), vec![(Difficulty::Easy, 1)]);
    assert_eq!(
      counts(&plan(2, None)),
      vec![(Difficulty::Easy, 1), (Difficulty::Medium, 1)]
    );
    assert_eq!(
      counts(&plan(3, None)),
      vec![(Difficulty::Easy, 1), (Difficulty::Medium, 1), (Difficulty::Hard, 1)]
    );
  }

  #[test]
  fn plan_sum_always_matches_batch_size() {
    for size in 1..=9u32 {
      let total: u32 = plan(size, None).iter().map(|t| t.count).sum();
      assert_eq!(total, size, "no-override sum for batch {size}");
    }
  }

  #[test]
  fn zero_sum_override_behaves_like_no_override() {
    let o = DifficultyOverride { easy: 0, medium: 0, hard: 0 };
    assert_eq!(plan(2, Some(&o)), plan(2, None));
  }

  #[test]
  fn exact_override_is_used_as_given() {
    let o = DifficultyOverride { easy: 0, medium: 0, hard: 3 };
    assert_eq!(counts(&plan(3, Some(&o))), vec![(Difficulty::Hard, 3)]);
  }

  #[test]
  fn mismatched_override_is_rescaled_to_the_exact_batch_size() {
    // 1/1/1 over a batch of 2: each tier wants 2/3; easy and medium win the
    // two leftover units on the tie-break order.
    let o = DifficultyOverride { easy: 1, medium: 1, hard: 1 };
    assert_eq!(
      counts(&plan(2, Some(&o))),
      vec![(Difficulty::Easy, 1), (Difficulty::Medium, 1)]
    );

    // Heavily skewed override still sums exactly.
    let o = DifficultyOverride { easy: 10, medium: 1, hard: 1 };
    let p = plan(3, Some(&o));
    let total: u32 = p.iter().map(|t| t.count).sum();
    assert_eq!(total, 3);
    assert_eq!(p[0].tier, Difficulty::Easy);
    assert!(p[0].count >= 2);
  }

  #[test]
  fn zero_count_tiers_are_dropped() {
    let o = DifficultyOverride { easy: 5, medium: 0, hard: 0 };
    assert_eq!(counts(&plan(3, Some(&o))), vec![(Difficulty::Easy, 3)]);
  }
}
