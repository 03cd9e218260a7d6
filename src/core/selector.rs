use std::sync::Arc;

use rand::Rng;

use crate::core::origin::Origin;

/// Weighted-random origin selection.
///
/// An origin's selection probability is its effective weight divided by the
/// sum of effective weights over the candidate set: weight 3 in a pool
/// totaling 5 is picked with probability 3/5. Selection is stateless across
/// requests; callers pass the candidate subset they want drawn from.
pub struct WeightedSelector;

impl WeightedSelector {
    /// Select one origin from `candidates` with weight-proportional
    /// probability.
    ///
    /// Returns `None` only for an empty candidate slice. The RNG is a
    /// parameter so tests can drive a seeded generator; production callers
    /// pass a fresh `rand::rng()`.
    pub fn select<R: Rng + ?Sized>(
        candidates: &[Arc<Origin>],
        rng: &mut R,
    ) -> Option<Arc<Origin>> {
        if candidates.is_empty() {
            return None;
        }

        let total_weight: f64 = candidates.iter().map(|o| o.effective_weight()).sum();
        let mut draw = rng.random_range(0.0..total_weight);

        for origin in candidates {
            draw -= origin.effective_weight();
            if draw < 0.0 {
                return Some(origin.clone());
            }
        }

        // Floating-point drift can leave the walk un-triggered even though
        // draw < total_weight; the last candidate absorbs it.
        candidates.last().cloned()
    }
}
