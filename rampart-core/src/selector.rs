use rand::Rng;

use crate::scenario::ScenarioKind;

/// Maps a uniform draw in `[0, 100)` to a scenario.
///
/// Cumulative boundaries follow the declaration order of the weight table, so
/// a fixed table and a fixed RNG seed give a fully deterministic sequence.
/// Draws are independent; no stratification.
#[derive(Debug, Clone)]
pub struct WeightedSelector {
    entries: Vec<(ScenarioKind, u64)>,
}

impl WeightedSelector {
    /// Expects a table already validated to sum to exactly 100.
    pub fn new(weights: &[(ScenarioKind, u64)]) -> Self {
        Self {
            entries: weights.to_vec(),
        }
    }

    pub fn pick(&self, rng: &mut impl Rng) -> ScenarioKind {
        let draw: f64 = rng.random_range(0.0..100.0);

        let mut cumulative = 0u64;
        for (kind, weight) in &self.entries {
            cumulative += weight;
            if draw < cumulative as f64 {
                return *kind;
            }
        }

        // Unreachable for validated tables; fall back to the last weighted
        // entry to stay total.
        self.entries
            .iter()
            .rev()
            .find(|(_, w)| *w > 0)
            .or_else(|| self.entries.last())
            .map(|(k, _)| *k)
            .unwrap_or(ScenarioKind::BrowseProducts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;

    fn selector() -> WeightedSelector {
        WeightedSelector::new(&[
            (ScenarioKind::BrowseProducts, 50),
            (ScenarioKind::SearchProducts, 20),
            (ScenarioKind::ViewProduct, 20),
            (ScenarioKind::ViewCategories, 10),
        ])
    }

    #[test]
    fn large_sample_tracks_configured_proportions() {
        let selector = selector();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        const DRAWS: u64 = 100_000;
        let mut observed: HashMap<ScenarioKind, u64> = HashMap::new();
        for _ in 0..DRAWS {
            *observed.entry(selector.pick(&mut rng)).or_default() += 1;
        }

        let expected = [
            (ScenarioKind::BrowseProducts, 50.0),
            (ScenarioKind::SearchProducts, 20.0),
            (ScenarioKind::ViewProduct, 20.0),
            (ScenarioKind::ViewCategories, 10.0),
        ];
        for (kind, pct) in expected {
            let got = *observed.get(&kind).unwrap_or(&0) as f64 * 100.0 / DRAWS as f64;
            assert!(
                (got - pct).abs() <= 2.0,
                "{kind}: observed {got:.2}%, expected {pct}% +/- 2%"
            );
        }
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let selector = selector();

        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);
        let seq_a: Vec<_> = (0..64).map(|_| selector.pick(&mut a)).collect();
        let seq_b: Vec<_> = (0..64).map(|_| selector.pick(&mut b)).collect();
        assert_eq!(seq_a, seq_b);
    }

    #[test]
    fn zero_weight_scenarios_are_never_picked() {
        let selector = WeightedSelector::new(&[
            (ScenarioKind::BrowseProducts, 100),
            (ScenarioKind::UserJourney, 0),
        ]);

        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..10_000 {
            assert_eq!(selector.pick(&mut rng), ScenarioKind::BrowseProducts);
        }
    }

    #[test]
    fn single_entry_table_always_wins() {
        let selector = WeightedSelector::new(&[(ScenarioKind::ViewCategories, 100)]);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(selector.pick(&mut rng), ScenarioKind::ViewCategories);
    }
}
