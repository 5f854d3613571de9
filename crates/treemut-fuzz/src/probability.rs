//! Per-run chances of applying each mutation kind.

use crate::random::RandomSource;
use std::collections::HashMap;
use treemut_core::{MutationKind, ProbabilityConfig};

/// Chances drawn once at the start of a run from the configured ranges
#[derive(Debug, Clone)]
pub struct ProbabilityContext {
    chances: HashMap<MutationKind, u32>,
}

impl ProbabilityContext {
    pub fn new(config: &ProbabilityConfig, rng: &mut dyn RandomSource) -> Self {
        let chances = MutationKind::ALL
            .iter()
            .map(|kind| {
                let range = config.range_for(*kind);
                (*kind, rng.range_inclusive(range.min, range.max))
            })
            .collect();
        Self { chances }
    }

    /// Every kind always applies
    pub fn always() -> Self {
        Self {
            chances: MutationKind::ALL.iter().map(|k| (*k, 100)).collect(),
        }
    }

    /// Chance in percent, `0..=100`
    pub fn chance_of(&self, kind: MutationKind) -> u32 {
        self.chances.get(&kind).copied().unwrap_or(0)
    }

    /// Roll for `kind`
    pub fn choose(&self, kind: MutationKind, rng: &mut dyn RandomSource) -> bool {
        rng.chance(self.chance_of(kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::ChaChaSource;

    #[test]
    fn test_chances_fall_in_configured_ranges() {
        let config = ProbabilityConfig::default();
        let mut rng = ChaChaSource::seeded(11);
        let ctx = ProbabilityContext::new(&config, &mut rng);
        for kind in MutationKind::ALL {
            let range = config.range_for(kind);
            let chance = ctx.chance_of(kind);
            assert!(range.min <= chance && chance <= range.max, "{:?} {}", kind, chance);
        }
    }

    #[test]
    fn test_always_chooses() {
        let ctx = ProbabilityContext::always();
        let mut rng = ChaChaSource::seeded(0);
        assert!(ctx.choose(MutationKind::DeleteStatement, &mut rng));
    }
}
