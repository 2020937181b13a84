//! Randomized milk rewards.

use rand::Rng;

use super::model::MilkReward;
use crate::config::Bounds;

/// Draws the `{tonAmount, bonus}` pair reported after each play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSampler {
    points: Bounds<u32>,
    /// `tonAmount` range in thousandths.
    milli_ton: Bounds<u64>,
}

impl RewardSampler {
    /// Returns `None` when `points` is inverted or `ton_amount` holds no
    /// value with three decimals.
    #[must_use]
    pub fn new(points: Bounds<u32>, ton_amount: Bounds<f64>) -> Option<Self> {
        let points = Bounds::new(points.min, points.max)?;
        let (lo, hi) = ton_amount.milli_grid()?;
        Some(Self {
            points,
            milli_ton: Bounds { min: lo, max: hi },
        })
    }

    /// Samples a reward. `tonAmount` is drawn on the 0.001 grid so the
    /// formatted value always lies inside the configured bounds.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> MilkReward {
        let bonus = rng.gen_range(self.points.min..=self.points.max);
        let milli = rng.gen_range(self.milli_ton.min..=self.milli_ton.max);

        MilkReward {
            ton_amount: format!("{}.{:03}", milli / 1000, milli % 1000),
            bonus,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn sampler() -> RewardSampler {
        RewardSampler::new(
            Bounds { min: 50, max: 65 },
            Bounds {
                min: 0.040,
                max: 0.055,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_samples_stay_in_bounds() {
        let sampler = sampler();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..2000 {
            let reward = sampler.sample(&mut rng);
            assert!((50..=65).contains(&reward.bonus));

            let (int, frac) = reward.ton_amount.split_once('.').unwrap();
            assert_eq!(int, "0");
            assert_eq!(frac.len(), 3);

            let ton: f64 = reward.ton_amount.parse().unwrap();
            assert!((0.040..=0.055).contains(&ton), "{ton} out of range");
        }
    }

    #[test]
    fn test_degenerate_bounds() {
        let sampler = RewardSampler::new(
            Bounds { min: 7, max: 7 },
            Bounds {
                min: 1.25,
                max: 1.25,
            },
        )
        .unwrap();
        let reward = sampler.sample(&mut StdRng::seed_from_u64(1));
        assert_eq!(reward.bonus, 7);
        assert_eq!(reward.ton_amount, "1.250");
    }

    #[test]
    fn test_hits_both_ends() {
        let sampler = RewardSampler::new(
            Bounds { min: 1, max: 2 },
            Bounds {
                min: 0.001,
                max: 0.002,
            },
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let seen: std::collections::HashSet<_> =
            (0..200).map(|_| sampler.sample(&mut rng).ton_amount).collect();
        assert!(seen.contains("0.001"));
        assert!(seen.contains("0.002"));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_refuses_ranges_it_cannot_honor() {
        let narrow = Bounds {
            min: 0.0411,
            max: 0.0419,
        };
        assert!(RewardSampler::new(Bounds { min: 1, max: 1 }, narrow).is_none());

        let ton = Bounds {
            min: 0.040,
            max: 0.055,
        };
        assert!(RewardSampler::new(Bounds { min: 9, max: 1 }, ton).is_none());
    }
}
