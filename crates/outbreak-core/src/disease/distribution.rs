//! Dwell-time distributions.

use crate::error::{CoreError, Result};
use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Fixed(u32),
    Discrete(Vec<(u32, f64)>),
    UniformSet(Vec<u32>),
    UniformInterval { min: u32, max: u32 },
    Normal { mean: f64, stddev: f64 },
    Gamma { shape: f64, scale: f64 },
}

impl Distribution {
    /// Validates normalization constraints that must hold at load time
    /// (e.g. discrete probabilities summing to 1), not at sample time.
    pub fn validate(&self) -> Result<()> {
        if let Distribution::Discrete(entries) = self {
            let total: f64 = entries.iter().map(|(_, p)| p).sum();
            if (total - 1.0).abs() > 1e-6 {
                return Err(CoreError::DistributionNotNormalized(total));
            }
        }
        Ok(())
    }

    /// Samples a non-negative integer dwell time.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        match self {
            Distribution::Fixed(v) => *v,
            Distribution::Discrete(entries) => {
                let u: f64 = rng.gen();
                let mut acc = 0.0;
                for (value, prob) in entries {
                    acc += prob;
                    if u <= acc {
                        return *value;
                    }
                }
                entries.last().map(|(v, _)| *v).unwrap_or(0)
            }
            Distribution::UniformSet(values) => {
                let idx = rng.gen_range(0..values.len().max(1));
                values.get(idx).copied().unwrap_or(0)
            }
            Distribution::UniformInterval { min, max } => {
                if max <= min {
                    *min
                } else {
                    rng.gen_range(*min..=*max)
                }
            }
            Distribution::Normal { mean, stddev } => {
                // Box-Muller, clamped to non-negative integer ticks.
                let u1: f64 = rng.gen::<f64>().max(f64::EPSILON);
                let u2: f64 = rng.gen();
                let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                ((mean + z * stddev).max(0.0)).round() as u32
            }
            Distribution::Gamma { shape, scale } => {
                // Marsaglia-Tsang for shape >= 1; shape < 1 boosted by one
                // and corrected, matching the standard approach used for
                // dwell-time sampling without pulling in a stats crate.
                let d = if *shape < 1.0 { shape + 1.0 } else { *shape } - 1.0 / 3.0;
                let c = 1.0 / (9.0 * d).sqrt();
                loop {
                    let x: f64 = {
                        let u1: f64 = rng.gen::<f64>().max(f64::EPSILON);
                        let u2: f64 = rng.gen();
                        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
                    };
                    let v = (1.0 + c * x).powi(3);
                    if v <= 0.0 {
                        continue;
                    }
                    let u: f64 = rng.gen();
                    if u.ln() < 0.5 * x * x + d - d * v + d * v.ln() {
                        let sample = d * v * scale;
                        let sample = if *shape < 1.0 {
                            sample * rng.gen::<f64>().powf(1.0 / shape)
                        } else {
                            sample
                        };
                        return sample.max(0.0).round() as u32;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn fixed_samples_constant() {
        let d = Distribution::Fixed(5);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..10 {
            assert_eq!(d.sample(&mut rng), 5);
        }
    }

    #[test]
    fn discrete_must_normalize() {
        let d = Distribution::Discrete(vec![(1, 0.5), (2, 0.4)]);
        assert!(d.validate().is_err());
    }

    #[test]
    fn uniform_interval_bounds() {
        let d = Distribution::UniformInterval { min: 2, max: 4 };
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..50 {
            let s = d.sample(&mut rng);
            assert!((2..=4).contains(&s));
        }
    }
}
