use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use strum_macros::{Display, EnumIter, EnumString};

const MAX_REJECTIONS: usize = 100;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
pub enum DistributionType {
    #[strum(serialize = "truncated_normal", serialize = "normal")]
    TruncatedNormal,
    #[strum(serialize = "truncated_exponential", serialize = "exponential")]
    TruncatedExponential,
    #[strum(serialize = "uniform")]
    Uniform,
}

/// A distribution over numbers restricted to [minimum, maximum].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruncatedDistribution {
    pub distribution_type: DistributionType,
    pub mean: f64,
    pub standard_deviation: f64,
    pub minimum: f64,
    pub maximum: f64,
}

impl TruncatedDistribution {
    /**
     * A missing mean defaults to the middle of the range width, a missing standard deviation to half the mean.
     * An empty range is widened by one.
     */
    pub fn new(
        distribution_type: DistributionType,
        mean: Option<f64>,
        standard_deviation: Option<f64>,
        minimum: f64,
        maximum: f64,
    ) -> Self {
        let maximum = if minimum == maximum {
            maximum + 1.0
        } else {
            maximum
        };
        let mean = mean.unwrap_or((maximum - minimum) / 2.0);
        let standard_deviation = standard_deviation.unwrap_or(mean / 2.0);
        Self {
            distribution_type,
            mean,
            standard_deviation,
            minimum,
            maximum,
        }
    }

    pub fn truncated_normal(mean: f64, standard_deviation: f64, minimum: f64, maximum: f64) -> Self {
        Self::new(
            DistributionType::TruncatedNormal,
            Some(mean),
            Some(standard_deviation),
            minimum,
            maximum,
        )
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self.distribution_type {
            DistributionType::TruncatedNormal => sample_truncated_normal(
                rng,
                self.mean,
                self.standard_deviation,
                self.minimum,
                self.maximum,
            ),
            DistributionType::TruncatedExponential => sample_truncated_exponential(
                rng,
                self.standard_deviation,
                self.minimum,
                self.maximum,
            ),
            DistributionType::Uniform => uniform(rng, self.minimum, self.maximum),
        }
    }

    /**
     * Samples and truncates towards zero.
     */
    pub fn sample_integer<R: Rng + ?Sized>(&self, rng: &mut R) -> i64 {
        self.sample(rng) as i64
    }
}

/**
 * Uniform in [low, high); returns `low` for an empty or inverted range.
 */
pub fn uniform<R: Rng + ?Sized>(rng: &mut R, low: f64, high: f64) -> f64 {
    if !(high > low) {
        return low;
    }
    let value = low + (high - low) * rng.random::<f64>();
    value.min(high)
}

fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

pub fn sample_truncated_normal<R: Rng + ?Sized>(
    rng: &mut R,
    mean: f64,
    standard_deviation: f64,
    minimum: f64,
    maximum: f64,
) -> f64 {
    let (minimum, maximum) = if minimum <= maximum {
        (minimum, maximum)
    } else {
        (maximum, minimum)
    };
    if !(standard_deviation > 0.0) {
        return mean.clamp(minimum, maximum);
    }
    for _ in 0..MAX_REJECTIONS {
        let value = mean + standard_deviation * standard_normal(rng);
        if minimum <= value && value <= maximum {
            return value;
        }
    }
    (mean + standard_deviation * standard_normal(rng)).clamp(minimum, maximum)
}

/**
 * Inverse-CDF sampling of an exponential with the given scale, shifted to start at `minimum`
 * and cut off at `maximum`.
 */
pub fn sample_truncated_exponential<R: Rng + ?Sized>(
    rng: &mut R,
    scale: f64,
    minimum: f64,
    maximum: f64,
) -> f64 {
    if !(scale > 0.0) || !(maximum > minimum) {
        return minimum;
    }
    let b = (maximum - minimum) / scale;
    let u = rng.random::<f64>();
    let value = minimum - scale * (1.0 - u * (1.0 - (-b).exp())).ln();
    value.clamp(minimum, maximum)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use strum::IntoEnumIterator;

    use super::{DistributionType, TruncatedDistribution};

    #[test]
    fn samples_stay_within_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1701);
        for distribution_type in DistributionType::iter() {
            let distribution =
                TruncatedDistribution::new(distribution_type, Some(5.0), Some(10.0), 2.0, 8.0);
            for _ in 0..1000 {
                let value = distribution.sample(&mut rng);
                assert!((2.0..=8.0).contains(&value), "{:?} {}", distribution_type, value);
            }
        }
    }

    #[test]
    fn defaults() {
        let distribution =
            TruncatedDistribution::new(DistributionType::TruncatedNormal, None, None, 4.0, 4.0);
        assert_eq!(distribution.maximum, 5.0);
        assert_eq!(distribution.mean, 0.5);
        assert_eq!(distribution.standard_deviation, 0.25);
    }

    #[test]
    fn zero_deviation() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let distribution = TruncatedDistribution::truncated_normal(600.0, 0.0, 0.0, 10.0);
        assert_eq!(distribution.sample(&mut rng), 10.0);
    }
}
