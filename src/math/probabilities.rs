use rand::Rng;

/**
 * Scales the weights to sum to 1; without any positive weight, all entries are equally likely.
 * The floating point error of the sum is corrected on the last entry.
 */
pub fn normalise(weights: &[f64]) -> Vec<f64> {
    if weights.is_empty() {
        return vec![];
    }
    let weights: Vec<f64> = weights.iter().map(|weight| weight.max(0.0)).collect();
    let sum: f64 = weights.iter().sum();
    let mut result: Vec<f64> = if sum > 0.0 {
        weights.iter().map(|weight| weight / sum).collect()
    } else {
        vec![1.0 / weights.len() as f64; weights.len()]
    };
    let total: f64 = result.iter().sum();
    if let Some(last) = result.last_mut() {
        *last += 1.0 - total;
    }
    result
}

/**
 * Draws an index according to the given probabilities, which must sum to 1.
 * Returns None for an empty list.
 */
pub fn choose_weighted<R: Rng + ?Sized>(rng: &mut R, probabilities: &[f64]) -> Option<usize> {
    if probabilities.is_empty() {
        return None;
    }
    let draw = rng.random::<f64>();
    let mut cumulative = 0.0;
    for (index, probability) in probabilities.iter().enumerate() {
        cumulative += probability;
        if draw < cumulative {
            return Some(index);
        }
    }
    //rounding may leave the draw just above the last cumulative value
    probabilities.iter().rposition(|probability| *probability > 0.0).or(Some(probabilities.len() - 1))
}

/**
 * Draws an index uniformly; returns None for an empty range.
 */
pub fn choose_uniform<R: Rng + ?Sized>(rng: &mut R, length: usize) -> Option<usize> {
    if length == 0 {
        None
    } else {
        Some(rng.random_range(0..length))
    }
}
