fn factor(precision: u32) -> f64 {
    10f64.powi(precision as i32)
}

/**
 * Rounds to the given number of decimal places.
 */
pub fn round_to(value: f64, precision: u32) -> f64 {
    if precision == 0 {
        return value.round();
    }
    let factor = factor(precision);
    let result = (value * factor).round() / factor;
    if result.is_finite() { result } else { value }
}

pub fn round_down(value: f64, precision: u32) -> f64 {
    if precision == 0 {
        return value.floor();
    }
    let factor = factor(precision);
    let result = (value * factor).floor() / factor;
    if result.is_finite() { result } else { value }
}

pub fn round_up(value: f64, precision: u32) -> f64 {
    if precision == 0 {
        return value.ceil();
    }
    let factor = factor(precision);
    let result = (value * factor).ceil() / factor;
    if result.is_finite() { result } else { value }
}

#[cfg(test)]
mod tests {
    use super::{round_down, round_to, round_up};

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(1.235001, 2), 1.24);
        assert_eq!(round_down(1.239, 2), 1.23);
        assert_eq!(round_up(1.231, 2), 1.24);
        assert_eq!(round_up(1.2, 0), 2.0);
        assert_eq!(round_down(-1.2, 0), -2.0);
    }
}
