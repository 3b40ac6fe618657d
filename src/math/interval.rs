use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    StrumDisplay,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum RelationalOperator {
    #[strum(serialize = "<")]
    Smaller,
    #[strum(serialize = "<=")]
    SmallerEqual,
    #[strum(serialize = ">")]
    Larger,
    #[strum(serialize = ">=")]
    LargerEqual,
}

impl RelationalOperator {
    pub fn apply(&self, a: f64, b: f64) -> bool {
        match self {
            RelationalOperator::Smaller => a < b,
            RelationalOperator::SmallerEqual => a <= b,
            RelationalOperator::Larger => a > b,
            RelationalOperator::LargerEqual => a >= b,
        }
    }

    pub fn is_upper_bound(&self) -> bool {
        match self {
            RelationalOperator::Smaller | RelationalOperator::SmallerEqual => true,
            RelationalOperator::Larger | RelationalOperator::LargerEqual => false,
        }
    }

    pub fn is_strict(&self) -> bool {
        match self {
            RelationalOperator::Smaller | RelationalOperator::Larger => true,
            RelationalOperator::SmallerEqual | RelationalOperator::LargerEqual => false,
        }
    }

    /**
     * The operator that holds exactly when this one does not.
     */
    pub fn inverse(&self) -> Self {
        match self {
            RelationalOperator::Smaller => RelationalOperator::LargerEqual,
            RelationalOperator::SmallerEqual => RelationalOperator::Larger,
            RelationalOperator::Larger => RelationalOperator::SmallerEqual,
            RelationalOperator::LargerEqual => RelationalOperator::Smaller,
        }
    }

    /**
     * The operator after swapping both sides: `a < b` iff `b > a`.
     */
    pub fn mirror(&self) -> Self {
        match self {
            RelationalOperator::Smaller => RelationalOperator::Larger,
            RelationalOperator::SmallerEqual => RelationalOperator::LargerEqual,
            RelationalOperator::Larger => RelationalOperator::Smaller,
            RelationalOperator::LargerEqual => RelationalOperator::SmallerEqual,
        }
    }

    fn strict(&self) -> Self {
        if self.is_upper_bound() {
            RelationalOperator::Smaller
        } else {
            RelationalOperator::Larger
        }
    }
}

/// A set of admissible values of a variable, seen from the variable: `x < 10` is `Bound(Smaller, 10)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Interval {
    Bound(RelationalOperator, f64),
    /// closed
    Between(f64, f64),
}

impl Interval {
    pub fn bound(operator: RelationalOperator, boundary: f64) -> Self {
        Interval::Bound(operator, boundary)
    }

    pub fn inverse(&self) -> Option<Self> {
        match self {
            Interval::Bound(operator, boundary) => Some(Interval::Bound(operator.inverse(), *boundary)),
            Interval::Between(_, _) => None,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        match self {
            Interval::Bound(operator, boundary) => operator.apply(value, *boundary),
            Interval::Between(low, high) => *low <= value && value <= *high,
        }
    }

    /**
     * The closed range covered by this interval, with open sides filled by `min` and `max`
     * and strict boundaries moved inwards by `offset`.
     */
    pub fn to_range(&self, min: f64, max: f64, offset: f64) -> (f64, f64) {
        match self {
            Interval::Bound(RelationalOperator::Smaller, boundary) => (min, boundary - offset),
            Interval::Bound(RelationalOperator::SmallerEqual, boundary) => (min, *boundary),
            Interval::Bound(RelationalOperator::Larger, boundary) => (boundary + offset, max),
            Interval::Bound(RelationalOperator::LargerEqual, boundary) => (*boundary, max),
            Interval::Between(low, high) => (*low, *high),
        }
    }

    /**
     * Returns whether the range of this interval is non-empty and lies within [min, max].
     */
    pub fn is_within(&self, min: f64, max: f64, offset: f64) -> bool {
        let (low, high) = self.to_range(min, max, offset);
        high - low > 0.0 && high <= max && low >= min
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interval::Bound(operator, boundary) => write!(f, "{} {}", operator, boundary),
            Interval::Between(low, high) => write!(f, "[{}, {}]", low, high),
        }
    }
}

/**
 * Attempts to combine two intervals into one. Two bounds in the same direction combine into the
 * tighter one; an upper and a lower bound combine into a closed interval if they cross.
 */
pub fn merge(a: &Interval, b: &Interval, offset: f64) -> Option<Interval> {
    match (a, b) {
        (Interval::Bound(op_a, value_a), Interval::Bound(op_b, value_b)) => {
            if op_a.is_upper_bound() == op_b.is_upper_bound() {
                let upper = op_a.is_upper_bound();
                if value_a == value_b {
                    let operator = if op_a.is_strict() || op_b.is_strict() {
                        op_a.strict()
                    } else {
                        *op_a
                    };
                    Some(Interval::Bound(operator, *value_a))
                } else if (upper && value_a < value_b) || (!upper && value_a > value_b) {
                    Some(*a)
                } else {
                    Some(*b)
                }
            } else {
                let ((op_upper, value_upper), (op_lower, value_lower)) = if op_a.is_upper_bound() {
                    ((op_a, value_a), (op_b, value_b))
                } else {
                    ((op_b, value_b), (op_a, value_a))
                };
                let high = if op_upper.is_strict() {
                    value_upper - offset
                } else {
                    *value_upper
                };
                let low = if op_lower.is_strict() {
                    value_lower + offset
                } else {
                    *value_lower
                };
                if high > low {
                    Some(Interval::Between(low, high))
                } else {
                    None
                }
            }
        }
        _ => None,
    }
}

/**
 * Merges intervals pairwise until no pair can be merged any further.
 */
pub fn merge_all(mut intervals: Vec<Interval>, offset: f64) -> Vec<Interval> {
    'outer: loop {
        for i in 0..intervals.len() {
            for j in i + 1..intervals.len() {
                if let Some(merged) = merge(&intervals[i], &intervals[j], offset) {
                    intervals.remove(j);
                    intervals.remove(i);
                    intervals.push(merged);
                    continue 'outer;
                }
            }
        }
        return intervals;
    }
}

/**
 * Intersects all intervals with [min, max]. Returns the resulting closed range and whether it is non-empty.
 */
pub fn tighten(intervals: &[Interval], min: f64, max: f64, offset: f64) -> ((f64, f64), bool) {
    let mut low = min;
    let mut high = max;
    for interval in intervals {
        let (interval_low, interval_high) = interval.to_range(min, max, offset);
        low = low.max(interval_low);
        high = high.min(interval_high);
    }
    ((low, high), high >= low)
}

/**
 * The given intervals followed by the inverse of each of them.
 */
pub fn with_inverses(intervals: &[Interval]) -> Vec<Interval> {
    let mut result = intervals.to_vec();
    result.extend(intervals.iter().filter_map(|interval| interval.inverse()));
    result
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    use super::{Interval, RelationalOperator, merge, merge_all, tighten, with_inverses};

    #[test]
    fn operator_symbols() {
        for operator in RelationalOperator::iter() {
            let symbol = operator.to_string();
            assert_eq!(RelationalOperator::from_str(&symbol).unwrap(), operator);
        }
        assert!(RelationalOperator::from_str("=").is_err());
    }

    #[test]
    fn merge_smaller_with_smaller_equal() {
        let a = Interval::bound(RelationalOperator::Smaller, 10.0);
        let b = Interval::bound(RelationalOperator::SmallerEqual, 10.0);
        let merged = merge(&a, &b, 1.0).unwrap();
        assert_eq!(merged, Interval::bound(RelationalOperator::Smaller, 10.0));
        assert_eq!(merge(&b, &a, 1.0), Some(merged));
        assert!(!merged.contains(10.0));
        assert!(merged.contains(9.5));

        let once = merge_all(vec![a, b], 1.0);
        let twice = merge_all(once.clone(), 1.0);
        assert_eq!(once, vec![merged]);
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_lower_bounds() {
        let a = Interval::bound(RelationalOperator::Larger, 3.0);
        let b = Interval::bound(RelationalOperator::LargerEqual, 5.0);
        assert_eq!(merge(&a, &b, 1.0), Some(b));
        assert_eq!(merge(&b, &a, 1.0), Some(b));
    }

    #[test]
    fn merge_crossing_bounds() {
        let upper = Interval::bound(RelationalOperator::Smaller, 10.0);
        let lower = Interval::bound(RelationalOperator::LargerEqual, 2.0);
        assert_eq!(merge(&upper, &lower, 1.0), Some(Interval::Between(2.0, 9.0)));
        assert_eq!(merge(&lower, &upper, 1.0), Some(Interval::Between(2.0, 9.0)));

        let disjoint = Interval::bound(RelationalOperator::Larger, 10.0);
        let other = Interval::bound(RelationalOperator::Smaller, 2.0);
        assert_eq!(merge(&disjoint, &other, 1.0), None);
        assert_eq!(merge_all(vec![disjoint, other], 1.0).len(), 2);
    }

    #[test]
    fn tighten_within_bounds() {
        let intervals = [
            Interval::bound(RelationalOperator::Smaller, 10.0),
            Interval::bound(RelationalOperator::Larger, 3.0),
        ];
        assert_eq!(tighten(&intervals, 0.0, 100.0, 1.0), ((4.0, 9.0), true));

        let contradiction = [
            Interval::bound(RelationalOperator::Smaller, 3.0),
            Interval::bound(RelationalOperator::Larger, 10.0),
        ];
        assert!(!tighten(&contradiction, 0.0, 100.0, 1.0).1);
    }

    #[test]
    fn inverses() {
        let intervals = [Interval::bound(RelationalOperator::Smaller, 10.0)];
        assert_eq!(
            with_inverses(&intervals),
            vec![
                Interval::bound(RelationalOperator::Smaller, 10.0),
                Interval::bound(RelationalOperator::LargerEqual, 10.0)
            ]
        );
    }
}
