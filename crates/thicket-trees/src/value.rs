use std::cmp::Ordering;

/// Index value marking "no index": a leaf's split column, a missing level.
pub const NO_INDEX: i64 = -1;

/// The two kinds of column a dataset may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Real-valued column.
    Numeric,
    /// Column drawing from a finite set of named levels.
    Categorical,
}

/// A single cell: missing, a number, or a category level index.
///
/// The numeric/categorical switch is carried by the column's [`ValueType`],
/// not by the cell; a well-formed column holds only `Na` plus one payload
/// variant. The explicit `Na` variant is the only missing-value signal;
/// NaN is never used as an in-band marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// Missing value.
    Na,
    /// Payload of a numeric column.
    Number(f64),
    /// Payload of a categorical column: index into the column's
    /// [`CategoryMap`](crate::CategoryMap), or [`NO_INDEX`] for the
    /// synthetic NA level.
    Level(i64),
}

impl Value {
    /// Return `true` for the missing-value marker.
    #[must_use]
    pub fn is_na(self) -> bool {
        matches!(self, Value::Na)
    }

    /// Return the numeric payload, or `None` for `Na` and levels.
    #[must_use]
    pub fn number(self) -> Option<f64> {
        match self {
            Value::Number(d) => Some(d),
            _ => None,
        }
    }

    /// Return the level payload, or `None` for `Na` and numbers.
    #[must_use]
    pub fn level(self) -> Option<i64> {
        match self {
            Value::Level(i) => Some(i),
            _ => None,
        }
    }

    /// Ordering used by the sort service: NA sorts first, then payloads
    /// ascending. Comparing a number to a level is a column-type violation
    /// and falls back to `Equal` so the row-index tie-break decides.
    pub(crate) fn sort_cmp(self, other: Value) -> Ordering {
        match (self, other) {
            (Value::Na, Value::Na) => Ordering::Equal,
            (Value::Na, _) => Ordering::Less,
            (_, Value::Na) => Ordering::Greater,
            (Value::Number(a), Value::Number(b)) => a.total_cmp(&b),
            (Value::Level(a), Value::Level(b)) => a.cmp(&b),
            _ => Ordering::Equal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NO_INDEX, Value};
    use std::cmp::Ordering;

    #[test]
    fn na_is_na() {
        assert!(Value::Na.is_na());
        assert!(!Value::Number(0.0).is_na());
        assert!(!Value::Level(0).is_na());
    }

    #[test]
    fn number_payload() {
        assert_eq!(Value::Number(2.5).number(), Some(2.5));
        assert_eq!(Value::Na.number(), None);
        assert_eq!(Value::Level(1).number(), None);
    }

    #[test]
    fn level_payload() {
        assert_eq!(Value::Level(3).level(), Some(3));
        assert_eq!(Value::Level(NO_INDEX).level(), Some(-1));
        assert_eq!(Value::Na.level(), None);
        assert_eq!(Value::Number(1.0).level(), None);
    }

    #[test]
    fn na_sorts_first() {
        assert_eq!(Value::Na.sort_cmp(Value::Number(-1e300)), Ordering::Less);
        assert_eq!(Value::Level(-1).sort_cmp(Value::Na), Ordering::Greater);
        assert_eq!(Value::Na.sort_cmp(Value::Na), Ordering::Equal);
    }

    #[test]
    fn numbers_sort_ascending() {
        assert_eq!(Value::Number(1.0).sort_cmp(Value::Number(2.0)), Ordering::Less);
        assert_eq!(Value::Number(2.0).sort_cmp(Value::Number(1.0)), Ordering::Greater);
    }

    #[test]
    fn na_level_sorts_before_named_levels() {
        assert_eq!(Value::Level(NO_INDEX).sort_cmp(Value::Level(0)), Ordering::Less);
    }
}
