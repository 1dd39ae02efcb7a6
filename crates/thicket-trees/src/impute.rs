//! Missing-value replacement baked into training.

use crate::category::CategoryMap;
use crate::error::TreesError;
use crate::selection::SelectionSet;
use crate::sort::sorted_column_indices;
use crate::value::{NO_INDEX, Value, ValueType};

/// Per-column policy for replacing NA values at training time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImputeOption {
    /// Leave NA in place. Splitting on a column that still holds NAs is an
    /// error, so this is only useful for columns without missing values
    /// (the target column always uses it).
    None,
    /// Categorical only: expose NA as a real synthetic level.
    ToCategory,
    /// Categorical only: replace with the modal level of the selected rows.
    ToMode,
    /// Numeric only: replace with the arithmetic mean of non-NA rows.
    ToMean,
    /// Numeric only: replace with the median (lower middle) of non-NA rows.
    ToMedian,
    /// Resolves to `ToCategory` (categorical) or `ToMedian` (numeric).
    Default,
}

impl ImputeOption {
    /// The option `Default` resolves to for a column type.
    #[must_use]
    pub fn default_for(value_type: ValueType) -> ImputeOption {
        match value_type {
            ValueType::Categorical => ImputeOption::ToCategory,
            ValueType::Numeric => ImputeOption::ToMedian,
        }
    }

    /// Resolve `Default` against a column type; other options pass through.
    #[must_use]
    pub fn resolve(self, value_type: ValueType) -> ImputeOption {
        match self {
            ImputeOption::Default => ImputeOption::default_for(value_type),
            other => other,
        }
    }

    /// Canonical lowercase name, as used in option files and model files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ImputeOption::None => "none",
            ImputeOption::ToCategory => "category",
            ImputeOption::ToMode => "mode",
            ImputeOption::ToMean => "mean",
            ImputeOption::ToMedian => "median",
            ImputeOption::Default => "default",
        }
    }
}

impl ValueType {
    /// Canonical lowercase name, as used in type files and model files.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Numeric => "numeric",
            ValueType::Categorical => "categorical",
        }
    }
}

/// Mean of the non-NA selected rows of a numeric column; NA when empty.
#[must_use]
pub(crate) fn mean_value(column: &[Value], select_rows: &SelectionSet) -> Value {
    let mut sum = 0.0;
    let mut count = 0usize;
    for &row in select_rows.indices() {
        if let Value::Number(d) = column[row] {
            sum += d;
            count += 1;
        }
    }
    if count > 0 {
        Value::Number(sum / count as f64)
    } else {
        Value::Na
    }
}

/// Median of the non-NA selected rows of a numeric column; NA when empty.
///
/// `sorted_indexes` must cover at least the selected rows in ascending
/// value order. Even-sized selections take the lower middle entry.
#[must_use]
pub(crate) fn median_value(
    column: &[Value],
    select_rows: &SelectionSet,
    sorted_indexes: &[usize],
) -> Value {
    let selected = select_rows.bits();
    let mut value_rows = Vec::with_capacity(select_rows.count());
    for &row in sorted_indexes {
        if selected[row] && !column[row].is_na() {
            value_rows.push(row);
        }
    }
    if value_rows.is_empty() {
        Value::Na
    } else {
        column[value_rows[value_rows.len() / 2]]
    }
}

/// Modal level of the non-NA selected rows of a categorical column; ties go
/// to the lexicographically earliest level name. NA when the selection or
/// the category map is empty.
pub(crate) fn mode_value(
    column: &[Value],
    select_rows: &SelectionSet,
    category_map: &CategoryMap,
) -> Result<Value, TreesError> {
    let category_count = category_map.count_all();
    if column.is_empty() || category_count == 0 {
        return Ok(Value::Na);
    }

    let begin = category_map.begin_index();
    let mut counts = vec![0usize; category_count];
    for &row in select_rows.indices() {
        if let Value::Level(level) = column[row] {
            let counts_index = level - begin;
            if counts_index >= 0 && (counts_index as usize) < category_count {
                counts[counts_index as usize] += 1;
            }
        }
    }

    let mut best = Value::Na;
    let mut best_count = 0usize;
    let mut best_name = "";
    for level in begin..category_map.end_index() {
        let count = counts[(level - begin) as usize];
        if count == 0 {
            continue;
        }
        let name = category_map
            .name_for(level)
            .ok_or(TreesError::Internal { detail: "category map iteration out of range" })?;
        let pick = best.is_na() || count > best_count || (count == best_count && name < best_name);
        if pick {
            best = Value::Level(level);
            best_count = count;
            best_name = name;
        }
    }
    Ok(best)
}

/// Compute the NA replacement value for one column under its impute option.
fn imputed_value(
    col: usize,
    options: &[ImputeOption],
    columns: &[Vec<Value>],
    value_types: &[ValueType],
    select_rows: &SelectionSet,
    category_maps: &[CategoryMap],
    sorted_indexes: &[Vec<usize>],
) -> Result<Value, TreesError> {
    let invalid = |option: ImputeOption| TreesError::InvalidImputeOption {
        option: option.name(),
        value_type: value_types[col].name(),
        column: col,
    };

    match value_types[col] {
        ValueType::Categorical => match options[col] {
            ImputeOption::None => Ok(Value::Na),
            ImputeOption::ToCategory => Ok(Value::Level(NO_INDEX)),
            ImputeOption::ToMode => mode_value(&columns[col], select_rows, &category_maps[col]),
            option @ (ImputeOption::ToMean | ImputeOption::ToMedian) => Err(invalid(option)),
            ImputeOption::Default => {
                Err(TreesError::Internal { detail: "unresolved default impute option" })
            }
        },
        ValueType::Numeric => match options[col] {
            ImputeOption::None => Ok(Value::Na),
            ImputeOption::ToMean => Ok(mean_value(&columns[col], select_rows)),
            ImputeOption::ToMedian => {
                Ok(median_value(&columns[col], select_rows, &sorted_indexes[col]))
            }
            option @ (ImputeOption::ToCategory | ImputeOption::ToMode) => Err(invalid(option)),
            ImputeOption::Default => {
                Err(TreesError::Internal { detail: "unresolved default impute option" })
            }
        },
    }
}

/// Replace NA values in the selected columns and rows.
///
/// Enables the synthetic NA level for `ToCategory` columns, rewrites NA
/// cells with the column's replacement value, and re-sorts the index table
/// of every column that changed. Returns the per-column replacement values
/// (NA for unselected or non-imputed columns); these are the values the
/// tree builder later compares against split points to route NAs.
///
/// # Errors
///
/// | Variant | When |
/// |---|---|
/// | [`TreesError::ShapeMismatch`] | per-column vectors disagree in length |
/// | [`TreesError::InvalidImputeOption`] | option does not fit the column type |
pub(crate) fn impute_values(
    options: &[ImputeOption],
    value_types: &[ValueType],
    columns: &mut [Vec<Value>],
    select_rows: &SelectionSet,
    select_columns: &SelectionSet,
    category_maps: &mut [CategoryMap],
    sorted_indexes: &mut [Vec<usize>],
) -> Result<Vec<Value>, TreesError> {
    let n_cols = columns.len();
    let check = |what: &'static str, got: usize| {
        if got == n_cols {
            Ok(())
        } else {
            Err(TreesError::ShapeMismatch { what, expected: n_cols, got })
        }
    };
    check("valueTypes", value_types.len())?;
    check("imputeOptions", options.len())?;
    check("categoryMaps", category_maps.len())?;
    check("sortedIndexes", sorted_indexes.len())?;

    let mut imputed = vec![Value::Na; n_cols];

    for &col in select_columns.indices() {
        if options[col] == ImputeOption::ToCategory {
            category_maps[col].set_use_na_category(true);
        }
        if options[col] == ImputeOption::Default {
            return Err(TreesError::Internal { detail: "unresolved default impute option" });
        }
        if options[col] == ImputeOption::None {
            continue;
        }

        imputed[col] = imputed_value(
            col,
            options,
            columns,
            value_types,
            select_rows,
            category_maps,
            sorted_indexes,
        )?;

        let mut changed = false;
        for &row in select_rows.indices() {
            if columns[col][row].is_na() {
                columns[col][row] = imputed[col];
                changed = true;
            }
        }
        if changed {
            sorted_indexes[col] = sorted_column_indices(&columns[col]);
        }
    }

    Ok(imputed)
}

#[cfg(test)]
mod tests {
    use super::{ImputeOption, impute_values, mean_value, median_value, mode_value};
    use crate::category::CategoryMap;
    use crate::error::TreesError;
    use crate::selection::SelectionSet;
    use crate::sort::sorted_column_indices;
    use crate::value::{NO_INDEX, Value, ValueType};

    fn numeric_column() -> Vec<Value> {
        vec![
            Value::Na,
            Value::Number(1.0),
            Value::Number(3.0),
            Value::Number(2.0),
            Value::Na,
            Value::Number(2.0),
        ]
    }

    #[test]
    fn mean_skips_na() {
        let column = numeric_column();
        let rows = SelectionSet::with_all(column.len(), true);
        assert_eq!(mean_value(&column, &rows), Value::Number(2.0));
    }

    #[test]
    fn mean_of_all_na_is_na() {
        let column = vec![Value::Na, Value::Na];
        let rows = SelectionSet::with_all(2, true);
        assert!(mean_value(&column, &rows).is_na());
    }

    #[test]
    fn median_takes_lower_middle() {
        let column = numeric_column();
        let rows = SelectionSet::with_all(column.len(), true);
        let sorted = sorted_column_indices(&column);
        // Non-NA subsequence is [1, 2, 2, 3]; entry floor(4/2) = index 2.
        assert_eq!(median_value(&column, &rows, &sorted), Value::Number(2.0));
    }

    #[test]
    fn median_of_empty_selection_is_na() {
        let column = numeric_column();
        let rows = SelectionSet::with_all(column.len(), false);
        let sorted = sorted_column_indices(&column);
        assert!(median_value(&column, &rows, &sorted).is_na());
    }

    #[test]
    fn mode_breaks_ties_by_name() {
        let mut map = CategoryMap::new();
        map.find_or_insert("delta");
        map.find_or_insert("bravo");
        let column = vec![Value::Level(0), Value::Level(1), Value::Level(1), Value::Level(0)];
        let rows = SelectionSet::with_all(4, true);
        // Counts are tied 2/2; "bravo" sorts before "delta".
        assert_eq!(mode_value(&column, &rows, &map).unwrap(), Value::Level(1));
    }

    #[test]
    fn mode_of_empty_map_is_na() {
        let map = CategoryMap::new();
        let column = vec![Value::Na];
        let rows = SelectionSet::with_all(1, true);
        assert!(mode_value(&column, &rows, &map).unwrap().is_na());
    }

    #[test]
    fn default_resolution() {
        assert_eq!(
            ImputeOption::Default.resolve(ValueType::Numeric),
            ImputeOption::ToMedian
        );
        assert_eq!(
            ImputeOption::Default.resolve(ValueType::Categorical),
            ImputeOption::ToCategory
        );
        assert_eq!(ImputeOption::ToMode.resolve(ValueType::Categorical), ImputeOption::ToMode);
    }

    #[test]
    fn impute_to_median_rewrites_na_and_resorts() {
        let mut columns = vec![numeric_column()];
        let value_types = vec![ValueType::Numeric];
        let mut maps = vec![CategoryMap::new()];
        let rows = SelectionSet::with_all(6, true);
        let cols = SelectionSet::with_all(1, true);
        let mut sorted = vec![sorted_column_indices(&columns[0])];

        let imputed = impute_values(
            &[ImputeOption::ToMedian],
            &value_types,
            &mut columns,
            &rows,
            &cols,
            &mut maps,
            &mut sorted,
        )
        .unwrap();

        assert_eq!(imputed[0], Value::Number(2.0));
        assert!(columns[0].iter().all(|v| !v.is_na()));
        // Re-sorted table must be ascending over the rewritten column.
        let resorted: Vec<f64> =
            sorted[0].iter().map(|&r| columns[0][r].number().unwrap()).collect();
        assert!(resorted.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn impute_to_category_enables_na_level() {
        let mut map = CategoryMap::new();
        map.find_or_insert("a");
        let mut columns = vec![vec![Value::Level(0), Value::Na, Value::Level(0)]];
        let value_types = vec![ValueType::Categorical];
        let mut maps = vec![map];
        let rows = SelectionSet::with_all(3, true);
        let cols = SelectionSet::with_all(1, true);
        let mut sorted = vec![sorted_column_indices(&columns[0])];

        let imputed = impute_values(
            &[ImputeOption::ToCategory],
            &value_types,
            &mut columns,
            &rows,
            &cols,
            &mut maps,
            &mut sorted,
        )
        .unwrap();

        assert!(maps[0].use_na_category());
        assert_eq!(imputed[0], Value::Level(NO_INDEX));
        assert_eq!(columns[0][1], Value::Level(NO_INDEX));
        // NA level sorts before level 0.
        assert_eq!(sorted[0][0], 1);
    }

    #[test]
    fn invalid_option_for_type_rejected() {
        let mut columns = vec![numeric_column()];
        let value_types = vec![ValueType::Numeric];
        let mut maps = vec![CategoryMap::new()];
        let rows = SelectionSet::with_all(6, true);
        let cols = SelectionSet::with_all(1, true);
        let mut sorted = vec![sorted_column_indices(&columns[0])];

        let err = impute_values(
            &[ImputeOption::ToMode],
            &value_types,
            &mut columns,
            &rows,
            &cols,
            &mut maps,
            &mut sorted,
        )
        .unwrap_err();
        assert!(matches!(err, TreesError::InvalidImputeOption { .. }));
    }

    #[test]
    fn none_leaves_na_in_place() {
        let mut columns = vec![numeric_column()];
        let value_types = vec![ValueType::Numeric];
        let mut maps = vec![CategoryMap::new()];
        let rows = SelectionSet::with_all(6, true);
        let cols = SelectionSet::with_all(1, true);
        let mut sorted = vec![sorted_column_indices(&columns[0])];

        let imputed = impute_values(
            &[ImputeOption::None],
            &value_types,
            &mut columns,
            &rows,
            &cols,
            &mut maps,
            &mut sorted,
        )
        .unwrap();
        assert!(imputed[0].is_na());
        assert!(columns[0][0].is_na());
    }
}
