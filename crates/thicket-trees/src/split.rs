//! Impurity measures and per-column best-split search.

use crate::category::CategoryMap;
use crate::error::TreesError;
use crate::selection::SelectionSet;
use crate::value::{Value, ValueType};

/// A candidate split point for one column and the impurity it achieves.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SplitCandidate {
    /// Threshold (numeric column) or level (categorical column).
    pub value: Value,
    /// Weighted impurity of the two sides; lower is better.
    pub measure: f64,
}

/// Natural-log entropy of a count vector; zero for an empty total.
pub(crate) fn entropy_for_counts(counts: &[usize]) -> f64 {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let mut entropy = 0.0;
    for &count in counts {
        if count > 0 {
            let p = count as f64 / total as f64;
            entropy -= p * p.ln();
        }
    }
    entropy
}

/// Weighted entropy of a binary split given the "less or equal" side's
/// counts and the whole node's counts. Empty sides contribute zero.
pub(crate) fn entropy_for_split(
    le_counts: &[usize],
    total_counts: &[usize],
) -> Result<f64, TreesError> {
    let le_total: usize = le_counts.iter().sum();
    let total: usize = total_counts.iter().sum();
    let gn_total = total - le_total;

    let mut le_entropy = 0.0;
    if le_total > 0 {
        for &count in le_counts {
            if count > 0 {
                let p = count as f64 / le_total as f64;
                le_entropy -= p * p.ln();
            }
        }
    }

    let mut gn_entropy = 0.0;
    if gn_total > 0 {
        for (&le, &all) in le_counts.iter().zip(total_counts) {
            let count = all - le;
            if count > 0 {
                let p = count as f64 / gn_total as f64;
                gn_entropy -= p * p.ln();
            }
        }
    }

    let entropy = if total > 0 {
        (le_entropy * le_total as f64 + gn_entropy * gn_total as f64) / total as f64
    } else {
        0.0
    };

    if entropy.is_nan() {
        return Err(TreesError::ImpurityNan);
    }
    Ok(entropy)
}

/// Sample standard deviation from running statistics, clamped to zero when
/// cancellation drives the variance negative. Zero for counts below two.
pub(crate) fn st_dev(count: usize, sum: f64, sum2: f64) -> f64 {
    if count <= 1 {
        return 0.0;
    }
    let n = count as f64;
    let variance = (sum2 - sum * sum / n) / (n - 1.0);
    if variance > 0.0 { variance.sqrt() } else { 0.0 }
}

/// Weighted standard deviation of a binary split. Falls back to the whole
/// node's deviation unless both sides hold at least two rows.
pub(crate) fn sd_for_split(
    le_sum: f64,
    le_sum2: f64,
    le_count: usize,
    total_sum: f64,
    total_sum2: f64,
    total_count: usize,
) -> Result<f64, TreesError> {
    let gn_count = total_count - le_count;
    let gn_sum = total_sum - le_sum;
    let gn_sum2 = total_sum2 - le_sum2;

    let sd = if le_count > 1 && gn_count > 1 {
        let le_sd = st_dev(le_count, le_sum, le_sum2);
        let gn_sd = st_dev(gn_count, gn_sum, gn_sum2);
        (le_sd * le_count as f64 + gn_sd * gn_count as f64) / total_count as f64
    } else {
        st_dev(total_count, total_sum, total_sum2)
    };

    if sd.is_nan() {
        return Err(TreesError::ImpurityNan);
    }
    Ok(sd)
}

/// Entropy of the target over a row selection, plus the level counts it was
/// computed from. Counts are indexed from the map's begin index.
pub(crate) fn target_entropy(
    select_rows: &SelectionSet,
    columns: &[Vec<Value>],
    target_column: usize,
    target_map: &CategoryMap,
) -> Result<(f64, Vec<usize>), TreesError> {
    let begin = target_map.begin_index();
    let mut counts = vec![0usize; target_map.count_all()];
    for &row in select_rows.indices() {
        let level = columns[target_column][row]
            .level()
            .ok_or(TreesError::UnimputedNa { column: target_column })?;
        counts[(level - begin) as usize] += 1;
    }
    Ok((entropy_for_counts(&counts), counts))
}

/// Standard deviation of the numeric target over a row selection.
pub(crate) fn target_sd(
    select_rows: &SelectionSet,
    columns: &[Vec<Value>],
    target_column: usize,
) -> Result<f64, TreesError> {
    let (sum, sum2, count) = target_stats(select_rows, columns, target_column)?;
    Ok(st_dev(count, sum, sum2))
}

/// Sum, sum of squares, and count of the numeric target over a selection.
pub(crate) fn target_stats(
    select_rows: &SelectionSet,
    columns: &[Vec<Value>],
    target_column: usize,
) -> Result<(f64, f64, usize), TreesError> {
    let mut sum = 0.0;
    let mut sum2 = 0.0;
    let mut count = 0usize;
    for &row in select_rows.indices() {
        let value = columns[target_column][row]
            .number()
            .ok_or(TreesError::UnimputedNa { column: target_column })?;
        sum += value;
        sum2 += value * value;
        count += 1;
    }
    Ok((sum, sum2, count))
}

/// Best threshold split for a numeric column, or `None` if the column has
/// no two distinct values over the selection.
///
/// Iterates rows in descending column order through the pre-sorted index
/// table, maintaining the "less or equal" side's statistics incrementally.
/// At each strict value change, the midpoint of the adjacent distinct
/// values is a candidate threshold.
///
/// # Errors
///
/// Returns [`TreesError::UnimputedNa`] when the column still holds an NA
/// over the selection, and [`TreesError::ImpurityNan`] from the impurity
/// kernels.
#[allow(clippy::too_many_arguments)]
pub(crate) fn best_numeric_split(
    col: usize,
    target_column: usize,
    select_rows: &SelectionSet,
    columns: &[Vec<Value>],
    value_types: &[ValueType],
    category_maps: &[CategoryMap],
    sorted_indexes: &[Vec<usize>],
) -> Result<Option<SplitCandidate>, TreesError> {
    let selected = select_rows.bits();
    let sorted = &sorted_indexes[col];
    let mut best: Option<SplitCandidate> = None;

    match value_types[target_column] {
        ValueType::Numeric => {
            let (total_sum, total_sum2, total_count) =
                target_stats(select_rows, columns, target_column)?;
            if total_count < 2 {
                return Ok(None);
            }

            // Initially every selected row is on the "less or equal" side
            // of the largest value; peel rows off from the top.
            let mut le_sum = total_sum;
            let mut le_sum2 = total_sum2;
            let mut le_count = total_count;
            let mut first = true;
            let mut previous = 0.0;

            for &row in sorted.iter().rev() {
                if !selected[row] {
                    continue;
                }
                let current =
                    columns[col][row].number().ok_or(TreesError::UnimputedNa { column: col })?;
                let measure = sd_for_split(
                    le_sum, le_sum2, le_count, total_sum, total_sum2, total_count,
                )?;

                if first {
                    first = false;
                } else if current < previous
                    && best.is_none_or(|b| measure < b.measure)
                {
                    best = Some(SplitCandidate {
                        value: Value::Number(0.5 * (current + previous)),
                        measure,
                    });
                }

                let target = columns[target_column][row]
                    .number()
                    .ok_or(TreesError::UnimputedNa { column: target_column })?;
                le_sum -= target;
                le_sum2 -= target * target;
                le_count -= 1;
                previous = current;
            }
        }

        ValueType::Categorical => {
            let target_map = &category_maps[target_column];
            let begin = target_map.begin_index();
            let mut total_counts = vec![0usize; target_map.count_all()];
            let mut total_rows = 0usize;
            for &row in select_rows.indices() {
                let level = columns[target_column][row]
                    .level()
                    .ok_or(TreesError::UnimputedNa { column: target_column })?;
                total_counts[(level - begin) as usize] += 1;
                total_rows += 1;
            }
            if total_rows < 2 {
                return Ok(None);
            }

            let mut le_counts = total_counts.clone();
            let mut first = true;
            let mut previous = 0.0;

            for &row in sorted.iter().rev() {
                if !selected[row] {
                    continue;
                }
                let current =
                    columns[col][row].number().ok_or(TreesError::UnimputedNa { column: col })?;

                if first {
                    first = false;
                } else if current < previous {
                    let measure = entropy_for_split(&le_counts, &total_counts)?;
                    if best.is_none_or(|b| measure < b.measure) {
                        best = Some(SplitCandidate {
                            value: Value::Number(0.5 * (current + previous)),
                            measure,
                        });
                    }
                }

                let level = columns[target_column][row]
                    .level()
                    .ok_or(TreesError::UnimputedNa { column: target_column })?;
                le_counts[(level - begin) as usize] -= 1;
                previous = current;
            }
        }
    }

    Ok(best)
}

/// Best one-vs-rest split for a categorical column: the "less or equal"
/// side is "row's level equals the chosen level". `None` when the column
/// has fewer than two levels or the selection is too small.
///
/// Equal impurities are broken by the lexicographically earliest level
/// name so the result does not depend on level insertion order.
#[allow(clippy::too_many_arguments)]
pub(crate) fn best_categorical_split(
    col: usize,
    target_column: usize,
    select_rows: &SelectionSet,
    columns: &[Vec<Value>],
    value_types: &[ValueType],
    category_maps: &[CategoryMap],
    sorted_indexes: &[Vec<usize>],
) -> Result<Option<SplitCandidate>, TreesError> {
    let col_map = &category_maps[col];
    let mut best: Option<(SplitCandidate, String)> = None;

    match value_types[target_column] {
        ValueType::Numeric => {
            let level_count = col_map.count_all();
            let begin = col_map.begin_index();
            if level_count <= 1 {
                return Ok(None);
            }

            let mut total_sum = 0.0;
            let mut total_sum2 = 0.0;
            let mut total_count = 0usize;
            let mut level_sum = vec![0.0; level_count];
            let mut level_sum2 = vec![0.0; level_count];
            let mut level_rows = vec![0usize; level_count];

            for &row in select_rows.indices() {
                let value = columns[target_column][row]
                    .number()
                    .ok_or(TreesError::UnimputedNa { column: target_column })?;
                total_sum += value;
                total_sum2 += value * value;
                total_count += 1;

                let level =
                    columns[col][row].level().ok_or(TreesError::UnimputedNa { column: col })?;
                let index = (level - begin) as usize;
                level_sum[index] += value;
                level_sum2[index] += value * value;
                level_rows[index] += 1;
            }
            if total_count < 2 {
                return Ok(None);
            }

            for level in begin..col_map.end_index() {
                let index = (level - begin) as usize;
                if level_rows[index] == 0 {
                    continue;
                }
                let measure = sd_for_split(
                    level_sum[index],
                    level_sum2[index],
                    level_rows[index],
                    total_sum,
                    total_sum2,
                    total_count,
                )?;
                let name = col_map
                    .name_for(level)
                    .ok_or(TreesError::LevelOutOfRange { level, column: col })?;
                update_best(&mut best, Value::Level(level), measure, name);
            }
        }

        ValueType::Categorical => {
            let target_map = &category_maps[target_column];
            let begin = target_map.begin_index();
            let n_target = target_map.count_all();

            let mut total_counts = vec![0usize; n_target];
            let mut total_rows = 0usize;
            for &row in select_rows.indices() {
                let level = columns[target_column][row]
                    .level()
                    .ok_or(TreesError::UnimputedNa { column: target_column })?;
                total_counts[(level - begin) as usize] += 1;
                total_rows += 1;
            }
            if total_rows == 0 {
                return Ok(None);
            }

            // Rows come grouped by the split column's level in the sorted
            // table; each group is evaluated when the level changes, and
            // the final group when the scan runs past the end.
            let selected = select_rows.bits();
            let sorted = &sorted_indexes[col];
            let mut first = true;
            let mut previous_level = 0i64;
            let mut current_level = 0i64;
            let mut group_rows = 0usize;
            let mut group_counts = vec![0usize; n_target];

            for index in 0..=sorted.len() {
                let mut evaluate = false;
                let mut measure = 0.0;

                if index == sorted.len() {
                    measure = entropy_for_split(&group_counts, &total_counts)?;
                    evaluate = group_rows > 0;
                } else {
                    let row = sorted[index];
                    if selected[row] {
                        current_level = columns[col][row]
                            .level()
                            .ok_or(TreesError::UnimputedNa { column: col })?;

                        if first {
                            first = false;
                        } else if current_level != previous_level {
                            measure = entropy_for_split(&group_counts, &total_counts)?;
                            evaluate = true;
                            group_rows = 0;
                            group_counts.fill(0);
                        }

                        let target = columns[target_column][row]
                            .level()
                            .ok_or(TreesError::UnimputedNa { column: target_column })?;
                        group_counts[(target - begin) as usize] += 1;
                        group_rows += 1;
                    }
                }

                if evaluate {
                    let name = col_map.name_for(previous_level).ok_or(
                        TreesError::LevelOutOfRange { level: previous_level, column: col },
                    )?;
                    update_best(&mut best, Value::Level(previous_level), measure, name);
                }

                previous_level = current_level;
            }
        }
    }

    Ok(best.map(|(candidate, _)| candidate))
}

/// Keep the candidate with the lower measure; equal measures go to the
/// lexicographically earlier level name.
fn update_best(best: &mut Option<(SplitCandidate, String)>, value: Value, measure: f64, name: &str) {
    let replace = match best {
        None => true,
        Some((candidate, best_name)) => {
            measure < candidate.measure || (measure == candidate.measure && name < best_name.as_str())
        }
    };
    if replace {
        *best = Some((SplitCandidate { value, measure }, name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::sorted_column_indices;

    fn numbers(vals: &[f64]) -> Vec<Value> {
        vals.iter().map(|&v| Value::Number(v)).collect()
    }

    fn levels(vals: &[i64]) -> Vec<Value> {
        vals.iter().map(|&v| Value::Level(v)).collect()
    }

    #[test]
    fn entropy_pure_counts_is_zero() {
        assert_eq!(entropy_for_counts(&[10, 0, 0]), 0.0);
        assert_eq!(entropy_for_counts(&[]), 0.0);
    }

    #[test]
    fn entropy_balanced_binary() {
        let entropy = entropy_for_counts(&[5, 5]);
        assert!((entropy - 2.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn split_entropy_of_perfect_separation_is_zero() {
        let entropy = entropy_for_split(&[3, 0], &[3, 3]).unwrap();
        assert!(entropy.abs() < 1e-12);
    }

    #[test]
    fn split_entropy_weights_sides() {
        // LE side: 1/1 split of 2 rows; GN side: pure 2 rows.
        let entropy = entropy_for_split(&[1, 1], &[1, 3]).unwrap();
        let expected = 2.0 / 4.0 * 2.0_f64.ln();
        assert!((entropy - expected).abs() < 1e-12);
    }

    #[test]
    fn st_dev_basics() {
        assert_eq!(st_dev(1, 5.0, 25.0), 0.0);
        let sd = st_dev(3, 6.0, 14.0); // values 1, 2, 3
        assert!((sd - 1.0).abs() < 1e-12);
    }

    #[test]
    fn st_dev_clamps_negative_variance() {
        // Cancellation can push the variance fractionally below zero.
        assert_eq!(st_dev(2, 2.0, 1.9999999999999998), 0.0);
    }

    #[test]
    fn sd_for_split_falls_back_to_parent_for_tiny_sides() {
        let total = (st_dev(4, 10.0, 30.0), 10.0, 30.0);
        // LE side of one row: fall back to the parent deviation.
        let sd = sd_for_split(1.0, 1.0, 1, total.1, total.2, 4).unwrap();
        assert!((sd - total.0).abs() < 1e-12);
    }

    #[test]
    fn numeric_split_separable_classes() {
        // Column 0 is the attribute, column 1 the categorical target.
        let columns = vec![numbers(&[1.0, 2.0, 3.0, 10.0, 11.0, 12.0]), levels(&[0, 0, 0, 1, 1, 1])];
        let value_types = vec![ValueType::Numeric, ValueType::Categorical];
        let mut target_map = CategoryMap::new();
        target_map.find_or_insert("a");
        target_map.find_or_insert("b");
        let category_maps = vec![CategoryMap::new(), target_map];
        let sorted = vec![sorted_column_indices(&columns[0]), Vec::new()];
        let rows = SelectionSet::with_all(6, true);

        let best = best_numeric_split(0, 1, &rows, &columns, &value_types, &category_maps, &sorted)
            .unwrap()
            .expect("split expected");
        assert_eq!(best.value, Value::Number(6.5));
        assert!(best.measure.abs() < 1e-12);
    }

    #[test]
    fn numeric_split_constant_column_finds_nothing() {
        let columns = vec![numbers(&[5.0, 5.0, 5.0, 5.0]), levels(&[0, 0, 1, 1])];
        let value_types = vec![ValueType::Numeric, ValueType::Categorical];
        let mut target_map = CategoryMap::new();
        target_map.find_or_insert("a");
        target_map.find_or_insert("b");
        let category_maps = vec![CategoryMap::new(), target_map];
        let sorted = vec![sorted_column_indices(&columns[0]), Vec::new()];
        let rows = SelectionSet::with_all(4, true);

        let best = best_numeric_split(0, 1, &rows, &columns, &value_types, &category_maps, &sorted)
            .unwrap();
        assert!(best.is_none());
    }

    #[test]
    fn numeric_split_numeric_target() {
        let columns = vec![
            numbers(&[1.0, 2.0, 3.0, 4.0]),
            numbers(&[10.0, 10.0, 20.0, 20.0]),
        ];
        let value_types = vec![ValueType::Numeric, ValueType::Numeric];
        let category_maps = vec![CategoryMap::new(), CategoryMap::new()];
        let sorted = vec![sorted_column_indices(&columns[0]), Vec::new()];
        let rows = SelectionSet::with_all(4, true);

        let best = best_numeric_split(0, 1, &rows, &columns, &value_types, &category_maps, &sorted)
            .unwrap()
            .expect("split expected");
        assert_eq!(best.value, Value::Number(2.5));
        assert!(best.measure.abs() < 1e-12);
    }

    #[test]
    fn numeric_split_errors_on_unimputed_na() {
        let columns = vec![
            vec![Value::Number(1.0), Value::Na, Value::Number(3.0)],
            levels(&[0, 1, 0]),
        ];
        let value_types = vec![ValueType::Numeric, ValueType::Categorical];
        let mut target_map = CategoryMap::new();
        target_map.find_or_insert("a");
        target_map.find_or_insert("b");
        let category_maps = vec![CategoryMap::new(), target_map];
        let sorted = vec![sorted_column_indices(&columns[0]), Vec::new()];
        let rows = SelectionSet::with_all(3, true);

        let err = best_numeric_split(0, 1, &rows, &columns, &value_types, &category_maps, &sorted)
            .unwrap_err();
        assert!(matches!(err, TreesError::UnimputedNa { column: 0 }));
    }

    #[test]
    fn categorical_split_entropy_target() {
        // Level 0 rows are all class 0, level 1 rows all class 1.
        let columns = vec![levels(&[0, 0, 1, 1]), levels(&[0, 0, 1, 1])];
        let value_types = vec![ValueType::Categorical, ValueType::Categorical];
        let mut col_map = CategoryMap::new();
        col_map.find_or_insert("p");
        col_map.find_or_insert("q");
        let mut target_map = CategoryMap::new();
        target_map.find_or_insert("x");
        target_map.find_or_insert("y");
        let category_maps = vec![col_map, target_map];
        let sorted =
            vec![sorted_column_indices(&columns[0]), Vec::new()];
        let rows = SelectionSet::with_all(4, true);

        let best =
            best_categorical_split(0, 1, &rows, &columns, &value_types, &category_maps, &sorted)
                .unwrap()
                .expect("split expected");
        assert!(best.measure.abs() < 1e-12);
        // Both levels separate perfectly; "p" wins the name tie-break.
        assert_eq!(best.value, Value::Level(0));
    }

    #[test]
    fn categorical_split_single_level_is_rejected_by_measure() {
        // One level only: the lone candidate leaves everything on one side,
        // so its measure equals the node entropy and cannot improve.
        let columns = vec![levels(&[0, 0, 0]), levels(&[0, 1, 0])];
        let value_types = vec![ValueType::Categorical, ValueType::Categorical];
        let mut col_map = CategoryMap::new();
        col_map.find_or_insert("only");
        let mut target_map = CategoryMap::new();
        target_map.find_or_insert("x");
        target_map.find_or_insert("y");
        let category_maps = vec![col_map, target_map];
        let sorted =
            vec![sorted_column_indices(&columns[0]), Vec::new()];
        let rows = SelectionSet::with_all(3, true);

        let best =
            best_categorical_split(0, 1, &rows, &columns, &value_types, &category_maps, &sorted)
                .unwrap()
                .expect("candidate expected");
        let node_entropy = entropy_for_counts(&[2, 1]);
        assert!((best.measure - node_entropy).abs() < 1e-12);
    }

    #[test]
    fn categorical_split_numeric_target() {
        // Level 1 rows have mean 100, the rest mean 1.
        let columns = vec![levels(&[0, 1, 0, 1, 2, 2]), numbers(&[1.0, 99.0, 1.2, 101.0, 0.9, 1.1])];
        let value_types = vec![ValueType::Categorical, ValueType::Numeric];
        let mut col_map = CategoryMap::new();
        col_map.find_or_insert("a");
        col_map.find_or_insert("b");
        col_map.find_or_insert("c");
        let category_maps = vec![col_map, CategoryMap::new()];
        let sorted =
            vec![sorted_column_indices(&columns[0]), Vec::new()];
        let rows = SelectionSet::with_all(6, true);

        let best =
            best_categorical_split(0, 1, &rows, &columns, &value_types, &category_maps, &sorted)
                .unwrap()
                .expect("split expected");
        assert_eq!(best.value, Value::Level(1));
    }

    #[test]
    fn categorical_split_fewer_than_two_levels_finds_nothing() {
        let columns = vec![levels(&[0, 0]), numbers(&[1.0, 2.0])];
        let value_types = vec![ValueType::Categorical, ValueType::Numeric];
        let mut col_map = CategoryMap::new();
        col_map.find_or_insert("only");
        let category_maps = vec![col_map, CategoryMap::new()];
        let sorted =
            vec![sorted_column_indices(&columns[0]), Vec::new()];
        let rows = SelectionSet::with_all(2, true);

        let best =
            best_categorical_split(0, 1, &rows, &columns, &value_types, &category_maps, &sorted)
                .unwrap();
        assert!(best.is_none());
    }
}
