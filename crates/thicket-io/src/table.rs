//! Conversion between CSV cell grids and typed value columns.

use thicket_trees::{CategoryMap, ImputeOption, Value, ValueType};

use crate::csv::Cell;
use crate::error::IoError;

/// Infer a value type per column: numeric iff every non-empty cell that is
/// not an unquoted NA token parses as a number. Quotation does not force a
/// column categorical on its own; a quoted `"5"` still reads as numeric.
#[must_use]
pub fn default_value_types(
    rows: &[Vec<Cell>],
    interpret_na: bool,
    na_string: &str,
) -> Vec<ValueType> {
    let n_cols = rows.first().map_or(0, Vec::len);
    let mut value_types = Vec::with_capacity(n_cols);
    for col in 0..n_cols {
        let mut value_type = ValueType::Numeric;
        for row in rows {
            let cell = &row[col];
            if cell.text.is_empty() {
                continue;
            }
            if interpret_na && cell.text == na_string && !cell.quoted {
                continue;
            }
            if cell.text.parse::<f64>().is_err() {
                value_type = ValueType::Categorical;
                break;
            }
        }
        value_types.push(value_type);
    }
    value_types
}

/// Convert a row-major cell grid into column-major typed values.
///
/// An unquoted cell equal to `na_string` (when `interpret_na` is on) or an
/// unquoted empty cell is NA. For categorical columns, unknown level names
/// are inserted into the column's map, unless `const_categories` is set,
/// in which case they become NA (the prediction-time rule for levels never
/// seen in training). `category_maps` is extended with empty maps up to
/// the column count.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::ShapeMismatch`] | `value_types` or constant maps disagree with the width |
/// | [`IoError::RaggedRow`] | a row is shorter than the header |
pub fn cells_to_values(
    rows: &[Vec<Cell>],
    value_types: &[ValueType],
    interpret_na: bool,
    na_string: &str,
    const_categories: bool,
    category_maps: &mut Vec<CategoryMap>,
) -> Result<Vec<Vec<Value>>, IoError> {
    let n_cols = rows.first().map_or(0, Vec::len);
    if value_types.len() != n_cols {
        return Err(IoError::ShapeMismatch {
            what: "valueTypes",
            expected: n_cols,
            got: value_types.len(),
        });
    }
    if const_categories && category_maps.len() != n_cols {
        return Err(IoError::ShapeMismatch {
            what: "categoryMaps",
            expected: n_cols,
            got: category_maps.len(),
        });
    }
    for (row, cells) in rows.iter().enumerate() {
        if cells.len() != n_cols {
            return Err(IoError::RaggedRow { row, expected: n_cols, got: cells.len() });
        }
    }

    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(n_cols);
    for col in 0..n_cols {
        if category_maps.len() <= col {
            category_maps.push(CategoryMap::new());
        }
        let map = &mut category_maps[col];
        let mut values = Vec::with_capacity(rows.len());

        for row in rows {
            let cell = &row[col];
            let is_na = (interpret_na && cell.text == na_string && !cell.quoted)
                || (cell.text.is_empty() && !cell.quoted);

            let value = if is_na {
                Value::Na
            } else {
                match value_types[col] {
                    ValueType::Numeric => {
                        cell.text.parse::<f64>().map_or(Value::Na, Value::Number)
                    }
                    ValueType::Categorical => match map.index_for(&cell.text) {
                        Some(index) => Value::Level(index),
                        None if const_categories => Value::Na,
                        None => Value::Level(map.find_or_insert(&cell.text)),
                    },
                }
            };
            values.push(value);
        }
        columns.push(values);
    }
    Ok(columns)
}

/// Convert column-major typed values back into a row-major cell grid.
///
/// Numbers are written in the canonical `%.8f` format; level names are
/// written as quoted cells. NA cells (and level indices with no name) are
/// written as the NA string when `write_na` is set, else left empty.
///
/// # Errors
///
/// Returns [`IoError::ShapeMismatch`] when the per-column vectors disagree.
pub fn values_to_cells(
    columns: &[Vec<Value>],
    value_types: &[ValueType],
    category_maps: &[CategoryMap],
    write_na: bool,
    na_string: &str,
) -> Result<Vec<Vec<Cell>>, IoError> {
    let n_cols = columns.len();
    if value_types.len() != n_cols {
        return Err(IoError::ShapeMismatch {
            what: "valueTypes",
            expected: n_cols,
            got: value_types.len(),
        });
    }
    if category_maps.len() != n_cols {
        return Err(IoError::ShapeMismatch {
            what: "categoryMaps",
            expected: n_cols,
            got: category_maps.len(),
        });
    }

    let n_rows = columns.first().map_or(0, Vec::len);
    let na_cell = || if write_na { Cell::plain(na_string) } else { Cell::plain("") };

    let mut rows = vec![Vec::with_capacity(n_cols); n_rows];
    for col in 0..n_cols {
        for (row, cells) in rows.iter_mut().enumerate() {
            let cell = match columns[col][row] {
                Value::Na => na_cell(),
                Value::Number(value) => Cell::plain(format!("{value:.8}")),
                Value::Level(level) => match category_maps[col].name_for(level) {
                    Some(name) => Cell::quoted(name),
                    None => na_cell(),
                },
            };
            cells.push(cell);
        }
    }
    Ok(rows)
}

/// Parse a value-type name; any prefix starting `c` or `n` is accepted,
/// case-insensitively.
///
/// # Errors
///
/// Returns [`IoError::UnknownValueType`] for anything else.
pub fn parse_value_type(name: &str) -> Result<ValueType, IoError> {
    let lower = name.to_lowercase();
    if lower.starts_with('c') {
        Ok(ValueType::Categorical)
    } else if lower.starts_with('n') {
        Ok(ValueType::Numeric)
    } else {
        Err(IoError::UnknownValueType { name: name.to_string() })
    }
}

/// Parse an impute-option name against the column's type. Prefix matching
/// follows the option files' conventions: `c…` category, `mo…` mode,
/// `mea…` mean, `med…` median, `d…` default, `no…` none.
///
/// # Errors
///
/// Returns [`IoError::UnknownImputeOption`] when the name is not
/// recognized for the given type.
pub fn parse_impute_option(name: &str, value_type: ValueType) -> Result<ImputeOption, IoError> {
    let lower = name.to_lowercase();
    let unknown = || IoError::UnknownImputeOption { name: name.to_string() };
    match value_type {
        ValueType::Categorical => {
            if lower.starts_with('c') {
                Ok(ImputeOption::ToCategory)
            } else if lower.starts_with("mo") {
                Ok(ImputeOption::ToMode)
            } else if lower.starts_with('d') {
                Ok(ImputeOption::Default)
            } else if lower.starts_with("no") {
                Ok(ImputeOption::None)
            } else {
                Err(unknown())
            }
        }
        ValueType::Numeric => {
            if lower.starts_with("mea") {
                Ok(ImputeOption::ToMean)
            } else if lower.starts_with("med") {
                Ok(ImputeOption::ToMedian)
            } else if lower.starts_with('d') {
                Ok(ImputeOption::Default)
            } else if lower.starts_with("no") {
                Ok(ImputeOption::None)
            } else {
                Err(unknown())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[(&str, bool)]]) -> Vec<Vec<Cell>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|&(text, quoted)| Cell { text: text.to_string(), quoted })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn type_inference() {
        let rows = grid(&[
            &[("1", false), ("A", false), ("NA", false)],
            &[("2.5", false), ("7", false), ("1", false)],
        ]);
        let types = default_value_types(&rows, true, "NA");
        assert_eq!(types, vec![ValueType::Numeric, ValueType::Categorical, ValueType::Numeric]);
    }

    #[test]
    fn quoted_na_token_is_not_na() {
        let rows = grid(&[&[("NA", true)], &[("xyz", false)]]);
        let types = default_value_types(&rows, true, "NA");
        assert_eq!(types, vec![ValueType::Categorical]);

        let mut maps = Vec::new();
        let columns = cells_to_values(&rows, &types, true, "NA", false, &mut maps).unwrap();
        assert_eq!(columns[0][0], Value::Level(0));
        assert_eq!(maps[0].name_for(0), Some("NA"));
    }

    #[test]
    fn numeric_and_na_conversion() {
        let rows = grid(&[&[("1.5", false)], &[("NA", false)], &[("", false)], &[("junk", false)]]);
        let mut maps = Vec::new();
        let columns =
            cells_to_values(&rows, &[ValueType::Numeric], true, "NA", false, &mut maps).unwrap();
        assert_eq!(columns[0][0], Value::Number(1.5));
        assert!(columns[0][1].is_na());
        assert!(columns[0][2].is_na());
        // Unparseable numeric text degrades to NA rather than aborting.
        assert!(columns[0][3].is_na());
    }

    #[test]
    fn categorical_levels_insert_in_row_order() {
        let rows = grid(&[&[("blue", false)], &[("red", false)], &[("blue", false)]]);
        let mut maps = Vec::new();
        let columns =
            cells_to_values(&rows, &[ValueType::Categorical], true, "NA", false, &mut maps)
                .unwrap();
        assert_eq!(columns[0], vec![Value::Level(0), Value::Level(1), Value::Level(0)]);
        assert_eq!(maps[0].name_for(0), Some("blue"));
        assert_eq!(maps[0].name_for(1), Some("red"));
    }

    #[test]
    fn constant_categories_map_unknown_to_na() {
        let mut maps = vec![CategoryMap::new()];
        maps[0].find_or_insert("blue");
        let rows = grid(&[&[("blue", false)], &[("green", false)]]);
        let columns =
            cells_to_values(&rows, &[ValueType::Categorical], true, "NA", true, &mut maps)
                .unwrap();
        assert_eq!(columns[0][0], Value::Level(0));
        assert!(columns[0][1].is_na());
        assert_eq!(maps[0].count_named(), 1, "constant maps must not grow");
    }

    #[test]
    fn ragged_row_rejected() {
        let rows = vec![
            vec![Cell::plain("1"), Cell::plain("2")],
            vec![Cell::plain("1")],
        ];
        let err = cells_to_values(
            &rows,
            &[ValueType::Numeric, ValueType::Numeric],
            true,
            "NA",
            false,
            &mut Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, IoError::RaggedRow { row: 1, .. }));
    }

    #[test]
    fn values_round_trip_through_cells() {
        let mut map = CategoryMap::new();
        map.find_or_insert("left");
        map.find_or_insert("right");
        let columns = vec![
            vec![Value::Number(1.25), Value::Na],
            vec![Value::Level(1), Value::Level(0)],
        ];
        let types = vec![ValueType::Numeric, ValueType::Categorical];
        let maps = vec![CategoryMap::new(), map];

        let cells = values_to_cells(&columns, &types, &maps, true, "NA").unwrap();
        assert_eq!(cells[0][0], Cell::plain("1.25000000"));
        assert_eq!(cells[0][1], Cell::quoted("right"));
        assert_eq!(cells[1][0], Cell::plain("NA"));
        assert_eq!(cells[1][1], Cell::quoted("left"));

        let mut parsed_maps = maps.clone();
        let parsed = cells_to_values(&cells, &types, true, "NA", true, &mut parsed_maps).unwrap();
        assert_eq!(parsed[0][0], Value::Number(1.25));
        assert!(parsed[0][1].is_na());
        assert_eq!(parsed[1], columns[1]);
    }

    #[test]
    fn numeric_output_rounds_half_to_even_at_eight_digits() {
        let columns = vec![vec![Value::Number(3.14159265358979)]];
        let cells = values_to_cells(
            &columns,
            &[ValueType::Numeric],
            &[CategoryMap::new()],
            true,
            "NA",
        )
        .unwrap();
        assert_eq!(cells[0][0], Cell::plain("3.14159265"));
    }

    #[test]
    fn value_type_names() {
        assert_eq!(parse_value_type("categorical").unwrap(), ValueType::Categorical);
        assert_eq!(parse_value_type("N").unwrap(), ValueType::Numeric);
        assert_eq!(parse_value_type("num").unwrap(), ValueType::Numeric);
        assert!(matches!(
            parse_value_type("ordinal").unwrap_err(),
            IoError::UnknownValueType { .. }
        ));
    }

    #[test]
    fn impute_option_names() {
        assert_eq!(
            parse_impute_option("category", ValueType::Categorical).unwrap(),
            ImputeOption::ToCategory
        );
        assert_eq!(
            parse_impute_option("mode", ValueType::Categorical).unwrap(),
            ImputeOption::ToMode
        );
        assert_eq!(parse_impute_option("mean", ValueType::Numeric).unwrap(), ImputeOption::ToMean);
        assert_eq!(
            parse_impute_option("median", ValueType::Numeric).unwrap(),
            ImputeOption::ToMedian
        );
        assert_eq!(
            parse_impute_option("default", ValueType::Numeric).unwrap(),
            ImputeOption::Default
        );
        assert_eq!(parse_impute_option("none", ValueType::Categorical).unwrap(), ImputeOption::None);
        // Mode is not a numeric option, mean not a categorical one.
        assert!(parse_impute_option("mode", ValueType::Numeric).is_err());
        assert!(parse_impute_option("mean", ValueType::Categorical).is_err());
    }
}
