//! Comparison helpers for checking predictions against reference values.

use crate::error::TreesError;
use crate::selection::SelectionSet;
use crate::value::Value;

/// Fraction of selected rows where two categorical columns agree,
/// measured against the full column length.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`TreesError::ShapeMismatch`] | columns differ in length |
/// | [`TreesError::EmptyDataset`] | columns are empty |
/// | [`TreesError::UnimputedNa`] | either column holds NA in a selected row |
pub fn compare_match(
    values1: &[Value],
    values2: &[Value],
    select_rows: &SelectionSet,
) -> Result<f64, TreesError> {
    if values1.len() != values2.len() {
        return Err(TreesError::ShapeMismatch {
            what: "comparison columns",
            expected: values1.len(),
            got: values2.len(),
        });
    }
    if values1.is_empty() {
        return Err(TreesError::EmptyDataset);
    }

    let mut matches = 0usize;
    for &row in select_rows.indices() {
        let left = values1[row].level().ok_or(TreesError::UnimputedNa { column: 0 })?;
        let right = values2[row].level().ok_or(TreesError::UnimputedNa { column: 1 })?;
        if left == right {
            matches += 1;
        }
    }
    Ok(matches as f64 / values1.len() as f64)
}

/// Root-mean-square difference between two numeric columns over the
/// selected rows.
///
/// # Errors
///
/// Same conditions as [`compare_match`].
pub fn compare_rms(
    values1: &[Value],
    values2: &[Value],
    select_rows: &SelectionSet,
) -> Result<f64, TreesError> {
    if values1.len() != values2.len() {
        return Err(TreesError::ShapeMismatch {
            what: "comparison columns",
            expected: values1.len(),
            got: values2.len(),
        });
    }
    if values1.is_empty() {
        return Err(TreesError::EmptyDataset);
    }

    let mut sum2 = 0.0;
    for &row in select_rows.indices() {
        let left = values1[row].number().ok_or(TreesError::UnimputedNa { column: 0 })?;
        let right = values2[row].number().ok_or(TreesError::UnimputedNa { column: 1 })?;
        let delta = left - right;
        sum2 += delta * delta;
    }
    Ok((sum2 / select_rows.count() as f64).sqrt())
}
