//! Sorted-index tables over value columns.

use crate::selection::SelectionSet;
use crate::value::Value;

/// Sort row indices of one column in ascending value order.
///
/// NA rows sort to the beginning; equal values keep ascending row order.
#[must_use]
pub fn sorted_column_indices(column: &[Value]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..column.len()).collect();
    indices.sort_unstable_by(|&i, &j| column[i].sort_cmp(column[j]).then(i.cmp(&j)));
    indices
}

/// Build the per-column sorted-index tables for every selected column.
///
/// Unselected columns get an empty table. Tables always cover the full row
/// domain; restricting a sort to a row selection is not supported.
#[must_use]
pub fn make_sorted_indexes(
    columns: &[Vec<Value>],
    select_columns: &SelectionSet,
) -> Vec<Vec<usize>> {
    let selected = select_columns.bits();
    columns
        .iter()
        .enumerate()
        .map(|(col, values)| {
            if selected[col] { sorted_column_indices(values) } else { Vec::new() }
        })
        .collect()
}
