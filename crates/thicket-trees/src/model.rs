//! The trained ensemble model.

use crate::category::CategoryMap;
use crate::compact::CompactTree;
use crate::error::TreesError;
use crate::impute::ImputeOption;
use crate::value::ValueType;

/// A trained ensemble: everything prediction and serialization need.
///
/// Column-indexed vectors cover the full training width, target column
/// included. `select_columns` lists the raw column numbers that survived
/// the constant-column filter, in selection order; tree nodes refer to
/// positions in this list, never to raw column numbers.
#[derive(Debug, Clone)]
pub struct Model {
    /// Value type per column, target included.
    pub value_types: Vec<ValueType>,
    /// Category map per column; numeric columns have an empty one.
    pub category_maps: Vec<CategoryMap>,
    /// Raw index of the target column.
    pub target_column: usize,
    /// Raw column numbers trees may split on, in selection order.
    pub select_columns: Vec<usize>,
    /// Impute option per column as resolved at training time.
    pub impute_options: Vec<ImputeOption>,
    /// The compacted trees of the ensemble.
    pub trees: Vec<CompactTree>,
    /// Column names, target included.
    pub col_names: Vec<String>,
}

impl Model {
    /// Number of columns, target included.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.value_types.len()
    }

    /// Number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Check the model's cross-references; deserialized models go through
    /// this before prediction.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreesError::ShapeMismatch`] | per-column vectors disagree |
    /// | [`TreesError::TargetColumnOutOfRange`] | target outside the width |
    /// | [`TreesError::UnknownSplitColumn`] | tree names a bad column |
    /// | [`TreesError::CorruptTree`] | half-linked node or bad child index |
    pub fn validate(&self) -> Result<(), TreesError> {
        let n_columns = self.n_columns();
        let check = |what: &'static str, got: usize| {
            if got == n_columns {
                Ok(())
            } else {
                Err(TreesError::ShapeMismatch { what, expected: n_columns, got })
            }
        };
        check("categoryMaps", self.category_maps.len())?;
        check("imputeOptions", self.impute_options.len())?;
        check("colNames", self.col_names.len())?;

        if self.target_column >= n_columns {
            return Err(TreesError::TargetColumnOutOfRange {
                target_column: self.target_column,
                n_columns,
            });
        }
        for &col in &self.select_columns {
            if col >= n_columns {
                return Err(TreesError::InvalidAvailableColumn { column: col, n_columns });
            }
        }

        for tree in &self.trees {
            let n_nodes = tree.len();
            if tree.split_col_index.len() != n_nodes
                || tree.less_or_equal.len() != n_nodes
                || tree.greater_or_not.len() != n_nodes
                || tree.to_less_or_equal_if_na.len() != n_nodes
            {
                return Err(TreesError::CorruptTree { detail: "node arrays differ in length" });
            }
            for node in 0..n_nodes {
                match (tree.less_or_equal[node], tree.greater_or_not[node]) {
                    (None, None) => {}
                    (Some(le), Some(gn)) => {
                        if le >= n_nodes || gn >= n_nodes {
                            return Err(TreesError::CorruptTree {
                                detail: "child index out of range",
                            });
                        }
                        let Some(index) = tree.split_col_index[node] else {
                            return Err(TreesError::CorruptTree {
                                detail: "split node without a split column",
                            });
                        };
                        if index >= self.select_columns.len() {
                            return Err(TreesError::UnknownSplitColumn {
                                index,
                                n_select_columns: self.select_columns.len(),
                            });
                        }
                    }
                    _ => {
                        return Err(TreesError::CorruptTree {
                            detail: "node with exactly one child",
                        });
                    }
                }
            }
        }
        Ok(())
    }
}
