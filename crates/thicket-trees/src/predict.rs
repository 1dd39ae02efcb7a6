//! Routing rows through trees and aggregating the ensemble's answers.

use tracing::debug;

use crate::compact::CompactTree;
use crate::error::TreesError;
use crate::model::Model;
use crate::selection::SelectionSet;
use crate::value::{Value, ValueType};

impl Model {
    /// Predict the target for every selected row.
    ///
    /// `columns` must have the model's full training width; the entry at
    /// the target column is ignored. Missing attribute values follow each
    /// node's NA branch; unknown levels should already have been mapped to
    /// NA when the input was converted against the model's category maps.
    ///
    /// Returns one value per row of the input; rows outside the selection
    /// stay NA. Categorical targets take the majority vote across trees
    /// (ties to the lexicographically earliest level name); numeric
    /// targets average the per-tree predictions.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreesError::PredictionShapeMismatch`] | wrong input width |
    /// | [`TreesError::EmptyEnsemble`] | the model holds no trees |
    /// | [`TreesError::UnknownSplitColumn`], [`TreesError::CorruptTree`] | inconsistent model |
    pub fn predict(
        &self,
        columns: &[Vec<Value>],
        select_rows: &SelectionSet,
    ) -> Result<Vec<Value>, TreesError> {
        if columns.len() != self.n_columns() {
            return Err(TreesError::PredictionShapeMismatch {
                expected: self.n_columns(),
                got: columns.len(),
            });
        }
        if self.trees.is_empty() {
            return Err(TreesError::EmptyEnsemble);
        }
        let n_rows = columns.first().map_or(0, Vec::len);
        debug!(n_rows, n_trees = self.trees.len(), "predicting");

        let mut predictions = vec![Value::Na; n_rows];

        match self.value_types[self.target_column] {
            ValueType::Categorical => {
                let target_map = &self.category_maps[self.target_column];
                let begin = target_map.begin_index();
                let n_levels = target_map.count_all();

                // Tally how often each level is predicted for each row.
                let mut counts = vec![vec![0usize; n_levels]; n_rows];
                let mut one_tree = vec![Value::Na; n_rows];
                for tree in &self.trees {
                    self.predict_tree(tree, columns, select_rows, &mut one_tree)?;
                    for &row in select_rows.indices() {
                        let level = one_tree[row].level().ok_or(TreesError::CorruptTree {
                            detail: "categorical tree produced a non-level value",
                        })?;
                        counts[row][(level - begin) as usize] += 1;
                    }
                }

                for &row in select_rows.indices() {
                    let mut max_count = 0usize;
                    for level in begin..target_map.end_index() {
                        let count = counts[row][(level - begin) as usize];
                        if max_count < count {
                            predictions[row] = Value::Level(level);
                            max_count = count;
                        } else if count > 0 && max_count == count {
                            // Equal votes: the earlier name wins, so the
                            // result is independent of level order.
                            let current = predictions[row]
                                .level()
                                .ok_or(TreesError::Internal { detail: "vote without a winner" })?;
                            let name = target_map.name_for(level).ok_or(
                                TreesError::LevelOutOfRange { level, column: self.target_column },
                            )?;
                            let current_name = target_map.name_for(current).ok_or(
                                TreesError::LevelOutOfRange {
                                    level: current,
                                    column: self.target_column,
                                },
                            )?;
                            if name < current_name {
                                predictions[row] = Value::Level(level);
                            }
                        }
                    }
                }
            }

            ValueType::Numeric => {
                let mut sums = vec![0.0f64; n_rows];
                let mut one_tree = vec![Value::Na; n_rows];
                for tree in &self.trees {
                    self.predict_tree(tree, columns, select_rows, &mut one_tree)?;
                    for &row in select_rows.indices() {
                        sums[row] += one_tree[row].number().ok_or(TreesError::CorruptTree {
                            detail: "numeric tree produced a non-numeric value",
                        })?;
                    }
                }
                for &row in select_rows.indices() {
                    predictions[row] = Value::Number(sums[row] / self.trees.len() as f64);
                }
            }
        }

        Ok(predictions)
    }

    /// Route every selected row through one tree, writing the reached leaf
    /// value into `out` (rows outside the selection are left untouched).
    fn predict_tree(
        &self,
        tree: &CompactTree,
        columns: &[Vec<Value>],
        select_rows: &SelectionSet,
        out: &mut [Value],
    ) -> Result<(), TreesError> {
        for &row in select_rows.indices() {
            let mut node = 0usize;
            while let Some(less_or_equal) = tree
                .less_or_equal
                .get(node)
                .copied()
                .ok_or(TreesError::CorruptTree { detail: "node index out of range" })?
            {
                let index = tree.split_col_index[node]
                    .ok_or(TreesError::CorruptTree { detail: "split node without a split column" })?;
                let col = *self.select_columns.get(index).ok_or(
                    TreesError::UnknownSplitColumn {
                        index,
                        n_select_columns: self.select_columns.len(),
                    },
                )?;

                let take_less_or_equal = match columns[col][row] {
                    Value::Na => tree.to_less_or_equal_if_na[node],
                    Value::Number(value) => {
                        let threshold = tree.value[node].number().ok_or(
                            TreesError::CorruptTree { detail: "numeric split without threshold" },
                        )?;
                        value <= threshold
                    }
                    Value::Level(level) => {
                        let split_level = tree.value[node].level().ok_or(
                            TreesError::CorruptTree { detail: "level split without level" },
                        )?;
                        level == split_level
                    }
                };

                node = if take_less_or_equal {
                    less_or_equal
                } else {
                    tree.greater_or_not[node]
                        .ok_or(TreesError::CorruptTree { detail: "node with exactly one child" })?
                };
            }
            out[row] = tree.value[node];
        }
        Ok(())
    }
}
