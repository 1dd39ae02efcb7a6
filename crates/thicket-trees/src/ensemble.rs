//! The ensemble driver: column selection, imputation, subsets, and the
//! per-subset build/prune/compact loop.

use tracing::{debug, info, instrument};

use crate::category::CategoryMap;
use crate::compact::CompactTree;
use crate::config::TrainConfig;
use crate::error::TreesError;
use crate::impute::{ImputeOption, impute_values};
use crate::model::Model;
use crate::prune::prune_tree;
use crate::selection::SelectionSet;
use crate::sort::make_sorted_indexes;
use crate::subsets::make_column_subsets;
use crate::tree::{BuildContext, grow_tree};
use crate::value::{Value, ValueType};

/// A column-major rectangular table of values with its column metadata.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<Vec<Value>>,
    value_types: Vec<ValueType>,
    category_maps: Vec<CategoryMap>,
    col_names: Vec<String>,
}

impl Dataset {
    /// Assemble a dataset, checking that the table is rectangular and the
    /// per-column vectors line up.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreesError::EmptyDataset`] | zero columns or zero rows |
    /// | [`TreesError::ColumnLengthMismatch`] | ragged columns |
    /// | [`TreesError::ShapeMismatch`] | metadata vectors disagree |
    pub fn new(
        columns: Vec<Vec<Value>>,
        value_types: Vec<ValueType>,
        category_maps: Vec<CategoryMap>,
        col_names: Vec<String>,
    ) -> Result<Self, TreesError> {
        if columns.is_empty() || columns[0].is_empty() {
            return Err(TreesError::EmptyDataset);
        }
        let n_rows = columns[0].len();
        for (column, values) in columns.iter().enumerate() {
            if values.len() != n_rows {
                return Err(TreesError::ColumnLengthMismatch {
                    column,
                    expected: n_rows,
                    got: values.len(),
                });
            }
        }
        let n_cols = columns.len();
        let check = |what: &'static str, got: usize| {
            if got == n_cols {
                Ok(())
            } else {
                Err(TreesError::ShapeMismatch { what, expected: n_cols, got })
            }
        };
        check("valueTypes", value_types.len())?;
        check("categoryMaps", category_maps.len())?;
        check("colNames", col_names.len())?;

        Ok(Self { columns, value_types, category_maps, col_names })
    }

    /// Number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.columns[0].len()
    }

    /// Number of columns.
    #[must_use]
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// The value columns.
    #[must_use]
    pub fn columns(&self) -> &[Vec<Value>] {
        &self.columns
    }

    /// Per-column value types.
    #[must_use]
    pub fn value_types(&self) -> &[ValueType] {
        &self.value_types
    }

    /// Per-column category maps.
    #[must_use]
    pub fn category_maps(&self) -> &[CategoryMap] {
        &self.category_maps
    }

    /// Column names.
    #[must_use]
    pub fn col_names(&self) -> &[String] {
        &self.col_names
    }
}

/// Counts describing a finished training run.
#[derive(Debug, Clone, Copy)]
pub struct TrainingMetadata {
    /// Columns per tree after auto-selection and clamping.
    pub columns_per_tree: usize,
    /// Number of candidate columns that survived the constant filter.
    pub n_selected_columns: usize,
    /// Number of column subsets generated.
    pub n_subsets: usize,
    /// Trees kept after the minimum-depth rule.
    pub n_trees: usize,
    /// Rows trained on (non-NA target).
    pub n_rows: usize,
}

/// A trained model together with run statistics.
#[derive(Debug, Clone)]
pub struct TrainResult {
    model: Model,
    metadata: TrainingMetadata,
}

impl TrainResult {
    /// Borrow the trained model.
    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Consume the result, keeping only the model.
    #[must_use]
    pub fn into_model(self) -> Model {
        self.model
    }

    /// Run statistics.
    #[must_use]
    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }
}

/// Train the ensemble. See [`TrainConfig::fit`] for the error table.
#[instrument(skip_all, fields(n_rows = data.n_rows(), n_columns = data.n_columns(), target_column))]
pub(crate) fn train(
    config: &TrainConfig,
    mut data: Dataset,
    target_column: usize,
    cancel: &mut dyn FnMut() -> bool,
) -> Result<TrainResult, TreesError> {
    let n_cols = data.n_columns();
    let n_rows = data.n_rows();

    // --- Validate config ---
    if config.max_trees == 0 {
        return Err(TreesError::InvalidMaxTrees { max_trees: 0 });
    }
    if config.max_depth == 0 {
        return Err(TreesError::InvalidMaxDepth { max_depth: 0 });
    }
    if config.min_leaf_count == 0 {
        return Err(TreesError::InvalidMinLeafCount { min_leaf_count: 0 });
    }
    if target_column >= n_cols {
        return Err(TreesError::TargetColumnOutOfRange { target_column, n_columns: n_cols });
    }

    // --- Candidate columns ---
    let mut available = SelectionSet::with_all(n_cols, false);
    match &config.available_columns {
        Some(columns) => {
            for &col in columns {
                if col >= n_cols || col == target_column {
                    return Err(TreesError::InvalidAvailableColumn { column: col, n_columns: n_cols });
                }
                available.select(col);
            }
        }
        None => {
            for col in 0..n_cols {
                if col != target_column {
                    available.select(col);
                }
            }
        }
    }

    // --- Impute options, defaults resolved ---
    let mut impute_options = match &config.impute_options {
        Some(options) => {
            if options.len() != n_cols {
                return Err(TreesError::ShapeMismatch {
                    what: "imputeOptions",
                    expected: n_cols,
                    got: options.len(),
                });
            }
            options.clone()
        }
        None => {
            let mut options = vec![ImputeOption::Default; n_cols];
            options[target_column] = ImputeOption::None;
            options
        }
    };
    for col in 0..n_cols {
        impute_options[col] = impute_options[col].resolve(data.value_types[col]);
    }

    // --- Rows: train only where the target is present ---
    let mut select_rows = SelectionSet::with_all(n_rows, false);
    for row in 0..n_rows {
        if !data.columns[target_column][row].is_na() {
            select_rows.select(row);
        }
    }
    if select_rows.count() == 0 {
        return Err(TreesError::NoTrainableRows);
    }

    // --- Drop constant columns ---
    let mut select_columns_set = SelectionSet::with_all(n_cols, false);
    for &col in available.indices() {
        if column_varies(&data.columns[col], &select_rows) {
            select_columns_set.select(col);
        }
    }
    let select_columns: Vec<usize> = select_columns_set.indices().to_vec();
    let n_selected = select_columns.len();

    // --- Columns per tree ---
    let mut columns_per_tree = match config.columns_per_tree {
        Some(count) => count,
        None => match data.value_types[target_column] {
            ValueType::Categorical => (n_selected as f64).sqrt().ceil() as usize,
            ValueType::Numeric => (n_selected as f64 / 3.0).ceil() as usize,
        },
    };
    if columns_per_tree == 0 || n_selected == 0 {
        return Err(TreesError::NoUsefulColumns);
    }
    if columns_per_tree > n_selected {
        columns_per_tree = n_selected;
    }

    info!(
        n_selected,
        columns_per_tree,
        n_rows = select_rows.count(),
        max_trees = config.max_trees,
        prune = config.do_prune,
        "training ensemble"
    );

    // --- Sorted tables and imputation ---
    let mut sorted_indexes = make_sorted_indexes(&data.columns, &select_columns_set);
    let imputed_values = impute_values(
        &impute_options,
        &data.value_types,
        &mut data.columns,
        &select_rows,
        &select_columns_set,
        &mut data.category_maps,
        &mut sorted_indexes,
    )?;

    // --- Column subsets, one tree each ---
    let subsets = make_column_subsets(n_selected, columns_per_tree, config.max_trees)?;
    debug!(n_subsets = subsets.len(), "column subsets generated");

    let mut trees: Vec<CompactTree> = Vec::new();
    for (subset_index, subset) in subsets.iter().enumerate() {
        if cancel() {
            return Err(TreesError::Cancelled);
        }

        let mut ctx = BuildContext {
            columns: &data.columns,
            value_types: &data.value_types,
            category_maps: &data.category_maps,
            select_columns: &select_columns,
            subset,
            target_column,
            sorted_indexes: &sorted_indexes,
            imputed_values: &imputed_values,
            max_depth: config.max_depth,
            max_nodes: config.max_nodes,
            min_improvement: config.min_improvement,
            min_leaf_count: config.min_leaf_count,
            max_splits_per_numeric_attribute: config.max_splits_per_numeric_attribute,
            next_index: 0,
            max_depth_used: 1,
        };

        let mut arena = grow_tree(&mut ctx, &select_rows)?;
        if config.do_prune {
            prune_tree(&mut arena, 0, data.value_types[target_column])?;
        }

        if ctx.max_depth_used >= config.min_depth {
            trees.push(CompactTree::from_arena(&arena, 0));
        } else {
            debug!(subset_index, depth = ctx.max_depth_used, "tree below min_depth, dropped");
        }
    }

    info!(n_trees = trees.len(), n_subsets = subsets.len(), "training complete");

    let metadata = TrainingMetadata {
        columns_per_tree,
        n_selected_columns: n_selected,
        n_subsets: subsets.len(),
        n_trees: trees.len(),
        n_rows: select_rows.count(),
    };
    let model = Model {
        value_types: data.value_types,
        category_maps: data.category_maps,
        target_column,
        select_columns,
        impute_options,
        trees,
        col_names: data.col_names,
    };

    Ok(TrainResult { model, metadata })
}

/// Does the column take at least two distinct non-NA values over the
/// selected rows?
fn column_varies(column: &[Value], select_rows: &SelectionSet) -> bool {
    let mut first: Option<Value> = None;
    for &row in select_rows.indices() {
        let value = column[row];
        if value.is_na() {
            continue;
        }
        match first {
            None => first = Some(value),
            Some(seen) => {
                if seen != value {
                    return true;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn levels(vals: &[i64]) -> Vec<Value> {
        vals.iter().map(|&v| Value::Level(v)).collect()
    }

    fn numbers(vals: &[f64]) -> Vec<Value> {
        vals.iter().map(|&v| Value::Number(v)).collect()
    }

    fn label_map(names: &[&str]) -> CategoryMap {
        let mut map = CategoryMap::new();
        for name in names {
            map.find_or_insert(name);
        }
        map
    }

    /// Two informative numeric attributes, one constant attribute, and a
    /// two-level target.
    fn classification_dataset() -> Dataset {
        Dataset::new(
            vec![
                numbers(&[1.0, 2.0, 3.0, 10.0, 11.0, 12.0]),
                numbers(&[5.0, 5.0, 5.0, 5.0, 5.0, 5.0]),
                numbers(&[0.5, 0.1, 0.4, 0.9, 0.8, 0.7]),
                levels(&[0, 0, 0, 1, 1, 1]),
            ],
            vec![
                ValueType::Numeric,
                ValueType::Numeric,
                ValueType::Numeric,
                ValueType::Categorical,
            ],
            vec![
                CategoryMap::new(),
                CategoryMap::new(),
                CategoryMap::new(),
                label_map(&["n", "y"]),
            ],
            vec!["a".into(), "b".into(), "c".into(), "label".into()],
        )
        .unwrap()
    }

    #[test]
    fn dataset_rejects_ragged_columns() {
        let err = Dataset::new(
            vec![numbers(&[1.0, 2.0]), numbers(&[1.0])],
            vec![ValueType::Numeric, ValueType::Numeric],
            vec![CategoryMap::new(), CategoryMap::new()],
            vec!["a".into(), "b".into()],
        )
        .unwrap_err();
        assert!(matches!(err, TreesError::ColumnLengthMismatch { column: 1, .. }));
    }

    #[test]
    fn dataset_rejects_empty() {
        let err = Dataset::new(Vec::new(), Vec::new(), Vec::new(), Vec::new()).unwrap_err();
        assert!(matches!(err, TreesError::EmptyDataset));
    }

    #[test]
    fn constant_columns_are_dropped() {
        let config = TrainConfig::new().with_min_leaf_count(1);
        let result = config.fit(classification_dataset(), 3).unwrap();
        // Column 1 is constant; columns 0 and 2 survive.
        assert_eq!(result.model().select_columns, vec![0, 2]);
        assert_eq!(result.metadata().n_selected_columns, 2);
    }

    #[test]
    fn training_separable_data_predicts_itself() {
        let config = TrainConfig::new().with_min_leaf_count(1).with_prune(true);
        let data = classification_dataset();
        let columns = data.columns().to_vec();
        let result = config.fit(data, 3).unwrap();

        let rows = SelectionSet::with_all(6, true);
        let predictions = result.model().predict(&columns, &rows).unwrap();
        let expected = levels(&[0, 0, 0, 1, 1, 1]);
        assert_eq!(predictions, expected);
    }

    #[test]
    fn rows_with_na_target_are_excluded() {
        let mut columns = vec![
            numbers(&[1.0, 2.0, 3.0, 10.0, 11.0, 12.0]),
            levels(&[0, 0, 0, 1, 1, 1]),
        ];
        columns[1][2] = Value::Na;
        let data = Dataset::new(
            columns,
            vec![ValueType::Numeric, ValueType::Categorical],
            vec![CategoryMap::new(), label_map(&["n", "y"])],
            vec!["a".into(), "label".into()],
        )
        .unwrap();
        let result = TrainConfig::new().with_min_leaf_count(1).fit(data, 1).unwrap();
        assert_eq!(result.metadata().n_rows, 5);
    }

    #[test]
    fn all_na_target_rejected() {
        let data = Dataset::new(
            vec![numbers(&[1.0, 2.0]), vec![Value::Na, Value::Na]],
            vec![ValueType::Numeric, ValueType::Categorical],
            vec![CategoryMap::new(), label_map(&["n", "y"])],
            vec!["a".into(), "label".into()],
        )
        .unwrap();
        let err = TrainConfig::new().fit(data, 1).unwrap_err();
        assert!(matches!(err, TreesError::NoTrainableRows));
    }

    #[test]
    fn all_constant_columns_rejected() {
        let data = Dataset::new(
            vec![numbers(&[5.0, 5.0, 5.0]), levels(&[0, 1, 0])],
            vec![ValueType::Numeric, ValueType::Categorical],
            vec![CategoryMap::new(), label_map(&["n", "y"])],
            vec!["a".into(), "label".into()],
        )
        .unwrap();
        let err = TrainConfig::new().fit(data, 1).unwrap_err();
        assert!(matches!(err, TreesError::NoUsefulColumns));
    }

    #[test]
    fn zero_max_trees_rejected() {
        let err = TrainConfig::new()
            .with_max_trees(0)
            .fit(classification_dataset(), 3)
            .unwrap_err();
        assert!(matches!(err, TreesError::InvalidMaxTrees { .. }));
    }

    #[test]
    fn min_depth_filters_stump_trees() {
        // A dataset whose target is pure: every tree stays a root leaf,
        // so min_depth = 2 keeps nothing.
        let data = Dataset::new(
            vec![numbers(&[1.0, 2.0, 3.0, 4.0]), levels(&[0, 0, 0, 0])],
            vec![ValueType::Numeric, ValueType::Categorical],
            vec![CategoryMap::new(), label_map(&["only"])],
            vec!["a".into(), "label".into()],
        )
        .unwrap();
        let result = TrainConfig::new()
            .with_min_leaf_count(1)
            .with_min_depth(2)
            .fit(data, 1)
            .unwrap();
        assert_eq!(result.model().n_trees(), 0);
        assert!(result.metadata().n_subsets > 0);
    }

    #[test]
    fn cancellation_between_trees() {
        let config = TrainConfig::new().with_min_leaf_count(1);
        let mut calls = 0usize;
        let err = config
            .fit_with_cancel(classification_dataset(), 3, &mut || {
                calls += 1;
                true
            })
            .unwrap_err();
        assert!(matches!(err, TreesError::Cancelled));
        assert_eq!(calls, 1);
    }

    #[test]
    fn deterministic_training() {
        let config = TrainConfig::new().with_min_leaf_count(1).with_prune(true);
        let a = config.fit(classification_dataset(), 3).unwrap();
        let b = config.fit(classification_dataset(), 3).unwrap();
        assert_eq!(a.model().trees, b.model().trees);
        assert_eq!(a.model().select_columns, b.model().select_columns);
    }

    #[test]
    fn available_columns_restrict_candidates() {
        let config = TrainConfig::new()
            .with_min_leaf_count(1)
            .with_available_columns(Some(vec![2]));
        let result = config.fit(classification_dataset(), 3).unwrap();
        assert_eq!(result.model().select_columns, vec![2]);
    }

    #[test]
    fn target_as_available_column_rejected() {
        let config = TrainConfig::new().with_available_columns(Some(vec![3]));
        let err = config.fit(classification_dataset(), 3).unwrap_err();
        assert!(matches!(err, TreesError::InvalidAvailableColumn { column: 3, .. }));
    }

    #[test]
    fn regression_on_linear_data() {
        // Target equals the attribute: a deep tree fits it closely.
        let x: Vec<f64> = (0..32).map(|i| i as f64).collect();
        let data = Dataset::new(
            vec![numbers(&x), numbers(&x)],
            vec![ValueType::Numeric, ValueType::Numeric],
            vec![CategoryMap::new(), CategoryMap::new()],
            vec!["x".into(), "y".into()],
        )
        .unwrap();
        let result = TrainConfig::new().with_min_leaf_count(1).fit(data, 1).unwrap();
        let columns = vec![numbers(&x), numbers(&x)];
        let rows = SelectionSet::with_all(32, true);
        let predictions = result.model().predict(&columns, &rows).unwrap();
        for (i, prediction) in predictions.iter().enumerate() {
            let value = prediction.number().unwrap();
            assert!((value - x[i]).abs() < 1e-9, "row {i}: {value} vs {}", x[i]);
        }
    }
}
