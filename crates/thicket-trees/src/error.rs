/// Errors from training and prediction.
#[derive(Debug, thiserror::Error)]
pub enum TreesError {
    /// Returned when the training dataset has zero rows or zero columns.
    #[error("dataset has no rows or no columns")]
    EmptyDataset,

    /// Returned when a column has a different length than the first column.
    #[error("column {column} has {got} rows, expected {expected}")]
    ColumnLengthMismatch {
        /// Zero-based index of the offending column.
        column: usize,
        /// Row count of the first column.
        expected: usize,
        /// Row count of the offending column.
        got: usize,
    },

    /// Returned when a per-column vector does not match the column count.
    #[error("{what} has {got} entries, expected {expected}")]
    ShapeMismatch {
        /// Which per-column vector is wrong (e.g. "valueTypes").
        what: &'static str,
        /// The expected entry count.
        expected: usize,
        /// The actual entry count.
        got: usize,
    },

    /// Returned when the target column index is out of range.
    #[error("target column {target_column} out of range for {n_columns} columns")]
    TargetColumnOutOfRange {
        /// The requested target column.
        target_column: usize,
        /// The number of columns in the dataset.
        n_columns: usize,
    },

    /// Returned when an available-column index is out of range or the target.
    #[error("available column {column} invalid for {n_columns} columns")]
    InvalidAvailableColumn {
        /// The offending column index.
        column: usize,
        /// The number of columns in the dataset.
        n_columns: usize,
    },

    /// Returned when every selected row has a missing target value.
    #[error("no rows with a non-missing target value")]
    NoTrainableRows,

    /// Returned when max_trees is zero.
    #[error("max_trees must be at least 1, got {max_trees}")]
    InvalidMaxTrees {
        /// The invalid max_trees value provided.
        max_trees: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when min_leaf_count is zero.
    #[error("min_leaf_count must be at least 1, got {min_leaf_count}")]
    InvalidMinLeafCount {
        /// The invalid min_leaf_count value provided.
        min_leaf_count: usize,
    },

    /// Returned when no candidate column varies over the selected rows.
    #[error("no useful columns: every candidate column is constant")]
    NoUsefulColumns,

    /// Returned by the strict insert path when a level name already exists.
    #[error("duplicate category name \"{name}\"")]
    DuplicateCategory {
        /// The level name that was inserted twice.
        name: String,
    },

    /// Returned when an impute option does not apply to the column's type.
    #[error("impute option {option} invalid for {value_type} column {column}")]
    InvalidImputeOption {
        /// Name of the offending impute option.
        option: &'static str,
        /// Name of the column's value type.
        value_type: &'static str,
        /// Zero-based index of the offending column.
        column: usize,
    },

    /// Returned when the split finder sees a missing value that imputation
    /// should have replaced (reachable when a column's impute option is
    /// `None` and the column still holds NAs).
    #[error("missing value in column {column} reached the split finder")]
    UnimputedNa {
        /// Zero-based index of the offending column.
        column: usize,
    },

    /// Returned when an impurity computation produces NaN; indicates a bug.
    #[error("impurity computation produced NaN")]
    ImpurityNan,

    /// Returned when a level index falls outside its column's category map.
    #[error("level index {level} out of range for column {column}")]
    LevelOutOfRange {
        /// The offending level index.
        level: i64,
        /// Zero-based index of the column.
        column: usize,
    },

    /// Returned when prediction input width does not match the model.
    #[error("prediction input has {got} columns, expected {expected}")]
    PredictionShapeMismatch {
        /// The column count the model was trained with.
        expected: usize,
        /// The column count supplied for prediction.
        got: usize,
    },

    /// Returned when a compact tree references a nonexistent split column.
    #[error("tree references split column {index}, but only {n_select_columns} columns were selected")]
    UnknownSplitColumn {
        /// The out-of-range split-column index.
        index: usize,
        /// The number of selected columns in the model.
        n_select_columns: usize,
    },

    /// Returned when a compact tree's child links are inconsistent.
    #[error("corrupt tree: {detail}")]
    CorruptTree {
        /// What was inconsistent.
        detail: &'static str,
    },

    /// Returned when predicting with a model that holds zero trees.
    #[error("model contains no trees")]
    EmptyEnsemble,

    /// Returned when a caller-supplied cancellation check fired.
    #[error("training cancelled")]
    Cancelled,

    /// Returned when an internal invariant is violated; indicates a bug.
    #[error("internal invariant violated: {detail}")]
    Internal {
        /// Which invariant was violated.
        detail: &'static str,
    },
}
