//! Configuration builder for ensemble training.

use crate::ensemble::{Dataset, TrainResult, train};
use crate::error::TreesError;
use crate::impute::ImputeOption;

/// Configuration for training a tree ensemble.
///
/// Construct via [`TrainConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter | Default |
/// |---|---|
/// | `columns_per_tree` | `None` (auto: ceil(sqrt(S)) classification, ceil(S/3) regression) |
/// | `max_depth` | 500 |
/// | `min_depth` | 1 |
/// | `do_prune` | `false` |
/// | `min_improvement` | 0.0 |
/// | `min_leaf_count` | 4 |
/// | `max_splits_per_numeric_attribute` | `None` (unlimited) |
/// | `max_trees` | 1000 |
/// | `max_nodes` | `None` (unlimited) |
/// | `impute_options` | `None` (per-type defaults) |
/// | `available_columns` | `None` (every non-target column) |
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub(crate) columns_per_tree: Option<usize>,
    pub(crate) max_depth: usize,
    pub(crate) min_depth: usize,
    pub(crate) do_prune: bool,
    pub(crate) min_improvement: f64,
    pub(crate) min_leaf_count: usize,
    pub(crate) max_splits_per_numeric_attribute: Option<usize>,
    pub(crate) max_trees: usize,
    pub(crate) max_nodes: Option<usize>,
    pub(crate) impute_options: Option<Vec<ImputeOption>>,
    pub(crate) available_columns: Option<Vec<usize>>,
}

impl TrainConfig {
    /// Create a config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns_per_tree: None,
            max_depth: 500,
            min_depth: 1,
            do_prune: false,
            min_improvement: 0.0,
            min_leaf_count: 4,
            max_splits_per_numeric_attribute: None,
            max_trees: 1000,
            max_nodes: None,
            impute_options: None,
            available_columns: None,
        }
    }

    /// Set how many columns each tree may split on.
    ///
    /// `None` picks `ceil(sqrt(S))` for classification or `ceil(S/3)` for
    /// regression over the `S` surviving columns, clamped to `[1, S]`.
    #[must_use]
    pub fn with_columns_per_tree(mut self, columns_per_tree: Option<usize>) -> Self {
        self.columns_per_tree = columns_per_tree;
        self
    }

    /// Set the maximum tree depth (the root counts as depth 1).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the depth a tree must reach to be kept in the ensemble.
    #[must_use]
    pub fn with_min_depth(mut self, min_depth: usize) -> Self {
        self.min_depth = min_depth;
        self
    }

    /// Enable or disable pessimistic pruning.
    #[must_use]
    pub fn with_prune(mut self, do_prune: bool) -> Self {
        self.do_prune = do_prune;
        self
    }

    /// Set the required improvement margin for regression splits, as a
    /// fraction of the parent's standard deviation.
    #[must_use]
    pub fn with_min_improvement(mut self, min_improvement: f64) -> Self {
        self.min_improvement = min_improvement;
        self
    }

    /// Set the minimum number of training rows per leaf.
    #[must_use]
    pub fn with_min_leaf_count(mut self, min_leaf_count: usize) -> Self {
        self.min_leaf_count = min_leaf_count;
        self
    }

    /// Cap how often one numeric column may be split on along a path.
    /// `None` means unlimited.
    #[must_use]
    pub fn with_max_splits_per_numeric_attribute(mut self, max_splits: Option<usize>) -> Self {
        self.max_splits_per_numeric_attribute = max_splits;
        self
    }

    /// Set the maximum number of trees (and column subsets).
    #[must_use]
    pub fn with_max_trees(mut self, max_trees: usize) -> Self {
        self.max_trees = max_trees;
        self
    }

    /// Cap the node budget of a single tree. `None` means unlimited.
    #[must_use]
    pub fn with_max_nodes(mut self, max_nodes: Option<usize>) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    /// Supply per-column impute options (target column included).
    /// `None` applies [`ImputeOption::Default`] to every attribute column.
    #[must_use]
    pub fn with_impute_options(mut self, impute_options: Option<Vec<ImputeOption>>) -> Self {
        self.impute_options = impute_options;
        self
    }

    /// Restrict the candidate attribute columns (raw indices).
    /// `None` makes every non-target column a candidate.
    #[must_use]
    pub fn with_available_columns(mut self, available_columns: Option<Vec<usize>>) -> Self {
        self.available_columns = available_columns;
        self
    }

    // --- Getters ---

    /// Return the columns-per-tree override, if any.
    #[must_use]
    pub fn columns_per_tree(&self) -> Option<usize> {
        self.columns_per_tree
    }

    /// Return the maximum tree depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Return the minimum depth a kept tree must reach.
    #[must_use]
    pub fn min_depth(&self) -> usize {
        self.min_depth
    }

    /// Return whether pruning is enabled.
    #[must_use]
    pub fn do_prune(&self) -> bool {
        self.do_prune
    }

    /// Return the regression improvement margin.
    #[must_use]
    pub fn min_improvement(&self) -> f64 {
        self.min_improvement
    }

    /// Return the minimum rows per leaf.
    #[must_use]
    pub fn min_leaf_count(&self) -> usize {
        self.min_leaf_count
    }

    /// Return the per-path numeric split cap, if any.
    #[must_use]
    pub fn max_splits_per_numeric_attribute(&self) -> Option<usize> {
        self.max_splits_per_numeric_attribute
    }

    /// Return the maximum number of trees.
    #[must_use]
    pub fn max_trees(&self) -> usize {
        self.max_trees
    }

    /// Return the per-tree node budget, if any.
    #[must_use]
    pub fn max_nodes(&self) -> Option<usize> {
        self.max_nodes
    }

    /// Train an ensemble on the dataset, predicting `target_column`.
    ///
    /// Consumes the dataset: imputation rewrites its columns in place and
    /// the category maps move into the returned model.
    ///
    /// # Errors
    ///
    /// | Variant | When |
    /// |---|---|
    /// | [`TreesError::EmptyDataset`] | no rows or no columns |
    /// | [`TreesError::ColumnLengthMismatch`] | ragged columns |
    /// | [`TreesError::ShapeMismatch`] | per-column vectors disagree |
    /// | [`TreesError::TargetColumnOutOfRange`] | bad target index |
    /// | [`TreesError::InvalidAvailableColumn`] | bad candidate column |
    /// | [`TreesError::NoTrainableRows`] | every target value is NA |
    /// | [`TreesError::InvalidMaxTrees`] | `max_trees` is zero |
    /// | [`TreesError::InvalidMaxDepth`] | `max_depth` is zero |
    /// | [`TreesError::InvalidMinLeafCount`] | `min_leaf_count` is zero |
    /// | [`TreesError::NoUsefulColumns`] | every candidate is constant |
    /// | [`TreesError::InvalidImputeOption`] | option does not fit a column |
    /// | [`TreesError::UnimputedNa`] | NA reached the split finder |
    pub fn fit(&self, data: Dataset, target_column: usize) -> Result<TrainResult, TreesError> {
        train(self, data, target_column, &mut || false)
    }

    /// Like [`TrainConfig::fit`], polling `cancel` between trees; training
    /// aborts with [`TreesError::Cancelled`] once it returns `true`.
    pub fn fit_with_cancel(
        &self,
        data: Dataset,
        target_column: usize,
        cancel: &mut dyn FnMut() -> bool,
    ) -> Result<TrainResult, TreesError> {
        train(self, data, target_column, cancel)
    }
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self::new()
    }
}
