//! Working tree arena and the greedy tree builder.

use crate::category::CategoryMap;
use crate::error::TreesError;
use crate::impute::{mean_value, mode_value};
use crate::selection::SelectionSet;
use crate::split::{
    SplitCandidate, best_categorical_split, best_numeric_split, st_dev, target_entropy,
    target_stats,
};
use crate::value::{Value, ValueType};

/// Handle into a tree's node arena.
pub(crate) type NodeId = usize;

/// Per-node statistic used for improvement and pruning decisions:
/// matching-target count for categorical targets, sum of squared residuals
/// for numeric targets.
#[derive(Debug, Clone, Copy)]
pub(crate) enum BranchStat {
    /// Count of rows whose target equals the leaf value.
    Correct(usize),
    /// Sum of squared residuals against the leaf value.
    Sum2(f64),
}

impl BranchStat {
    pub(crate) fn correct(self) -> usize {
        match self {
            BranchStat::Correct(count) => count,
            BranchStat::Sum2(_) => 0,
        }
    }

    pub(crate) fn sum2(self) -> f64 {
        match self {
            BranchStat::Sum2(sum2) => sum2,
            BranchStat::Correct(_) => 0.0,
        }
    }
}

/// One node of a working tree. Children and parent are arena handles; a
/// node is a leaf while `less_or_equal` is `None`.
#[derive(Debug, Clone)]
pub(crate) struct TreeNode {
    /// Value reported when traversal terminates here.
    pub leaf_value: Value,
    /// Threshold or level the node splits on; NA for leaves.
    pub split_value: Value,
    pub parent: Option<NodeId>,
    pub less_or_equal: Option<NodeId>,
    pub greater_or_not: Option<NodeId>,
    /// Which branch an NA takes at this node.
    pub to_less_or_equal_if_na: bool,
    /// Index into the ensemble's selected-columns list; `None` for leaves.
    pub split_col_index: Option<usize>,
    /// Viewed as a leaf: rows whose target matches `leaf_value`
    /// (categorical) or is `<=` it (numeric).
    pub leaf_less_or_equal_count: usize,
    /// The complementary row count.
    pub leaf_greater_or_not_count: usize,
    pub branch_stat: BranchStat,
    /// Training rows that reach this node.
    pub select_rows: SelectionSet,
}

impl TreeNode {
    pub(crate) fn row_count(&self) -> usize {
        self.leaf_less_or_equal_count + self.leaf_greater_or_not_count
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.less_or_equal.is_none()
    }
}

/// Everything one tree's growth needs, plus the per-build node counter
/// (confined here rather than living in any global).
pub(crate) struct BuildContext<'a> {
    pub columns: &'a [Vec<Value>],
    pub value_types: &'a [ValueType],
    pub category_maps: &'a [CategoryMap],
    /// Raw column number for each entry of the selected-columns list.
    pub select_columns: &'a [usize],
    /// This tree's assigned subset: indices into `select_columns`.
    pub subset: &'a [usize],
    pub target_column: usize,
    pub sorted_indexes: &'a [Vec<usize>],
    /// Per-raw-column NA replacement values fixed by imputation.
    pub imputed_values: &'a [Value],
    pub max_depth: usize,
    pub max_nodes: Option<usize>,
    pub min_improvement: f64,
    pub min_leaf_count: usize,
    pub max_splits_per_numeric_attribute: Option<usize>,
    /// Serial number for the next allocated node; also the budget gauge
    /// for `max_nodes`. Rolled-back children stay counted.
    pub next_index: usize,
    /// Deepest level (root = 1) that gained a split.
    pub max_depth_used: usize,
}

/// Grow a tree from scratch: root leaf from the target's mean or mode,
/// then recursive splitting. Returns the arena; the root is entry 0.
pub(crate) fn grow_tree(ctx: &mut BuildContext<'_>, select_rows: &SelectionSet)
-> Result<Vec<TreeNode>, TreesError> {
    let target_type = ctx.value_types[ctx.target_column];
    let target = &ctx.columns[ctx.target_column];

    let leaf_value = match target_type {
        ValueType::Numeric => mean_value(target, select_rows),
        ValueType::Categorical => {
            mode_value(target, select_rows, &ctx.category_maps[ctx.target_column])?
        }
    };

    let mut root = TreeNode {
        leaf_value,
        split_value: Value::Na,
        parent: None,
        less_or_equal: None,
        greater_or_not: None,
        to_less_or_equal_if_na: false,
        split_col_index: None,
        leaf_less_or_equal_count: 0,
        leaf_greater_or_not_count: 0,
        branch_stat: match target_type {
            ValueType::Numeric => BranchStat::Sum2(0.0),
            ValueType::Categorical => BranchStat::Correct(0),
        },
        select_rows: select_rows.clone(),
    };

    match target_type {
        ValueType::Numeric => {
            let leaf = root
                .leaf_value
                .number()
                .ok_or(TreesError::Internal { detail: "numeric target yielded non-numeric mean" })?;
            let mut sum2 = 0.0;
            for &row in root.select_rows.indices() {
                let value = target[row]
                    .number()
                    .ok_or(TreesError::UnimputedNa { column: ctx.target_column })?;
                let delta = value - leaf;
                sum2 += delta * delta;
                if value <= leaf {
                    root.leaf_less_or_equal_count += 1;
                } else {
                    root.leaf_greater_or_not_count += 1;
                }
            }
            root.branch_stat = BranchStat::Sum2(sum2);
        }
        ValueType::Categorical => {
            let leaf = root
                .leaf_value
                .level()
                .ok_or(TreesError::Internal { detail: "categorical target yielded no mode" })?;
            let mut correct = 0usize;
            for &row in root.select_rows.indices() {
                let level = target[row]
                    .level()
                    .ok_or(TreesError::UnimputedNa { column: ctx.target_column })?;
                if level == leaf {
                    root.leaf_less_or_equal_count += 1;
                    correct += 1;
                } else {
                    root.leaf_greater_or_not_count += 1;
                }
            }
            root.branch_stat = BranchStat::Correct(correct);
        }
    }

    let mut arena = vec![root];
    ctx.next_index = 0;
    ctx.max_depth_used = 1;
    improve_subtree(&mut arena, 0, 1, ctx)?;
    Ok(arena)
}

/// Recursively try to split the given leaf, then its children.
fn improve_subtree(
    arena: &mut Vec<TreeNode>,
    node: NodeId,
    depth: usize,
    ctx: &mut BuildContext<'_>,
) -> Result<(), TreesError> {
    if depth < ctx.max_depth && ctx.max_nodes.is_none_or(|max| ctx.next_index < max) {
        if let Some((less_or_equal, greater_or_not)) = improve_leaf(arena, node, ctx)? {
            if ctx.max_depth_used < depth + 1 {
                ctx.max_depth_used = depth + 1;
            }
            improve_subtree(arena, less_or_equal, depth + 1, ctx)?;
            improve_subtree(arena, greater_or_not, depth + 1, ctx)?;
        }
    }
    Ok(())
}

/// Split a leaf unless it is already perfect. Returns the new children's
/// handles when a split was committed.
fn improve_leaf(
    arena: &mut Vec<TreeNode>,
    node: NodeId,
    ctx: &mut BuildContext<'_>,
) -> Result<Option<(NodeId, NodeId)>, TreesError> {
    let perfect = match ctx.value_types[ctx.target_column] {
        ValueType::Categorical => arena[node].branch_stat.correct() == arena[node].row_count(),
        ValueType::Numeric => arena[node].branch_stat.sum2() == 0.0,
    };
    if perfect {
        return Ok(None);
    }
    improve_imperfect_leaf(arena, node, ctx)
}

/// The split attempt proper: find the best column, test improvement,
/// build children, and roll back if a child falls under the leaf floor.
fn improve_imperfect_leaf(
    arena: &mut Vec<TreeNode>,
    node: NodeId,
    ctx: &mut BuildContext<'_>,
) -> Result<Option<(NodeId, NodeId)>, TreesError> {
    let target_type = ctx.value_types[ctx.target_column];

    // Best split per subset column, in subset order.
    let mut candidates: Vec<Option<SplitCandidate>> = Vec::with_capacity(ctx.subset.len());
    for &column_index in ctx.subset {
        let col = ctx.select_columns[column_index];
        let candidate = match ctx.value_types[col] {
            ValueType::Categorical => best_categorical_split(
                col,
                ctx.target_column,
                &arena[node].select_rows,
                ctx.columns,
                ctx.value_types,
                ctx.category_maps,
                ctx.sorted_indexes,
            )?,
            ValueType::Numeric => {
                if numeric_splits_exhausted(arena, node, col, ctx) {
                    None
                } else {
                    best_numeric_split(
                        col,
                        ctx.target_column,
                        &arena[node].select_rows,
                        ctx.columns,
                        ctx.value_types,
                        ctx.category_maps,
                        ctx.sorted_indexes,
                    )?
                }
            }
        };
        candidates.push(candidate);
    }

    // Lowest measure wins; the earliest subset position wins ties.
    let mut best: Option<(usize, SplitCandidate)> = None;
    for (si_index, candidate) in candidates.iter().enumerate() {
        if let Some(candidate) = candidate
            && best.as_ref().is_none_or(|(_, b)| candidate.measure < b.measure)
        {
            best = Some((si_index, *candidate));
        }
    }
    let Some((best_si_index, best_split)) = best else {
        return Ok(None);
    };
    let split_col_index = ctx.subset[best_si_index];
    let col = ctx.select_columns[split_col_index];

    // The split must beat the leaf it replaces.
    let improved = match target_type {
        ValueType::Categorical => {
            let (leaf_measure, _) = target_entropy(
                &arena[node].select_rows,
                ctx.columns,
                ctx.target_column,
                &ctx.category_maps[ctx.target_column],
            )?;
            best_split.measure < leaf_measure
        }
        ValueType::Numeric => {
            let (sum, sum2, count) =
                target_stats(&arena[node].select_rows, ctx.columns, ctx.target_column)?;
            if count == 0 {
                false
            } else {
                let leaf_measure = st_dev(count, sum, sum2);
                // A split on a many-level column is discounted less.
                let factor = match ctx.value_types[col] {
                    ValueType::Categorical => ctx.category_maps[col].count_all() as f64,
                    ValueType::Numeric => 1.0,
                };
                let delta = (leaf_measure - best_split.measure) * factor;
                delta >= ctx.min_improvement * leaf_measure
            }
        }
    };
    if !improved {
        return Ok(None);
    }

    // Partition the node's rows by the chosen split.
    let n_rows = arena[node].select_rows.domain_size();
    let mut rows_less_or_equal = SelectionSet::with_all(n_rows, false);
    let mut rows_greater_or_not = SelectionSet::with_all(n_rows, false);
    for &row in arena[node].select_rows.indices() {
        let less_or_equal = match ctx.value_types[col] {
            ValueType::Categorical => {
                let level =
                    ctx.columns[col][row].level().ok_or(TreesError::UnimputedNa { column: col })?;
                Value::Level(level) == best_split.value
            }
            ValueType::Numeric => {
                let value =
                    ctx.columns[col][row].number().ok_or(TreesError::UnimputedNa { column: col })?;
                let threshold = best_split
                    .value
                    .number()
                    .ok_or(TreesError::Internal { detail: "numeric split holds no threshold" })?;
                value <= threshold
            }
        };
        if less_or_equal {
            rows_less_or_equal.select(row);
        } else {
            rows_greater_or_not.select(row);
        }
    }

    let less_or_equal_node = make_child(node, rows_less_or_equal, ctx)?;
    let greater_or_not_node = make_child(node, rows_greater_or_not, ctx)?;

    // Both sides must clear the leaf floor or the split is abandoned.
    if less_or_equal_node.row_count() < ctx.min_leaf_count
        || greater_or_not_node.row_count() < ctx.min_leaf_count
    {
        return Ok(None);
    }

    // Fix the NA route from where the imputed value would have gone; an NA
    // imputed value routes to the greater/not branch.
    let to_less_or_equal_if_na = match ctx.value_types[col] {
        ValueType::Numeric => match (ctx.imputed_values[col].number(), best_split.value.number()) {
            (Some(imputed), Some(threshold)) => imputed <= threshold,
            _ => false,
        },
        ValueType::Categorical => match ctx.imputed_values[col] {
            Value::Level(imputed) => Value::Level(imputed) == best_split.value,
            _ => false,
        },
    };

    let less_or_equal = arena.len();
    arena.push(less_or_equal_node);
    let greater_or_not = arena.len();
    arena.push(greater_or_not_node);

    let parent = &mut arena[node];
    parent.split_value = best_split.value;
    parent.split_col_index = Some(split_col_index);
    parent.less_or_equal = Some(less_or_equal);
    parent.greater_or_not = Some(greater_or_not);
    parent.to_less_or_equal_if_na = to_less_or_equal_if_na;

    Ok(Some((less_or_equal, greater_or_not)))
}

/// Count ancestor splits on `col`; `true` when the per-path budget for
/// numeric splits on one attribute is used up.
fn numeric_splits_exhausted(
    arena: &[TreeNode],
    node: NodeId,
    col: usize,
    ctx: &BuildContext<'_>,
) -> bool {
    let Some(max_splits) = ctx.max_splits_per_numeric_attribute else {
        return false;
    };
    let mut used = 0usize;
    let mut next = arena[node].parent;
    while let Some(parent) = next {
        if let Some(split_col_index) = arena[parent].split_col_index
            && ctx.select_columns[split_col_index] == col
        {
            used += 1;
        }
        next = arena[parent].parent;
    }
    used >= max_splits
}

/// Build one provisional child leaf: its value from the target's mean or
/// mode over the side's rows, plus the leaf and branch statistics used by
/// the improvement test and the pruner.
fn make_child(
    parent: NodeId,
    select_rows: SelectionSet,
    ctx: &mut BuildContext<'_>,
) -> Result<TreeNode, TreesError> {
    let target_type = ctx.value_types[ctx.target_column];
    let target = &ctx.columns[ctx.target_column];

    let leaf_value = match target_type {
        ValueType::Numeric => mean_value(target, &select_rows),
        ValueType::Categorical => {
            mode_value(target, &select_rows, &ctx.category_maps[ctx.target_column])?
        }
    };

    let mut child = TreeNode {
        leaf_value,
        split_value: Value::Na,
        parent: Some(parent),
        less_or_equal: None,
        greater_or_not: None,
        to_less_or_equal_if_na: false,
        split_col_index: None,
        leaf_less_or_equal_count: 0,
        leaf_greater_or_not_count: 0,
        branch_stat: match target_type {
            ValueType::Numeric => BranchStat::Sum2(0.0),
            ValueType::Categorical => BranchStat::Correct(0),
        },
        select_rows,
    };
    ctx.next_index += 1;

    if child.select_rows.count() == 0 {
        return Ok(child);
    }

    match target_type {
        ValueType::Numeric => {
            let leaf = child
                .leaf_value
                .number()
                .ok_or(TreesError::Internal { detail: "numeric target yielded non-numeric mean" })?;
            let mut sum2 = 0.0;
            for &row in child.select_rows.indices() {
                let value = target[row]
                    .number()
                    .ok_or(TreesError::UnimputedNa { column: ctx.target_column })?;
                let delta = value - leaf;
                sum2 += delta * delta;
                if value <= leaf {
                    child.leaf_less_or_equal_count += 1;
                } else {
                    child.leaf_greater_or_not_count += 1;
                }
            }
            child.branch_stat = BranchStat::Sum2(sum2);
        }
        ValueType::Categorical => {
            let leaf = child
                .leaf_value
                .level()
                .ok_or(TreesError::Internal { detail: "categorical target yielded no mode" })?;
            let mut correct = 0usize;
            for &row in child.select_rows.indices() {
                let level = target[row]
                    .level()
                    .ok_or(TreesError::UnimputedNa { column: ctx.target_column })?;
                if level == leaf {
                    child.leaf_less_or_equal_count += 1;
                    correct += 1;
                } else {
                    child.leaf_greater_or_not_count += 1;
                }
            }
            child.branch_stat = BranchStat::Correct(correct);
        }
    }

    Ok(child)
}
