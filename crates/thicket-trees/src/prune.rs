//! Pessimistic bottom-up pruning.
//!
//! Follows the error-estimate pruning described in Witten & Frank, "Data
//! Mining" (2000): a Wilson-style upper confidence bound on the error rate
//! for classification, an (n+1)/(n-1)-inflated RMS for regression.

use crate::error::TreesError;
use crate::tree::{BranchStat, NodeId, TreeNode};
use crate::value::{NO_INDEX, Value, ValueType};

/// Prune the working tree in place: refresh subtree statistics, then walk
/// the branch nodes deepest-first and replace each subtree whose estimated
/// error would not get worse as a single leaf.
pub(crate) fn prune_tree(
    arena: &mut [TreeNode],
    root: NodeId,
    target_type: ValueType,
) -> Result<(), TreesError> {
    match target_type {
        ValueType::Categorical => {
            update_branch_categorical(arena, root);
        }
        ValueType::Numeric => {
            update_branch_numeric(arena, root);
        }
    }

    let mut nodes: Vec<(usize, NodeId)> = Vec::new();
    find_branch_nodes(arena, root, 0, &mut nodes);
    nodes.sort_by(|a, b| b.0.cmp(&a.0));

    for &(_, node) in &nodes {
        let replace = match target_type {
            ValueType::Categorical => test_replace_subtree_categorical(arena, node)?,
            ValueType::Numeric => test_replace_subtree_numeric(arena, node)?,
        };
        if replace {
            arena[node].less_or_equal = None;
            arena[node].greater_or_not = None;
            arena[node].split_col_index = None;
        }
    }
    Ok(())
}

/// Refresh `branch_stat` bottom-up: a branch's correct count is the sum of
/// its subtrees' counts. Returns the node's count.
fn update_branch_categorical(arena: &mut [TreeNode], node: NodeId) -> usize {
    if let (Some(le), Some(gn)) = (arena[node].less_or_equal, arena[node].greater_or_not) {
        let sum = update_branch_categorical(arena, le) + update_branch_categorical(arena, gn);
        arena[node].branch_stat = BranchStat::Correct(sum);
        sum
    } else {
        arena[node].branch_stat.correct()
    }
}

/// Refresh `branch_stat` bottom-up: a branch's residual sum of squares is
/// the sum of its subtrees' sums. Returns the node's sum.
fn update_branch_numeric(arena: &mut [TreeNode], node: NodeId) -> f64 {
    if let (Some(le), Some(gn)) = (arena[node].less_or_equal, arena[node].greater_or_not) {
        let sum = update_branch_numeric(arena, le) + update_branch_numeric(arena, gn);
        arena[node].branch_stat = BranchStat::Sum2(sum);
        sum
    } else {
        arena[node].branch_stat.sum2()
    }
}

/// Collect all branch nodes with their depths, in pre-order.
fn find_branch_nodes(
    arena: &[TreeNode],
    node: NodeId,
    depth: usize,
    nodes: &mut Vec<(usize, NodeId)>,
) {
    if let (Some(le), Some(gn)) = (arena[node].less_or_equal, arena[node].greater_or_not) {
        nodes.push((depth, node));
        find_branch_nodes(arena, le, depth + 1, nodes);
        find_branch_nodes(arena, gn, depth + 1, nodes);
    }
}

/// Wilson-style upper bound on the error rate of `category_count` correct
/// answers out of `total_count`, at the fixed pessimistic confidence
/// z = 0.69 (roughly the 25% tail).
pub(crate) fn pessimistic_error_estimate(
    category_count: usize,
    total_count: usize,
) -> Result<f64, TreesError> {
    const Z: f64 = 0.69;
    let n = total_count as f64;
    let f = (n - category_count as f64) / n;

    let numerator = f + Z * Z / (2.0 * n) + Z * (f / n - f * f / n + Z * Z / (4.0 * n * n)).sqrt();
    let denominator = 1.0 + Z * Z / n;
    let estimate = numerator / denominator;

    if estimate.is_nan() {
        return Err(TreesError::ImpurityNan);
    }
    Ok(estimate)
}

/// Should this subtree become a leaf? Categorical target: yes when the
/// node's own pessimistic estimate is strictly below the weighted sum of
/// its children's branch estimates, or when every leaf below already
/// agrees on one level (the subtree is redundant).
fn test_replace_subtree_categorical(
    arena: &[TreeNode],
    node: NodeId,
) -> Result<bool, TreesError> {
    let node_correct = arena[node].leaf_less_or_equal_count;
    let node_count = arena[node].row_count();
    let node_estimate = pessimistic_error_estimate(node_correct, node_count)?;

    let (le, gn) = children(arena, node)?;

    let le_count = arena[le].row_count();
    let le_estimate = if le_count == 0 {
        0.0
    } else {
        pessimistic_error_estimate(arena[le].branch_stat.correct(), le_count)?
    };

    let gn_count = arena[gn].row_count();
    let gn_estimate = if gn_count == 0 {
        0.0
    } else {
        pessimistic_error_estimate(arena[gn].branch_stat.correct(), gn_count)?
    };

    let weighted = le_estimate * le_count as f64 / node_count as f64
        + gn_estimate * gn_count as f64 / node_count as f64;

    Ok(node_estimate < weighted || same_level_for_all_leaves(arena, node) != NO_INDEX)
}

/// Should this subtree become a leaf? Numeric target: yes when the node's
/// inflated RMS is strictly below the weighted sum of its children's.
fn test_replace_subtree_numeric(arena: &[TreeNode], node: NodeId) -> Result<bool, TreesError> {
    let estimate = |id: NodeId| {
        let count = arena[id].row_count() as f64;
        let rms = (arena[id].branch_stat.sum2() / count).sqrt();
        (count + 1.0) / (count - 1.0) * rms
    };

    let node_count = arena[node].row_count() as f64;
    let node_estimate = estimate(node);

    let (le, gn) = children(arena, node)?;
    let weighted = estimate(le) * arena[le].row_count() as f64 / node_count
        + estimate(gn) * arena[gn].row_count() as f64 / node_count;

    Ok(node_estimate < weighted)
}

/// If every leaf of the subtree holds the same target level, return it,
/// else [`NO_INDEX`].
fn same_level_for_all_leaves(arena: &[TreeNode], node: NodeId) -> i64 {
    match (arena[node].less_or_equal, arena[node].greater_or_not) {
        (None, _) | (_, None) => match arena[node].leaf_value {
            Value::Level(level) => level,
            _ => NO_INDEX,
        },
        (Some(le), Some(gn)) => {
            let left = same_level_for_all_leaves(arena, le);
            if left == NO_INDEX {
                NO_INDEX
            } else if left == same_level_for_all_leaves(arena, gn) {
                left
            } else {
                NO_INDEX
            }
        }
    }
}

fn children(arena: &[TreeNode], node: NodeId) -> Result<(NodeId, NodeId), TreesError> {
    match (arena[node].less_or_equal, arena[node].greater_or_not) {
        (Some(le), Some(gn)) => Ok((le, gn)),
        _ => Err(TreesError::CorruptTree { detail: "branch node with a missing child" }),
    }
}
