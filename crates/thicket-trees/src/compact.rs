//! Packed array-of-fields tree form used for prediction and serialization.

use crate::tree::{NodeId, TreeNode};
use crate::value::Value;

/// A finished tree as parallel arrays, one entry per node, root at index 0
/// and children in depth-first pre-order.
///
/// Invariant: `less_or_equal` and `greater_or_not` are either both `None`
/// (a leaf, whose `value` is the leaf value) or both in-range indices (a
/// split, whose `value` is the threshold or level and whose
/// `split_col_index` names a column in the ensemble's selected-columns
/// list).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactTree {
    /// Index into the ensemble's selected-columns list; `None` for leaves.
    pub split_col_index: Vec<Option<usize>>,
    /// Child taken on "less or equal" (or "equals" for level splits).
    pub less_or_equal: Vec<Option<usize>>,
    /// Child taken otherwise.
    pub greater_or_not: Vec<Option<usize>>,
    /// Branch an NA value takes at each node; `false` for leaves.
    pub to_less_or_equal_if_na: Vec<bool>,
    /// Leaf value or split threshold/level, depending on the node kind.
    pub value: Vec<Value>,
}

impl CompactTree {
    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// `true` when the tree holds no nodes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.less_or_equal.iter().filter(|c| c.is_none()).count()
    }

    /// Flatten the reachable part of a working-tree arena, assigning fresh
    /// contiguous pre-order indices (pruning leaves unreachable entries
    /// behind in the arena; they are simply not copied).
    pub(crate) fn from_arena(arena: &[TreeNode], root: NodeId) -> CompactTree {
        let mut tree = CompactTree::default();
        tree.append(arena, root);
        tree
    }

    fn append(&mut self, arena: &[TreeNode], node: NodeId) -> usize {
        let index = self.value.len();
        self.split_col_index.push(None);
        self.less_or_equal.push(None);
        self.greater_or_not.push(None);
        self.to_less_or_equal_if_na.push(false);
        self.value.push(arena[node].leaf_value);

        if let (Some(le), Some(gn)) = (arena[node].less_or_equal, arena[node].greater_or_not) {
            let le_index = self.append(arena, le);
            let gn_index = self.append(arena, gn);
            self.split_col_index[index] = arena[node].split_col_index;
            self.less_or_equal[index] = Some(le_index);
            self.greater_or_not[index] = Some(gn_index);
            self.to_less_or_equal_if_na[index] = arena[node].to_less_or_equal_if_na;
            self.value[index] = arena[node].split_value;
        }

        index
    }
}

#[cfg(test)]
mod tests {
    use super::CompactTree;
    use crate::selection::SelectionSet;
    use crate::tree::{BranchStat, TreeNode};
    use crate::value::Value;

    fn node(leaf_value: Value) -> TreeNode {
        TreeNode {
            leaf_value,
            split_value: Value::Na,
            parent: None,
            less_or_equal: None,
            greater_or_not: None,
            to_less_or_equal_if_na: false,
            split_col_index: None,
            leaf_less_or_equal_count: 0,
            leaf_greater_or_not_count: 0,
            branch_stat: BranchStat::Correct(0),
            select_rows: SelectionSet::new(),
        }
    }

    /// Arena laid out in a deliberately scrambled order:
    /// entry 2 is the root splitting to leaves 0 and 4; entries 1 and 3
    /// are detached garbage that compaction must skip.
    fn scrambled_arena() -> Vec<TreeNode> {
        let mut root = node(Value::Level(0));
        root.split_value = Value::Number(1.5);
        root.split_col_index = Some(7);
        root.less_or_equal = Some(0);
        root.greater_or_not = Some(4);
        root.to_less_or_equal_if_na = true;
        vec![
            node(Value::Level(1)),
            node(Value::Level(9)),
            root,
            node(Value::Level(9)),
            node(Value::Level(2)),
        ]
    }

    #[test]
    fn preorder_reindex_from_scrambled_arena() {
        let tree = CompactTree::from_arena(&scrambled_arena(), 2);
        assert_eq!(tree.len(), 3);
        // Root first, then the two leaves in branch order.
        assert_eq!(tree.split_col_index[0], Some(7));
        assert_eq!(tree.less_or_equal[0], Some(1));
        assert_eq!(tree.greater_or_not[0], Some(2));
        assert!(tree.to_less_or_equal_if_na[0]);
        assert_eq!(tree.value[0], Value::Number(1.5));
        assert_eq!(tree.value[1], Value::Level(1));
        assert_eq!(tree.value[2], Value::Level(2));
    }

    #[test]
    fn leaves_have_no_links() {
        let tree = CompactTree::from_arena(&scrambled_arena(), 2);
        for index in 1..3 {
            assert_eq!(tree.split_col_index[index], None);
            assert_eq!(tree.less_or_equal[index], None);
            assert_eq!(tree.greater_or_not[index], None);
            assert!(!tree.to_less_or_equal_if_na[index]);
        }
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn single_leaf_tree() {
        let arena = vec![node(Value::Number(4.25))];
        let tree = CompactTree::from_arena(&arena, 0);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.n_leaves(), 1);
        assert_eq!(tree.value[0], Value::Number(4.25));
    }
}
