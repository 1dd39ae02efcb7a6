//! Deterministic enumeration of the column subsets assigned to trees.

use crate::error::TreesError;

/// Produce an ordered list of column subsets, one per future tree.
///
/// Column indices range over `0..column_count` (positions in the ensemble's
/// selected-columns list, not raw dataset columns). Each subset holds
/// exactly `columns_per_subset` distinct columns and at most `max_subsets`
/// subsets are produced.
///
/// The columns are partitioned into fixed-size groups and `k`-out-of-`g`
/// group combinations are enumerated lexicographically; the group size is
/// shrunk as far as the `max_subsets` budget allows so that the subset
/// space is covered as finely as possible. Within each combination the
/// `columns_per_subset` least-used columns are kept, ties broken by column
/// index, which balances how often each column is seen across the ensemble.
/// Identical inputs yield byte-identical output.
///
/// # Errors
///
/// Returns [`TreesError::Internal`] when `columns_per_subset` exceeds
/// `column_count`; the driver clamps before calling.
pub fn make_column_subsets(
    column_count: usize,
    columns_per_subset: usize,
    max_subsets: usize,
) -> Result<Vec<Vec<usize>>, TreesError> {
    if columns_per_subset > column_count || columns_per_subset == 0 {
        return Err(TreesError::Internal { detail: "columns per subset out of range" });
    }

    // Search for the smallest group size whose combination count still fits
    // the budget. Start with one full group per subset.
    let mut per_group_next = columns_per_subset;
    let mut n_full_next = column_count / per_group_next;
    let mut short_next = column_count - n_full_next * per_group_next;
    let mut k_choose_next = 1usize;
    let mut special_next = short_next != 0;

    let mut n_full = n_full_next;
    let mut per_group = per_group_next;
    let mut short = short_next;
    let mut k_choose = k_choose_next;
    let mut special = special_next;

    let mut done = per_group_next <= 1;
    while !done {
        per_group_next -= 1;
        n_full_next = column_count / per_group_next;
        short_next = column_count - n_full_next * per_group_next;
        k_choose_next = columns_per_subset.div_ceil(per_group_next);

        // The short group needs a separate pass when k-1 full groups plus
        // the short group cannot cover a whole subset.
        special_next = short_next != 0
            && (k_choose_next - 1) * per_group_next + short_next < columns_per_subset;

        let combo_count = if special_next {
            2.0 * n_choose_k(n_full_next, k_choose_next)
        } else if short_next != 0 {
            n_choose_k(n_full_next + 1, k_choose_next)
        } else {
            n_choose_k(n_full_next, k_choose_next)
        };

        if combo_count <= max_subsets as f64 {
            n_full = n_full_next;
            per_group = per_group_next;
            short = short_next;
            k_choose = k_choose_next;
            special = special_next;
        }

        if per_group == 1 || combo_count >= max_subsets as f64 {
            done = true;
        }
    }

    // Enumerate the chosen group combinations, capped at max_subsets.
    let mut count = 0usize;
    let mut combinations: Vec<Vec<usize>> = Vec::new();
    if special {
        iterate_combinations(n_full, k_choose, None, &mut combinations, &mut count, max_subsets);
        iterate_combinations(
            n_full,
            k_choose,
            Some(n_full),
            &mut combinations,
            &mut count,
            max_subsets,
        );
    } else if short != 0 {
        iterate_combinations(
            n_full + 1,
            k_choose,
            None,
            &mut combinations,
            &mut count,
            max_subsets,
        );
    } else {
        iterate_combinations(n_full, k_choose, None, &mut combinations, &mut count, max_subsets);
    }

    // A combination may cover more columns than a subset needs; keep the
    // least-used ones, ties by column index, and tally usage as we go.
    let mut usage = vec![0usize; column_count];
    let mut subsets = Vec::with_capacity(combinations.len());

    for combination in &combinations {
        let mut available: Vec<(usize, usize)> = Vec::new();
        for &group in combination {
            let start = group * per_group;
            let end = ((group + 1) * per_group).min(column_count);
            for col in start..end {
                available.push((col, usage[col]));
            }
        }
        available.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));

        if available.len() < columns_per_subset {
            return Err(TreesError::Internal { detail: "combination smaller than subset" });
        }

        let mut subset = Vec::with_capacity(columns_per_subset);
        for &(col, _) in available.iter().take(columns_per_subset) {
            subset.push(col);
            usage[col] += 1;
        }
        subsets.push(subset);
    }

    Ok(subsets)
}

/// Number of combinations of `k` items chosen from `n`, as a float so that
/// oversized intermediate counts saturate instead of overflowing.
fn n_choose_k(n: usize, k: usize) -> f64 {
    let k = if n - k > k { n - k } else { k };
    let mut result = 1.0;
    for i in ((k + 1)..=n).rev() {
        result *= i as f64;
    }
    for i in (2..=(n - k)).rev() {
        result /= i as f64;
    }
    result
}

/// Recursively list all combinations of `k` items chosen from `0..n` in
/// lexicographic order, stopping once `count` reaches `limit`. When
/// `append` is set, that index is appended to every combination generated
/// by this call (used to splice in the short group).
fn iterate_combinations(
    n: usize,
    k: usize,
    append: Option<usize>,
    combinations: &mut Vec<Vec<usize>>,
    count: &mut usize,
    limit: usize,
) {
    let mut next: Vec<Vec<usize>> = Vec::new();

    if n == 0 {
        // nothing to choose from
    } else if k == 0 {
        if *count < limit {
            next.push(Vec::new());
            *count += 1;
        }
    } else if n == k {
        if *count < limit {
            next.push((0..k).collect());
            *count += 1;
        }
    } else {
        // All combinations without the last item, then all that contain it.
        if *count < limit {
            iterate_combinations(n - 1, k, None, &mut next, count, limit);
        }
        if *count < limit {
            iterate_combinations(n - 1, k - 1, Some(n - 1), &mut next, count, limit);
        }
    }

    if let Some(index) = append {
        for combination in &mut next {
            combination.push(index);
        }
    }

    combinations.append(&mut next);
}
