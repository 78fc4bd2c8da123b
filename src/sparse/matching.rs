//! Hopcroft-Karp algorithm for maximum bipartite matching.
//!
//! Finds a maximum cardinality matching between the columns and rows of a
//! sparse pattern in O(E√V) time. The matching size is the structural rank,
//! which symbolic factorization uses to reject patterns that are singular
//! for every choice of values.
//!
//! # References
//!
//! Hopcroft, J. E., & Karp, R. M. (1973). "An n^(5/2) algorithm for maximum
//! matchings in bipartite graphs." SIAM Journal on Computing, 2(4), 225-231.

use std::collections::VecDeque;

/// Result of maximum matching computation.
#[derive(Debug, Clone)]
pub struct MatchingResult {
    /// For each column j, the row matched to it
    pub col_to_row: Vec<Option<usize>>,
    /// For each row i, the column matched to it
    pub row_to_col: Vec<Option<usize>>,
    /// Size of the maximum matching (structural rank)
    pub structural_rank: usize,
}

const INF: usize = usize::MAX;

/// Compute a maximum bipartite matching of a CSC pattern.
///
/// An edge exists between column j and row i if the pattern has a nonzero
/// at (i, j). The pattern is assumed valid (see [`super::Sparsity::new`]).
pub fn hopcroft_karp(
    n_rows: usize,
    n_cols: usize,
    col_ptrs: &[usize],
    row_indices: &[usize],
) -> MatchingResult {
    let mut col_to_row: Vec<Option<usize>> = vec![None; n_cols];
    let mut row_to_col: Vec<Option<usize>> = vec![None; n_rows];

    if n_rows == 0 || n_cols == 0 {
        return MatchingResult {
            col_to_row,
            row_to_col,
            structural_rank: 0,
        };
    }

    // dist[n_cols] is the distance of the "unmatched row" sentinel
    let mut dist: Vec<usize> = vec![0; n_cols + 1];
    let mut matching_size = 0usize;

    while bfs(col_ptrs, row_indices, &col_to_row, &row_to_col, &mut dist) {
        for j in 0..n_cols {
            if col_to_row[j].is_none()
                && dfs(
                    j,
                    col_ptrs,
                    row_indices,
                    &mut col_to_row,
                    &mut row_to_col,
                    &mut dist,
                )
            {
                matching_size += 1;
            }
        }
    }

    MatchingResult {
        col_to_row,
        row_to_col,
        structural_rank: matching_size,
    }
}

/// BFS phase: build the level graph from unmatched columns.
///
/// Returns true if at least one augmenting path exists.
fn bfs(
    col_ptrs: &[usize],
    row_indices: &[usize],
    col_to_row: &[Option<usize>],
    row_to_col: &[Option<usize>],
    dist: &mut [usize],
) -> bool {
    let n_cols = col_to_row.len();
    let mut queue: VecDeque<usize> = VecDeque::with_capacity(n_cols);

    for j in 0..n_cols {
        if col_to_row[j].is_none() {
            dist[j] = 0;
            queue.push_back(j);
        } else {
            dist[j] = INF;
        }
    }
    dist[n_cols] = INF;

    while let Some(j) = queue.pop_front() {
        if dist[j] < dist[n_cols] {
            for &i in &row_indices[col_ptrs[j]..col_ptrs[j + 1]] {
                let matched = row_to_col[i];
                let idx = matched.unwrap_or(n_cols);
                if dist[idx] == INF {
                    dist[idx] = dist[j] + 1;
                    if let Some(c) = matched {
                        queue.push_back(c);
                    }
                }
            }
        }
    }

    dist[n_cols] != INF
}

/// DFS phase: find an augmenting path from column j in the level graph.
fn dfs(
    j: usize,
    col_ptrs: &[usize],
    row_indices: &[usize],
    col_to_row: &mut [Option<usize>],
    row_to_col: &mut [Option<usize>],
    dist: &mut [usize],
) -> bool {
    let n_cols = col_to_row.len();
    for &i in &row_indices[col_ptrs[j]..col_ptrs[j + 1]] {
        let matched = row_to_col[i];
        let idx = matched.unwrap_or(n_cols);
        if dist[idx] == dist[j].saturating_add(1) {
            let augmented = match matched {
                None => true,
                Some(c) => dfs(c, col_ptrs, row_indices, col_to_row, row_to_col, dist),
            };
            if augmented {
                col_to_row[j] = Some(i);
                row_to_col[i] = Some(j);
                return true;
            }
        }
    }

    // Dead end for this phase
    dist[j] = INF;
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hopcroft_karp_empty() {
        let result = hopcroft_karp(0, 0, &[0], &[]);
        assert_eq!(result.structural_rank, 0);
    }

    #[test]
    fn test_hopcroft_karp_permutation_needed() {
        // [. x]
        // [x x]
        let result = hopcroft_karp(2, 2, &[0, 1, 3], &[1, 0, 1]);
        assert_eq!(result.structural_rank, 2);
        assert_eq!(result.col_to_row[0], Some(1));
        assert_eq!(result.col_to_row[1], Some(0));
    }

    #[test]
    fn test_hopcroft_karp_augmenting_path() {
        // [x x .]
        // [x . x]
        // [. x x]
        let result = hopcroft_karp(3, 3, &[0, 2, 4, 6], &[0, 1, 0, 2, 1, 2]);
        assert_eq!(result.structural_rank, 3);

        let mut row_matched = [false; 3];
        for j in 0..3 {
            let i = result.col_to_row[j].unwrap();
            assert!(!row_matched[i], "Row {} matched twice", i);
            row_matched[i] = true;
            assert_eq!(result.row_to_col[i], Some(j));
        }
    }

    #[test]
    fn test_structural_rank_truly_singular() {
        // [x .]
        // [x .]
        let result = hopcroft_karp(2, 2, &[0, 2, 2], &[0, 1]);
        assert_eq!(result.structural_rank, 1);
        assert_eq!(result.col_to_row[1], None);
    }
}
