//! Rank extraction for identification trials.
//!
//! Provides [`rank_list`], which orders a user's enrollees by descending
//! similarity, and [`genuine_rank`], which locates the user's genuine match
//! within the top `n_ranks` of that ordering. Ties between equal scores are
//! resolved by [`TieBreak`].

use std::cmp::Ordering;

use crate::matrix::SimilarityMatrix;

/// Strategy for ordering enrollees whose scores are tied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TieBreak {
    /// Tied enrollees keep their original column order (stable sort).
    #[default]
    ColumnOrder,
    /// The genuine match is ranked after every impostor it ties with.
    Pessimistic,
    /// The genuine match is ranked before every impostor it ties with.
    Optimistic,
}

impl TieBreak {
    /// Whether `impostor` is ordered before `genuine` when their scores tie.
    fn impostor_first(self, impostor: usize, genuine: usize) -> bool {
        match self {
            TieBreak::ColumnOrder => impostor < genuine,
            TieBreak::Pessimistic => true,
            TieBreak::Optimistic => false,
        }
    }
}

/// Enrollee column indices for `user`, sorted by descending score and
/// truncated to the first `n_ranks` entries.
///
/// # Panics
///
/// Panics if `user >= matrix.n_users()`.
pub fn rank_list(
    matrix: &SimilarityMatrix,
    user: usize,
    n_ranks: usize,
    tie_break: TieBreak,
) -> Vec<usize> {
    let row = matrix.row(user);
    let genuine = matrix.genuine_column(user);

    let mut order: Vec<usize> = (0..row.len()).collect();
    // `sort_by` is stable, so equal keys stay in column order.
    order.sort_by(|&a, &b| {
        row[b].total_cmp(&row[a]).then_with(|| match tie_break {
            TieBreak::ColumnOrder => Ordering::Equal,
            TieBreak::Pessimistic => (a == genuine).cmp(&(b == genuine)),
            TieBreak::Optimistic => (b == genuine).cmp(&(a == genuine)),
        })
    });
    order.truncate(n_ranks);
    order
}

/// 0-indexed rank of `user`'s genuine match, or `None` if it falls outside
/// the top `n_ranks`.
///
/// Equivalent to the genuine column's position in [`rank_list`], computed by
/// counting the enrollees that would precede it instead of sorting the row.
///
/// # Panics
///
/// Panics if `user >= matrix.n_users()`.
pub fn genuine_rank(
    matrix: &SimilarityMatrix,
    user: usize,
    n_ranks: usize,
    tie_break: TieBreak,
) -> Option<usize> {
    let row = matrix.row(user);
    let genuine = matrix.genuine_column(user);
    let target = row[genuine];

    let mut ahead = 0usize;
    for (j, score) in row.iter().enumerate() {
        if j == genuine {
            continue;
        }
        match score.total_cmp(&target) {
            Ordering::Greater => ahead += 1,
            Ordering::Equal if tie_break.impostor_first(j, genuine) => ahead += 1,
            _ => {}
        }
        if ahead >= n_ranks {
            return None;
        }
    }

    (ahead < n_ranks).then_some(ahead)
}

// ── Tests ──────────────────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn square_matrix(max_n: usize) -> impl Strategy<Value = SimilarityMatrix> {
        (1..=max_n).prop_flat_map(|n| {
            // coarse grid of scores so ties are common
            proptest::collection::vec(0..5u8, n * n).prop_map(move |cells| {
                let data = cells.into_iter().map(|c| c as f64 / 4.0).collect();
                let ids: Vec<String> = (0..n).map(|i| i.to_string()).collect();
                SimilarityMatrix::from_flat(ids.clone(), ids, data).unwrap()
            })
        })
    }

    fn tie_break() -> impl Strategy<Value = TieBreak> {
        prop_oneof![
            Just(TieBreak::ColumnOrder),
            Just(TieBreak::Pessimistic),
            Just(TieBreak::Optimistic),
        ]
    }

    proptest! {
        #[test]
        fn counting_matches_sorted_position(
            m in square_matrix(8),
            tb in tie_break(),
            window in 0..10usize,
        ) {
            for u in 0..m.n_users() {
                let list = rank_list(&m, u, window, tb);
                let genuine = m.genuine_column(u);
                let expected = list.iter().position(|&j| j == genuine);
                prop_assert_eq!(genuine_rank(&m, u, window, tb), expected);
            }
        }

        #[test]
        fn pessimistic_never_better_than_optimistic(m in square_matrix(8)) {
            let n = m.n_enrollees();
            for u in 0..m.n_users() {
                let p = genuine_rank(&m, u, n, TieBreak::Pessimistic);
                let o = genuine_rank(&m, u, n, TieBreak::Optimistic);
                prop_assert!(p >= o);
            }
        }
    }
}
