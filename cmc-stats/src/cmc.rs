//! Cumulative Matching Characteristic curves.
//!
//! [`cmc_curve`] tallies, for every user of a [`SimilarityMatrix`], the rank
//! at which its genuine match appears, normalizes the tally and accumulates
//! it into a [`CmcCurve`]. The curve answers "what fraction of users is
//! correctly identified within the top `k` candidates" for every
//! `k` in `1..=n_ranks`, and summarizes the whole curve as a normalized area.

use cmc_core::{CmcError, Result, Summarizable};
use tracing::{debug, warn};

use crate::matrix::SimilarityMatrix;
use crate::rank::{genuine_rank, TieBreak};

/// Number of ranks evaluated when none is configured.
pub const DEFAULT_N_RANKS: i64 = 100;

/// Default base title for CMC charts.
pub const DEFAULT_TITLE: &str = "Fingerprint detector CMC curve";

/// X-axis label for CMC charts.
pub const RANK_AXIS_LABEL: &str = "Rank";

/// Y-axis label for CMC charts.
pub const RATE_AXIS_LABEL: &str = "Recognition Rate";

/// Divisor applied to the rank-hit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Normalization {
    /// Divide by the number of users: the curve is the fraction of users
    /// identified by each rank and always ends at or below 1.
    #[default]
    Users,
    /// Divide by the number of enrollees. Only a rate when the gallery
    /// holds exactly the probe identities.
    Enrollees,
}

impl Normalization {
    fn divisor(self, matrix: &SimilarityMatrix) -> usize {
        match self {
            Normalization::Users => matrix.n_users(),
            Normalization::Enrollees => matrix.n_enrollees(),
        }
    }
}

/// Parameters of a CMC computation.
#[derive(Debug, Clone, PartialEq)]
pub struct CmcConfig {
    /// Requested number of ranks, clamped to `[0, n_users]` at compute time.
    pub n_ranks: i64,
    pub normalization: Normalization,
    pub tie_break: TieBreak,
    /// Optional label carried into chart titles.
    pub name: Option<String>,
}

impl Default for CmcConfig {
    fn default() -> Self {
        Self {
            n_ranks: DEFAULT_N_RANKS,
            normalization: Normalization::default(),
            tie_break: TieBreak::default(),
            name: None,
        }
    }
}

impl CmcConfig {
    /// Config with the given requested rank count and default everything else.
    pub fn new(n_ranks: i64) -> Self {
        Self {
            n_ranks,
            ..Self::default()
        }
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Clamp a requested rank count to `[0, n_users]`.
///
/// Out-of-range requests are not errors; a warning is logged and the
/// clamped value returned.
pub fn clamp_n_ranks(requested: i64, n_users: usize) -> usize {
    if requested < 0 {
        warn!(requested, effective = 0, "n_ranks below zero, clamping");
        return 0;
    }
    let requested_u = usize::try_from(requested).unwrap_or(usize::MAX);
    if requested_u > n_users {
        warn!(requested, effective = n_users, "n_ranks exceeds user count, clamping");
        return n_users;
    }
    requested_u
}

/// A single point on the CMC curve.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CmcPoint {
    /// 1-indexed rank.
    pub rank: usize,
    /// Cumulative recognition rate at this rank.
    pub recognition_rate: f64,
}

/// A computed CMC curve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CmcCurve {
    n_ranks: usize,
    rank_frequency: Vec<usize>,
    cumulative: Vec<f64>,
    /// Genuine rank (0-indexed) per user, `None` for misses.
    genuine_ranks: Vec<Option<usize>>,
    divisor: usize,
    normalization: Normalization,
    name: Option<String>,
    revision: u64,
}

/// Compute the CMC curve of `matrix`.
///
/// Every user contributes one hit at the rank of its genuine match, or
/// nothing if the match lies beyond `n_ranks`.
pub fn cmc_curve(matrix: &SimilarityMatrix, config: &CmcConfig) -> CmcCurve {
    let n_ranks = clamp_n_ranks(config.n_ranks, matrix.n_users());
    let tie_break = config.tie_break;

    let genuine_ranks = collect_genuine_ranks(matrix, n_ranks, tie_break);
    let rank_frequency = tally(&genuine_ranks, n_ranks);

    let divisor = config.normalization.divisor(matrix);
    let cumulative = cumulative_frequency(&rank_frequency, divisor);

    debug!(
        users = matrix.n_users(),
        enrollees = matrix.n_enrollees(),
        n_ranks,
        hits = rank_frequency.iter().sum::<usize>(),
        divisor,
        "computed CMC curve"
    );

    CmcCurve {
        n_ranks,
        rank_frequency,
        cumulative,
        genuine_ranks,
        divisor,
        normalization: config.normalization,
        name: config.name.clone(),
        revision: matrix.revision(),
    }
}

#[cfg(feature = "parallel")]
fn collect_genuine_ranks(
    matrix: &SimilarityMatrix,
    n_ranks: usize,
    tie_break: TieBreak,
) -> Vec<Option<usize>> {
    use rayon::prelude::*;
    (0..matrix.n_users())
        .into_par_iter()
        .map(|u| genuine_rank(matrix, u, n_ranks, tie_break))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn collect_genuine_ranks(
    matrix: &SimilarityMatrix,
    n_ranks: usize,
    tie_break: TieBreak,
) -> Vec<Option<usize>> {
    (0..matrix.n_users())
        .map(|u| genuine_rank(matrix, u, n_ranks, tie_break))
        .collect()
}

#[cfg(feature = "parallel")]
fn tally(genuine_ranks: &[Option<usize>], n_ranks: usize) -> Vec<usize> {
    use rayon::prelude::*;
    genuine_ranks
        .par_iter()
        .fold(
            || vec![0usize; n_ranks],
            |mut counts, rank| {
                if let Some(r) = *rank {
                    counts[r] += 1;
                }
                counts
            },
        )
        .reduce(
            || vec![0usize; n_ranks],
            |mut a, b| {
                for (x, y) in a.iter_mut().zip(b) {
                    *x += y;
                }
                a
            },
        )
}

#[cfg(not(feature = "parallel"))]
fn tally(genuine_ranks: &[Option<usize>], n_ranks: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_ranks];
    for r in genuine_ranks.iter().flatten() {
        counts[*r] += 1;
    }
    counts
}

/// Prefix sum of `counts / divisor`.
fn cumulative_frequency(counts: &[usize], divisor: usize) -> Vec<f64> {
    let d = divisor as f64;
    let mut total = 0usize;
    counts
        .iter()
        .map(|&c| {
            // accumulate integer counts so the tail is exact
            total += c;
            total as f64 / d
        })
        .collect()
}

/// Trapezoidal area under `y` sampled at unit-spaced x.
fn trapezoidal_area(y: &[f64]) -> f64 {
    y.windows(2).map(|w| (w[0] + w[1]) / 2.0).sum()
}

impl CmcCurve {
    /// Number of ranks the curve covers.
    pub fn n_ranks(&self) -> usize {
        self.n_ranks
    }

    /// Whether the curve has no points (`n_ranks == 0`).
    pub fn is_empty(&self) -> bool {
        self.n_ranks == 0
    }

    /// Hit counts per 0-indexed rank.
    pub fn rank_frequency(&self) -> &[usize] {
        &self.rank_frequency
    }

    /// Hit counts divided by the normalization divisor.
    pub fn normalized_frequency(&self) -> Vec<f64> {
        let d = self.divisor as f64;
        self.rank_frequency.iter().map(|&c| c as f64 / d).collect()
    }

    /// Cumulative recognition rate per 0-indexed rank.
    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    /// Genuine-match rank (0-indexed) of every user, `None` for misses.
    pub fn genuine_ranks(&self) -> &[Option<usize>] {
        &self.genuine_ranks
    }

    /// Users whose genuine match fell inside the window.
    pub fn hits(&self) -> usize {
        self.rank_frequency.iter().sum()
    }

    /// Users whose genuine match fell outside the window.
    pub fn misses(&self) -> usize {
        self.genuine_ranks.len() - self.hits()
    }

    pub fn divisor(&self) -> usize {
        self.divisor
    }

    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Matrix revision the curve was computed from.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Cumulative recognition rate using the top `rank` candidates.
    ///
    /// # Errors
    ///
    /// Returns [`CmcError::OutOfRange`] unless `1 <= rank <= n_ranks`.
    pub fn cumulative_at(&self, rank: usize) -> Result<f64> {
        if rank == 0 || rank > self.n_ranks {
            return Err(CmcError::OutOfRange {
                rank,
                n_ranks: self.n_ranks,
            });
        }
        Ok(self.cumulative[rank - 1])
    }

    /// Raw trapezoidal area under the curve over ranks `1..=n_ranks`.
    pub fn auc(&self) -> f64 {
        trapezoidal_area(&self.cumulative)
    }

    /// Area under the curve normalized to `[0, 1]`; a curve that is 1 at
    /// every rank scores exactly 1.
    ///
    /// The area over `[1, n_ranks]` is divided by the interval width
    /// `n_ranks - 1`. A single-rank curve summarizes to its only value.
    ///
    /// # Errors
    ///
    /// Returns an error if the curve is empty.
    pub fn curve_summary(&self) -> Result<f64> {
        match self.n_ranks {
            0 => Err(CmcError::InvalidInput(
                "curve_summary: curve is empty (n_ranks = 0)".into(),
            )),
            1 => Ok(self.cumulative[0]),
            n => Ok(self.auc() / (n - 1) as f64),
        }
    }

    /// Trapezoidal area divided by `n_ranks` rather than by the interval
    /// width. This is the figure printed in the legend of the Python CMC
    /// tooling; a perfect curve scores `(n_ranks - 1) / n_ranks`.
    ///
    /// # Errors
    ///
    /// Returns an error if the curve is empty.
    pub fn area_per_rank(&self) -> Result<f64> {
        if self.n_ranks == 0 {
            return Err(CmcError::InvalidInput(
                "area_per_rank: curve is empty (n_ranks = 0)".into(),
            ));
        }
        Ok(self.auc() / self.n_ranks as f64)
    }

    /// `(rank, recognition_rate)` pairs for plotting.
    pub fn points(&self) -> Vec<CmcPoint> {
        self.cumulative
            .iter()
            .enumerate()
            .map(|(i, &rate)| CmcPoint {
                rank: i + 1,
                recognition_rate: rate,
            })
            .collect()
    }

    /// Chart title: `base`, followed by the curve name in parentheses if set.
    pub fn title(&self, base: &str) -> String {
        match &self.name {
            Some(name) => format!("{base} ({name})"),
            None => base.to_string(),
        }
    }

    /// Legend entry carrying the summary to two decimals.
    pub fn legend_label(&self) -> String {
        match self.curve_summary() {
            Ok(s) => format!("CMC curve (auc = {s:.2})"),
            Err(_) => "CMC curve (empty)".to_string(),
        }
    }
}

impl Summarizable for CmcCurve {
    fn summary(&self) -> String {
        let rank1 = self.cumulative.first().copied().unwrap_or(0.0);
        let last = self.cumulative.last().copied().unwrap_or(0.0);
        format!(
            "n_ranks={}, hits={}, misses={}, rank1={:.4}, rank{}={:.4}, auc={:.4}",
            self.n_ranks,
            self.hits(),
            self.misses(),
            rank1,
            self.n_ranks,
            last,
            self.curve_summary().unwrap_or(0.0),
        )
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn labelled_matrix(max_users: usize, max_extra: usize) -> impl Strategy<Value = SimilarityMatrix> {
        (1..=max_users, 0..=max_extra).prop_flat_map(|(n_users, extra)| {
            let n_cols = n_users + extra;
            proptest::collection::vec(-1.0f64..1.0, n_users * n_cols).prop_map(move |data| {
                let users: Vec<String> = (0..n_users).map(|i| format!("u{i}")).collect();
                // genuine columns sit after the impostor-only gallery entries
                let enrollees: Vec<String> = (0..extra)
                    .map(|i| format!("x{i}"))
                    .chain(users.iter().cloned())
                    .collect();
                SimilarityMatrix::from_flat(users, enrollees, data).unwrap()
            })
        })
    }

    /// Like `labelled_matrix`, but scores are drawn from a five-value grid so
    /// tied scores are common.
    fn tied_matrix(max_users: usize, max_extra: usize) -> impl Strategy<Value = SimilarityMatrix> {
        (1..=max_users, 0..=max_extra).prop_flat_map(|(n_users, extra)| {
            let n_cols = n_users + extra;
            proptest::collection::vec(0..5u8, n_users * n_cols).prop_map(move |cells| {
                let users: Vec<String> = (0..n_users).map(|i| format!("u{i}")).collect();
                let enrollees: Vec<String> = users
                    .iter()
                    .cloned()
                    .chain((0..extra).map(|i| format!("x{i}")))
                    .collect();
                let data = cells.into_iter().map(|c| c as f64 / 4.0).collect();
                SimilarityMatrix::from_flat(users, enrollees, data).unwrap()
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

    fn normalization() -> impl Strategy<Value = Normalization> {
        prop_oneof![Just(Normalization::Users), Just(Normalization::Enrollees)]
    }

    /// Straightforward sort-and-scan CMC used as the expected result.
    fn sorted_reference(
        m: &SimilarityMatrix,
        config: &CmcConfig,
    ) -> (Vec<Option<usize>>, Vec<usize>, Vec<f64>) {
        let n_ranks = clamp_n_ranks(config.n_ranks, m.n_users());
        let mut ranks = Vec::new();
        let mut counts = vec![0usize; n_ranks];
        for u in 0..m.n_users() {
            let genuine = m.genuine_column(u);
            let rank = crate::rank::rank_list(m, u, n_ranks, config.tie_break)
                .iter()
                .position(|&j| j == genuine);
            if let Some(r) = rank {
                counts[r] += 1;
            }
            ranks.push(rank);
        }
        let divisor = match config.normalization {
            Normalization::Users => m.n_users(),
            Normalization::Enrollees => m.n_enrollees(),
        } as f64;
        let mut total = 0.0;
        let cumulative = counts
            .iter()
            .map(|&c| {
                total += c as f64 / divisor;
                total
            })
            .collect();
        (ranks, counts, cumulative)
    }

    proptest! {
        // Exercises whichever aggregation pass is compiled in; run the suite
        // with and without `--features parallel`.
        #[test]
        fn aggregation_matches_sorted_reference(
            m in tied_matrix(12, 4),
            n in -2i64..16,
            tb in tie_break(),
            norm in normalization(),
        ) {
            let config = CmcConfig::new(n).with_tie_break(tb).with_normalization(norm);
            let curve = cmc_curve(&m, &config);
            let (ranks, counts, cumulative) = sorted_reference(&m, &config);

            prop_assert_eq!(curve.genuine_ranks(), ranks.as_slice());
            prop_assert_eq!(curve.rank_frequency(), counts.as_slice());
            prop_assert_eq!(curve.cumulative().len(), cumulative.len());
            for (got, want) in curve.cumulative().iter().zip(&cumulative) {
                prop_assert!((got - want).abs() < 1e-9);
            }
        }

        #[test]
        fn cumulative_monotone_and_bounded(m in labelled_matrix(10, 4), n in -3i64..15) {
            let curve = cmc_curve(&m, &CmcConfig::new(n));
            let c = curve.cumulative();
            for w in c.windows(2) {
                prop_assert!(w[0] <= w[1]);
            }
            for &v in c {
                prop_assert!((0.0..=1.0).contains(&v));
            }
            if let Ok(s) = curve.curve_summary() {
                prop_assert!((0.0..=1.0 + 1e-12).contains(&s));
            }
        }

        #[test]
        fn full_window_reaches_one(m in labelled_matrix(10, 0)) {
            // square gallery: every genuine match ranks within n_users
            let curve = cmc_curve(&m, &CmcConfig::new(m.n_users() as i64));
            let last = *curve.cumulative().last().unwrap();
            prop_assert!((last - 1.0).abs() < 1e-12);
            prop_assert_eq!(curve.misses(), 0);
        }

        #[test]
        fn hits_plus_misses_is_users(m in labelled_matrix(10, 4), n in 0i64..12) {
            let curve = cmc_curve(&m, &CmcConfig::new(n));
            prop_assert_eq!(curve.hits() + curve.misses(), m.n_users());
        }
    }
}
