//! Stateful CMC evaluation over an owned similarity matrix.
//!
//! A [`CmcCalculator`] is either uninitialized or holds the curve computed by
//! its last [`compute`](CmcCalculator::compute) call. Accessors never compute
//! on their own. Writes through [`matrix_mut`](CmcCalculator::matrix_mut) do
//! not discard the cached curve; [`is_stale`](CmcCalculator::is_stale) reports
//! when it no longer reflects the matrix.

use cmc_core::{CmcError, Result};
use tracing::debug;

use crate::cmc::{clamp_n_ranks, cmc_curve, CmcConfig, CmcCurve};
use crate::matrix::SimilarityMatrix;

/// CMC curve calculator with an explicit `Uninitialized -> Computed` state.
#[derive(Debug, Clone)]
pub struct CmcCalculator {
    matrix: SimilarityMatrix,
    config: CmcConfig,
    curve: Option<CmcCurve>,
}

impl CmcCalculator {
    /// Create an uninitialized calculator.
    pub fn new(matrix: SimilarityMatrix, config: CmcConfig) -> Self {
        Self {
            matrix,
            config,
            curve: None,
        }
    }

    /// Create a calculator and compute its curve immediately.
    pub fn computed(matrix: SimilarityMatrix, config: CmcConfig) -> Self {
        let mut calc = Self::new(matrix, config);
        calc.compute();
        calc
    }

    /// Compute (or recompute) the curve from the current matrix.
    pub fn compute(&mut self) -> &CmcCurve {
        if self.is_stale() {
            debug!(
                cached = self.curve.as_ref().map(CmcCurve::revision),
                current = self.matrix.revision(),
                "recomputing stale CMC curve"
            );
        }
        self.curve.insert(cmc_curve(&self.matrix, &self.config))
    }

    /// The cached curve, if computed.
    pub fn curve(&self) -> Option<&CmcCurve> {
        self.curve.as_ref()
    }

    /// Whether a curve has been computed.
    pub fn is_computed(&self) -> bool {
        self.curve.is_some()
    }

    /// Whether the cached curve predates the latest matrix write.
    ///
    /// An uninitialized calculator is never stale.
    pub fn is_stale(&self) -> bool {
        self.curve
            .as_ref()
            .is_some_and(|c| c.revision() != self.matrix.revision())
    }

    pub fn matrix(&self) -> &SimilarityMatrix {
        &self.matrix
    }

    /// Mutable access to the matrix. The cached curve is kept until the
    /// next [`compute`](Self::compute).
    pub fn matrix_mut(&mut self) -> &mut SimilarityMatrix {
        &mut self.matrix
    }

    pub fn config(&self) -> &CmcConfig {
        &self.config
    }

    /// Effective rank count: the configured request clamped to the user count.
    pub fn n_ranks(&self) -> usize {
        clamp_n_ranks(self.config.n_ranks, self.matrix.n_users())
    }

    /// Change the requested rank count. Drops any cached curve.
    pub fn set_n_ranks(&mut self, n_ranks: i64) {
        self.config.n_ranks = n_ranks;
        self.curve = None;
    }

    fn computed_curve(&self) -> Result<&CmcCurve> {
        self.curve.as_ref().ok_or(CmcError::NotComputed)
    }

    /// Cumulative recognition rate at `rank` from the cached curve.
    ///
    /// # Errors
    ///
    /// [`CmcError::NotComputed`] before the first `compute`, and
    /// [`CmcError::OutOfRange`] unless `1 <= rank <= n_ranks`.
    pub fn cumulative_at(&self, rank: usize) -> Result<f64> {
        self.computed_curve()?.cumulative_at(rank)
    }

    /// Normalized area under the cached curve.
    pub fn curve_summary(&self) -> Result<f64> {
        self.computed_curve()?.curve_summary()
    }
}
