//! Cumulative Matching Characteristic (CMC) evaluation for biometric
//! identification.
//!
//! - **Similarity matrices** — [`SimilarityMatrix`], probes by gallery, with
//!   the genuine match of each probe resolved from its identifier
//! - **Rank extraction** — [`rank_list`] and [`genuine_rank`] with explicit
//!   [`TieBreak`] policies
//! - **CMC curves** — [`cmc_curve`] and [`CmcCurve`]: rank-k recognition
//!   rates and a normalized area-under-curve summary
//! - **Calculator** — [`CmcCalculator`], an owned matrix with an explicitly
//!   computed, staleness-aware cached curve
//!
//! Enable the `parallel` feature to spread the per-user pass over rayon.

pub mod calculator;
pub mod cmc;
pub mod matrix;
pub mod rank;

pub use calculator::CmcCalculator;
pub use cmc::{
    clamp_n_ranks, cmc_curve, CmcConfig, CmcCurve, CmcPoint, Normalization, DEFAULT_N_RANKS,
    DEFAULT_TITLE, RANK_AXIS_LABEL, RATE_AXIS_LABEL,
};
pub use matrix::SimilarityMatrix;
pub use rank::{genuine_rank, rank_list, TieBreak};
