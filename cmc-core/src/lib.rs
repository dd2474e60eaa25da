//! Shared primitives for CMC biometric evaluation.
//!
//! `cmc-core` provides the foundation the other crates build on:
//!
//! - **Error types** — [`CmcError`] and [`Result`] for structured error handling
//! - **Traits** — [`Summarizable`] for one-line result summaries

pub mod error;
pub mod traits;

pub use error::{CmcError, Result};
pub use traits::*;
