//! Probe-by-gallery similarity matrices.
//!
//! A [`SimilarityMatrix`] stores one row of scores per user (probe) and one
//! column per enrollee (gallery entry). Every user must also be enrolled: the
//! column carrying the user's own identifier is its genuine match.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use cmc_core::{CmcError, Result};

/// Source of matrix revisions, unique across every matrix in the process.
static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

fn next_revision() -> u64 {
    NEXT_REVISION.fetch_add(1, Ordering::Relaxed)
}

/// Row-major similarity scores between users and enrollees.
///
/// Equality compares labels and scores, not revisions.
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    /// Row-major storage: `data[user * n_enrollees + enrollee]`.
    data: Vec<f64>,
    users: Vec<String>,
    enrollees: Vec<String>,
    /// Column index of each user's genuine match.
    genuine: Vec<usize>,
    revision: u64,
}

impl SimilarityMatrix {
    /// Build a matrix from labelled rows.
    ///
    /// # Errors
    ///
    /// Returns [`CmcError::InvalidMatrix`] if the matrix is empty, a row has
    /// the wrong length, a score is NaN, an identifier is duplicated, or a
    /// user has no enrollee column with the same identifier.
    pub fn new(users: Vec<String>, enrollees: Vec<String>, rows: &[&[f64]]) -> Result<Self> {
        if rows.len() != users.len() {
            return Err(CmcError::InvalidMatrix(format!(
                "{} user labels for {} rows",
                users.len(),
                rows.len()
            )));
        }
        let n_cols = enrollees.len();
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(CmcError::InvalidMatrix(format!(
                    "row {} ({}) has {} scores, expected {}",
                    i,
                    users[i],
                    row.len(),
                    n_cols,
                )));
            }
            data.extend_from_slice(row);
        }
        Self::from_flat(users, enrollees, data)
    }

    /// Build a matrix from row-major scores.
    ///
    /// # Errors
    ///
    /// Same conditions as [`SimilarityMatrix::new`], plus a length mismatch
    /// between `data` and `users.len() * enrollees.len()`.
    pub fn from_flat(users: Vec<String>, enrollees: Vec<String>, data: Vec<f64>) -> Result<Self> {
        if users.is_empty() {
            return Err(CmcError::InvalidMatrix("no users".into()));
        }
        if enrollees.is_empty() {
            return Err(CmcError::InvalidMatrix("no enrollees".into()));
        }
        if data.len() != users.len() * enrollees.len() {
            return Err(CmcError::InvalidMatrix(format!(
                "{} scores for a {}x{} matrix",
                data.len(),
                users.len(),
                enrollees.len()
            )));
        }
        if let Some(pos) = data.iter().position(|v| v.is_nan()) {
            let n_cols = enrollees.len();
            return Err(CmcError::InvalidMatrix(format!(
                "NaN score for user {} / enrollee {}",
                users[pos / n_cols],
                enrollees[pos % n_cols]
            )));
        }

        let genuine = resolve_genuine(&users, &enrollees)?;

        Ok(Self {
            data,
            users,
            enrollees,
            genuine,
            revision: next_revision(),
        })
    }

    /// Build a matrix whose users and enrollees are labelled by position
    /// (`"0"`, `"1"`, ...). Row `i`'s genuine match is column `i`, so the
    /// matrix must have at least as many columns as rows.
    pub fn from_rows(rows: &[&[f64]]) -> Result<Self> {
        let n_cols = rows.first().map_or(0, |r| r.len());
        let users = (0..rows.len()).map(|i| i.to_string()).collect();
        let enrollees = (0..n_cols).map(|j| j.to_string()).collect();
        Self::new(users, enrollees, rows)
    }

    /// Number of users (rows).
    pub fn n_users(&self) -> usize {
        self.users.len()
    }

    /// Number of enrollees (columns).
    pub fn n_enrollees(&self) -> usize {
        self.enrollees.len()
    }

    /// User identifiers in row order.
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Enrollee identifiers in column order.
    pub fn enrollees(&self) -> &[String] {
        &self.enrollees
    }

    /// Scores of one user against every enrollee.
    ///
    /// # Panics
    ///
    /// Panics if `user >= n_users()`.
    pub fn row(&self, user: usize) -> &[f64] {
        let n = self.enrollees.len();
        &self.data[user * n..(user + 1) * n]
    }

    /// Score at `(user, enrollee)`, or `None` if out of bounds.
    pub fn get(&self, user: usize, enrollee: usize) -> Option<f64> {
        if user < self.users.len() && enrollee < self.enrollees.len() {
            Some(self.data[user * self.enrollees.len() + enrollee])
        } else {
            None
        }
    }

    /// Column index of the genuine match of `user`.
    ///
    /// # Panics
    ///
    /// Panics if `user >= n_users()`.
    pub fn genuine_column(&self, user: usize) -> usize {
        self.genuine[user]
    }

    /// Row index of the user with identifier `id`.
    pub fn user_index(&self, id: &str) -> Option<usize> {
        self.users.iter().position(|u| u == id)
    }

    /// Column index of the enrollee with identifier `id`.
    pub fn enrollee_index(&self, id: &str) -> Option<usize> {
        self.enrollees.iter().position(|e| e == id)
    }

    /// Content revision. Every constructed matrix and every successful write
    /// gets a fresh value, so two revisions are equal only for the same
    /// unmodified matrix (or its clones).
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Overwrite the score at `(user, enrollee)`.
    ///
    /// # Errors
    ///
    /// Returns an error if either index is out of bounds or `score` is NaN.
    pub fn set(&mut self, user: usize, enrollee: usize, score: f64) -> Result<()> {
        if user >= self.users.len() || enrollee >= self.enrollees.len() {
            return Err(CmcError::InvalidInput(format!(
                "set: ({}, {}) outside a {}x{} matrix",
                user,
                enrollee,
                self.users.len(),
                self.enrollees.len()
            )));
        }
        if score.is_nan() {
            return Err(CmcError::InvalidMatrix(format!(
                "NaN score for user {} / enrollee {}",
                self.users[user], self.enrollees[enrollee]
            )));
        }
        self.data[user * self.enrollees.len() + enrollee] = score;
        self.revision = next_revision();
        Ok(())
    }

    /// Overwrite the score for a `(user, enrollee)` identifier pair.
    pub fn set_by_id(&mut self, user: &str, enrollee: &str, score: f64) -> Result<()> {
        let i = self
            .user_index(user)
            .ok_or_else(|| CmcError::InvalidInput(format!("set_by_id: unknown user {user}")))?;
        let j = self.enrollee_index(enrollee).ok_or_else(|| {
            CmcError::InvalidInput(format!("set_by_id: unknown enrollee {enrollee}"))
        })?;
        self.set(i, j, score)
    }
}

impl PartialEq for SimilarityMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.users == other.users && self.enrollees == other.enrollees && self.data == other.data
    }
}

/// Column index of each user's own identifier among the enrollees.
fn resolve_genuine(users: &[String], enrollees: &[String]) -> Result<Vec<usize>> {
    let mut columns: HashMap<&str, usize> = HashMap::with_capacity(enrollees.len());
    for (j, id) in enrollees.iter().enumerate() {
        if columns.insert(id.as_str(), j).is_some() {
            return Err(CmcError::InvalidMatrix(format!("duplicate enrollee id {id}")));
        }
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(users.len());
    let mut genuine = Vec::with_capacity(users.len());
    for id in users {
        if !seen.insert(id.as_str()) {
            return Err(CmcError::InvalidMatrix(format!("duplicate user id {id}")));
        }
        match columns.get(id.as_str()) {
            Some(&j) => genuine.push(j),
            None => {
                return Err(CmcError::InvalidMatrix(format!(
                    "user {id} has no enrollee column and can never be matched"
                )))
            }
        }
    }
    Ok(genuine)
}
