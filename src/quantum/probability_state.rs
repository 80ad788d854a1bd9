//! Per-piece probability distributions over board squares.
//!
//! A superposed piece is described by a `ProbabilityState`: a map from
//! `StateId` (a binary path through the piece's probability history) to a
//! `Branch` (square plus probability mass). The map is the sole source of
//! truth for "where could this piece be".

use std::collections::BTreeMap;
use std::fmt;

use chess::Square;
use serde::{Deserialize, Serialize};

use crate::errors::QuantumChessErrors;

/// Tolerance for floating-point drift when checking that probability mass
/// sums to 1.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// A binary-string path in an implicit binary tree rooted at `"0"`.
///
/// Each split or entanglement extends a state's id by appending `'0'`/`'1'`
/// (or two bits for the distinct-two-blocker case), so every id names one
/// branch of the piece's probability-tree decomposition. Ids of the live
/// branches of one piece are never prefixes of one another: the leaves
/// partition the tree.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(String);

impl StateId {
    /// The root id every piece starts from.
    pub fn root() -> Self {
        StateId("0".to_owned())
    }

    /// Build an id from its raw path text. Empty paths are rejected.
    pub fn parse(path: &str) -> Result<Self, QuantumChessErrors> {
        if path.is_empty() || !path.bytes().all(|b| b == b'0' || b == b'1') {
            return Err(QuantumChessErrors::InvalidSquare(format!(
                "state id must be a non-empty binary path, got {path:?}"
            )));
        }
        Ok(StateId(path.to_owned()))
    }

    /// Extend this id by one branch bit.
    pub fn child(&self, bit: u8) -> Self {
        let mut path = self.0.clone();
        path.push(if bit == 0 { '0' } else { '1' });
        StateId(path)
    }

    /// Extend this id by two branch bits (distinct-two-blocker outcomes).
    pub fn grandchild(&self, first: u8, second: u8) -> Self {
        self.child(first).child(second)
    }

    /// The complementary branch: same path with the last bit flipped.
    ///
    /// Entanglement records always pair a branch with the partner's sibling
    /// branch, because "the blocker was there" and "the blocker was not
    /// there" are the two halves of one split.
    pub fn sibling(&self) -> Self {
        let mut path = self.0.clone();
        let last = path.pop().unwrap_or('0');
        path.push(if last == '0' { '1' } else { '0' });
        StateId(path)
    }

    /// True when `self` is an ancestor of (or equal to) `other` in the
    /// probability tree.
    pub fn is_prefix_of(&self, other: &StateId) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Raw path text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One leaf of a piece's probability tree: a square claim with its mass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Branch {
    pub square: Square,
    pub probability: f64,
}

/// The map from `StateId` to `Branch` owned by exactly one quantum piece.
///
/// Invariant: the probabilities of all current entries sum to 1.0 (within
/// [`PROBABILITY_TOLERANCE`]) whenever the piece is not mid-transition.
/// Iteration order is the total order on `StateId`, so every consumer sees
/// branches deterministically.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbabilityState {
    entries: BTreeMap<StateId, Branch>,
}

impl ProbabilityState {
    /// A fresh classical-like state: the root branch at `square` with
    /// probability 1.
    pub fn single(square: Square) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(
            StateId::root(),
            Branch {
                square,
                probability: 1.0,
            },
        );
        ProbabilityState { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, id: &StateId) -> Option<&Branch> {
        self.entries.get(id)
    }

    pub fn insert(&mut self, id: StateId, branch: Branch) {
        self.entries.insert(id, branch);
    }

    pub fn remove(&mut self, id: &StateId) -> Option<Branch> {
        self.entries.remove(id)
    }

    /// Iterate branches in `StateId` order.
    pub fn iter(&self) -> impl Iterator<Item = (&StateId, &Branch)> {
        self.entries.iter()
    }

    /// The first (lowest `StateId`) branch claiming `square`, if any.
    pub fn branch_at(&self, square: Square) -> Option<(&StateId, &Branch)> {
        self.entries.iter().find(|(_, b)| b.square == square)
    }

    /// Sum of all branch masses.
    pub fn total_probability(&self) -> f64 {
        self.entries.values().map(|b| b.probability).sum()
    }

    /// Remove every branch whose id has `prefix` as an ancestor.
    /// Returns the ids that were removed.
    pub fn remove_subtree(&mut self, prefix: &StateId) -> Vec<StateId> {
        let doomed: Vec<StateId> = self
            .entries
            .keys()
            .filter(|id| prefix.is_prefix_of(id))
            .cloned()
            .collect();
        for id in &doomed {
            self.entries.remove(id);
        }
        doomed
    }

    /// Rescale all branches so their masses sum to 1 again.
    ///
    /// A zero-mass state cannot be renormalized: that means entanglement
    /// bookkeeping pruned every branch, which is an internal inconsistency.
    pub fn normalize(&mut self) -> Result<(), QuantumChessErrors> {
        let total = self.total_probability();
        if total <= 0.0 {
            return Err(QuantumChessErrors::InconsistentProbabilityState(
                "cannot renormalize a zero-probability state".to_owned(),
            ));
        }
        for branch in self.entries.values_mut() {
            branch.probability /= total;
        }
        Ok(())
    }

    /// Defensive invariant check: non-empty, every mass in [0, 1], and the
    /// total within tolerance of 1.
    pub fn validate(&self) -> Result<(), QuantumChessErrors> {
        if self.entries.is_empty() {
            return Err(QuantumChessErrors::InconsistentProbabilityState(
                "probability state has no branches".to_owned(),
            ));
        }
        for (id, branch) in &self.entries {
            if !branch.probability.is_finite()
                || branch.probability < -PROBABILITY_TOLERANCE
                || branch.probability > 1.0 + PROBABILITY_TOLERANCE
            {
                return Err(QuantumChessErrors::InconsistentProbabilityState(format!(
                    "branch {id} has probability {} outside [0, 1]",
                    branch.probability
                )));
            }
        }
        let total = self.total_probability();
        if (total - 1.0).abs() > 1e-6 {
            return Err(QuantumChessErrors::InconsistentProbabilityState(format!(
                "branch probabilities sum to {total}, expected 1.0"
            )));
        }
        Ok(())
    }
}
