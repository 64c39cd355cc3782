//! Best-path recovery from a finalised lattice.

use serde::Serialize;

use crate::wfst::{Label, StateId};

use super::DecodeError;
use super::lattice::Lattice;

/// Single best path through the lattice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestPath {
    /// One state per frame `0..=T`, chronological.
    pub state_sequence: Vec<StateId>,
    /// Output labels in path order.
    pub output_labels: Vec<Label>,
    /// Total path cost, including the final cost.
    pub cost: f64,
}

/// Walk backpointers from the best state at the last frame back to frame 0.
///
/// Epsilon hops are collapsed into the emitting hop that preceded them, so a
/// state reached through an epsilon chain appears directly after the state
/// that emitted into the chain. Output labels picked up along the chain are
/// kept.
///
/// # Errors
/// Returns `NoCompletePath` if nothing is reachable at the last frame, and
/// `BrokenBacktrace` if a backpointer is missing before frame 0.
pub fn backtrace(lattice: &Lattice) -> Result<BestPath, DecodeError> {
    let last = lattice.num_frames();
    let (best_final_state, cost) = lattice.best_state(last).ok_or(DecodeError::NoCompletePath)?;

    let mut state_sequence = Vec::with_capacity(last + 1);
    let mut fragments: Vec<&[Label]> = Vec::with_capacity(last + 1);
    let mut j = best_final_state;

    for t in (0..=last).rev() {
        state_sequence.push(j);
        fragments.push(lattice.outlabels(t, j));
        if t > 0 {
            // continue the backtrace at the predecessor, frame t - 1
            j = lattice.back(t, j).ok_or(DecodeError::BrokenBacktrace { frame: t, state: j })?;
        }
    }

    state_sequence.reverse();
    let output_labels = fragments.iter().rev().flat_map(|f| f.iter().copied()).collect();

    Ok(BestPath { state_sequence, output_labels, cost })
}
