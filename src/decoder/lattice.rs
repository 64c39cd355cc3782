//! Time-indexed Viterbi lattice: best cost, backpointer and output fragment
//! for every `(frame, state)` cell.

use crate::wfst::{Label, StateId};

/// Negative log of probability zero.
///
/// A finite stand-in for infinity so that comparisons stay ordered. Cells at
/// this value are unreachable; the search never adds to it.
pub const NLL_ZERO: f64 = 1e10;

/// Dense `(T+1) x N` lattice owned by one decoding session.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    num_states: usize,
    num_frames: usize,
    cost: Vec<f64>,              // Best cumulative cost reaching the cell
    back: Vec<Option<StateId>>,  // State at t-1 on the best path into the cell
    outlabels: Vec<Vec<Label>>,  // Output labels of the most recent hop into the cell
}

impl Lattice {
    /// Allocate a lattice for `num_frames` observations.
    ///
    /// Every cell starts unreachable except `(0, start)`, which costs zero. A
    /// missing or out-of-range start leaves the whole lattice unreachable.
    pub fn new(num_states: usize, num_frames: usize, start: Option<StateId>) -> Self {
        let cells = (num_frames + 1) * num_states;
        let mut lattice = Self {
            num_states,
            num_frames,
            cost: vec![NLL_ZERO; cells],
            back: vec![None; cells],
            outlabels: vec![Vec::new(); cells],
        };
        if let Some(start) = start.filter(|&s| s < num_states) {
            lattice.cost[start] = 0.0;
        }
        lattice
    }

    /// Return every cell to its initial value without reallocating.
    pub fn clear(&mut self, start: Option<StateId>) {
        self.cost.fill(NLL_ZERO);
        self.back.fill(None);
        self.outlabels.iter_mut().for_each(Vec::clear);
        if let Some(start) = start.filter(|&s| s < self.num_states) {
            self.cost[start] = 0.0;
        }
    }

    #[inline]
    fn index(&self, t: usize, state: StateId) -> usize {
        t * self.num_states + state
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    /// Number of observation frames (T); valid frame indices are `0..=T`.
    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    #[inline]
    pub fn cost(&self, t: usize, state: StateId) -> f64 {
        self.cost[self.index(t, state)]
    }

    #[inline]
    pub fn back(&self, t: usize, state: StateId) -> Option<StateId> {
        self.back[self.index(t, state)]
    }

    #[inline]
    pub fn outlabels(&self, t: usize, state: StateId) -> &[Label] {
        &self.outlabels[self.index(t, state)]
    }

    #[inline]
    pub fn is_reachable(&self, t: usize, state: StateId) -> bool {
        self.cost(t, state) < NLL_ZERO
    }

    /// All costs at frame `t`, indexed by state.
    pub fn frame_costs(&self, t: usize) -> &[f64] {
        let lo = self.index(t, 0);
        &self.cost[lo..lo + self.num_states]
    }

    /// Number of reachable states at frame `t`.
    pub fn active_states(&self, t: usize) -> usize {
        self.frame_costs(t).iter().filter(|&&c| c < NLL_ZERO).count()
    }

    /// Lowest-cost reachable state at frame `t`, ties going to the lowest id.
    pub fn best_state(&self, t: usize) -> Option<(StateId, f64)> {
        let mut best: Option<(StateId, f64)> = None;
        for (state, &cost) in self.frame_costs(t).iter().enumerate() {
            if cost < best.map_or(NLL_ZERO, |(_, c)| c) {
                best = Some((state, cost));
            }
        }
        best
    }

    /// Overwrite a cell with an improved path.
    pub(crate) fn relax(&mut self, t: usize, state: StateId, cost: f64, back: Option<StateId>, labels: Vec<Label>) {
        let idx = self.index(t, state);
        self.cost[idx] = cost;
        self.back[idx] = back;
        self.outlabels[idx] = labels;
    }

    /// Add a terminal cost to a reachable cell. A sum that reaches the
    /// sentinel makes the cell unreachable.
    pub(crate) fn add_cost(&mut self, t: usize, state: StateId, extra: f64) {
        let idx = self.index(t, state);
        let total = self.cost[idx] + extra;
        if total < NLL_ZERO {
            self.cost[idx] = total;
        } else {
            self.reset(t, state);
        }
    }

    /// Mark a cell unreachable.
    pub(crate) fn reset(&mut self, t: usize, state: StateId) {
        let idx = self.index(t, state);
        self.cost[idx] = NLL_ZERO;
        self.back[idx] = None;
        self.outlabels[idx].clear();
    }
}
