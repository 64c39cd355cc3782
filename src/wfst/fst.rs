//! Dense, immutable transducer stored in CSR form.

use super::{Automaton, FstArc, StateId, SymbolTable};

/// Immutable WFST with arcs stored contiguously per source state.
///
/// Built through [`WfstBuilder`](super::WfstBuilder) or the AT&T text loader,
/// both of which validate before handing one out. Shared read-only across
/// decoding sessions.
#[derive(Debug, Clone)]
pub struct Wfst {
    start: Option<StateId>,
    finals: Vec<Option<f64>>, // Final cost per state, None = not final
    offsets: Vec<usize>,      // length num_states + 1
    arcs: Vec<FstArc>,        // Sorted by source state
    isyms: SymbolTable,
    osyms: SymbolTable,
}

impl Wfst {
    /// Assemble from per-state arc lists. Callers validate afterwards.
    pub(super) fn from_parts(start: Option<StateId>, finals: Vec<Option<f64>>, state_arcs: Vec<Vec<FstArc>>, isyms: SymbolTable, osyms: SymbolTable) -> Self {
        let mut offsets = Vec::with_capacity(state_arcs.len() + 1);
        let mut arcs = Vec::with_capacity(state_arcs.iter().map(Vec::len).sum());

        offsets.push(0);
        for list in state_arcs {
            arcs.extend(list);
            offsets.push(arcs.len());
        }

        Self { start, finals, offsets, arcs, isyms, osyms }
    }
}

impl Automaton for Wfst {
    fn num_states(&self) -> usize {
        self.finals.len()
    }

    fn start(&self) -> Option<StateId> {
        self.start
    }

    fn final_cost(&self, state: StateId) -> Option<f64> {
        self.finals.get(state).copied().flatten()
    }

    #[inline]
    fn arcs(&self, state: StateId) -> &[FstArc] {
        match (self.offsets.get(state), self.offsets.get(state + 1)) {
            (Some(&lo), Some(&hi)) => &self.arcs[lo..hi],
            _ => &[],
        }
    }

    fn input_symbols(&self) -> &SymbolTable {
        &self.isyms
    }

    fn output_symbols(&self) -> &SymbolTable {
        &self.osyms
    }

    fn num_arcs(&self) -> usize {
        self.arcs.len()
    }
}
