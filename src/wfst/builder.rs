//! Incremental construction of a [`Wfst`].

use super::{FstArc, StateId, SymbolTable, Wfst, WfstError, validate};

/// Mutable builder mirroring the usual FST construction calls
/// (`add_state`, `add_arc`, `set_start`, `set_final`).
#[derive(Debug, Clone, Default)]
pub struct WfstBuilder {
    start: Option<StateId>,
    finals: Vec<Option<f64>>,
    arcs: Vec<Vec<FstArc>>,
    isyms: SymbolTable,
    osyms: SymbolTable,
}

impl WfstBuilder {
    pub fn new(isyms: SymbolTable, osyms: SymbolTable) -> Self {
        Self { isyms, osyms, ..Default::default() }
    }

    /// Add a new state and return its id.
    pub fn add_state(&mut self) -> StateId {
        self.finals.push(None);
        self.arcs.push(Vec::new());
        self.finals.len() - 1
    }

    /// Grow the state set so that `state` exists.
    pub fn ensure_state(&mut self, state: StateId) {
        while self.finals.len() <= state {
            self.add_state();
        }
    }

    pub fn num_states(&self) -> usize {
        self.finals.len()
    }

    pub fn set_start(&mut self, state: StateId) {
        self.start = Some(state);
    }

    pub fn set_final(&mut self, state: StateId, cost: f64) {
        self.ensure_state(state);
        self.finals[state] = Some(cost);
    }

    /// Add an arc leaving `source`. The source state is created if missing;
    /// the destination is checked at [`build`](Self::build) time.
    pub fn add_arc(&mut self, source: StateId, arc: FstArc) {
        self.ensure_state(source);
        self.arcs[source].push(arc);
    }

    /// Freeze into a validated [`Wfst`].
    ///
    /// # Errors
    /// Returns the first validation failure (missing start state, arcs leaving
    /// the state range, invalid weights, unknown labels).
    pub fn build(self) -> Result<Wfst, WfstError> {
        let fst = Wfst::from_parts(self.start, self.finals, self.arcs, self.isyms, self.osyms);
        validate(&fst)?;
        Ok(fst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wfst::Automaton;

    #[test]
    fn test_build_grows_states() {
        let mut isyms = SymbolTable::with_epsilon();
        let a = isyms.add_symbol("a");
        let mut b = WfstBuilder::new(isyms, SymbolTable::with_epsilon());
        b.set_start(0);
        b.add_arc(0, FstArc::new(a, 0, 1.0, 3));
        b.set_final(3, 0.25);

        let fst = b.build().unwrap();
        assert_eq!(fst.num_states(), 4);
        assert_eq!(fst.start(), Some(0));
        assert_eq!(fst.final_cost(3), Some(0.25));
        assert_eq!(fst.arcs(0)[0].nextstate, 3);
    }
}
