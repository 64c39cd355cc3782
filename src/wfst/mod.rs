//! Weighted finite-state transducer module.
//!
//! Provides the read-only automaton view consumed by the decoder, a dense
//! CSR-backed implementation, symbol tables, and the OpenFST text loader.

mod builder;
mod fst;
mod symbols;
mod text;

use std::ops::Range;

use thiserror::Error;

pub use builder::WfstBuilder;
pub use fst::Wfst;
pub use symbols::SymbolTable;
pub use text::{parse_att, read_att};

/// Dense state identifier in `[0, num_states)`.
pub type StateId = usize;

/// Arc label. Label `0` is reserved for epsilon on both sides.
pub type Label = u32;

/// Epsilon label (no observation consumed / no output emitted).
pub const EPSILON: Label = 0;

/// A weighted transition between two states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FstArc {
    pub ilabel: Label,       // Input label (acoustic unit), 0 = epsilon
    pub olabel: Label,       // Output label (word), 0 = none
    pub weight: f64,         // Negative log-probability cost
    pub nextstate: StateId,  // Destination state
}

impl FstArc {
    pub fn new(ilabel: Label, olabel: Label, weight: f64, nextstate: StateId) -> Self {
        Self { ilabel, olabel, weight, nextstate }
    }

    /// Whether this arc moves without consuming an observation.
    #[inline]
    pub fn is_epsilon(&self) -> bool {
        self.ilabel == EPSILON
    }
}

/// Read-only query surface over a weighted automaton.
///
/// The decoder only ever reads through this trait, so any graph store that can
/// answer these queries (including one produced by an external FST toolkit)
/// can be searched.
pub trait Automaton {
    /// Number of states; ids are `0..num_states()`.
    fn num_states(&self) -> usize;

    /// The start state, if one has been set.
    fn start(&self) -> Option<StateId>;

    /// Cost of terminating in `state`, or `None` if it is not final.
    fn final_cost(&self, state: StateId) -> Option<f64>;

    /// Outgoing arcs of `state`.
    fn arcs(&self, state: StateId) -> &[FstArc];

    /// Symbol table for input labels (acoustic units).
    fn input_symbols(&self) -> &SymbolTable;

    /// Symbol table for output labels (words).
    fn output_symbols(&self) -> &SymbolTable;

    /// Iterate over all state ids.
    fn states(&self) -> Range<StateId> {
        0..self.num_states()
    }

    /// Total number of arcs.
    fn num_arcs(&self) -> usize {
        self.states().map(|s| self.arcs(s).len()).sum()
    }

    /// Size reported for the graph: one per state plus one per arc.
    fn size(&self) -> usize {
        self.num_states() + self.num_arcs()
    }
}

/// Errors raised while loading or validating an automaton.
#[derive(Error, Debug)]
pub enum WfstError {
    #[error("automaton has no start state")]
    NoStartState,

    #[error("state {state} out of range (automaton has {num_states} states)")]
    StateOutOfRange { state: StateId, num_states: usize },

    #[error("invalid weight {weight} on state {state}: weights must be finite and non-negative")]
    InvalidWeight { state: StateId, weight: f64 },

    #[error("input label {0} has no entry in the input symbol table")]
    UnknownInputLabel(Label),

    #[error("output label {0} has no entry in the output symbol table")]
    UnknownOutputLabel(Label),

    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("duplicate symbol '{0}'")]
    DuplicateSymbol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check that an automaton is safe to search.
///
/// Decoding assumes every check here has passed: a start state exists, every
/// arc lands inside the state range, all weights and final costs are finite
/// and non-negative, and every non-epsilon label resolves through its symbol
/// table.
pub fn validate<A: Automaton + ?Sized>(fst: &A) -> Result<(), WfstError> {
    let num_states = fst.num_states();

    match fst.start() {
        None => return Err(WfstError::NoStartState),
        Some(start) if start >= num_states => return Err(WfstError::StateOutOfRange { state: start, num_states }),
        Some(_) => {}
    }

    for state in fst.states() {
        if let Some(weight) = fst.final_cost(state)
            && !is_valid_weight(weight)
        {
            return Err(WfstError::InvalidWeight { state, weight });
        }

        for arc in fst.arcs(state) {
            if arc.nextstate >= num_states {
                return Err(WfstError::StateOutOfRange { state: arc.nextstate, num_states });
            }
            if !is_valid_weight(arc.weight) {
                return Err(WfstError::InvalidWeight { state, weight: arc.weight });
            }
            if arc.ilabel != EPSILON && fst.input_symbols().find_symbol(arc.ilabel).is_none() {
                return Err(WfstError::UnknownInputLabel(arc.ilabel));
            }
            if arc.olabel != EPSILON && fst.output_symbols().find_symbol(arc.olabel).is_none() {
                return Err(WfstError::UnknownOutputLabel(arc.olabel));
            }
        }
    }

    Ok(())
}

fn is_valid_weight(weight: f64) -> bool {
    weight.is_finite() && weight >= 0.0
}
