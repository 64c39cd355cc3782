//! Viterbi decoder over a composed WFST.
//!
//! Time-synchronous search: frame 0 epsilon closure, then for each frame an
//! emitting step followed by an epsilon closure, then finalisation and a
//! backtrace through the lattice.

pub(crate) mod backtrace;
pub(crate) mod lattice;
pub(crate) mod search;
pub(crate) mod session;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::observation::ObservationModel;
use crate::wfst::{Automaton, Label, StateId, WfstError, validate};

pub use backtrace::BestPath;
pub use lattice::{Lattice, NLL_ZERO};
pub use search::{Emissions, finalise_decoding, forward_step, prune_frame, traverse_epsilon_arcs};
pub use session::{DecodeStats, DecoderSession};

/// Errors raised by a decoding session.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("no path reached a final state at the end of the observations")]
    NoCompletePath,

    #[error("missing backpointer at frame {frame}, state {state}")]
    BrokenBacktrace { frame: usize, state: StateId },

    #[error("backtrace requested before decoding")]
    NotDecoded,

    #[error("observations cannot score unit '{0}'")]
    UnscorableUnit(String),

    #[error("input label {0} has no symbol")]
    UnknownInputLabel(Label),

    #[error("output label {0} has no symbol")]
    UnknownOutputLabel(Label),
}

/// Search options shared by every session of a decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Beam relative to the best cost of each frame; `None` searches exhaustively.
    pub beam: Option<f64>,
}

/// Outcome of decoding one utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decoding {
    pub state_sequence: Vec<StateId>, // Empty when no path completed
    pub output_labels: Vec<Label>,
    pub output_sequence: Vec<String>,
    pub cost: Option<f64>,
    pub reached_completion: bool,
    pub stats: DecodeStats,
}

impl Decoding {
    /// Space-joined output symbols.
    pub fn transcript(&self) -> String {
        self.output_sequence.join(" ")
    }
}

/// Decoder bound to one validated automaton.
pub struct Decoder<A: Automaton> {
    fst: A,
    config: SearchConfig,
}

impl<A: Automaton> Decoder<A> {
    /// Validate the automaton and wrap it for decoding.
    ///
    /// # Errors
    /// Returns the first validation failure; no session can be created from a
    /// malformed automaton.
    pub fn new(fst: A, config: SearchConfig) -> Result<Self, WfstError> {
        validate(&fst)?;
        debug!("Decoder ready: {} states, {} arcs", fst.num_states(), fst.num_arcs());
        Ok(Self { fst, config })
    }

    pub fn automaton(&self) -> &A {
        &self.fst
    }

    pub fn config(&self) -> SearchConfig {
        self.config
    }

    /// Open a session over one observation sequence.
    pub fn session<'a, O: ObservationModel + ?Sized>(&'a self, observations: &'a O) -> Result<DecoderSession<'a, A, O>, DecodeError> {
        DecoderSession::new(&self.fst, observations, self.config)
    }

    /// Decode and backtrace in one call.
    ///
    /// A session in which no path completes is not an error: it comes back
    /// with `reached_completion == false`, empty sequences and no cost.
    pub fn decode<O: ObservationModel + ?Sized>(&self, observations: &O) -> Result<Decoding, DecodeError> {
        let mut session = self.session(observations)?;
        let stats = session.decode();

        if !stats.reached_completion {
            return Ok(Decoding {
                state_sequence: Vec::new(),
                output_labels: Vec::new(),
                output_sequence: Vec::new(),
                cost: None,
                reached_completion: false,
                stats,
            });
        }

        let path = session.backtrace()?;
        let output_sequence = session.resolve_output_labels(&path.output_labels)?;
        Ok(Decoding {
            state_sequence: path.state_sequence,
            output_labels: path.output_labels,
            output_sequence,
            cost: Some(path.cost),
            reached_completion: true,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::CostTable;
    use crate::wfst::{FstArc, SymbolTable, Wfst, WfstBuilder};

    fn symbols(names: &[&str]) -> SymbolTable {
        let mut table = SymbolTable::with_epsilon();
        for name in names {
            table.add_symbol(name);
        }
        table
    }

    fn zero_costs(units: &[&str], frames: usize) -> CostTable {
        CostTable::new(units.iter().map(|u| u.to_string()).collect(), vec![vec![0.0; units.len()]; frames]).unwrap()
    }

    /// Linear chain of `n` emitting arcs, each outputting the next word.
    fn chain(n: usize) -> Wfst {
        let mut b = WfstBuilder::new(symbols(&["a"]), symbols(&["w1", "w2", "w3", "w4"]));
        let mut state = b.add_state();
        b.set_start(state);
        for i in 0..n {
            let next = b.add_state();
            b.add_arc(state, FstArc::new(1, (i + 1) as Label, 1.0, next));
            state = next;
        }
        b.set_final(state, 0.0);
        b.build().unwrap()
    }

    #[test]
    fn test_no_observations() {
        let mut b = WfstBuilder::new(symbols(&["a"]), symbols(&[]));
        let s0 = b.add_state();
        b.set_start(s0);
        b.set_final(s0, 0.75);
        let decoder = Decoder::new(b.build().unwrap(), SearchConfig::default()).unwrap();

        let result = decoder.decode(&zero_costs(&["a"], 0)).unwrap();
        assert!(result.reached_completion);
        assert_eq!(result.state_sequence, vec![s0]);
        assert!(result.output_sequence.is_empty());
        assert_eq!(result.cost, Some(0.75));
    }

    #[test]
    fn test_single_linear_path() {
        let decoder = Decoder::new(chain(4), SearchConfig::default()).unwrap();
        let result = decoder.decode(&zero_costs(&["a"], 4)).unwrap();

        assert!(result.reached_completion);
        assert_eq!(result.cost, Some(4.0));
        assert_eq!(result.state_sequence, vec![0, 1, 2, 3, 4]);
        assert_eq!(result.output_sequence, vec!["w1", "w2", "w3", "w4"]);
        assert_eq!(result.transcript(), "w1 w2 w3 w4");
        assert_eq!(result.stats.frames, 4);
    }

    #[test]
    fn test_chain_with_wrong_length_does_not_complete() {
        let decoder = Decoder::new(chain(3), SearchConfig::default()).unwrap();
        let result = decoder.decode(&zero_costs(&["a"], 2)).unwrap();
        assert!(!result.reached_completion);
        assert!(result.state_sequence.is_empty());
        assert_eq!(result.cost, None);
    }

    #[test]
    fn test_unreachable_automaton() {
        let mut b = WfstBuilder::new(symbols(&["a"]), symbols(&[]));
        let s0 = b.add_state();
        let s1 = b.add_state();
        let s2 = b.add_state();
        b.set_start(s0);
        b.add_arc(s0, FstArc::new(1, 0, 0.0, s0));
        b.add_arc(s1, FstArc::new(1, 0, 0.0, s2));
        b.set_final(s2, 0.0);
        let decoder = Decoder::new(b.build().unwrap(), SearchConfig::default()).unwrap();

        for frames in [0, 1, 5] {
            let obs = zero_costs(&["a"], frames);
            let result = decoder.decode(&obs).unwrap();
            assert!(!result.reached_completion, "frames={}", frames);

            let mut session = decoder.session(&obs).unwrap();
            assert!(matches!(session.backtrace(), Err(DecodeError::NotDecoded)));
            session.decode();
            assert_eq!(session.reached_completion(), Some(false));
            assert!(matches!(session.backtrace(), Err(DecodeError::NoCompletePath)));
        }
    }

    #[test]
    fn test_epsilon_detour_ties_first_found() {
        // 0 -a:w1-> 1 (final)
        // 0 -a:w1-> 2 -eps/0-> 1
        let mut b = WfstBuilder::new(symbols(&["a"]), symbols(&["w1", "w2"]));
        for _ in 0..3 {
            b.add_state();
        }
        b.set_start(0);
        b.add_arc(0, FstArc::new(1, 1, 1.0, 1));
        b.add_arc(0, FstArc::new(1, 1, 1.0, 2));
        b.add_arc(2, FstArc::new(0, 0, 0.0, 1));
        b.set_final(1, 0.0);
        let decoder = Decoder::new(b.build().unwrap(), SearchConfig::default()).unwrap();

        let obs = zero_costs(&["a"], 1);
        let mut session = decoder.session(&obs).unwrap();
        let stats = session.decode();
        assert!(stats.reached_completion);
        // the direct arc is found first; the equal-cost detour must not replace it
        assert_eq!(stats.epsilon_updates, 0);

        let path = session.backtrace().unwrap();
        assert_eq!(path.cost, 1.0);
        assert_eq!(path.state_sequence, vec![0, 1]);
        assert_eq!(path.output_labels, vec![1]);
    }

    #[test]
    fn test_epsilon_chain_output_labels() {
        // 0 -a:<eps>-> 1 -eps:w1-> 2 -eps:w2-> 3 (final)
        let mut b = WfstBuilder::new(symbols(&["a"]), symbols(&["w1", "w2"]));
        for _ in 0..4 {
            b.add_state();
        }
        b.set_start(0);
        b.add_arc(0, FstArc::new(1, 0, 0.5, 1));
        b.add_arc(1, FstArc::new(0, 1, 0.25, 2));
        b.add_arc(2, FstArc::new(0, 2, 0.25, 3));
        b.set_final(3, 1.0);
        let decoder = Decoder::new(b.build().unwrap(), SearchConfig::default()).unwrap();

        let result = decoder.decode(&zero_costs(&["a"], 1)).unwrap();
        assert!(result.reached_completion);
        assert_eq!(result.cost, Some(2.0));
        // the epsilon states in between collapse into one hop
        assert_eq!(result.state_sequence, vec![0, 3]);
        assert_eq!(result.output_sequence, vec!["w1", "w2"]);
    }

    #[test]
    fn test_emission_costs_pick_best_word() {
        // two competing one-arc words, scored by the observations
        let mut b = WfstBuilder::new(symbols(&["p", "b"]), symbols(&["pea", "bee"]));
        for _ in 0..2 {
            b.add_state();
        }
        b.set_start(0);
        b.add_arc(0, FstArc::new(1, 1, 0.0, 1));
        b.add_arc(0, FstArc::new(2, 2, 0.0, 1));
        b.add_arc(1, FstArc::new(0, 0, 0.0, 0));
        b.set_final(1, 0.0);
        let decoder = Decoder::new(b.build().unwrap(), SearchConfig::default()).unwrap();

        let obs = CostTable::new(vec!["p".into(), "b".into()], vec![vec![0.1, 2.0], vec![3.0, 0.2]]).unwrap();
        let result = decoder.decode(&obs).unwrap();
        assert_eq!(result.transcript(), "pea bee");
        assert!((result.cost.unwrap() - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_decoding_is_deterministic() {
        let decoder = Decoder::new(chain(3), SearchConfig { beam: Some(10.0) }).unwrap();
        let obs = zero_costs(&["a"], 3);
        let first = decoder.decode(&obs).unwrap();
        let second = decoder.decode(&obs).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unscorable_unit_fails_once() {
        let decoder = Decoder::new(chain(2), SearchConfig::default()).unwrap();
        let obs = zero_costs(&["b"], 2);
        assert!(matches!(decoder.decode(&obs), Err(DecodeError::UnscorableUnit(_))));
    }

    /// Hand-rolled automaton that bypasses the builder's validation.
    struct RawAutomaton {
        arcs: Vec<Vec<FstArc>>,
        symbols: SymbolTable,
    }

    impl Automaton for RawAutomaton {
        fn num_states(&self) -> usize {
            self.arcs.len()
        }

        fn start(&self) -> Option<StateId> {
            Some(0)
        }

        fn final_cost(&self, _state: StateId) -> Option<f64> {
            None
        }

        fn arcs(&self, state: StateId) -> &[FstArc] {
            &self.arcs[state]
        }

        fn input_symbols(&self) -> &SymbolTable {
            &self.symbols
        }

        fn output_symbols(&self) -> &SymbolTable {
            &self.symbols
        }
    }

    #[test]
    fn test_malformed_automaton_rejected() {
        let raw = RawAutomaton { arcs: vec![vec![FstArc::new(1, 0, 0.0, 5)]], symbols: symbols(&["a"]) };
        assert!(matches!(Decoder::new(raw, SearchConfig::default()), Err(WfstError::StateOutOfRange { state: 5, num_states: 1 })));

        let raw = RawAutomaton { arcs: vec![vec![FstArc::new(1, 0, f64::NAN, 0)]], symbols: symbols(&["a"]) };
        assert!(matches!(Decoder::new(raw, SearchConfig::default()), Err(WfstError::InvalidWeight { .. })));
    }
}
