//! One decoding session: a lattice plus the control flow that fills it.

use serde::Serialize;
use tracing::debug;

use crate::observation::ObservationModel;
use crate::wfst::{Automaton, Label};

use super::backtrace::{BestPath, backtrace};
use super::lattice::Lattice;
use super::search::{Emissions, finalise_decoding, forward_step, prune_frame, traverse_epsilon_arcs};
use super::{DecodeError, SearchConfig};

/// Counters collected while decoding one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DecodeStats {
    pub frames: usize,           // Observation frames (T)
    pub emitting_updates: usize, // Improving relaxations over emitting arcs
    pub epsilon_updates: usize,  // Improving relaxations over epsilon arcs
    pub pruned: usize,           // Cells dropped by the beam
    pub max_active: usize,       // Largest number of reachable states in one frame
    pub reached_completion: bool,
}

/// Decoding state for a single utterance.
///
/// Owns its lattice exclusively; the automaton and observations are borrowed
/// read-only, so many sessions can run against one automaton at once.
pub struct DecoderSession<'a, A: Automaton + ?Sized, O: ObservationModel + ?Sized> {
    fst: &'a A,
    emissions: Emissions<'a, O>,
    config: SearchConfig,
    lattice: Lattice,
    finished: Option<bool>, // Finalisation result, None until decode() ran
}

impl<'a, A: Automaton + ?Sized, O: ObservationModel + ?Sized> DecoderSession<'a, A, O> {
    /// Create a session for one observation sequence.
    ///
    /// # Errors
    /// Returns `UnscorableUnit` if the automaton uses a unit the observations
    /// cannot score. This is checked once here rather than per frame.
    pub fn new(fst: &'a A, observations: &'a O, config: SearchConfig) -> Result<Self, DecodeError> {
        let emissions = Emissions::resolve(fst, observations)?;
        let lattice = Lattice::new(fst.num_states(), observations.len(), fst.start());
        Ok(Self { fst, emissions, config, lattice, finished: None })
    }

    /// Reset the lattice to frame 0: only the start state and its epsilon
    /// closure are reachable.
    ///
    /// # Returns
    /// Number of epsilon relaxations performed at frame 0.
    pub fn initialise_decoding(&mut self) -> usize {
        self.lattice.clear(self.fst.start());
        self.finished = None;
        traverse_epsilon_arcs(&mut self.lattice, self.fst, 0)
    }

    /// Run the full search: frame 0 closure, then emitting step, epsilon
    /// closure and optional pruning for every frame, then finalisation.
    pub fn decode(&mut self) -> DecodeStats {
        let num_frames = self.emissions.num_frames();
        let mut stats = DecodeStats { frames: num_frames, ..Default::default() };

        stats.epsilon_updates += self.initialise_decoding();
        stats.max_active = self.lattice.active_states(0);

        for t in 1..=num_frames {
            stats.emitting_updates += forward_step(&mut self.lattice, self.fst, &self.emissions, t);
            stats.epsilon_updates += traverse_epsilon_arcs(&mut self.lattice, self.fst, t);
            if let Some(beam) = self.config.beam {
                stats.pruned += prune_frame(&mut self.lattice, t, beam);
            }

            let active = self.lattice.active_states(t);
            stats.max_active = stats.max_active.max(active);
            debug!("Frame {}/{}: {} active states", t, num_frames, active);
        }

        let finished = finalise_decoding(&mut self.lattice, self.fst);
        self.finished = Some(finished);
        stats.reached_completion = finished;
        stats
    }

    /// Whether the last `decode()` reached a final state; `None` before decoding.
    pub fn reached_completion(&self) -> Option<bool> {
        self.finished
    }

    /// Recover the best path of the last `decode()`.
    ///
    /// # Errors
    /// Returns `NotDecoded` before `decode()` has run and `NoCompletePath` if
    /// no path reached a final state.
    pub fn backtrace(&self) -> Result<BestPath, DecodeError> {
        match self.finished {
            None => Err(DecodeError::NotDecoded),
            Some(false) => Err(DecodeError::NoCompletePath),
            Some(true) => backtrace(&self.lattice),
        }
    }

    /// Convert output labels into symbols through the output symbol table.
    pub fn resolve_output_labels(&self, labels: &[Label]) -> Result<Vec<String>, DecodeError> {
        labels
            .iter()
            .map(|&label| self.fst.output_symbols().find_symbol(label).map(str::to_string).ok_or(DecodeError::UnknownOutputLabel(label)))
            .collect()
    }

    /// Read-only view of the lattice.
    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::CostTable;
    use crate::wfst::{FstArc, SymbolTable, WfstBuilder};

    #[test]
    fn test_decode_reuses_session_lattice() {
        let mut isyms = SymbolTable::with_epsilon();
        let a = isyms.add_symbol("a");
        let mut b = WfstBuilder::new(isyms, SymbolTable::with_epsilon());
        b.add_state();
        b.add_state();
        b.set_start(0);
        b.add_arc(0, FstArc::new(a, 0, 1.0, 1));
        b.add_arc(1, FstArc::new(a, 0, 1.0, 1));
        b.set_final(1, 0.0);
        let fst = b.build().unwrap();
        let obs = CostTable::new(vec!["a".into()], vec![vec![0.5]; 3]).unwrap();

        let mut session = DecoderSession::new(&fst, &obs, SearchConfig::default()).unwrap();
        assert_eq!(session.reached_completion(), None);
        let buffer = session.lattice().frame_costs(0).as_ptr();

        let first = session.decode();
        let first_path = session.backtrace().unwrap();
        let second = session.decode();

        assert_eq!(first, second);
        assert_eq!(session.backtrace().unwrap(), first_path);
        assert_eq!(first_path.cost, 4.5);
        assert_eq!(session.lattice().frame_costs(0).as_ptr(), buffer);
    }
}
