//! Per-frame relaxation steps of the Viterbi search.

use std::collections::{HashMap, VecDeque};

use tracing::warn;

use crate::observation::ObservationModel;
use crate::wfst::{Automaton, EPSILON, Label};

use super::DecodeError;
use super::lattice::{Lattice, NLL_ZERO};

/// Input label -> observation unit mapping, resolved once per session.
pub struct Emissions<'o, O: ObservationModel + ?Sized> {
    observations: &'o O,
    units: HashMap<Label, usize>, // Input label -> observation unit
}

impl<'o, O: ObservationModel + ?Sized> Emissions<'o, O> {
    /// Resolve every input label used on an arc of `fst` to a unit of `observations`.
    ///
    /// # Errors
    /// Returns `UnscorableUnit` for the first unit the observation source has
    /// no costs for, and `UnknownInputLabel` for labels missing from the
    /// input symbol table.
    pub fn resolve<A: Automaton + ?Sized>(fst: &A, observations: &'o O) -> Result<Self, DecodeError> {
        let mut units = HashMap::new();

        for state in fst.states() {
            for arc in fst.arcs(state).iter().filter(|a| !a.is_epsilon()) {
                if units.contains_key(&arc.ilabel) {
                    continue;
                }
                let symbol = fst.input_symbols().find_symbol(arc.ilabel).ok_or(DecodeError::UnknownInputLabel(arc.ilabel))?;
                let unit = observations.unit_index(symbol).ok_or_else(|| DecodeError::UnscorableUnit(symbol.to_string()))?;
                units.insert(arc.ilabel, unit);
            }
        }

        Ok(Self { observations, units })
    }

    /// Number of observation frames.
    pub fn num_frames(&self) -> usize {
        self.observations.len()
    }

    /// Emission cost of `label` at `frame`. Unresolved labels cost `NLL_ZERO`,
    /// which can never improve a cell.
    #[inline]
    pub fn cost(&self, label: Label, frame: usize) -> f64 {
        match self.units.get(&label) {
            Some(&unit) => self.observations.emission_cost(unit, frame),
            None => NLL_ZERO,
        }
    }
}

/// Relax all epsilon arcs at frame `t` until no cell improves.
///
/// Every state is queued once up front; a state is queued again only when
/// its cost improves and it is not already pending. Improvements use a strict
/// comparison, so on exact ties the path found first is kept. The relaxed
/// state inherits its predecessor's backpointer and extends (rather than
/// replaces) its output fragment.
///
/// # Returns
/// Number of improving relaxations.
pub fn traverse_epsilon_arcs<A: Automaton + ?Sized>(lattice: &mut Lattice, fst: &A, t: usize) -> usize {
    let num_states = fst.num_states();
    let mut queue: VecDeque<usize> = (0..num_states).collect();
    let mut pending = vec![true; num_states];
    let mut updates = 0;

    while let Some(i) = queue.pop_front() {
        pending[i] = false;

        // nothing to propagate from an unreachable state
        if !lattice.is_reachable(t, i) {
            continue;
        }

        let cost_i = lattice.cost(t, i);
        let back_i = lattice.back(t, i);

        for arc in fst.arcs(i).iter().filter(|a| a.is_epsilon()) {
            let j = arc.nextstate;
            let candidate = cost_i + arc.weight;
            if candidate < lattice.cost(t, j) {
                let mut labels = lattice.outlabels(t, i).to_vec();
                if arc.olabel != EPSILON {
                    labels.push(arc.olabel);
                }
                lattice.relax(t, j, candidate, back_i, labels);
                updates += 1;

                if !pending[j] {
                    pending[j] = true;
                    queue.push_back(j);
                }
            }
        }
    }

    updates
}

/// Advance from frame `t - 1` to frame `t` over observation-consuming arcs.
///
/// Each candidate reads only frame `t - 1`, so the order states are visited
/// in does not matter. The relaxed cell points directly at its source and its
/// output fragment restarts with the arc's output label.
///
/// # Returns
/// Number of improving relaxations.
pub fn forward_step<A, O>(lattice: &mut Lattice, fst: &A, emissions: &Emissions<'_, O>, t: usize) -> usize
where
    A: Automaton + ?Sized,
    O: ObservationModel + ?Sized,
{
    let mut updates = 0;

    for i in fst.states() {
        if !lattice.is_reachable(t - 1, i) {
            continue;
        }
        let cost_i = lattice.cost(t - 1, i);

        for arc in fst.arcs(i).iter().filter(|a| !a.is_epsilon()) {
            let j = arc.nextstate;
            let candidate = cost_i + arc.weight + emissions.cost(arc.ilabel, t);
            if candidate < lattice.cost(t, j) {
                let labels = if arc.olabel != EPSILON { vec![arc.olabel] } else { Vec::new() };
                lattice.relax(t, j, candidate, Some(i), labels);
                updates += 1;
            }
        }
    }

    updates
}

/// Drop every cell at frame `t` whose cost exceeds the best cost by more than `beam`.
///
/// # Returns
/// Number of pruned cells.
pub fn prune_frame(lattice: &mut Lattice, t: usize, beam: f64) -> usize {
    let Some((_, best)) = lattice.best_state(t) else {
        return 0;
    };
    let threshold = best + beam;
    let mut pruned = 0;

    for state in 0..lattice.num_states() {
        if lattice.is_reachable(t, state) && lattice.cost(t, state) > threshold {
            lattice.reset(t, state);
            pruned += 1;
        }
    }

    pruned
}

/// Fold final costs into the last frame.
///
/// Reachable final states get their final cost added; reachable non-final
/// states become unreachable since a path cannot end there.
///
/// # Returns
/// `true` if any path reached a final state.
pub fn finalise_decoding<A: Automaton + ?Sized>(lattice: &mut Lattice, fst: &A) -> bool {
    let last = lattice.num_frames();

    for state in fst.states() {
        if !lattice.is_reachable(last, state) {
            continue;
        }
        match fst.final_cost(state) {
            Some(weight) => lattice.add_cost(last, state, weight),
            None => lattice.reset(last, state),
        }
    }

    let finished = lattice.best_state(last).is_some();
    if !finished {
        warn!("No path got to the end of the observations");
    }
    finished
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

    /// 0 -eps:x/1-> 1 -eps/0.5-> 2 -eps:y/0-> 1 (cycle), 0 -eps/3-> 2, 3 isolated
    fn epsilon_cycle() -> Wfst {
        let mut b = WfstBuilder::new(symbols(&["a"]), symbols(&["x", "y"]));
        for _ in 0..4 {
            b.add_state();
        }
        b.set_start(0);
        b.add_arc(0, FstArc::new(0, 1, 1.0, 1));
        b.add_arc(0, FstArc::new(0, 0, 3.0, 2));
        b.add_arc(1, FstArc::new(0, 0, 0.5, 2));
        b.add_arc(2, FstArc::new(0, 2, 0.0, 1));
        b.set_final(2, 0.0);
        b.build().unwrap()
    }

    #[test]
    fn test_epsilon_closure_reaches_fixed_point() {
        let fst = epsilon_cycle();
        let mut lattice = Lattice::new(fst.num_states(), 0, fst.start());

        let updates = traverse_epsilon_arcs(&mut lattice, &fst, 0);
        assert!(updates >= 2);
        assert_eq!(lattice.cost(0, 1), 1.0);
        assert_eq!(lattice.cost(0, 2), 1.5);
        assert_eq!(lattice.outlabels(0, 1), [1]);
        assert_eq!(lattice.outlabels(0, 2), [1]);
        assert_eq!(lattice.back(0, 2), None);
        assert!(!lattice.is_reachable(0, 3));

        let snapshot = lattice.clone();
        assert_eq!(traverse_epsilon_arcs(&mut lattice, &fst, 0), 0);
        assert_eq!(lattice, snapshot);
    }

    #[test]
    fn test_epsilon_closure_is_monotonic() {
        let fst = epsilon_cycle();
        let mut lattice = Lattice::new(fst.num_states(), 0, fst.start());
        // Pre-seed state 2 with a cost better than any epsilon path can offer
        lattice.relax(0, 2, 0.25, None, vec![]);
        traverse_epsilon_arcs(&mut lattice, &fst, 0);
        assert_eq!(lattice.cost(0, 2), 0.25);
        assert!(lattice.outlabels(0, 2).is_empty());
        // state 1 is now best reached through the seeded state 2 -> 1 arc
        assert_eq!(lattice.cost(0, 1), 0.25);
        assert_eq!(lattice.outlabels(0, 1), [2]);
    }

    #[test]
    fn test_forward_step_replaces_labels() {
        let mut b = WfstBuilder::new(symbols(&["a", "b"]), symbols(&["x"]));
        b.add_state();
        b.add_state();
        b.set_start(0);
        b.add_arc(0, FstArc::new(1, 1, 1.0, 1));
        b.add_arc(0, FstArc::new(2, 0, 0.0, 1));
        let fst = b.build().unwrap();

        let obs = CostTable::new(vec!["a".into(), "b".into()], vec![vec![0.5, 4.0]]).unwrap();
        let emissions = Emissions::resolve(&fst, &obs).unwrap();
        let mut lattice = Lattice::new(2, 1, Some(0));
        lattice.relax(0, 0, 0.0, None, vec![9]);

        let updates = forward_step(&mut lattice, &fst, &emissions, 1);
        assert_eq!(updates, 1);
        assert_eq!(lattice.cost(1, 1), 1.5);
        assert_eq!(lattice.back(1, 1), Some(0));
        assert_eq!(lattice.outlabels(1, 1), [1]);
        assert!(!lattice.is_reachable(1, 0));
    }

    #[test]
    fn test_emissions_reject_unscorable_unit() {
        let mut b = WfstBuilder::new(symbols(&["a", "sil"]), symbols(&[]));
        b.add_state();
        b.set_start(0);
        b.add_arc(0, FstArc::new(2, 0, 0.0, 0));
        let fst = b.build().unwrap();

        let obs = CostTable::new(vec!["a".into()], vec![]).unwrap();
        match Emissions::resolve(&fst, &obs) {
            Err(DecodeError::UnscorableUnit(unit)) => assert_eq!(unit, "sil"),
            _ => panic!("expected UnscorableUnit"),
        }
    }

    #[test]
    fn test_emissions_with_sparse_labels() {
        let sparse = Label::MAX - 1;
        let mut isyms = SymbolTable::with_epsilon();
        isyms.add_pair("sil", sparse).unwrap();
        let mut b = WfstBuilder::new(isyms, symbols(&[]));
        b.add_state();
        b.add_state();
        b.set_start(0);
        b.add_arc(0, FstArc::new(sparse, 0, 0.5, 1));
        b.set_final(1, 0.0);
        let fst = b.build().unwrap();

        let obs = CostTable::new(vec!["sil".into()], vec![vec![0.25]]).unwrap();
        let emissions = Emissions::resolve(&fst, &obs).unwrap();
        assert_eq!(emissions.cost(sparse, 1), 0.25);
        assert_eq!(emissions.cost(7, 1), NLL_ZERO);

        let mut lattice = Lattice::new(fst.num_states(), 1, fst.start());
        assert_eq!(forward_step(&mut lattice, &fst, &emissions, 1), 1);
        assert_eq!(lattice.cost(1, 1), 0.75);
    }

    #[test]
    fn test_prune_frame_keeps_best() {
        let mut lattice = Lattice::new(3, 1, Some(0));
        lattice.relax(1, 0, 5.0, Some(0), vec![]);
        lattice.relax(1, 1, 2.0, Some(0), vec![]);
        lattice.relax(1, 2, 2.5, Some(0), vec![]);

        assert_eq!(prune_frame(&mut lattice, 1, 1.0), 1);
        assert!(!lattice.is_reachable(1, 0));
        assert_eq!(lattice.back(1, 0), None);
        assert_eq!(lattice.best_state(1), Some((1, 2.0)));
        assert!(lattice.is_reachable(1, 2));

        assert_eq!(prune_frame(&mut lattice, 1, 0.0), 1);
        assert_eq!(lattice.active_states(1), 1);
    }

    #[test]
    fn test_finalise_decoding() {
        let fst = epsilon_cycle();
        let mut lattice = Lattice::new(fst.num_states(), 0, fst.start());
        traverse_epsilon_arcs(&mut lattice, &fst, 0);

        assert!(finalise_decoding(&mut lattice, &fst));
        assert!(!lattice.is_reachable(0, 0));
        assert!(!lattice.is_reachable(0, 1));
        assert_eq!(lattice.cost(0, 2), 1.5);
    }
}
