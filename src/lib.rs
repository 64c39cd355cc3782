//! Viterbi decoding over weighted finite-state transducers.
//!
//! The decoder searches a composed recognition graph ([`wfst::Wfst`]) for the
//! cheapest path that explains a sequence of per-frame acoustic costs
//! ([`observation::ObservationModel`]), then recovers the output words along
//! that path. [`batch`] runs many such sessions concurrently and scores them
//! against reference transcriptions with [`eval`].

pub mod batch;
pub mod config;
pub mod decoder;
pub mod eval;
pub mod observation;
pub mod wfst;
