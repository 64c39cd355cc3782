//! Batch decoding of observation directories.
//!
//! Discovers observation files, decodes them concurrently against one shared
//! automaton, and aggregates per-session results into a [`BatchReport`].

mod report;
mod runner;

pub use report::{BatchReport, SessionReport};
pub use runner::{SessionInput, decode_file, discover_sessions, read_transcription, run_batch};
