//! Evaluation of decoded transcripts against references.

mod wer;

pub use wer::{AlignmentErrors, compute_alignment_errors, compute_alignment_errors_str};
