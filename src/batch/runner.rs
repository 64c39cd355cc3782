//! Concurrent decoding of a directory of observation files.
//!
//! Each session owns its lattice, so sessions share nothing mutable: the
//! automaton is shared read-only and every file is decoded on its own
//! blocking worker, bounded by a semaphore.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::decoder::Decoder;
use crate::eval::compute_alignment_errors_str;
use crate::observation::CostTable;
use crate::wfst::Automaton;

use super::report::{BatchReport, SessionReport};

/// One observation file and its optional reference transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInput {
    pub observations: PathBuf,
    pub transcription: Option<PathBuf>,
}

/// Find every `*.json` cost table in `dir`, sorted by path.
///
/// A sibling `*.txt` file with the same stem is taken as the reference.
pub fn discover_sessions(dir: &Path) -> Result<Vec<SessionInput>> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("Failed to read observations directory {}", dir.display()))?;

    let mut inputs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let transcription = Some(path.with_extension("txt")).filter(|p| p.is_file());
        inputs.push(SessionInput { observations: path, transcription });
    }

    inputs.sort_by(|a, b| a.observations.cmp(&b.observations));
    debug!("Found {} observation file(s) in {}", inputs.len(), dir.display());
    Ok(inputs)
}

/// Read the reference transcription (first line, trimmed).
pub fn read_transcription(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read transcription {}", path.display()))?;
    Ok(text.lines().next().unwrap_or_default().trim().to_string())
}

/// Decode one observation file and score it against its reference.
///
/// A session in which no path completes is reported with an empty
/// hypothesis rather than as a failure.
///
/// # Errors
/// Returns an error if the observations cannot be read or scored by the
/// decoder's automaton, or the transcription cannot be read.
pub fn decode_file<A: Automaton>(decoder: &Decoder<A>, input: &SessionInput) -> Result<SessionReport> {
    let path = &input.observations;
    let observations = CostTable::read(path).with_context(|| format!("Failed to load observations {}", path.display()))?;

    // lattice allocation is part of the decode time
    let start = Instant::now();
    let mut session = decoder.session(&observations).with_context(|| format!("Cannot decode {}", path.display()))?;
    let stats = session.decode();
    let decode_secs = start.elapsed().as_secs_f64();

    let start = Instant::now();
    let (hypothesis, cost) = if stats.reached_completion {
        let best = session.backtrace()?;
        let words = session.resolve_output_labels(&best.output_labels)?;
        (words.join(" "), Some(best.cost))
    } else {
        warn!("No complete path for {}", path.display());
        (String::new(), None)
    };
    let backtrace_secs = start.elapsed().as_secs_f64();

    let reference = input.transcription.as_deref().map(read_transcription).transpose()?;
    let errors = reference.as_deref().map(|r| compute_alignment_errors_str(r, &hypothesis));
    let word_count = reference.as_deref().map_or(0, |r| r.split_whitespace().count());

    info!("📝 {}: \"{}\"", path.file_name().unwrap_or_default().to_string_lossy(), hypothesis);
    if let Some(errors) = errors {
        debug!("   errors (sub, del, ins) = ({}, {}, {}) over {} words", errors.substitutions, errors.deletions, errors.insertions, word_count);
    }

    Ok(SessionReport {
        path: path.clone(),
        reference,
        hypothesis,
        errors,
        word_count,
        reached_completion: stats.reached_completion,
        cost,
        decode_secs,
        backtrace_secs,
        stats: Some(stats),
        error: None,
    })
}

/// Decode every input with at most `jobs` sessions in flight.
///
/// Cancelling the token stops new sessions from being scheduled; sessions
/// already running finish and are included in the report.
///
/// # Arguments
/// * `decoder` - Shared decoder (automaton is read-only across sessions)
/// * `inputs` - Sessions to decode, reported in this order
/// * `jobs` - Maximum number of concurrent sessions
/// * `cancel` - Token fired on shutdown
pub async fn run_batch<A>(decoder: Arc<Decoder<A>>, inputs: Vec<SessionInput>, jobs: usize, cancel: CancellationToken) -> Result<BatchReport>
where
    A: Automaton + Send + Sync + 'static,
{
    let fst = decoder.automaton();
    let mut report = BatchReport::new(fst.num_states(), fst.size());

    info!("🚀 Decoding {} session(s) with {} worker(s)", inputs.len(), jobs.max(1));

    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let mut handles = Vec::with_capacity(inputs.len());

    for input in inputs {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Cancellation requested, not scheduling remaining sessions");
                report.cancelled = true;
                break;
            }
            permit = semaphore.clone().acquire_owned() => permit.context("Worker pool closed")?,
        };

        let decoder = decoder.clone();
        let path = input.observations.clone();
        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit; // released when the session ends
            decode_file(&decoder, &input)
        });
        handles.push((path, handle));
    }

    for (path, handle) in handles {
        let session = match handle.await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                error!("❌ {:#}", e);
                SessionReport::failed(&path, &e)
            }
            Err(e) => {
                let e = anyhow::Error::new(e).context("Decoding worker panicked");
                error!("❌ {}: {:#}", path.display(), e);
                SessionReport::failed(&path, &e)
            }
        };
        report.sessions.push(session);
    }

    Ok(report)
}
