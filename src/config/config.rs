//! Application configuration and CLI argument parsing.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::decoder::SearchConfig;

/// Strategy used to prune the search space at each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PruningStrategy {
    /// Drop states whose cost exceeds the frame's best cost by more than the threshold
    #[default]
    Normal,
}

impl std::fmt::Display for PruningStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PruningStrategy::Normal => write!(f, "normal"),
        }
    }
}

/// Options that may also come from a JSON config file.
///
/// Every key is optional; a value given on the command line always wins.
/// Keys the decoder does not use are kept in `ignored` and reported.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FileConfig {
    pub data_dir: Option<PathBuf>,
    pub fst: Option<PathBuf>,
    pub isyms: Option<PathBuf>,
    pub osyms: Option<PathBuf>,
    pub observations_dir: Option<PathBuf>,
    pub pruning_threshold: Option<f64>,
    pub pruning_strategy: Option<PruningStrategy>,
    pub jobs: Option<usize>,
    pub output: Option<PathBuf>,
    pub verbose: Option<bool>,
    #[serde(flatten)]
    pub ignored: BTreeMap<String, serde_json::Value>,
}

/// Decoder application configuration.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(name = "wfst-decoder")]
#[command(author, version, about = "Viterbi decoding of acoustic cost tables over a composed WFST", long_about = None)]
pub struct AppConfig {
    /// JSON config file; its keys fill options not given on the command line
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Directory holding graph/ and observations/ (used for any path not set explicitly)
    #[arg(long, short = 'd', env = "WFST_DATA_DIR", default_value_os_t = default_data_dir())]
    pub data_dir: PathBuf,

    /// Decoding graph in OpenFST AT&T text format
    #[arg(long, env = "WFST_FST")]
    pub fst: Option<PathBuf>,

    /// Input symbol table (acoustic units)
    #[arg(long)]
    pub isyms: Option<PathBuf>,

    /// Output symbol table (words)
    #[arg(long)]
    pub osyms: Option<PathBuf>,

    /// Directory of observation cost tables (*.json), with optional *.txt references
    #[arg(long, short = 'o', env = "WFST_OBSERVATIONS_DIR")]
    pub observations_dir: Option<PathBuf>,

    /// Beam width: prune states costing more than the frame's best plus this value
    #[arg(long, value_parser = parse_threshold)]
    pub pruning_threshold: Option<f64>,

    /// Pruning strategy (only applies when a pruning threshold is set)
    #[arg(long, value_enum, default_value = "normal")]
    pub pruning_strategy: PruningStrategy,

    /// Number of sessions decoded concurrently (0 = auto-detect based on CPU cores)
    #[arg(long, short = 'j', default_value = "0")]
    pub jobs: usize,

    /// Write the batch report as JSON to this file
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// Config file keys with no meaning to the decoder
    #[arg(skip)]
    #[serde(default)]
    pub ignored_keys: Vec<String>,
}

impl AppConfig {
    /// Parse configuration from command line arguments, merging in the
    /// config file if one was given.
    pub fn from_args() -> Result<Self> {
        let mut config = Self::parse();

        if let Some(ref path) = config.config {
            let file = FileConfig::read(path)?;
            config.merge(file);
        }

        config.normalize_jobs();
        Ok(config)
    }

    /// Fill options still at their defaults from a config file.
    pub fn merge(&mut self, file: FileConfig) {
        if let Some(data_dir) = file.data_dir
            && self.data_dir == default_data_dir()
        {
            self.data_dir = data_dir;
        }
        self.fst = self.fst.take().or(file.fst);
        self.isyms = self.isyms.take().or(file.isyms);
        self.osyms = self.osyms.take().or(file.osyms);
        self.observations_dir = self.observations_dir.take().or(file.observations_dir);
        self.pruning_threshold = self.pruning_threshold.or(file.pruning_threshold);
        self.output = self.output.take().or(file.output);
        if let Some(strategy) = file.pruning_strategy {
            self.pruning_strategy = strategy;
        }
        if self.jobs == 0
            && let Some(jobs) = file.jobs
        {
            self.jobs = jobs;
        }
        self.verbose = self.verbose || file.verbose.unwrap_or(false);
        self.ignored_keys.extend(file.ignored.into_keys());
    }

    /// Resolve `jobs = 0` to the number of CPU cores.
    fn normalize_jobs(&mut self) {
        if self.jobs == 0 {
            self.jobs = num_cpus::get().max(1);
        }
    }

    /// Get the path to the decoding graph.
    pub fn fst_path(&self) -> PathBuf {
        self.fst.clone().unwrap_or_else(|| self.data_dir.join("graph").join("HCLG.fst.txt"))
    }

    /// Get the path to the input symbol table.
    pub fn isyms_path(&self) -> PathBuf {
        self.isyms.clone().unwrap_or_else(|| self.data_dir.join("graph").join("isyms.txt"))
    }

    /// Get the path to the output symbol table.
    pub fn osyms_path(&self) -> PathBuf {
        self.osyms.clone().unwrap_or_else(|| self.data_dir.join("graph").join("osyms.txt"))
    }

    /// Get the observations directory.
    pub fn observations_path(&self) -> PathBuf {
        self.observations_dir.clone().unwrap_or_else(|| self.data_dir.join("observations"))
    }

    /// Search options handed to the decoder.
    pub fn search_config(&self) -> SearchConfig {
        match self.pruning_strategy {
            PruningStrategy::Normal => SearchConfig { beam: self.pruning_threshold },
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        for path in [self.fst_path(), self.isyms_path(), self.osyms_path()] {
            if !path.is_file() {
                anyhow::bail!("Required graph file not found: {}", path.display());
            }
        }

        let observations = self.observations_path();
        if !observations.is_dir() {
            anyhow::bail!("Observations directory does not exist: {}", observations.display());
        }

        if let Some(threshold) = self.pruning_threshold
            && !(threshold.is_finite() && threshold >= 0.0)
        {
            anyhow::bail!("Pruning threshold must be a non-negative number");
        }

        if self.jobs == 0 {
            anyhow::bail!("Number of jobs must be positive");
        }

        Ok(())
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        info!("Configuration:");
        info!("  Decoding graph: {}", self.fst_path().display());
        info!("  Input symbols: {}", self.isyms_path().display());
        info!("  Output symbols: {}", self.osyms_path().display());
        info!("  Observations: {}", self.observations_path().display());
        match self.pruning_threshold {
            Some(threshold) => info!("  Pruning: {} (threshold {})", self.pruning_strategy, threshold),
            None => info!("  Pruning: disabled"),
        }
        info!("  Jobs: {}", self.jobs);
        if let Some(ref output) = self.output {
            info!("  Report: {}", output.display());
        }
        if !self.ignored_keys.is_empty() {
            warn!("Ignoring unused config file keys: {}", self.ignored_keys.join(", "));
        }
    }
}

impl FileConfig {
    /// Read a JSON config file.
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Get the default data directory (~/.wfst-decoder).
fn default_data_dir() -> PathBuf {
    if let Some(home_dir) = dirs::home_dir() {
        home_dir.join(".wfst-decoder")
    } else {
        PathBuf::from("data")
    }
}

/// Parse and validate a pruning threshold (finite, non-negative).
fn parse_threshold(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("'{}' is not a valid number", s))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("pruning threshold must be finite and non-negative, got {}", value))
    }
}
