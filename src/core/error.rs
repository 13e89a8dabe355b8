//! Error types
//!
//! File-level failures ([`EngineError`], [`ScanError`]) are logged and skipped by the
//! aggregator. [`ProviderError`] is what an evaluation call returns to its caller.

use std::path::PathBuf;

use thiserror::Error;

/// Failure of a single engine invocation
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to engine '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("engine '{program}' exited with status {status:?}: {stderr}")]
    NonZeroExit {
        program: String,
        status: Option<i32>,
        stderr: String,
    },

    #[error("engine '{program}' timed out after {timeout_secs}s")]
    Timeout { program: String, timeout_secs: u64 },

    #[error("engine '{program}' was cancelled")]
    Cancelled { program: String },
}

/// A root directory that could not be enumerated for one extension class
#[derive(Debug, Error)]
#[error("unable to find any '*.{extension}' files under {}: {source}", root.display())]
pub struct ScanError {
    pub root: PathBuf,
    pub extension: String,
    #[source]
    pub source: std::io::Error,
}

/// Call-level failure of an evaluation
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unable to get query info: {0}")]
    InvalidCondition(#[source] serde_yaml::Error),

    #[error("invalid line number '{text}' for match in {uri}")]
    InvalidLineNumber {
        uri: String,
        text: String,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("cannot express {} as a file URI", path.display())]
    InvalidLocation { path: PathBuf },

    #[error("provider has been stopped")]
    Stopped,
}
