//! Evaluate flow - condition in, deduplicated incidents out
//!
//! [`Provider`] owns the engine template and the session used to stop in-flight
//! engine processes. An evaluation parses the condition first (failing before any
//! scan), aggregates records for the image key path, keeps the ones tagged `latest`
//! and collapses structurally identical incidents.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::backends::aggregate::collect_records;
use crate::backends::engine::{default_jobs, EngineCommand, EngineSession, ExecOptions};
use crate::backends::query::IMAGE_KEY_PATH;
use crate::backends::scan::{candidate_files, ScanOptions};
use crate::core::error::ProviderError;
use crate::core::model::{
    EvaluationResult, Incident, QueryRecord, ResultSet, IMAGE_TAG_VARIABLE,
};
use crate::core::render::{RenderConfig, Renderer};

/// Tag value that makes a record an incident
pub const LATEST_TAG: &str = "latest";

/// Caller-supplied description of what to search for
///
/// The payload is kept opaque; any well-formed YAML document resolves to the image
/// key path.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct Condition(serde_yaml::Value);

impl Condition {
    pub fn parse(payload: &[u8]) -> Result<Self, ProviderError> {
        serde_yaml::from_slice(payload).map_err(ProviderError::InvalidCondition)
    }

    pub fn payload(&self) -> &serde_yaml::Value {
        &self.0
    }

    /// Logical key path the condition resolves to
    pub fn key_path(&self) -> &'static [&'static str] {
        IMAGE_KEY_PATH
    }
}

/// Everything a provider needs to evaluate conditions
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub root: PathBuf,
    pub engine: EngineCommand,
    /// Per-invocation engine timeout
    pub timeout: Duration,
    /// Maximum concurrent engine processes
    pub jobs: usize,
    pub scan: ScanOptions,
}

impl ProviderConfig {
    pub fn new(root: impl Into<PathBuf>, engine: EngineCommand) -> Self {
        Self {
            root: root.into(),
            engine,
            timeout: Duration::from_secs(30),
            jobs: default_jobs(),
            scan: ScanOptions::default(),
        }
    }
}

/// Evaluates conditions against the manifests under one root
#[derive(Debug)]
pub struct Provider {
    config: ProviderConfig,
    session: EngineSession,
}

impl Provider {
    pub fn new(config: ProviderConfig) -> Self {
        Self {
            config,
            session: EngineSession::new(),
        }
    }

    /// Evaluate one condition payload
    pub fn evaluate(&self, condition: &[u8]) -> Result<EvaluationResult, ProviderError> {
        let condition = Condition::parse(condition)?;
        if self.session.is_cancelled() {
            return Err(ProviderError::Stopped);
        }

        let files = candidate_files(&self.config.root, self.config.scan);
        debug!(
            root = %self.config.root.display(),
            condition = ?condition.payload(),
            files = files.len(),
            "evaluating condition"
        );

        let options = ExecOptions {
            timeout: self.config.timeout,
            jobs: self.config.jobs,
            session: self.session.clone(),
        };
        let records = collect_records(
            &files,
            condition.key_path(),
            &self.config.engine,
            &options,
        );
        // Cancelled engines yield no records; that is an aborted call, not a no-match.
        if self.session.is_cancelled() {
            return Err(ProviderError::Stopped);
        }

        let incidents = build_incidents(&records)?;
        info!(
            records = records.len(),
            incidents = incidents.len(),
            "evaluation finished"
        );

        Ok(EvaluationResult::from_incidents(incidents))
    }

    /// Cancel running engine processes and wait for them to exit
    ///
    /// Idempotent. Later evaluations fail with [`ProviderError::Stopped`].
    pub fn stop(&self) {
        debug!(running = self.session.running(), "stopping provider");
        self.session.cancel();
        self.session.wait_idle();
    }
}

/// Apply the `latest` predicate and build deduplicated incidents
///
/// A matching record whose line number does not parse fails the whole call.
pub fn build_incidents(records: &[QueryRecord]) -> Result<Vec<Incident>, ProviderError> {
    let mut seen = HashSet::new();
    let mut incidents = Vec::new();

    for record in records.iter().filter(|r| r.value == LATEST_TAG) {
        let line_number = record.line_number.trim().parse::<u32>().map_err(|source| {
            ProviderError::InvalidLineNumber {
                uri: record.location.to_string(),
                text: record.line_number.clone(),
                source,
            }
        })?;

        let incident = Incident::new(&record.location, line_number)
            .with_variable(IMAGE_TAG_VARIABLE, record.value.as_str());

        // Canonical JSON is the identity; variables are a BTreeMap so key order is fixed.
        let key =
            serde_json::to_string(&incident).unwrap_or_else(|_| format!("{:?}", incident));
        if seen.insert(key) {
            incidents.push(incident);
        }
    }

    Ok(incidents)
}

/// Read the condition payload from a file, or stdin for `-`
pub fn read_condition(source: Option<&Path>) -> Result<Vec<u8>> {
    match source {
        Some(path) if path != Path::new("-") => std::fs::read(path)
            .with_context(|| format!("Failed to read condition file: {}", path.display())),
        _ => {
            let mut buffer = Vec::new();
            std::io::Read::read_to_end(&mut std::io::stdin(), &mut buffer)
                .context("Failed to read condition from stdin")?;
            Ok(buffer)
        }
    }
}

/// Run the evaluate command
pub fn run_evaluate(
    config: ProviderConfig,
    condition: Option<&Path>,
    render_config: RenderConfig,
) -> Result<()> {
    let payload = read_condition(condition)?;
    let provider = Provider::new(config);

    let result = provider.evaluate(&payload);
    provider.stop();
    let result = result.context("Evaluation failed")?;

    let renderer = Renderer::with_config(render_config);
    println!("{}", renderer.render(&ResultSet::from(&result)));

    Ok(())
}
