//! Aggregator - fans the scanned files out to concurrent engine invocations
//!
//! A pool of at most `jobs` scoped workers pulls files from a shared cursor, so every
//! file is queried exactly once and no more than `jobs` engine processes are alive at a
//! time. Records are appended to a single mutex-guarded vector and the call returns
//! only after every worker has joined. A file whose read, engine run or output parse
//! fails contributes no records and does not affect the others.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;

use anyhow::Result;
use tracing::{debug, warn};

use crate::backends::engine::{execute, EngineCommand, ExecOptions};
use crate::backends::parse::parse_output;
use crate::backends::query::build_query;
use crate::backends::scan::{candidate_files, ScanOptions};
use crate::core::model::{FileLocation, QueryRecord, ResultItem, ResultSet};
use crate::core::render::{RenderConfig, Renderer};

/// Query every file for `key_path` and collect the raw records
pub fn collect_records<S: AsRef<str>>(
    files: &[PathBuf],
    key_path: &[S],
    template: &EngineCommand,
    options: &ExecOptions,
) -> Vec<QueryRecord> {
    let query = build_query(key_path);
    let results: Mutex<Vec<QueryRecord>> = Mutex::new(Vec::new());
    let cursor = AtomicUsize::new(0);
    let jobs = options.jobs.clamp(1, files.len().max(1));

    let work = || {
        while let Some(file) = files.get(cursor.fetch_add(1, Ordering::Relaxed)) {
            let records = query_file(file, &query, template, options);
            if records.is_empty() {
                continue;
            }
            results
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .extend(records);
        }
    };

    thread::scope(|scope| {
        let mut workers = 0;
        for worker in 0..jobs {
            match thread::Builder::new()
                .name(format!("engine-worker-{worker}"))
                .spawn_scoped(scope, &work)
            {
                Ok(_) => workers += 1,
                Err(err) => {
                    warn!(started = workers, error = %err, "could not start more workers");
                    break;
                }
            }
        }
        // Without any worker the files are still queried, one by one on this thread.
        if workers == 0 {
            work();
        }
    });

    let records = results
        .into_inner()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    debug!(files = files.len(), jobs, records = records.len(), "aggregation complete");
    records
}

/// Run the engine against one file; failures are logged and yield no records
fn query_file(
    file: &Path,
    query: &str,
    template: &EngineCommand,
    options: &ExecOptions,
) -> Vec<QueryRecord> {
    let data = match fs::read(file) {
        Ok(data) => data,
        Err(err) => {
            warn!(file = %file.display(), error = %err, "error reading YAML file");
            return Vec::new();
        }
    };

    let location = match FileLocation::from_path(file) {
        Ok(location) => location,
        Err(err) => {
            warn!(file = %file.display(), error = %err, "error getting file location");
            return Vec::new();
        }
    };

    let command = template.with_query(query);
    match execute(&command, &data, options) {
        Ok(output) => parse_output(&output, &location),
        Err(err) => {
            warn!(file = %file.display(), error = %err, "error running query engine");
            Vec::new()
        }
    }
}

/// Run the query command: raw records for a key path, no predicate and no dedup
pub fn run_query(
    root: &Path,
    key_path: &[String],
    template: &EngineCommand,
    scan: ScanOptions,
    options: &ExecOptions,
    config: RenderConfig,
) -> Result<()> {
    let files = candidate_files(root, scan);
    let records = collect_records(&files, key_path, template, options);

    let mut result_set: ResultSet = records.iter().map(ResultItem::record).collect();
    result_set.sort();

    let renderer = Renderer::with_config(config);
    println!("{}", renderer.render(&result_set));

    Ok(())
}
