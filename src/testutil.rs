//! Test helpers: shell scripts standing in for yq
//!
//! Scripts are run as `sh <script> <args...>` rather than executed directly, which
//! avoids ETXTBSY races between freshly written files and concurrent forks.

use std::path::{Path, PathBuf};

use crate::backends::engine::EngineCommand;

/// Write `body` to `dir/name` and return a command that runs it with `sh`
pub fn script(dir: &Path, name: &str, body: &str) -> EngineCommand {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
    EngineCommand::new("sh").with_args([path.to_string_lossy().into_owned()])
}

/// The fake engine script shared with the integration tests
///
/// - logs one line per invocation to `$FAKE_ENGINE_LOG`
/// - input containing `FAIL` exits 3 with a diagnostic on stderr
/// - input starting with `#raw` echoes the remaining lines verbatim
/// - otherwise, per `---` separated document, prints the first `image:` value and its
///   line number, or `null` and `0` like yq does for a missing key
pub const FAKE_ENGINE: &str = include_str!("../tests/fixtures/fake-yq.sh");

/// Installed fake engine with an invocation log
pub struct FakeEngine {
    pub script: PathBuf,
    pub log: PathBuf,
}

impl FakeEngine {
    pub fn install(dir: &Path) -> Self {
        let script = dir.join("fake-yq.sh");
        let log = dir.join("fake-yq.log");
        std::fs::write(&script, FAKE_ENGINE).unwrap();
        std::fs::write(&log, "").unwrap();
        Self { script, log }
    }

    pub fn command(&self) -> EngineCommand {
        EngineCommand::new("sh")
            .with_args([self.script.to_string_lossy().into_owned()])
            .with_env("FAKE_ENGINE_LOG", self.log.to_string_lossy().into_owned())
    }

    /// Number of times the engine has been started
    pub fn invocations(&self) -> usize {
        std::fs::read_to_string(&self.log)
            .map(|log| log.lines().count())
            .unwrap_or(0)
    }
}

/// A pod-template manifest whose container image sits on `line`
pub fn deployment(image: &str, line: usize) -> String {
    let mut manifest = String::new();
    // Pad with comments so the image lands exactly on `line`.
    for _ in 0..line.saturating_sub(7) {
        manifest.push_str("# padding\n");
    }
    manifest.push_str("apiVersion: apps/v1\n");
    manifest.push_str("kind: Deployment\n");
    manifest.push_str("spec:\n");
    manifest.push_str("  template:\n");
    manifest.push_str("    spec:\n");
    manifest.push_str("      containers:\n");
    manifest.push_str(&format!("        - image: \"{}\"\n", image));
    manifest
}

#[test]
fn deployment_places_image_on_requested_line() {
    let manifest = deployment("nginx:latest", 10);
    let line = manifest
        .lines()
        .position(|l| l.contains("image:"))
        .map(|i| i + 1);
    assert_eq!(line, Some(10));
}
