//! Query engine execution
//!
//! Runs the external query engine (yq) once per document: the document is written to
//! stdin, the expression is the trailing argument, stdout and stderr are captured
//! separately. Every invocation builds its own [`EngineCommand`] from an immutable
//! template so concurrent tasks never share command state.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::core::error::EngineError;
use crate::core::util::read_lossy;

/// Separator the engine places between documents in its output
pub const DOCUMENT_SEPARATOR: &str = "---";

/// How often a running engine is checked for exit, timeout and cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Immutable description of an engine invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl EngineCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Fresh command with `query` appended as the trailing argument
    pub fn with_query(&self, query: &str) -> Self {
        let mut command = self.clone();
        command.args.push(query.to_string());
        command
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so a kill also reaches helpers a wrapper script started.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);
        cmd
    }
}

/// Cancellation flag plus a count of running engine processes
///
/// Cloning shares the same state. Once cancelled, running executions kill their child
/// and new ones refuse to start.
#[derive(Debug, Clone, Default)]
pub struct EngineSession {
    inner: Arc<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
    cancelled: AtomicBool,
    running: Mutex<usize>,
    idle: Condvar,
}

impl EngineSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Number of engine processes currently alive
    pub fn running(&self) -> usize {
        *self.lock_running()
    }

    /// Block until no engine process is alive
    pub fn wait_idle(&self) {
        let mut running = self.lock_running();
        while *running > 0 {
            running = match self.inner.idle.wait(running) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    fn lock_running(&self) -> MutexGuard<'_, usize> {
        self.inner
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter(&self) -> Option<RunningGuard<'_>> {
        let mut running = self.lock_running();
        if self.is_cancelled() {
            return None;
        }
        *running += 1;
        Some(RunningGuard { session: self })
    }
}

/// Decrements the running count when the child has been reaped
struct RunningGuard<'a> {
    session: &'a EngineSession,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        let mut running = self.session.lock_running();
        *running = running.saturating_sub(1);
        self.session.inner.idle.notify_all();
    }
}

/// Default number of engine processes allowed to run at once
pub fn default_jobs() -> usize {
    thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

/// Limits for a batch of engine invocations
#[derive(Debug, Clone)]
pub struct ExecOptions {
    /// Per-invocation timeout
    pub timeout: Duration,
    /// Maximum concurrent engine processes
    pub jobs: usize,
    pub session: EngineSession,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            jobs: default_jobs(),
            session: EngineSession::new(),
        }
    }
}

/// Captured output of one successful invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineOutput {
    pub stdout: String,
    pub stderr: String,
}

impl EngineOutput {
    /// Non-empty result segments, split on separator lines
    pub fn segments(&self) -> Vec<String> {
        let mut segments = Vec::new();
        let mut current = String::new();

        for line in self.stdout.lines() {
            if line.trim_end() == DOCUMENT_SEPARATOR {
                segments.push(std::mem::take(&mut current));
            } else {
                current.push_str(line);
                current.push('\n');
            }
        }
        segments.push(current);

        segments.retain(|segment| !segment.trim().is_empty());
        segments
    }
}

/// Run `command` with `input` on stdin
pub fn execute(
    command: &EngineCommand,
    input: &[u8],
    options: &ExecOptions,
) -> Result<EngineOutput, EngineError> {
    let program = command.program_name();

    let Some(_running) = options.session.enter() else {
        return Err(EngineError::Cancelled { program });
    };

    debug!(
        program = %program,
        args = ?command.args(),
        input_bytes = input.len(),
        "spawning engine"
    );

    let mut child = command
        .to_command()
        .spawn()
        .map_err(|source| EngineError::Spawn {
            program: program.clone(),
            source,
        })?;

    let io_error = |source: std::io::Error| EngineError::Io {
        program: program.clone(),
        source,
    };

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    // Pipes are serviced on their own threads so a chatty engine cannot fill a buffer
    // and stall while we are still writing the document.
    let piped = thread::scope(|scope| {
        let writer = thread::Builder::new()
            .name("engine-stdin".to_string())
            .spawn_scoped(scope, move || match stdin {
                Some(mut stdin) => stdin.write_all(input),
                None => Ok(()),
            });
        let out_reader = thread::Builder::new()
            .name("engine-stdout".to_string())
            .spawn_scoped(scope, move || stdout.map(read_lossy).transpose());
        let err_reader = thread::Builder::new()
            .name("engine-stderr".to_string())
            .spawn_scoped(scope, move || stderr.map(read_lossy).transpose());

        let (writer, out_reader, err_reader) = match (writer, out_reader, err_reader) {
            (Ok(w), Ok(o), Ok(e)) => (w, o, e),
            (w, o, e) => {
                // Dropped closures close their pipe ends; the kill unblocks the rest.
                kill_and_reap(&mut child, &program);
                let source = w
                    .err()
                    .or(o.err())
                    .or(e.err())
                    .unwrap_or_else(|| std::io::Error::other("failed to start pipe thread"));
                return Err(io_error(source));
            }
        };

        let status = wait_for_exit(&mut child, &program, options);

        let write_result = writer.join().unwrap_or(Ok(()));
        let out = out_reader.join().unwrap_or(Ok(None));
        let err = err_reader.join().unwrap_or(Ok(None));

        if let Err(err) = write_result {
            // The engine may legitimately stop reading early (e.g. on a parse error);
            // its exit status decides the outcome.
            debug!(program = %program, error = %err, "engine closed stdin early");
        }
        Ok((status, out, err))
    });

    let (status, stdout, stderr) = piped?;
    let status = status?;
    let stdout = stdout.map_err(io_error)?.unwrap_or_default();
    let stderr = stderr.map_err(io_error)?.unwrap_or_default();

    debug!(
        program = %program,
        status = ?status.code(),
        stdout_bytes = stdout.len(),
        "engine exited"
    );

    if !status.success() {
        return Err(EngineError::NonZeroExit {
            program,
            status: status.code(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(EngineOutput { stdout, stderr })
}

/// Poll the child until it exits, is cancelled or times out; the child is always reaped
fn wait_for_exit(
    child: &mut Child,
    program: &str,
    options: &ExecOptions,
) -> Result<std::process::ExitStatus, EngineError> {
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if options.session.is_cancelled() {
                    kill_and_reap(child, program);
                    return Err(EngineError::Cancelled {
                        program: program.to_string(),
                    });
                }
                if start.elapsed() > options.timeout {
                    kill_and_reap(child, program);
                    return Err(EngineError::Timeout {
                        program: program.to_string(),
                        timeout_secs: options.timeout.as_secs(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                kill_and_reap(child, program);
                return Err(EngineError::Io {
                    program: program.to_string(),
                    source,
                });
            }
        }
    }
}

/// Kill the engine's process group (the child alone off unix) and reap the child
fn kill_and_reap(child: &mut Child, program: &str) {
    if let Err(err) = kill_group(child) {
        debug!(program, error = %err, "kill failed, engine probably exited");
    }
    if let Err(err) = child.wait() {
        debug!(program, error = %err, "failed to reap engine");
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) -> std::io::Result<()> {
    let pgid = child.id() as libc::pid_t;
    // SAFETY: kill has no memory preconditions; the negative pid names the group the
    // child leads, and the child is not reaped yet so its id cannot have been reused.
    let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if result == 0 {
        Ok(())
    } else {
        child.kill()
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) -> std::io::Result<()> {
    child.kill()
}
