//! Purpose: Launch `jupyter nbconvert` as a child process with a wall-clock bound.
//! Exports: `JupyterCommand`, `run_bounded`.
//! Role: Single choke point for every external process the exporter starts.
//! Invariants: stdin is fed and stdout/stderr drained on helper threads, so pipes never deadlock.
//! Invariants: A child that outlives its deadline is killed and reaped before returning.
use std::ffi::OsStr;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use super::error::{Error, ErrorKind};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

#[derive(Clone, Debug)]
pub struct JupyterCommand {
    program: PathBuf,
}

impl JupyterCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// `jupyter nbconvert ARGS...` running in `working_dir`.
    pub fn nbconvert<I, S>(&self, args: I, working_dir: &Path) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.arg("nbconvert").args(args).current_dir(working_dir);
        command
    }
}

impl Default for JupyterCommand {
    fn default() -> Self {
        Self::new("jupyter")
    }
}

/// Run `command` with `input` on stdin and return its stdout.
///
/// A non-zero exit becomes an error of `failure_kind` carrying the last
/// meaningful stderr line, which for nbconvert is the original exception.
/// Overrunning `timeout` becomes a `Timeout` error carrying `timeout_hint`.
pub fn run_bounded(
    mut command: Command,
    input: Vec<u8>,
    timeout: Option<Duration>,
    failure_kind: ErrorKind,
    timeout_hint: &str,
) -> Result<Vec<u8>, Error> {
    let program = command.get_program().to_string_lossy().into_owned();
    debug!(?command, ?timeout, "spawning");

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| {
            Error::new(failure_kind)
                .with_message(format!("failed to start `{program}`: {err}"))
                .with_hint("Install Jupyter with `pip install 'nbconvert[webpdf]'` or pass --jupyter.")
                .with_source(err)
        })?;

    let stdin = child.stdin.take();
    let writer = thread::spawn(move || {
        if let Some(mut pipe) = stdin {
            // A child that exits early closes the pipe; its exit status reports why.
            let _ = pipe.write_all(&input);
        }
    });
    let stdout = spawn_reader(child.stdout.take());
    let stderr = spawn_reader(child.stderr.take());

    let status = wait_with_deadline(&mut child, timeout, &program, timeout_hint)?;
    let _ = writer.join();
    let stdout = join_reader(stdout);
    let stderr = join_reader(stderr);

    if status.success() {
        return Ok(stdout);
    }
    let summary = last_error_line(&stderr)
        .unwrap_or_else(|| format!("`{program}` exited with {status}"));
    debug!(%status, stderr = %String::from_utf8_lossy(&stderr), "child failed");
    Err(Error::new(failure_kind).with_message(summary))
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
    program: &str,
    timeout_hint: &str,
) -> Result<std::process::ExitStatus, Error> {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::new(ErrorKind::Io)
                    .with_message(format!("failed to wait for `{program}`"))
                    .with_source(err));
            }
        }
        if let Some(limit) = timeout {
            if start.elapsed() > limit {
                let _ = child.kill();
                let _ = child.wait();
                return Err(Error::new(ErrorKind::Timeout)
                    .with_message(format!("timed out after {}s", limit.as_secs_f64()))
                    .with_hint(timeout_hint));
            }
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn spawn_reader<R>(pipe: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn join_reader(handle: JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

fn last_error_line(stderr: &[u8]) -> Option<String> {
    let text = strip_ansi(&String::from_utf8_lossy(stderr));
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Drop ANSI color sequences that IPython tracebacks carry.
fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for next in chars.by_ref() {
                if next.is_ascii_alphabetic() {
                    break;
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}
