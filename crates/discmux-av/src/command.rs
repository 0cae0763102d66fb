//! Tool invocations and the cancellable process runner.

use crate::tools::{Tool, ToolPaths};
use crate::{Error, Result};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often a running child is polled for exit and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// One external program call: which tool, with which arguments.
///
/// # Example
///
/// ```
/// use discmux_av::{Invocation, Tool};
///
/// let mut inv = Invocation::new(Tool::Mkvmerge);
/// inv.arg("-J").arg("/disc/BDMV/PLAYLIST/00800.mpls");
/// assert_eq!(inv.to_string(), "mkvmerge -J /disc/BDMV/PLAYLIST/00800.mpls");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    tool: Tool,
    args: Vec<String>,
}

impl Invocation {
    pub fn new(tool: Tool) -> Self {
        Self {
            tool,
            args: Vec::new(),
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Append a path argument.
    pub fn path(&mut self, p: &Path) -> &mut Self {
        self.args.push(p.to_string_lossy().into_owned());
        self
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tool)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Code(i32),
    /// Killed by a signal; never an allowed status.
    Signalled,
}

impl ExitOutcome {
    pub fn code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Code(c) => Some(*c),
            ExitOutcome::Signalled => None,
        }
    }

    /// Whether the exit code is in the allowed set.
    pub fn is_allowed(&self, allowed: &[i32]) -> bool {
        self.code().map(|c| allowed.contains(&c)).unwrap_or(false)
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Code(c) => write!(f, "exit code {}", c),
            ExitOutcome::Signalled => f.write_str("signal"),
        }
    }
}

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit: ExitOutcome,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit: ExitOutcome::Code(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Process boundary for every external tool.
///
/// Implementations must return [`Error::Cancelled`] without starting the
/// tool when the token is already cancelled, and must stop an in-flight
/// tool once it is cancelled.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &Invocation, cancel: &CancellationToken) -> Result<ToolOutput>;
}

/// Runs tools as child processes of this one.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    paths: ToolPaths,
}

impl SystemRunner {
    pub fn new(paths: ToolPaths) -> Self {
        Self { paths }
    }
}

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &Invocation, cancel: &CancellationToken) -> Result<ToolOutput> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let tool = invocation.tool();
        let program = self.paths.resolve(tool)?;
        tracing::debug!(command = %invocation, "spawning");

        let mut child = Command::new(&program)
            .args(invocation.arguments())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    Error::tool_not_found(tool.name())
                } else {
                    Error::launch(tool.name(), e)
                }
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let mut terminated = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if !terminated && cancel.is_cancelled() {
                tracing::info!(tool = %tool, pid = child.id(), "terminating");
                terminate(&mut child);
                terminated = true;
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if terminated {
            return Err(Error::Cancelled);
        }

        let exit = match status.code() {
            Some(c) => ExitOutcome::Code(c),
            None => ExitOutcome::Signalled,
        };
        Ok(ToolOutput {
            exit,
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Err(e) = kill(Pid::from_raw(child.id() as i32), Signal::SIGTERM) {
        tracing::warn!(error = %e, "SIGTERM failed, killing");
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
}
