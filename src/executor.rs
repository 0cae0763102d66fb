//! Runs [`WorkTask`]s through the primary/split/join state machine.

use crate::error::{Error, Result};
use crate::tasks::{PlannedCommand, WorkTask};
use discmux_av::{ExitOutcome, ToolRunner};
use discmux_common::paths::file_stem;
use std::fmt;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// mkvmerge exit code for a run that stopped with errors.
const PARTIAL_JOIN_EXIT: i32 = 2;

/// Where a task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    PrimaryRunning,
    Succeeded,
    FallbackRunning,
    FallbackJoining,
    /// Join failed; the split outputs stand in for the joined file.
    Degraded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Degraded | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::PrimaryRunning => "primary running",
            Self::Succeeded => "succeeded",
            Self::FallbackRunning => "fallback running",
            Self::FallbackJoining => "fallback joining",
            Self::Degraded => "degraded",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Terminal state of a task and the files it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub state: TaskState,
    pub outputs: Vec<PathBuf>,
}

pub struct TaskExecutor<'a> {
    runner: &'a dyn ToolRunner,
    allowed: &'a [i32],
    cancel: &'a CancellationToken,
}

impl<'a> TaskExecutor<'a> {
    /// `allowed` are the exit codes that count as success.
    pub fn new(runner: &'a dyn ToolRunner, allowed: &'a [i32], cancel: &'a CancellationToken) -> Self {
        Self {
            runner,
            allowed,
            cancel,
        }
    }

    /// Run one task to a terminal state.
    ///
    /// An ignorable task that fails yields [`TaskState::Failed`] with no
    /// outputs. A failing task without fallback returns its error.
    /// Cancellation always returns [`Error::Terminated`].
    pub fn execute(&self, task: &WorkTask) -> Result<TaskOutcome> {
        let mut state = TaskState::Pending;
        self.advance(&mut state, TaskState::PrimaryRunning, task);

        let err = match self.run_primary(task) {
            Ok(outputs) => return Ok(self.finish(&mut state, TaskState::Succeeded, task, outputs)),
            Err(Error::Terminated) => return Err(Error::Terminated),
            Err(e) => e,
        };

        if task.can_be_ignored() {
            tracing::warn!(input = %task.input().display(), error = %err, "ignoring failed task");
            return Ok(self.finish(&mut state, TaskState::Failed, task, Vec::new()));
        }
        let Some(fallback) = task.fallback() else {
            self.advance(&mut state, TaskState::Failed, task);
            return Err(err);
        };

        tracing::warn!(input = %task.input().display(), error = %err, "primary mux failed, muxing clips separately");
        self.advance(&mut state, TaskState::FallbackRunning, task);
        for worker in &fallback.split_workers {
            match self.run(worker) {
                Ok(()) => {}
                Err(Error::Terminated) => return Err(Error::Terminated),
                Err(e) => {
                    tracing::warn!(output = %worker.output.display(), error = %e, "split worker failed")
                }
            }
        }

        self.advance(&mut state, TaskState::FallbackJoining, task);
        match self.join(&fallback.join) {
            Ok(()) => {
                let outputs = vec![fallback.join.output.clone()];
                Ok(self.finish(&mut state, TaskState::Succeeded, task, outputs))
            }
            Err(Error::Terminated) => Err(Error::Terminated),
            Err(e) => {
                // Split outputs are reported as-is; a failed worker's path may not exist.
                tracing::warn!(input = %task.input().display(), error = %e, "join failed, keeping separate parts");
                let outputs = fallback
                    .split_workers
                    .iter()
                    .map(|w| w.output.clone())
                    .collect();
                Ok(self.finish(&mut state, TaskState::Degraded, task, outputs))
            }
        }
    }

    fn run_primary(&self, task: &WorkTask) -> Result<Vec<PathBuf>> {
        let primary = task.primary();
        self.run(primary)?;
        if task.is_chapter_split() {
            let parts = split_outputs(&primary.output)?;
            if parts.is_empty() {
                return Err(Error::NoOutputFile(primary.output.clone()));
            }
            Ok(parts)
        } else {
            require_file(&primary.output)?;
            Ok(vec![primary.output.clone()])
        }
    }

    fn run(&self, cmd: &PlannedCommand) -> Result<()> {
        tracing::info!(command = %cmd.invocation, "running");
        let output = self.runner.run(&cmd.invocation, self.cancel)?;
        if !output.exit.is_allowed(self.allowed) {
            tracing::debug!(stderr = %output.stderr.trim(), "tool output");
            return Err(Error::execution(cmd.invocation.tool(), output.exit, &cmd.output));
        }
        Ok(())
    }

    /// Only the partial exit code, a signal, a launch failure or a missing
    /// joined file degrade a join. Warning exits succeed whatever `allowed` says.
    fn join(&self, cmd: &PlannedCommand) -> Result<()> {
        tracing::info!(command = %cmd.invocation, "joining");
        let output = self.runner.run(&cmd.invocation, self.cancel)?;
        match output.exit {
            ExitOutcome::Code(code) if code != PARTIAL_JOIN_EXIT => require_file(&cmd.output),
            exit => {
                tracing::debug!(stderr = %output.stderr.trim(), "tool output");
                Err(Error::execution(cmd.invocation.tool(), exit, &cmd.output))
            }
        }
    }

    fn advance(&self, state: &mut TaskState, next: TaskState, task: &WorkTask) {
        tracing::debug!(input = %task.input().display(), from = %state, to = %next, "task state");
        *state = next;
    }

    fn finish(&self, state: &mut TaskState, next: TaskState, task: &WorkTask, outputs: Vec<PathBuf>) -> TaskOutcome {
        self.advance(state, next, task);
        TaskOutcome {
            state: next,
            outputs,
        }
    }
}

fn require_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::NoOutputFile(path.to_path_buf()))
    }
}

/// Numbered files mkvmerge writes for a split run of `output`
/// (`name.mkv` becomes `name-001.mkv`, `name-002.mkv`, ...).
pub(crate) fn split_outputs(output: &Path) -> Result<Vec<PathBuf>> {
    let Some(dir) = output.parent() else {
        return Ok(Vec::new());
    };
    let prefix = format!("{}-", file_stem(output));
    let extension = output.extension();

    let mut parts: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension() == extension)
        .filter(|p| file_stem(p).starts_with(&prefix))
        .collect();
    parts.sort();
    Ok(parts)
}
