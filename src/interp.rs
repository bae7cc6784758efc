//! Owned handle over the sclang interpreter subprocess.
//!
//! The handle has an explicit lifecycle — `NotStarted`, `Running`, `Exited`
//! — with `start` and `stop` as the only mutators. Code is written to the
//! interpreter's stdin using sclang's pipe protocol: a chunk terminated by
//! `0x0c` is interpreted and its result posted, a chunk terminated by
//! `0x1b` is interpreted silently. An evaluation may be preceded by a
//! silent `thisProcess.nowExecutingPath` notice so error posts carry the
//! right file path.

use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tracing::{debug, info};

use crate::settings::InterpreterSettings;

/// Terminator for "interpret and print the result".
const INTERPRET_PRINT: u8 = 0x0c;
/// Terminator for "interpret silently".
const INTERPRET_SILENT: u8 = 0x1b;

/// Errors from interpreter lifecycle and evaluation operations.
#[derive(Debug, thiserror::Error)]
pub enum InterpreterError {
    #[error("interpreter is already running")]
    AlreadyRunning,

    #[error("interpreter is not running")]
    NotRunning,

    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write to interpreter stdin: {0}")]
    Write(#[from] std::io::Error),
}

/// Lifecycle state of the interpreter subprocess.
enum State {
    NotStarted,
    Running { child: Child, stdin: ChildStdin },
    Exited { code: Option<i32> },
}

/// Single-owner handle over the sclang subprocess.
pub struct Interpreter {
    state: State,
}

/// Liveness summary reported to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NotStarted,
    Running,
    Exited,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NotStarted => "not-started",
            Status::Running => "running",
            Status::Exited => "exited",
        }
    }
}

impl Interpreter {
    /// A handle with no subprocess yet.
    pub fn new() -> Self {
        Self {
            state: State::NotStarted,
        }
    }

    /// Spawn sclang with piped stdin. Errors if a process is already live.
    pub fn start(&mut self, settings: &InterpreterSettings) -> Result<(), InterpreterError> {
        if matches!(self.probe(), Status::Running) {
            return Err(InterpreterError::AlreadyRunning);
        }

        let command = settings.command();
        let mut cmd = Command::new(&command);
        match &settings.args {
            Some(args) => cmd.args(args),
            // -i names the controlling IDE so sclang enters pipe mode.
            None => cmd.args(["-i", "sclsp"]),
        };
        if let Some(config) = &settings.config_file {
            cmd.arg("-l").arg(config);
        }
        if let Some(dir) = &settings.runtime_dir {
            cmd.arg("-d").arg(dir);
        }
        // Post window output goes to our stderr; stdout would corrupt the
        // LSP channel.
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| InterpreterError::Spawn {
            command: command.display().to_string(),
            source,
        })?;
        let stdin = child.stdin.take().expect("stdin was piped");

        info!("started interpreter: {}", command.display());
        self.state = State::Running { child, stdin };
        Ok(())
    }

    /// Kill the subprocess if live and return to `NotStarted`.
    pub async fn stop(&mut self) -> Result<(), InterpreterError> {
        match std::mem::replace(&mut self.state, State::NotStarted) {
            State::Running { mut child, stdin } => {
                drop(stdin);
                let _ = child.kill().await;
                info!("stopped interpreter");
                Ok(())
            }
            State::NotStarted | State::Exited { .. } => Err(InterpreterError::NotRunning),
        }
    }

    /// Current liveness, transitioning `Running -> Exited` if the process
    /// has died since the last check.
    pub fn probe(&mut self) -> Status {
        if let State::Running { child, .. } = &mut self.state {
            if let Ok(Some(status)) = child.try_wait() {
                info!("interpreter exited: {}", status);
                self.state = State::Exited {
                    code: status.code(),
                };
            }
        }
        match &self.state {
            State::NotStarted => Status::NotStarted,
            State::Running { .. } => Status::Running,
            State::Exited { .. } => Status::Exited,
        }
    }

    /// Exit code of a dead interpreter, when known.
    pub fn exit_code(&self) -> Option<i32> {
        match &self.state {
            State::Exited { code } => *code,
            _ => None,
        }
    }

    /// Send a code chunk for interpretation, optionally preceded by a
    /// silent current-file-path notice.
    pub async fn send(
        &mut self,
        code: &str,
        file_path: Option<&Path>,
    ) -> Result<(), InterpreterError> {
        if !matches!(self.probe(), Status::Running) {
            return Err(InterpreterError::NotRunning);
        }
        let State::Running { stdin, .. } = &mut self.state else {
            return Err(InterpreterError::NotRunning);
        };

        if let Some(path) = file_path {
            let notice = format!(
                "thisProcess.nowExecutingPath = \"{}\";",
                path.display().to_string().replace('\\', "\\\\").replace('"', "\\\"")
            );
            stdin.write_all(notice.as_bytes()).await?;
            stdin.write_all(&[INTERPRET_SILENT]).await?;
        }

        debug!("evaluating {} bytes", code.len());
        stdin.write_all(code.as_bytes()).await?;
        stdin.write_all(&[INTERPRET_PRINT]).await?;
        stdin.flush().await?;
        Ok(())
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}
