/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Unix command execution adapter

use crate::domain::CommandError;
use crate::ports::{CommandExecutor, CommandOutput, SystemCommand};
use async_trait::async_trait;
use log::{debug, error, warn};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Default deadline of a single omreport invocation
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Exit code omreport uses when it has nothing to report
const IDLE_EXIT_CODE: i32 = 255;

/// Time a process gets to exit after SIGINT before it is killed
const INTERRUPT_GRACE_PERIOD: Duration = Duration::from_millis(100);

/// Process-wide command deadline, shared by every clone
///
/// Stored as milliseconds so it can be read and replaced without locking.
/// Invocations load the value once when they start.
#[derive(Debug, Clone)]
pub struct CommandTimeout(Arc<AtomicU64>);

impl CommandTimeout {
    pub fn new(timeout: Duration) -> Self {
        Self(Arc::new(AtomicU64::new(timeout.as_millis() as u64)))
    }

    /// Current deadline
    pub fn get(&self) -> Duration {
        Duration::from_millis(self.0.load(Ordering::SeqCst))
    }

    /// Replace the deadline; a zero value is ignored
    ///
    /// # Returns
    /// * `true` - The new deadline is in effect
    /// * `false` - The value was zero and the previous deadline stays
    pub fn set(&self, timeout: Duration) -> bool {
        if timeout.is_zero() {
            warn!("Command timeout of zero is not allowed, keeping {:?}", self.get());
            return false;
        }
        self.0.store(timeout.as_millis() as u64, Ordering::SeqCst);
        true
    }
}

impl Default for CommandTimeout {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

/// Unix-based command executor that enforces deadlines
pub struct UnixCommandExecutor {
    /// Deadline for commands without their own
    timeout: CommandTimeout,
    /// Wait between SIGINT and SIGKILL
    grace_period: Duration,
}

impl UnixCommandExecutor {
    /// Create a new Unix command executor
    ///
    /// # Arguments
    /// * `timeout` - Shared deadline handle, may be changed while running
    pub fn new(timeout: CommandTimeout) -> Self {
        Self {
            timeout,
            grace_period: INTERRUPT_GRACE_PERIOD,
        }
    }

    /// Create a Unix command executor with default settings
    pub fn with_defaults() -> Self {
        Self::new(CommandTimeout::default())
    }

    /// Handle to the shared deadline
    pub fn timeout_handle(&self) -> CommandTimeout {
        self.timeout.clone()
    }

    /// Execute a command once, interrupting it at the deadline
    async fn execute_once(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        let deadline = command.timeout.unwrap_or_else(|| self.timeout.get());

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        // Own process group, so a timeout reaches everything the program started
        #[cfg(unix)]
        cmd.process_group(0);

        debug!("Executing: {}", command.display());

        let mut child = cmd
            .spawn()
            .map_err(|e| spawn_error(&command.program, e))?;
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let result = timeout(deadline, async {
            let (stdout, stderr, status) = tokio::join!(
                read_pipe(stdout_pipe),
                read_pipe(stderr_pipe),
                child.wait()
            );
            Ok::<_, io::Error>((stdout?, stderr?, status?))
        })
        .await;

        match result {
            Ok(Ok((stdout, stderr, status))) => finish(command, &stdout, &stderr, status),
            Ok(Err(source)) => Err(CommandError::Io {
                program: command.program.clone(),
                source,
            }),
            Err(_) => {
                self.interrupt(&mut child, &command.program).await;
                Err(CommandError::TimedOut {
                    program: command.program.clone(),
                    timeout: deadline,
                })
            }
        }
    }

    /// SIGINT to the process group, then SIGKILL to whatever is left of it
    async fn interrupt(&self, child: &mut Child, program: &str) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                let group = -(pid as libc::pid_t);
                // SAFETY: the group was created for this child, whose pid is not reaped yet
                let exited = if unsafe { libc::kill(group, libc::SIGINT) } == 0 {
                    error!("Interrupted '{program}' after timeout");
                    matches!(timeout(self.grace_period, child.wait()).await, Ok(Ok(_)))
                } else {
                    false
                };
                // SAFETY: same group; fails with ESRCH once every member is gone
                unsafe { libc::kill(group, libc::SIGKILL) };
                if exited {
                    return;
                }
            }
        }

        match child.kill().await {
            Ok(()) => error!("Killed '{program}' after timeout"),
            Err(e) => error!("Failed to kill '{program}': {e}"),
        }
    }
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

fn spawn_error(program: &str, source: io::Error) -> CommandError {
    if source.kind() == io::ErrorKind::NotFound {
        CommandError::NotFound(program.to_string())
    } else {
        CommandError::Io {
            program: program.to_string(),
            source,
        }
    }
}

fn finish(
    command: &SystemCommand,
    stdout: &[u8],
    stderr: &[u8],
    status: ExitStatus,
) -> Result<CommandOutput, CommandError> {
    let stderr = String::from_utf8_lossy(stderr).into_owned();
    let exit_code = status.code();

    if status.success() {
        return Ok(CommandOutput {
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr,
            exit_code,
            success: true,
        });
    }

    if exit_code == Some(IDLE_EXIT_CODE) {
        debug!("'{}' exited with {IDLE_EXIT_CODE}, nothing to report", command.display());
        return Ok(CommandOutput {
            stdout: String::new(),
            stderr,
            exit_code,
            success: false,
        });
    }

    Err(CommandError::NonZeroExit {
        program: command.program.clone(),
        code: exit_code,
        stderr: stderr.trim().to_string(),
    })
}

/// Resolve a program name the way the process spawner would
fn find_program(name: &str) -> bool {
    if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
        return Path::new(name).is_file();
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(name).is_file()))
        .unwrap_or(false)
}

#[async_trait]
impl CommandExecutor for UnixCommandExecutor {
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        if command.program.is_empty() {
            return Err(CommandError::InvalidArguments(
                "program name is empty".to_string(),
            ));
        }
        self.execute_once(command).await
    }

    async fn is_command_available(&self, command_name: &str) -> Result<bool, CommandError> {
        Ok(find_program(command_name))
    }
}
