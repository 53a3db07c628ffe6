//! Exec session plumbing: create one short-lived process inside the
//! container, demultiplex its output, report how it ended.

use std::pin::Pin;

use bollard::exec::{CreateExecOptions, StartExecOptions};
use bollard::Docker;
use bytes::Bytes;
use futures_util::stream::{self, Stream};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use super::config::BridgeConfig;
use super::errors::{classify_stderr, is_not_found, BridgeError};

/// Stream of raw stdout bytes from an exec session. Stderr collected during
/// the session surfaces as one trailing error after the last stdout frame.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BridgeError>> + Send>>;

/// Result of a completed exec session
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i64>,
}

impl ExecOutput {
    /// Combined output, used where any emitted text is an error message
    pub fn combined(&self) -> String {
        let mut combined = self.stdout.trim().to_string();
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr);
        }
        combined
    }
}

/// Runs commands inside one container via the runtime's exec primitive.
///
/// Each call spawns exactly one process and consumes it; sessions are never
/// reused and nothing is retried. The container's running state is
/// re-inspected before every session rather than cached.
#[derive(Debug, Clone)]
pub struct ExecRunner {
    docker: Docker,
    container_id: String,
    config: BridgeConfig,
}

impl ExecRunner {
    pub fn new(docker: Docker, container_id: String, config: BridgeConfig) -> Self {
        Self {
            docker,
            container_id,
            config,
        }
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Fail fast if the container is gone or stopped, before the runtime
    /// gets a chance to reject an exec with a less useful message.
    pub async fn ensure_running(&self) -> Result<(), BridgeError> {
        let inspect = self
            .docker
            .inspect_container(
                &self.container_id,
                None::<bollard::query_parameters::InspectContainerOptions>,
            )
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    BridgeError::ContainerNotFound(self.container_id.clone())
                } else {
                    BridgeError::RuntimeUnavailable(e)
                }
            })?;

        let running = inspect
            .state
            .as_ref()
            .and_then(|state| state.running)
            .unwrap_or(false);

        if !running {
            return Err(BridgeError::ContainerNotRunning(self.container_id.clone()));
        }

        Ok(())
    }

    /// Run a command, collect demultiplexed stdout/stderr, read the exit
    /// code once the output stream has ended.
    pub async fn exec(&self, argv: Vec<String>) -> Result<ExecOutput, BridgeError> {
        self.ensure_running().await?;

        log::debug!(
            "Executing command in container {}: {:?}",
            self.container_id,
            argv
        );

        let exec = self
            .docker
            .create_exec(
                &self.container_id,
                CreateExecOptions {
                    cmd: Some(argv),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    working_dir: self.config.working_directory.clone(),
                    ..Default::default()
                },
            )
            .await?;

        let start_config = StartExecOptions {
            detach: false,
            ..Default::default()
        };

        let mut stdout = String::new();
        let mut stderr = String::new();

        match self.docker.start_exec(&exec.id, Some(start_config)).await? {
            bollard::exec::StartExecResults::Attached {
                output: mut output_stream,
                ..
            } => {
                while let Some(msg) = output_stream.next().await {
                    match msg? {
                        bollard::container::LogOutput::StdOut { message } => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        bollard::container::LogOutput::StdErr { message } => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        _ => {}
                    }
                }
            }
            bollard::exec::StartExecResults::Detached => {
                return Err(BridgeError::TransferFailed {
                    path: String::new(),
                    message: "unexpected detached execution".to_string(),
                });
            }
        }

        let exec_inspect = self.docker.inspect_exec(&exec.id).await?;
        let exit_code = exec_inspect.exit_code;

        log::debug!(
            "Command completed (exit code {:?}, {} stdout bytes, {} stderr bytes)",
            exit_code,
            stdout.len(),
            stderr.len()
        );

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code,
        })
    }

    /// Run a command with stdin attached, feed it the full input buffer,
    /// close stdin, then drain output.
    ///
    /// The session only counts as complete once both conditions hold: the
    /// write half has been shut down and the output stream has ended.
    /// Treating partial output as final is the classic bug this avoids.
    pub async fn exec_with_stdin(
        &self,
        argv: Vec<String>,
        input_bytes: &[u8],
    ) -> Result<ExecOutput, BridgeError> {
        self.ensure_running().await?;

        log::debug!(
            "Executing command with stdin in container {}: {:?} ({} input bytes)",
            self.container_id,
            argv,
            input_bytes.len()
        );

        let exec = self
            .docker
            .create_exec(
                &self.container_id,
                CreateExecOptions {
                    cmd: Some(argv),
                    attach_stdin: Some(true),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    working_dir: self.config.working_directory.clone(),
                    ..Default::default()
                },
            )
            .await?;

        let start_config = StartExecOptions {
            detach: false,
            ..Default::default()
        };

        let mut stdout = String::new();
        let mut stderr = String::new();

        match self.docker.start_exec(&exec.id, Some(start_config)).await? {
            bollard::exec::StartExecResults::Attached {
                output: mut output_stream,
                input,
            } => {
                {
                    let mut stdin = input;
                    stdin.write_all(input_bytes).await?;
                    stdin.flush().await?;
                    stdin.shutdown().await?;
                }

                while let Some(msg) = output_stream.next().await {
                    match msg? {
                        bollard::container::LogOutput::StdOut { message } => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        bollard::container::LogOutput::StdErr { message } => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        _ => {}
                    }
                }
            }
            bollard::exec::StartExecResults::Detached => {
                return Err(BridgeError::TransferFailed {
                    path: String::new(),
                    message: "unexpected detached execution".to_string(),
                });
            }
        }

        let exec_inspect = self.docker.inspect_exec(&exec.id).await?;

        Ok(ExecOutput {
            stdout,
            stderr,
            exit_code: exec_inspect.exit_code,
        })
    }

    /// Run a command and hand its stdout to the caller as a byte stream,
    /// without buffering the content.
    ///
    /// Stderr frames are accumulated while streaming; if any arrived by the
    /// time the session ends, they surface as a single trailing error
    /// classified against `path`. Dropping the stream drops the underlying
    /// session.
    pub async fn exec_stream(
        &self,
        argv: Vec<String>,
        path: String,
    ) -> Result<ByteStream, BridgeError> {
        self.ensure_running().await?;

        log::debug!(
            "Streaming command in container {}: {:?}",
            self.container_id,
            argv
        );

        let exec = self
            .docker
            .create_exec(
                &self.container_id,
                CreateExecOptions {
                    cmd: Some(argv),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    working_dir: self.config.working_directory.clone(),
                    ..Default::default()
                },
            )
            .await?;

        let start_config = StartExecOptions {
            detach: false,
            ..Default::default()
        };

        let output = match self.docker.start_exec(&exec.id, Some(start_config)).await? {
            bollard::exec::StartExecResults::Attached { output, .. } => output,
            bollard::exec::StartExecResults::Detached => {
                return Err(BridgeError::TransferFailed {
                    path,
                    message: "unexpected detached execution".to_string(),
                });
            }
        };

        struct StreamState {
            output: Pin<
                Box<
                    dyn Stream<
                            Item = Result<
                                bollard::container::LogOutput,
                                bollard::errors::Error,
                            >,
                        > + Send,
                >,
            >,
            stderr: String,
            path: String,
        }

        let state = StreamState {
            output,
            stderr: String::new(),
            path,
        };

        let byte_stream = stream::unfold(state, |mut st| async move {
            loop {
                match st.output.next().await {
                    Some(Ok(bollard::container::LogOutput::StdOut { message })) => {
                        return Some((Ok(message), st));
                    }
                    Some(Ok(bollard::container::LogOutput::StdErr { message })) => {
                        st.stderr.push_str(&String::from_utf8_lossy(&message));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        st.stderr.clear();
                        return Some((Err(BridgeError::RuntimeUnavailable(e)), st));
                    }
                    None => {
                        let stderr = std::mem::take(&mut st.stderr);
                        if stderr.trim().is_empty() {
                            return None;
                        }
                        return Some((Err(classify_stderr(&st.path, stderr.trim())), st));
                    }
                }
            }
        });

        Ok(Box::pin(byte_stream))
    }

    /// Run a file-mutating command (`mkdir`, `rm`, `mv`, `chmod`).
    ///
    /// Any stderr output is a failure for these, even when the exit code
    /// could not be observed.
    pub async fn exec_checked(
        &self,
        argv: Vec<String>,
        path: &str,
    ) -> Result<ExecOutput, BridgeError> {
        let output = self.exec(argv).await?;

        if !output.stderr.trim().is_empty() {
            return Err(classify_stderr(path, output.stderr.trim()));
        }

        if let Some(code) = output.exit_code {
            if code != 0 {
                return Err(BridgeError::TransferFailed {
                    path: path.to_string(),
                    message: format!("command exited with status {}", code),
                });
            }
        }

        Ok(output)
    }
}
