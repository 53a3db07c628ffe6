//! Moving file content in and out of a container as byte streams.

use futures_util::StreamExt;

use super::dir_plan::validate_abs_path;
use super::errors::{classify_stderr, BridgeError};
use super::executor::{ByteStream, ExecRunner};

/// Write a byte buffer to a file inside the container via an exec session
/// with stdin attached, then fix the file's permissions.
///
/// The target path is the one argument that has to pass through a shell (the
/// redirection), so it is validated and shell-quoted; everything else is a
/// plain argv. The write does not create missing parent directories: those
/// are the directory plan's job, and a missing parent fails with
/// `PathNotFound` without leaving a partial file behind.
pub async fn put(
    runner: &ExecRunner,
    path: &str,
    content: &[u8],
    mode: u32,
) -> Result<(), BridgeError> {
    validate_abs_path(path)?;

    let quoted = shlex::try_quote(path).map_err(|_| BridgeError::InvalidPath {
        path: path.to_string(),
        reason: "cannot be shell-quoted".to_string(),
    })?;

    let mut argv = runner.config().shell.clone();
    argv.push(format!("cat > {}", quoted));

    let output = runner.exec_with_stdin(argv, content).await?;

    // A clean write is silent. Anything the session printed is an error.
    let emitted = output.combined();
    if !emitted.is_empty() {
        return Err(classify_stderr(path, &emitted));
    }
    if let Some(code) = output.exit_code {
        if code != 0 {
            return Err(BridgeError::TransferFailed {
                path: path.to_string(),
                message: format!("write exited with status {}", code),
            });
        }
    }

    chmod(runner, path, mode).await
}

/// Explicit permission-set step that follows every content write
pub async fn chmod(runner: &ExecRunner, path: &str, mode: u32) -> Result<(), BridgeError> {
    runner
        .exec_checked(
            vec![
                "chmod".to_string(),
                format!("{:o}", mode),
                path.to_string(),
            ],
            path,
        )
        .await?;
    Ok(())
}

/// Stream a file's content out of the container.
///
/// The bytes are handed over as they arrive, so content size is bounded by
/// the transport, not process memory. A nonexistent path yields an empty
/// stream whose trailing item is the classified stderr error; callers must
/// consume the stream to observe it.
pub async fn get(runner: &ExecRunner, path: &str) -> Result<ByteStream, BridgeError> {
    validate_abs_path(path)?;

    runner
        .exec_stream(
            vec!["cat".to_string(), path.to_string()],
            path.to_string(),
        )
        .await
}

/// Buffered read for callers that need the whole file (editor loads, the
/// per-file archive walk).
pub async fn get_to_vec(runner: &ExecRunner, path: &str) -> Result<Vec<u8>, BridgeError> {
    let mut stream = get(runner, path).await?;
    let mut content = Vec::new();

    while let Some(chunk) = stream.next().await {
        content.extend_from_slice(&chunk?);
    }

    Ok(content)
}

/// POSIX mode bits of a path, via a stat call inside the container
pub async fn stat_mode(runner: &ExecRunner, path: &str) -> Result<u32, BridgeError> {
    validate_abs_path(path)?;

    let output = runner
        .exec(vec![
            "stat".to_string(),
            "-c".to_string(),
            "%a".to_string(),
            path.to_string(),
        ])
        .await?;

    if !output.stderr.trim().is_empty() {
        return Err(classify_stderr(path, output.stderr.trim()));
    }

    u32::from_str_radix(output.stdout.trim(), 8).map_err(|_| BridgeError::TransferFailed {
        path: path.to_string(),
        message: format!("unexpected stat output: {}", output.stdout.trim()),
    })
}
