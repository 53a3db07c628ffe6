/// Errors surfaced by container filesystem operations
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),
    #[error("container is not running: {0}")]
    ContainerNotRunning(String),
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),
    #[error("invalid path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
    #[error("transfer failed for {path}: {message}")]
    TransferFailed { path: String, message: String },
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(#[from] bollard::errors::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Whether a runtime error is a 404 for the container itself
pub(crate) fn is_not_found(err: &bollard::errors::Error) -> bool {
    matches!(
        err,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Map stderr emitted by a container command onto the error taxonomy.
///
/// The raw command line is never included; only the path the operation was
/// asked to touch plus the message the command printed.
pub(crate) fn classify_stderr(path: &str, stderr: &str) -> BridgeError {
    let lowered = stderr.to_lowercase();

    if lowered.contains("not a directory") {
        return BridgeError::NotADirectory(path.to_string());
    }

    if lowered.contains("no such file or directory")
        || lowered.contains("nonexistent directory")
        || lowered.contains("cannot create")
    {
        return BridgeError::PathNotFound(path.to_string());
    }

    if lowered.contains("directory not empty") {
        return BridgeError::DirectoryNotEmpty(path.to_string());
    }

    let message = stderr
        .lines()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("command reported an error")
        .trim()
        .to_string();

    BridgeError::TransferFailed {
        path: path.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_stderr_path_not_found() {
        let err = classify_stderr(
            "/missing/file.txt",
            "cat: /missing/file.txt: No such file or directory",
        );
        assert!(matches!(err, BridgeError::PathNotFound(p) if p == "/missing/file.txt"));

        // dash phrases redirection failures differently
        let err = classify_stderr(
            "/missing/dir/file.txt",
            "sh: 1: cannot create /missing/dir/file.txt: Directory nonexistent",
        );
        assert!(matches!(err, BridgeError::PathNotFound(_)));
    }

    #[test]
    fn test_classify_stderr_not_a_directory() {
        let err = classify_stderr("/etc/passwd/x", "mkdir: /etc/passwd/x: Not a directory");
        assert!(matches!(err, BridgeError::NotADirectory(p) if p == "/etc/passwd/x"));
    }

    #[test]
    fn test_classify_stderr_directory_not_empty() {
        let err = classify_stderr("/data", "rmdir: failed to remove '/data': Directory not empty");
        assert!(matches!(err, BridgeError::DirectoryNotEmpty(_)));
    }

    #[test]
    fn test_classify_stderr_falls_back_to_transfer_failed() {
        let err = classify_stderr("/data/file", "chmod: changing permissions: Operation not permitted");
        match err {
            BridgeError::TransferFailed { path, message } => {
                assert_eq!(path, "/data/file");
                assert!(message.contains("Operation not permitted"));
            }
            other => panic!("Expected TransferFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_stderr_first_nonblank_line_only() {
        let err = classify_stderr("/p", "\n\nfirst real line\nsecond line\n");
        match err {
            BridgeError::TransferFailed { message, .. } => assert_eq!(message, "first real line"),
            other => panic!("Expected TransferFailed, got {other:?}"),
        }
    }
}
