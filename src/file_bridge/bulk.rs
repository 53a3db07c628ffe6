//! Multi-step operations: batch uploads with directory planning, recursive
//! folder downloads, and the single-exec delete/rename/mkdir calls.

use serde::Serialize;

use super::archive::{self, ZipDownload};
use super::dir_plan::{build_directory_plan, join_under, validate_abs_path};
use super::errors::BridgeError;
use super::executor::ExecRunner;
use super::transfer;

/// One file of an upload batch, fully formed at request ingestion
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub content: Vec<u8>,
    /// Path relative to the batch's base directory, e.g. `a/c/d.txt`
    pub relative_path: String,
    /// Name the file had on the caller's side, kept for reporting
    pub original_name: String,
}

/// Outcome of a completed upload batch
#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub files_transferred: usize,
    pub directories_created: usize,
    /// File count from re-listing the destination tree; `None` when the
    /// verification listing itself failed (the transfers still succeeded).
    pub verified_files: Option<usize>,
}

/// Upload a batch of files under a base directory.
///
/// Planning: build the directory plan for every target. Executing: create
/// the planned directories sequentially in order (later ones may depend on
/// earlier ones), then write and chmod each file, one at a time; a shared
/// exec channel gives no concurrency guarantee, and two stdin sessions must
/// never interleave on one file. Verifying: re-list the destination tree
/// for a best-effort transferred-file count.
///
/// The first file that fails aborts the remaining files and the error names
/// the failing path. Directories already created are left in place.
pub async fn upload_batch(
    runner: &ExecRunner,
    base: &str,
    items: &[UploadItem],
    mode: u32,
) -> Result<UploadSummary, BridgeError> {
    validate_abs_path(base)?;

    let relative_paths: Vec<String> =
        items.iter().map(|item| item.relative_path.clone()).collect();
    let plan = build_directory_plan(base, &relative_paths)?;

    log::debug!(
        "Uploading {} files under {} ({} directories to create)",
        items.len(),
        base,
        plan.len()
    );

    for directory in &plan {
        runner
            .exec_checked(
                vec![
                    "mkdir".to_string(),
                    "-p".to_string(),
                    directory.to_string(),
                ],
                directory,
            )
            .await?;
    }

    let mut files_transferred = 0;
    for item in items {
        let target = join_under(base, &item.relative_path)?;
        if let Err(e) = transfer::put(runner, &target, &item.content, mode).await {
            log::error!(
                "Upload batch aborted at {} ({}): {}",
                target,
                item.original_name,
                e
            );
            return Err(e);
        }
        files_transferred += 1;
    }

    let verified_files = verify_file_count(runner, base).await;

    Ok(UploadSummary {
        files_transferred,
        directories_created: plan.len(),
        verified_files,
    })
}

/// Best-effort re-list of the destination tree after an upload
async fn verify_file_count(runner: &ExecRunner, base: &str) -> Option<usize> {
    match runner
        .exec(vec![
            "find".to_string(),
            base.to_string(),
            "-type".to_string(),
            "f".to_string(),
        ])
        .await
    {
        Ok(output) if output.stderr.trim().is_empty() => Some(
            output
                .stdout
                .lines()
                .filter(|line| !line.trim().is_empty())
                .count(),
        ),
        Ok(output) => {
            log::warn!(
                "Upload verification listing reported errors: {}",
                output.stderr.trim()
            );
            None
        }
        Err(e) => {
            log::warn!("Upload verification listing failed: {}", e);
            None
        }
    }
}

/// Download a directory tree as a zip via the per-file walk.
/// A missing root comes back as a valid empty archive.
pub async fn download_tree(runner: &ExecRunner, root: &str) -> Result<ZipDownload, BridgeError> {
    archive::zip_from_walk(runner, root).await
}

/// Delete a path; directories need `recursive` set
pub async fn delete_path(
    runner: &ExecRunner,
    path: &str,
    recursive: bool,
) -> Result<(), BridgeError> {
    validate_abs_path(path)?;

    let argv = if recursive {
        vec!["rm".to_string(), "-rf".to_string(), path.to_string()]
    } else {
        vec!["rm".to_string(), "-f".to_string(), path.to_string()]
    };

    runner.exec_checked(argv, path).await?;
    Ok(())
}

/// Rename or move a path
pub async fn rename_path(runner: &ExecRunner, from: &str, to: &str) -> Result<(), BridgeError> {
    validate_abs_path(from)?;
    validate_abs_path(to)?;

    runner
        .exec_checked(
            vec!["mv".to_string(), from.to_string(), to.to_string()],
            from,
        )
        .await?;
    Ok(())
}

/// Create a directory (and any missing ancestors; creation is idempotent)
pub async fn make_directory(runner: &ExecRunner, path: &str) -> Result<(), BridgeError> {
    validate_abs_path(path)?;

    runner
        .exec_checked(
            vec!["mkdir".to_string(), "-p".to_string(), path.to_string()],
            path,
        )
        .await?;
    Ok(())
}
