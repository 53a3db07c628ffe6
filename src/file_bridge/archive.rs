//! Archive bridging between the runtime's native tar interface and the zip
//! format callers download, plus the tar-staged single-file write path.
//!
//! Downloads come in two flavors: transcoding the runtime's tar export of a
//! path into a zip, and walking a recursive file listing to zip files one by
//! one. Uploads that need permission fidelity are staged as a one-entry tar
//! and pushed through the runtime's archive import.

use std::io::{Seek, SeekFrom, Write};

use bollard::query_parameters::{DownloadFromContainerOptions, UploadToContainerOptions};
use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::{Either, Full};
use tar::{Archive, Builder};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::dir_plan::validate_abs_path;
use super::errors::{is_not_found, BridgeError};
use super::executor::ExecRunner;
use super::transfer;

/// A finished zip archive, staged on an unlinked temporary file so large
/// downloads never sit whole in memory and cleanup needs no bookkeeping.
#[derive(Debug)]
pub struct ZipDownload {
    pub file: tokio::fs::File,
    pub size: u64,
}

impl ZipDownload {
    /// Read the whole archive into memory. Convenience for small archives
    /// and tests; streaming callers read `file` directly.
    pub async fn into_bytes(self) -> Result<Vec<u8>, BridgeError> {
        use tokio::io::AsyncReadExt;

        let mut file = self.file;
        let mut bytes = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
}

/// Download a path from the container and transcode the runtime's tar
/// export into a zip archive.
///
/// Only regular file entries are carried over; directories and special
/// entries are skipped, a leading `./` marker is stripped, and each entry
/// keeps its tar mode bits. A path the runtime does not know yields a
/// structurally valid empty zip rather than an error.
pub async fn zip_from_tar_export(
    runner: &ExecRunner,
    path: &str,
) -> Result<ZipDownload, BridgeError> {
    validate_abs_path(path)?;

    let options = DownloadFromContainerOptions {
        path: path.to_string(),
    };

    let mut stream = runner
        .docker()
        .download_from_container(runner.container_id(), Some(options));
    let mut tar_data = Vec::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(chunk) => tar_data.extend_from_slice(&chunk),
            Err(e) if is_not_found(&e) => {
                log::debug!("Archive export target missing, emitting empty zip: {}", path);
                tar_data.clear();
                break;
            }
            Err(e) => return Err(BridgeError::RuntimeUnavailable(e)),
        }
    }

    let (file, size) = tokio::task::spawn_blocking(move || transcode_tar_to_zip(&tar_data))
        .await
        .map_err(|e| {
            BridgeError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        })??;

    Ok(ZipDownload {
        file: tokio::fs::File::from_std(file),
        size,
    })
}

fn transcode_tar_to_zip(tar_data: &[u8]) -> Result<(std::fs::File, u64), BridgeError> {
    let file = tempfile::tempfile()?;
    let mut zip = ZipWriter::new(file);
    let mut archive = Archive::new(tar_data);

    for entry in archive.entries()? {
        let mut entry = entry?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = entry.path()?.to_string_lossy().to_string();
        let name = name.strip_prefix("./").unwrap_or(&name).to_string();
        if name.is_empty() {
            continue;
        }

        let mode = entry.header().mode().unwrap_or(0o644);
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(mode);

        zip.start_file(name, options)?;
        std::io::copy(&mut entry, &mut zip)?;
    }

    finish_zip(zip)
}

/// Zip a directory tree by walking a recursive file listing and reading
/// every file through its own exec session.
///
/// This is the best-effort bulk export: a file that fails to read or stat
/// is logged and skipped, never fatal to the archive. The zip is finalized
/// only after every constituent read has completed or failed. An empty or
/// missing root produces a valid zero-entry zip.
pub async fn zip_from_walk(runner: &ExecRunner, root: &str) -> Result<ZipDownload, BridgeError> {
    validate_abs_path(root)?;

    let listing = runner
        .exec(vec![
            "find".to_string(),
            root.to_string(),
            "-type".to_string(),
            "f".to_string(),
        ])
        .await?;

    if !listing.stderr.trim().is_empty() {
        // Missing or partially unreadable roots degrade to whatever the
        // walk did produce; the archive stays best-effort.
        log::warn!(
            "Recursive listing of {} reported errors: {}",
            root,
            listing.stderr.trim()
        );
    }

    let files: Vec<String> = listing
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    let root_prefix = format!("{}/", root.trim_end_matches('/'));
    let file = tempfile::tempfile()?;
    let mut zip = ZipWriter::new(file);

    for path in &files {
        let mode = match transfer::stat_mode(runner, path).await {
            Ok(mode) => mode,
            Err(e) => {
                log::warn!("Skipping {} in archive (stat failed: {})", path, e);
                continue;
            }
        };

        let content = match transfer::get_to_vec(runner, path).await {
            Ok(content) => content,
            Err(e) => {
                log::warn!("Skipping {} in archive (read failed: {})", path, e);
                continue;
            }
        };

        let entry_name = path
            .strip_prefix(&root_prefix)
            .map(str::to_string)
            .unwrap_or_else(|| {
                std::path::Path::new(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "file".to_string())
            });

        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(mode);

        zip.start_file(entry_name, options)?;
        zip.write_all(&content)?;
    }

    let (file, size) = finish_zip(zip)?;

    Ok(ZipDownload {
        file: tokio::fs::File::from_std(file),
        size,
    })
}

fn finish_zip(zip: ZipWriter<std::fs::File>) -> Result<(std::fs::File, u64), BridgeError> {
    let mut file = zip.finish()?;
    let size = file.metadata()?.len();
    file.seek(SeekFrom::Start(0))?;
    Ok((file, size))
}

/// Push one file into the container through the runtime's archive import,
/// preserving its name and mode.
///
/// The content is staged as an in-memory tar with exactly one entry and
/// imported into the destination's parent directory. The destination is
/// guarded against replacing an existing directory with a file. This is the
/// edit-and-save path: the editor already holds the full content and wants
/// atomic placement rather than an exec pipe.
///
/// # Arguments
///
/// * `runner` - Exec runner bound to the target container
/// * `path` - Absolute path the file should have inside the container
/// * `content` - Content of the file as bytes
/// * `mode` - POSIX permission bits for the created file
///
/// # Example
///
/// ```rust,no_run
/// # use bollard::Docker;
/// # use container_file_bridge::{BridgeConfig, ExecRunner};
/// # use container_file_bridge::file_bridge::archive::put_via_archive;
/// # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
/// let docker = Docker::connect_with_local_defaults()?;
/// let runner = ExecRunner::new(docker, "container_id".to_string(), BridgeConfig::default());
/// put_via_archive(&runner, "/workspace/config.json", b"{}", 0o644).await?;
/// # Ok(())
/// # }
/// ```
pub async fn put_via_archive(
    runner: &ExecRunner,
    path: &str,
    content: &[u8],
    mode: u32,
) -> Result<(), BridgeError> {
    validate_abs_path(path)?;
    runner.ensure_running().await?;

    let file_name = std::path::Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| BridgeError::InvalidPath {
            path: path.to_string(),
            reason: "has no file name".to_string(),
        })?
        .to_string();

    let dir_path = std::path::Path::new(path)
        .parent()
        .and_then(|p| p.to_str())
        .ok_or_else(|| BridgeError::InvalidPath {
            path: path.to_string(),
            reason: "has no parent directory".to_string(),
        })?
        .to_string();

    // Never replace an existing directory with a file.
    let probe = runner
        .exec(vec!["test".to_string(), "-d".to_string(), path.to_string()])
        .await?;
    if probe.exit_code == Some(0) {
        return Err(BridgeError::TransferFailed {
            path: path.to_string(),
            message: "destination exists as a directory".to_string(),
        });
    }

    let tar_data = stage_single_file_tar(&file_name, content, mode)?;

    let upload_options = UploadToContainerOptions {
        path: dir_path,
        ..Default::default()
    };

    runner
        .docker()
        .upload_to_container(
            runner.container_id(),
            Some(upload_options),
            Either::Left(Full::new(Bytes::from(tar_data))),
        )
        .await?;

    Ok(())
}

/// Build a one-entry tar in memory; the staging format `put_via_archive`
/// imports. Split out so the staging step is testable without a runtime.
pub(crate) fn stage_single_file_tar(
    file_name: &str,
    content: &[u8],
    mode: u32,
) -> Result<Vec<u8>, BridgeError> {
    let mut tar_data = Vec::new();
    {
        let mut builder = Builder::new(&mut tar_data);

        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(mode);
        header.set_cksum();

        builder.append_data(&mut header, file_name, content)?;
        builder.finish()?;
    }
    Ok(tar_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn build_tar(entries: &[(&str, &[u8], u32)]) -> Vec<u8> {
        let mut tar_data = Vec::new();
        {
            let mut builder = Builder::new(&mut tar_data);
            for (name, content, mode) in entries {
                let mut header = tar::Header::new_gnu();
                header.set_size(content.len() as u64);
                header.set_mode(*mode);
                header.set_cksum();
                builder.append_data(&mut header, *name, *content).unwrap();
            }
            builder.finish().unwrap();
        }
        tar_data
    }

    fn read_zip(file: std::fs::File) -> zip::ZipArchive<std::fs::File> {
        zip::ZipArchive::new(file).unwrap()
    }

    #[test]
    fn test_transcode_carries_content_and_mode() {
        let tar_data = build_tar(&[("dir/hello.txt", b"hello world", 0o755)]);
        let (file, size) = transcode_tar_to_zip(&tar_data).unwrap();
        assert!(size > 0);

        let mut archive = read_zip(file);
        assert_eq!(archive.len(), 1);

        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "dir/hello.txt");
        assert_eq!(entry.unix_mode().map(|m| m & 0o777), Some(0o755));

        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello world");
    }

    #[test]
    fn test_transcode_strips_leading_dot_slash() {
        let tar_data = build_tar(&[("./notes.md", b"x", 0o644)]);
        let (file, _) = transcode_tar_to_zip(&tar_data).unwrap();

        let mut archive = read_zip(file);
        let entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "notes.md");
    }

    #[test]
    fn test_transcode_skips_directory_entries() {
        let mut tar_data = Vec::new();
        {
            let mut builder = Builder::new(&mut tar_data);

            let mut dir_header = tar::Header::new_gnu();
            dir_header.set_entry_type(tar::EntryType::Directory);
            dir_header.set_size(0);
            dir_header.set_mode(0o755);
            dir_header.set_cksum();
            builder
                .append_data(&mut dir_header, "sub/", &b""[..])
                .unwrap();

            let mut file_header = tar::Header::new_gnu();
            file_header.set_size(1);
            file_header.set_mode(0o644);
            file_header.set_cksum();
            builder
                .append_data(&mut file_header, "sub/f", &b"x"[..])
                .unwrap();

            builder.finish().unwrap();
        }

        let (file, _) = transcode_tar_to_zip(&tar_data).unwrap();
        let mut archive = read_zip(file);
        assert_eq!(archive.len(), 1);
        assert_eq!(archive.by_index(0).unwrap().name(), "sub/f");
    }

    #[test]
    fn test_transcode_empty_input_yields_valid_empty_zip() {
        let (file, size) = transcode_tar_to_zip(&[]).unwrap();
        assert!(size > 0); // end-of-central-directory record

        let archive = read_zip(file);
        assert_eq!(archive.len(), 0);
    }

    #[test]
    fn test_stage_single_file_tar_round_trip() {
        let tar_data = stage_single_file_tar("config.json", b"{\"a\":1}", 0o600).unwrap();

        let mut archive = Archive::new(tar_data.as_slice());
        let mut entries = archive.entries().unwrap();

        let mut entry = entries.next().unwrap().unwrap();
        assert_eq!(
            entry.path().unwrap().to_string_lossy(),
            "config.json"
        );
        assert_eq!(entry.header().mode().unwrap(), 0o600);

        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"{\"a\":1}");

        assert!(entries.next().is_none());
    }
}
