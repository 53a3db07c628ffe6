//! Container filesystem bridge
//!
//! This module lets a caller browse, edit, upload, download, and manage
//! files inside a running container's filesystem without the container
//! exposing any filesystem API of its own. Every operation is mediated by a
//! short-lived exec session or by the runtime's tar archive interface; the
//! bridge itself keeps no state between requests.

pub mod archive;
pub mod bulk;
pub mod config;
pub mod dir_plan;
pub mod errors;
pub mod executor;
pub mod listing;
pub mod transfer;

// Re-export commonly used types for convenience
pub use archive::ZipDownload;
pub use bulk::{UploadItem, UploadSummary};
pub use config::BridgeConfig;
pub use dir_plan::build_directory_plan;
pub use errors::BridgeError;
pub use executor::{ByteStream, ExecOutput, ExecRunner};
pub use listing::{parse_listing, FileEntry, FileKind};

use bollard::Docker;

use errors::classify_stderr;

/// Label returned when nothing better can be learned about the host
const DEFAULT_HOST_LABEL: &str = "container";

/// Client for filesystem operations inside one container.
///
/// Owns the runtime handle and the container id; the container's state is
/// re-inspected at the start of every operation, never cached across calls.
#[derive(Debug, Clone)]
pub struct FileBridge {
    docker: Docker,
    container_id: String,
    config: BridgeConfig,
    runner: ExecRunner,
}

impl FileBridge {
    /// Create a new bridge for the specified container
    pub fn new(docker: Docker, container_id: String, config: BridgeConfig) -> Self {
        let runner = ExecRunner::new(docker.clone(), container_id.clone(), config.clone());
        Self {
            docker,
            container_id,
            config,
            runner,
        }
    }

    /// Get the container ID
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    /// List the entries at a directory path.
    ///
    /// An empty result means an empty directory; a failed listing surfaces
    /// as an error classified from the listing command's stderr.
    pub async fn list_directory(&self, path: &str) -> Result<Vec<FileEntry>, BridgeError> {
        dir_plan::validate_abs_path(path)?;

        let output = self.runner.exec(listing::listing_command(path)).await?;

        if !output.stderr.trim().is_empty() {
            return Err(classify_stderr(path, output.stderr.trim()));
        }
        if let Some(code) = output.exit_code {
            if code != 0 {
                return Err(BridgeError::TransferFailed {
                    path: path.to_string(),
                    message: format!("listing exited with status {}", code),
                });
            }
        }

        Ok(listing::parse_listing(&output.stdout))
    }

    /// Stream a file's content out of the container (attachment-style
    /// download). Dropping the stream terminates the underlying session.
    pub async fn read_file(&self, path: &str) -> Result<ByteStream, BridgeError> {
        transfer::get(&self.runner, path).await
    }

    /// Read a file's full content into memory (editor loads)
    pub async fn read_file_to_vec(&self, path: &str) -> Result<Vec<u8>, BridgeError> {
        transfer::get_to_vec(&self.runner, path).await
    }

    /// Write or create a file via an exec-pipe write, then fix its
    /// permissions to the configured default mode
    pub async fn write_file(&self, path: &str, content: &[u8]) -> Result<(), BridgeError> {
        transfer::put(&self.runner, path, content, self.config.default_file_mode).await
    }

    /// Write a file through the runtime's archive import, preserving the
    /// given mode. The edit-and-save path: atomic placement with
    /// permission fidelity, no exec pipe.
    pub async fn save_file_via_archive(
        &self,
        path: &str,
        content: &[u8],
        mode: u32,
    ) -> Result<(), BridgeError> {
        archive::put_via_archive(&self.runner, path, content, mode).await
    }

    /// Upload a batch of files (one file or a whole folder with relative
    /// paths preserved) under a base directory
    pub async fn upload(
        &self,
        base: &str,
        items: &[UploadItem],
    ) -> Result<UploadSummary, BridgeError> {
        bulk::upload_batch(&self.runner, base, items, self.config.default_file_mode).await
    }

    /// Download a path (single file or whole directory) as a zip archive,
    /// transcoded from the runtime's native tar export
    pub async fn download_zip(&self, path: &str) -> Result<ZipDownload, BridgeError> {
        self.runner.ensure_running().await?;
        archive::zip_from_tar_export(&self.runner, path).await
    }

    /// Download a directory tree as a zip built from per-file reads;
    /// unreadable files are skipped, a missing root yields an empty archive
    pub async fn download_tree_zip(&self, root: &str) -> Result<ZipDownload, BridgeError> {
        bulk::download_tree(&self.runner, root).await
    }

    /// Delete a path; set `recursive` for directories
    pub async fn delete(&self, path: &str, recursive: bool) -> Result<(), BridgeError> {
        bulk::delete_path(&self.runner, path, recursive).await
    }

    /// Rename or move a path
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), BridgeError> {
        bulk::rename_path(&self.runner, from, to).await
    }

    /// Create an empty directory (missing ancestors included)
    pub async fn create_directory(&self, path: &str) -> Result<(), BridgeError> {
        bulk::make_directory(&self.runner, path).await
    }

    /// Boot a stopped container before file access. Starting an already
    /// running container is a success, not an error.
    pub async fn start_container(&self) -> Result<(), BridgeError> {
        match self
            .docker
            .start_container(
                &self.container_id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => Err(BridgeError::ContainerNotFound(self.container_id.clone())),
            Err(e) => Err(BridgeError::RuntimeUnavailable(e)),
        }
    }

    /// Human-readable label for the container host, best effort. Falls back
    /// from the container's hostname to its inspect name to a truncated id;
    /// never errors.
    pub async fn host_label(&self) -> String {
        if let Ok(output) = self.runner.exec(vec!["hostname".to_string()]).await {
            let label = output.stdout.trim();
            if !label.is_empty() {
                return label.to_string();
            }
        }

        // Stopped or unreachable container: the inspect name still works
        if let Ok(inspect) = self
            .docker
            .inspect_container(
                &self.container_id,
                None::<bollard::query_parameters::InspectContainerOptions>,
            )
            .await
        {
            if let Some(name) = inspect.name {
                let name = name.trim_start_matches('/').to_string();
                if !name.is_empty() {
                    return name;
                }
            }
        }

        let short_id: String = self.container_id.chars().take(12).collect();
        if short_id.is_empty() {
            DEFAULT_HOST_LABEL.to_string()
        } else {
            short_id
        }
    }
}
