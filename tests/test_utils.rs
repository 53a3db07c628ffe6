//! Test utilities for container management and cleanup
//!
//! Provides an RAII container guard so integration tests clean up their
//! containers even when they panic or return early.

use bollard::container::{Config, CreateContainerOptions, RemoveContainerOptions};
use bollard::image::CreateImageOptions;
use bollard::Docker;
use container_file_bridge::{BridgeConfig, FileBridge};
use futures_util::StreamExt;
use uuid::Uuid;

/// Image used for bridge integration tests. GNU coreutils are needed for
/// the quoting listing format the bridge drives (ls, cat, stat, find).
pub const TEST_CONTAINER_IMAGE: &str = "debian:stable-slim";

/// Test container guard that automatically removes its container on drop
pub struct TestContainerGuard {
    docker: Docker,
    container_name: String,
    container_id: String,
}

#[allow(dead_code)]
impl TestContainerGuard {
    /// Pull the test image, create and start a container that idles until
    /// the test is done with it.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let _ = pretty_env_logger::try_init();

        let docker = Docker::connect_with_local_defaults()?;
        let container_name = Self::generate_unique_container_name("bridge-test");

        let create_image_options = CreateImageOptions {
            from_image: TEST_CONTAINER_IMAGE,
            ..Default::default()
        };

        let mut pull_stream = docker.create_image(Some(create_image_options), None, None);
        while let Some(result) = pull_stream.next().await {
            match result {
                Ok(_) => {}
                Err(e) => {
                    eprintln!("Image pull warning (might already exist): {}", e);
                    break;
                }
            }
        }

        let options = CreateContainerOptions {
            name: container_name.as_str(),
            ..Default::default()
        };

        let config = Config {
            image: Some(TEST_CONTAINER_IMAGE),
            cmd: Some(vec!["sleep", "3600"]),
            ..Default::default()
        };

        let container = docker.create_container(Some(options), config).await?;
        docker
            .start_container(
                &container.id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await?;

        Ok(Self {
            docker,
            container_name,
            container_id: container.id,
        })
    }

    /// Bridge bound to this guard's container
    pub fn bridge(&self) -> FileBridge {
        FileBridge::new(
            self.docker.clone(),
            self.container_id.clone(),
            BridgeConfig::default(),
        )
    }

    pub fn docker(&self) -> &Docker {
        &self.docker
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Stop the container so not-running preconditions can be exercised
    pub async fn stop(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.docker
            .stop_container(
                &self.container_name,
                None::<bollard::query_parameters::StopContainerOptions>,
            )
            .await?;
        Ok(())
    }

    /// Unique container name for parallel test safety
    fn generate_unique_container_name(prefix: &str) -> String {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis();
        let uuid = Uuid::new_v4();
        format!("{}-{}-{}", prefix, timestamp, uuid.simple())
    }

    /// Manual cleanup (called automatically by Drop, but can be called explicitly)
    pub async fn cleanup(&self) {
        let _ = self
            .docker
            .stop_container(
                &self.container_name,
                None::<bollard::query_parameters::StopContainerOptions>,
            )
            .await;

        let remove_options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };

        if let Err(e) = self
            .docker
            .remove_container(&self.container_name, Some(remove_options))
            .await
        {
            if !e.to_string().contains("No such container") {
                eprintln!(
                    "Warning: Failed to cleanup container {}: {}",
                    self.container_name, e
                );
            }
        }
    }
}

impl Drop for TestContainerGuard {
    fn drop(&mut self) {
        // Best-effort cleanup on a blocking thread since Drop can't be async
        let docker = self.docker.clone();
        let container_name = self.container_name.clone();

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("Warning: Failed to create runtime for cleanup: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                let _ = docker
                    .stop_container(
                        &container_name,
                        None::<bollard::query_parameters::StopContainerOptions>,
                    )
                    .await;

                let remove_options = RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                };

                if let Err(e) = docker
                    .remove_container(&container_name, Some(remove_options))
                    .await
                {
                    if !e.to_string().contains("No such container") {
                        eprintln!(
                            "Warning: Failed to cleanup container {} in Drop: {}",
                            container_name, e
                        );
                    }
                }
            });
        });
    }
}
