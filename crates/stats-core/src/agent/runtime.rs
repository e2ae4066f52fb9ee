//! Docker image measurement and pruning

use crate::models::BYTES_PER_GB;
use async_trait::async_trait;
use bollard::container::PruneContainersOptions;
use bollard::image::{ListImagesOptions, PruneImagesOptions};
use bollard::Docker;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("docker api error: {0}")]
    Docker(#[from] bollard::errors::Error),
}

/// What a prune removed. Informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub containers_deleted: usize,
    pub images_deleted: usize,
    pub space_reclaimed_bytes: i64,
}

/// Local container runtime operations used by the agent
#[async_trait]
pub trait ImageRuntime: Send + Sync {
    /// Total size of all local images in GB
    async fn images_size_gb(&self) -> Result<f64, RuntimeError>;

    /// Remove stopped containers, then dangling images
    async fn prune(&self) -> Result<PruneSummary, RuntimeError>;
}

/// `ImageRuntime` backed by the Docker Engine API
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using the platform defaults (`DOCKER_HOST` or the local socket)
    pub fn connect() -> Result<Self, RuntimeError> {
        Ok(Self {
            docker: Docker::connect_with_local_defaults()?,
        })
    }
}

/// Sum image sizes in bytes and convert to GB
pub fn total_size_gb(sizes: impl IntoIterator<Item = i64>) -> f64 {
    let total: i64 = sizes.into_iter().map(|s| s.max(0)).sum();
    total as f64 / BYTES_PER_GB
}

#[async_trait]
impl ImageRuntime for DockerRuntime {
    async fn images_size_gb(&self) -> Result<f64, RuntimeError> {
        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await?;

        debug!(images = images.len(), "Listed images");
        Ok(total_size_gb(images.iter().map(|img| img.size)))
    }

    async fn prune(&self) -> Result<PruneSummary, RuntimeError> {
        let containers = self
            .docker
            .prune_containers(None::<PruneContainersOptions<String>>)
            .await?;
        debug!(report = ?containers, "Pruned containers");

        let images = self
            .docker
            .prune_images(None::<PruneImagesOptions<String>>)
            .await?;
        debug!(report = ?images, "Pruned images");

        Ok(PruneSummary {
            containers_deleted: containers.containers_deleted.map_or(0, |c| c.len()),
            images_deleted: images.images_deleted.map_or(0, |i| i.len()),
            space_reclaimed_bytes: containers.space_reclaimed.unwrap_or(0)
                + images.space_reclaimed.unwrap_or(0),
        })
    }
}
