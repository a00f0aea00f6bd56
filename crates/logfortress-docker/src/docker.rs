//! Bollard-backed control plane.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{InspectContainerOptions, ListContainersOptions, LogsOptions};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{ContainerInspectResponse, ContainerStateStatusEnum};
use bollard::network::{InspectNetworkOptions, ListNetworksOptions};
use futures_util::StreamExt;
use logfortress_core::{
    ContainerHandle, ContainerStatus, Error, NetworkMember, NetworkSummary, Result, StreamOptions,
};

use crate::{ByteStream, ControlPlane};

/// Talks to a local Docker daemon.
pub struct DockerControlPlane {
    docker: Docker,
    tail: String,
}

impl DockerControlPlane {
    /// Connect using the local defaults (`DOCKER_HOST` or the platform socket).
    pub fn new(options: &StreamOptions) -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| Error::ControlPlaneUnreachable(e.to_string()))?;
        Ok(Self::from_docker(docker, options))
    }

    /// Connect to a specific socket path.
    pub fn with_socket(socket_path: &str, options: &StreamOptions) -> Result<Self> {
        let docker = Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
            .map_err(|e| Error::ControlPlaneUnreachable(e.to_string()))?;
        Ok(Self::from_docker(docker, options))
    }

    fn from_docker(docker: Docker, options: &StreamOptions) -> Self {
        Self {
            docker,
            tail: options.tail.clone(),
        }
    }

    /// Repository tags of an image, skipping dangling `<none>` entries.
    async fn image_tags(&self, image: &str) -> Result<Vec<String>> {
        match self.docker.inspect_image(image).await {
            Ok(inspect) => Ok(inspect
                .repo_tags
                .unwrap_or_default()
                .into_iter()
                .filter(|tag| tag != "<none>:<none>")
                .collect()),
            Err(e) if is_not_found(&e) => Ok(Vec::new()),
            Err(e) => Err(api_error(e)),
        }
    }

    async fn handle_from_inspect(&self, inspect: ContainerInspectResponse) -> Result<ContainerHandle> {
        let status = inspect
            .state
            .and_then(|state| state.status)
            .map_or_else(|| ContainerStatus::Unknown(String::new()), status_from_enum);

        let image_tags = match inspect.image.as_deref() {
            Some(image) => self.image_tags(image).await?,
            None => Vec::new(),
        };

        Ok(ContainerHandle {
            id: inspect.id.unwrap_or_default(),
            name: trim_name(inspect.name.as_deref().unwrap_or_default()),
            status,
            image_tags,
        })
    }
}

#[async_trait]
impl ControlPlane for DockerControlPlane {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map_err(|e| Error::ControlPlaneUnreachable(e.to_string()))?;
        Ok(())
    }

    async fn list_running(&self) -> Result<Vec<ContainerHandle>> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);

        let options = ListContainersOptions {
            filters,
            ..Default::default()
        };

        let containers = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(api_error)?;

        let mut handles = Vec::with_capacity(containers.len());
        for container in containers {
            let image_ref = container.image_id.or(container.image);
            let image_tags = match image_ref.as_deref() {
                Some(image) => self.image_tags(image).await?,
                None => Vec::new(),
            };

            handles.push(ContainerHandle {
                id: container.id.unwrap_or_default(),
                name: container
                    .names
                    .and_then(|names| names.first().map(|name| trim_name(name)))
                    .unwrap_or_default(),
                status: container
                    .state
                    .as_deref()
                    .map_or(ContainerStatus::Running, ContainerStatus::parse),
                image_tags,
            });
        }

        Ok(handles)
    }

    async fn get_container(&self, reference: &str) -> Result<Option<ContainerHandle>> {
        match self
            .docker
            .inspect_container(reference, None::<InspectContainerOptions>)
            .await
        {
            Ok(inspect) => self.handle_from_inspect(inspect).await.map(Some),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(api_error(e)),
        }
    }

    async fn follow_logs(&self, container_id: &str) -> Result<ByteStream> {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            tail: self.tail.clone(),
            ..Default::default()
        };

        let stream = self
            .docker
            .logs(container_id, Some(options))
            .map(|chunk| chunk.map(|output| output.into_bytes().to_vec()).map_err(api_error));

        tracing::debug!(container = container_id, "attached to container logs");
        Ok(Box::pin(stream))
    }

    async fn exec_follow(&self, container_id: &str, command: &[String]) -> Result<ByteStream> {
        let exec = self
            .docker
            .create_exec(
                container_id,
                CreateExecOptions {
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    cmd: Some(command.to_vec()),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| Error::ControlPlane(format!("failed to create exec: {e}")))?;

        match self
            .docker
            .start_exec(&exec.id, None)
            .await
            .map_err(|e| Error::ControlPlane(format!("failed to start exec: {e}")))?
        {
            StartExecResults::Attached { output, .. } => {
                tracing::debug!(container = container_id, exec = %exec.id, ?command, "attached to exec output");
                Ok(Box::pin(output.map(|chunk| {
                    chunk
                        .map(|output| output.into_bytes().to_vec())
                        .map_err(api_error)
                })))
            }
            StartExecResults::Detached => Err(Error::ControlPlane(
                "exec started detached, no output to follow".to_string(),
            )),
        }
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        let networks = self
            .docker
            .list_networks(None::<ListNetworksOptions<String>>)
            .await
            .map_err(api_error)?;

        let mut summaries = Vec::with_capacity(networks.len());
        for network in networks {
            let Some(id) = network.id else { continue };

            // The list endpoint omits attached containers; inspect fills them in.
            let detail = match self
                .docker
                .inspect_network(&id, None::<InspectNetworkOptions<String>>)
                .await
            {
                Ok(detail) => detail,
                Err(e) if is_not_found(&e) => continue,
                Err(e) => return Err(api_error(e)),
            };

            let mut containers: Vec<NetworkMember> = detail
                .containers
                .unwrap_or_default()
                .into_iter()
                .map(|(container_id, member)| NetworkMember {
                    id: container_id,
                    name: member.name.unwrap_or_default(),
                })
                .collect();
            containers.sort_by(|a, b| a.name.cmp(&b.name));

            summaries.push(NetworkSummary {
                id,
                name: network.name.unwrap_or_default(),
                containers,
            });
        }

        Ok(summaries)
    }
}

fn trim_name(name: &str) -> String {
    name.trim_start_matches('/').to_string()
}

fn status_from_enum(status: ContainerStateStatusEnum) -> ContainerStatus {
    match status {
        ContainerStateStatusEnum::CREATED => ContainerStatus::Created,
        ContainerStateStatusEnum::RUNNING => ContainerStatus::Running,
        ContainerStateStatusEnum::PAUSED => ContainerStatus::Paused,
        ContainerStateStatusEnum::RESTARTING => ContainerStatus::Restarting,
        ContainerStateStatusEnum::REMOVING => ContainerStatus::Removing,
        ContainerStateStatusEnum::EXITED => ContainerStatus::Exited,
        ContainerStateStatusEnum::DEAD => ContainerStatus::Dead,
        ContainerStateStatusEnum::EMPTY => ContainerStatus::Unknown(String::new()),
    }
}

fn is_not_found(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Responses from the daemon are API errors; anything else never reached it.
fn api_error(err: BollardError) -> Error {
    match err {
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => Error::ControlPlane(format!("{status_code}: {message}")),
        other => Error::ControlPlaneUnreachable(other.to_string()),
    }
}
