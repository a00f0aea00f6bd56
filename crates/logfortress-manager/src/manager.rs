//! Custom log source lifecycle management.

use std::sync::Arc;

use logfortress_core::{
    Config, ContainerSummary, Error, NetworkSummary, RegistryState, RegistryStore, Result,
    StreamMode, StreamSession,
};
use logfortress_docker::{ControlPlane, DockerControlPlane, LogStream};

use crate::enumerator::{self, Reconciled};

/// Tracks custom log sources and serves listings and live streams.
///
/// Construction resolves the registry location, loads it, and verifies
/// the control plane answers. Every operation that needs the control
/// plane re-checks it first and fails with
/// [`Error::ControlPlaneUnreachable`] when it does not.
pub struct LogSourceManager {
    /// Container runtime access.
    control_plane: Arc<dyn ControlPlane>,
    /// Persistence for custom sources.
    store: RegistryStore,
    /// Last loaded registry snapshot.
    registry: RegistryState,
    /// Configuration.
    config: Config,
}

impl LogSourceManager {
    /// Connect to Docker as configured and initialize.
    pub async fn connect(config: Config) -> Result<Self> {
        let docker = match config.docker_socket.as_deref() {
            Some(socket) => DockerControlPlane::with_socket(socket, &config.streaming)?,
            None => DockerControlPlane::new(&config.streaming)?,
        };
        Self::with_control_plane(Arc::new(docker), config).await
    }

    /// Initialize against an existing control plane.
    pub async fn with_control_plane(
        control_plane: Arc<dyn ControlPlane>,
        config: Config,
    ) -> Result<Self> {
        let store = RegistryStore::in_dir(&config.config_dir)?;
        let registry = store.load()?;
        tracing::debug!(path = %store.path().display(), sources = registry.len(), "loaded custom log sources");

        let manager = Self {
            control_plane,
            store,
            registry,
            config,
        };
        manager.ensure_reachable().await?;
        Ok(manager)
    }

    /// Fail fast when the control plane does not answer.
    pub async fn ensure_reachable(&self) -> Result<()> {
        self.control_plane.ping().await.map_err(|e| match e {
            Error::ControlPlaneUnreachable(_) => e,
            other => Error::ControlPlaneUnreachable(other.to_string()),
        })
    }

    /// Re-read the registry from disk.
    pub fn reload(&mut self) -> Result<()> {
        self.registry = self.store.load()?;
        Ok(())
    }

    /// The registry as last loaded.
    pub fn custom_sources(&self) -> &RegistryState {
        &self.registry
    }

    /// Registered path for a container, if any.
    pub fn custom_source(&self, container_ref: &str) -> Option<&str> {
        self.registry.get(container_ref)
    }

    /// Custom file when a source is registered for the container, native otherwise.
    pub fn preferred_mode(&self, container_ref: &str) -> StreamMode {
        if self.registry.contains(container_ref) {
            StreamMode::CustomFile
        } else {
            StreamMode::Native
        }
    }

    /// All running containers.
    pub async fn list_running(&self) -> Result<Vec<ContainerSummary>> {
        self.ensure_reachable().await?;
        enumerator::list_running(self.control_plane.as_ref()).await
    }

    /// Running containers plus the freshly reloaded custom sources.
    pub async fn list_reconciled(&mut self) -> Result<Reconciled> {
        self.ensure_reachable().await?;
        self.reload()?;
        enumerator::list_reconciled(self.control_plane.as_ref(), &self.registry).await
    }

    /// Register `path` as the custom log source of `container_ref`.
    ///
    /// The container must exist now. Nothing is written when it does not,
    /// and a failed save leaves the in-memory registry untouched.
    pub async fn register(&mut self, container_ref: &str, path: &str) -> Result<()> {
        self.ensure_reachable().await?;

        if self.control_plane.get_container(container_ref).await?.is_none() {
            return Err(Error::ContainerNotFound(container_ref.to_string()));
        }

        let mut updated = self.store.load()?;
        updated.upsert(container_ref, path);
        self.store.save(&updated)?;
        self.registry = updated;

        tracing::info!(container = container_ref, path, "registered custom log source");
        Ok(())
    }

    /// Open a live stream of `container_ref`'s logs.
    ///
    /// Only an unreachable control plane is an error here; everything
    /// else, including an unknown container, arrives as a terminal notice
    /// on the returned stream. Custom sources are looked up in a fresh
    /// read of the registry, so concurrent callers need only `&self`.
    pub async fn open_stream(&self, container_ref: &str, mode: StreamMode) -> Result<LogStream> {
        self.ensure_reachable().await?;

        let session = match mode {
            StreamMode::Native => StreamSession::native(container_ref),
            StreamMode::CustomFile => {
                let snapshot = self.store.load()?;
                match snapshot.get(container_ref) {
                    Some(path) => StreamSession::custom_file(container_ref, path),
                    None => {
                        let session = StreamSession {
                            container_ref: container_ref.to_string(),
                            mode,
                            path: None,
                        };
                        return Ok(LogStream::notice(
                            session,
                            format!(
                                "No custom log source registered for container '{container_ref}'."
                            ),
                        ));
                    }
                }
            }
        };

        tracing::debug!(container = container_ref, %mode, "opening log stream");
        Ok(LogStream::start(
            Arc::clone(&self.control_plane),
            session,
            &self.config.streaming,
        ))
    }

    /// Networks and the containers attached to them.
    pub async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        self.ensure_reachable().await?;
        self.control_plane.list_networks().await
    }
}
