//! Test support for logfortress: an in-memory control plane.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use logfortress_core::{Config, ContainerHandle, ContainerStatus, Error, NetworkSummary, Result};
use logfortress_docker::{ByteStream, ControlPlane};
use logfortress_manager::LogSourceManager;
use tempfile::TempDir;
use tokio::sync::Notify;

/// Scripted output of a log or exec origin.
#[derive(Debug, Clone, Default)]
pub struct Script {
    chunks: Vec<Vec<u8>>,
    error: Option<String>,
    keep_open: bool,
}

impl Script {
    /// Emit these chunks and then end.
    pub fn chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
            ..Self::default()
        }
    }

    /// After the chunks, stay open without producing anything.
    #[must_use]
    pub fn then_idle(mut self) -> Self {
        self.keep_open = true;
        self
    }

    /// After the chunks, fail with `message`.
    #[must_use]
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// A container known to the fake.
#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub handle: ContainerHandle,
    pub logs: Script,
    pub exec: Script,
    /// When set, opening logs or exec fails with this API error.
    pub attach_error: Option<String>,
}

impl FakeContainer {
    /// A running container with the given name and image tag.
    pub fn running(name: &str, image_tag: &str) -> Self {
        Self::with_status(name, image_tag, ContainerStatus::Running)
    }

    /// A container in an arbitrary state.
    pub fn with_status(name: &str, image_tag: &str, status: ContainerStatus) -> Self {
        let hex: String = name.bytes().map(|b| format!("{b:02x}")).collect();
        Self {
            handle: ContainerHandle {
                id: format!("{hex:0<64}"),
                name: name.to_string(),
                status,
                image_tags: if image_tag.is_empty() {
                    Vec::new()
                } else {
                    vec![image_tag.to_string()]
                },
            },
            logs: Script::default(),
            exec: Script::default(),
            attach_error: None,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.handle.id = id.to_string();
        self
    }

    #[must_use]
    pub fn failing_attach(mut self, message: &str) -> Self {
        self.attach_error = Some(message.to_string());
        self
    }

    #[must_use]
    pub fn with_logs(mut self, script: Script) -> Self {
        self.logs = script;
        self
    }

    #[must_use]
    pub fn with_exec(mut self, script: Script) -> Self {
        self.exec = script;
        self
    }
}

/// Counters observed by tests.
#[derive(Debug, Default)]
struct Observed {
    attachments: AtomicUsize,
    releases: AtomicUsize,
    released: Notify,
    exec_commands: Mutex<Vec<(String, Vec<String>)>>,
}

/// In-memory [`ControlPlane`].
#[derive(Debug, Default)]
pub struct FakeControlPlane {
    containers: Mutex<Vec<FakeContainer>>,
    unreachable: AtomicBool,
    observed: Arc<Observed>,
}

impl FakeControlPlane {
    pub fn new(containers: Vec<FakeContainer>) -> Arc<Self> {
        Arc::new(Self {
            containers: Mutex::new(containers),
            ..Self::default()
        })
    }

    /// Remove a container by name.
    pub fn remove(&self, name: &str) {
        self.containers
            .lock()
            .unwrap()
            .retain(|c| c.handle.name != name);
    }

    /// Make every call fail as if the daemon were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// How many log or exec origins were opened.
    pub fn attachments(&self) -> usize {
        self.observed.attachments.load(Ordering::SeqCst)
    }

    /// How many opened origins have since been dropped.
    pub fn releases(&self) -> usize {
        self.observed.releases.load(Ordering::SeqCst)
    }

    /// Commands passed to `exec_follow`, with the container ID.
    pub fn exec_commands(&self) -> Vec<(String, Vec<String>)> {
        self.observed.exec_commands.lock().unwrap().clone()
    }

    /// Wait until at least one origin has been released, or time out.
    pub async fn wait_released(&self, timeout: Duration) -> bool {
        let waited = tokio::time::timeout(timeout, async {
            while self.releases() == 0 {
                self.observed.released.notified().await;
            }
        })
        .await;
        waited.is_ok()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(Error::ControlPlaneUnreachable(
                "connection refused".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn find(&self, reference: &str) -> Option<FakeContainer> {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.handle.name == reference || c.handle.id.starts_with(reference))
            .cloned()
    }

    fn open(&self, script: Script) -> ByteStream {
        self.observed.attachments.fetch_add(1, Ordering::SeqCst);
        Box::pin(ScriptedStream {
            pending: script.chunks.into(),
            error: script.error,
            keep_open: script.keep_open,
            observed: Arc::clone(&self.observed),
        })
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn ping(&self) -> Result<()> {
        self.check_reachable()
    }

    async fn list_running(&self) -> Result<Vec<ContainerHandle>> {
        self.check_reachable()?;
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.handle.status.is_running())
            .map(|c| c.handle.clone())
            .collect())
    }

    async fn get_container(&self, reference: &str) -> Result<Option<ContainerHandle>> {
        self.check_reachable()?;
        Ok(self.find(reference).map(|c| c.handle))
    }

    async fn follow_logs(&self, container_id: &str) -> Result<ByteStream> {
        self.check_reachable()?;
        let container = self
            .find(container_id)
            .ok_or_else(|| Error::ControlPlane(format!("404: no such container {container_id}")))?;
        if let Some(message) = container.attach_error {
            return Err(Error::ControlPlane(message));
        }
        Ok(self.open(container.logs))
    }

    async fn exec_follow(&self, container_id: &str, command: &[String]) -> Result<ByteStream> {
        self.check_reachable()?;
        let container = self
            .find(container_id)
            .ok_or_else(|| Error::ControlPlane(format!("404: no such container {container_id}")))?;
        self.observed
            .exec_commands
            .lock()
            .unwrap()
            .push((container_id.to_string(), command.to_vec()));
        if let Some(message) = container.attach_error {
            return Err(Error::ControlPlane(message));
        }
        Ok(self.open(container.exec))
    }

    async fn list_networks(&self) -> Result<Vec<NetworkSummary>> {
        self.check_reachable()?;
        Ok(Vec::new())
    }
}

/// Replays a [`Script`] and reports when it is dropped.
struct ScriptedStream {
    pending: VecDeque<Vec<u8>>,
    error: Option<String>,
    keep_open: bool,
    observed: Arc<Observed>,
}

impl Stream for ScriptedStream {
    type Item = Result<Vec<u8>>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(chunk) = self.pending.pop_front() {
            return Poll::Ready(Some(Ok(chunk)));
        }
        if let Some(message) = self.error.take() {
            return Poll::Ready(Some(Err(Error::ControlPlaneUnreachable(message))));
        }
        if self.keep_open {
            Poll::Pending
        } else {
            Poll::Ready(None)
        }
    }
}

impl Drop for ScriptedStream {
    fn drop(&mut self) {
        self.observed.releases.fetch_add(1, Ordering::SeqCst);
        self.observed.released.notify_one();
    }
}

/// A manager over `control_plane` with its registry in a fresh temp dir.
pub async fn manager_in_tempdir(
    control_plane: Arc<FakeControlPlane>,
) -> Result<(LogSourceManager, TempDir)> {
    let temp_dir = TempDir::new().map_err(|e| Error::Config(e.to_string()))?;
    let config = Config::with_config_dir(temp_dir.path());
    let manager = LogSourceManager::with_control_plane(control_plane, config).await?;
    Ok((manager, temp_dir))
}
