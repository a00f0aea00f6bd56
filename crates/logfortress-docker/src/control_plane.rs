//! Capability interface over the container runtime.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use logfortress_core::{ContainerHandle, NetworkSummary, Result};

/// Raw output chunks from a container. Dropping the stream detaches
/// from the underlying socket or exec channel.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Operations logfortress needs from a container runtime.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Check that the runtime answers at all.
    async fn ping(&self) -> Result<()>;

    /// All containers currently running, in runtime order.
    async fn list_running(&self) -> Result<Vec<ContainerHandle>>;

    /// Look up a container by name or ID. `Ok(None)` means it does not exist.
    async fn get_container(&self, reference: &str) -> Result<Option<ContainerHandle>>;

    /// Follow the combined stdout/stderr of a container.
    async fn follow_logs(&self, container_id: &str) -> Result<ByteStream>;

    /// Run `command` inside the container and follow its output.
    async fn exec_follow(&self, container_id: &str, command: &[String]) -> Result<ByteStream>;

    /// Networks with their attached containers.
    async fn list_networks(&self) -> Result<Vec<NetworkSummary>>;
}
