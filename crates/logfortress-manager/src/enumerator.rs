//! Joins live containers with registered custom sources.

use futures::future::try_join_all;
use logfortress_core::{ContainerSummary, CustomSourceRow, RegistryState, Result};
use logfortress_docker::ControlPlane;

/// Running containers alongside every registered custom source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    pub running: Vec<ContainerSummary>,
    pub custom: Vec<CustomSourceRow>,
}

/// Summaries of all running containers, in the order the runtime returns them.
pub async fn list_running(control_plane: &dyn ControlPlane) -> Result<Vec<ContainerSummary>> {
    let handles = control_plane.list_running().await?;
    Ok(handles.iter().map(|handle| handle.summary()).collect())
}

/// Running containers plus one row per registry entry.
///
/// A registered container that no longer exists yields a row without
/// live details; only control-plane failures are returned as errors.
pub async fn list_reconciled(
    control_plane: &dyn ControlPlane,
    registry: &RegistryState,
) -> Result<Reconciled> {
    let running = list_running(control_plane).await?;

    let custom = try_join_all(registry.iter().map(|(name, path)| async move {
        let container = control_plane.get_container(name).await?;
        if container.is_none() {
            tracing::warn!(container = name, path, "custom log source refers to a missing container");
        }
        Ok::<_, logfortress_core::Error>(CustomSourceRow {
            name: name.to_string(),
            path: path.to_string(),
            container: container.map(|handle| handle.summary()),
        })
    }))
    .await?;

    Ok(Reconciled { running, custom })
}
