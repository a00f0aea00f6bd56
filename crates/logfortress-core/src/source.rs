//! Container and log source views shared by the control plane, the
//! enumerator and the streamer.

use serde::{Deserialize, Serialize};

/// Placeholder image label for untagged images.
pub const NO_TAG: &str = "<no tag>";

/// Placeholder shown for fields of a container that no longer exists.
pub const NOT_FOUND: &str = "N/A";

/// Runtime state of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerStatus {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    /// A state string the runtime reported that we do not model.
    Unknown(String),
}

impl ContainerStatus {
    /// Whether logs can be followed from the container.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Parse a runtime state string such as `"running"` or `"exited"`.
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "created" => Self::Created,
            "running" => Self::Running,
            "paused" => Self::Paused,
            "restarting" => Self::Restarting,
            "removing" => Self::Removing,
            "exited" => Self::Exited,
            "dead" => Self::Dead,
            _ => Self::Unknown(state.to_string()),
        }
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Restarting => write!(f, "restarting"),
            Self::Removing => write!(f, "removing"),
            Self::Exited => write!(f, "exited"),
            Self::Dead => write!(f, "dead"),
            Self::Unknown(state) => write!(f, "{state}"),
        }
    }
}

/// A container as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Full container ID.
    pub id: String,
    /// Container name without the leading slash.
    pub name: String,
    /// Current state.
    pub status: ContainerStatus,
    /// Tags of the container's image, possibly empty.
    pub image_tags: Vec<String>,
}

impl ContainerHandle {
    /// Project the handle into a listing row.
    pub fn summary(&self) -> ContainerSummary {
        ContainerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            primary_image_tag: self
                .image_tags
                .first()
                .cloned()
                .unwrap_or_else(|| NO_TAG.to_string()),
            status: self.status.clone(),
        }
    }
}

/// Read-only listing row for a live container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    /// First image tag, or [`NO_TAG`].
    pub primary_image_tag: String,
    pub status: ContainerStatus,
}

impl ContainerSummary {
    /// The 12 character ID prefix the docker CLI displays.
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }
}

/// A registered custom source joined with its live container, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomSourceRow {
    /// Registered container reference.
    pub name: String,
    /// Registered log file path.
    pub path: String,
    /// Live container details, `None` when the container no longer resolves.
    pub container: Option<ContainerSummary>,
}

impl CustomSourceRow {
    /// Whether the referenced container currently exists.
    pub fn is_found(&self) -> bool {
        self.container.is_some()
    }

    /// Short container ID or [`NOT_FOUND`].
    pub fn id(&self) -> &str {
        self.container.as_ref().map_or(NOT_FOUND, ContainerSummary::short_id)
    }

    /// Image tag or [`NOT_FOUND`].
    pub fn image(&self) -> &str {
        self.container
            .as_ref()
            .map_or(NOT_FOUND, |c| c.primary_image_tag.as_str())
    }

    /// Status label or [`NOT_FOUND`].
    pub fn status(&self) -> String {
        self.container
            .as_ref()
            .map_or_else(|| NOT_FOUND.to_string(), |c| c.status.to_string())
    }
}

/// Where a stream reads its lines from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamMode {
    /// The container's combined stdout/stderr.
    Native,
    /// The registered custom log file inside the container.
    CustomFile,
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::CustomFile => write!(f, "custom file"),
        }
    }
}

/// Description of one live log tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSession {
    pub container_ref: String,
    pub mode: StreamMode,
    /// File followed in [`StreamMode::CustomFile`].
    pub path: Option<String>,
}

impl StreamSession {
    /// Session over the container's own output.
    pub fn native(container_ref: impl Into<String>) -> Self {
        Self {
            container_ref: container_ref.into(),
            mode: StreamMode::Native,
            path: None,
        }
    }

    /// Session following `path` inside the container.
    pub fn custom_file(container_ref: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            container_ref: container_ref.into(),
            mode: StreamMode::CustomFile,
            path: Some(path.into()),
        }
    }
}

/// One item of a log stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLine {
    /// A decoded line from the origin.
    Output(String),
    /// Terminal informational line; nothing follows it.
    Notice(String),
}

impl StreamLine {
    /// Text of the line regardless of kind.
    pub fn text(&self) -> &str {
        match self {
            Self::Output(text) | Self::Notice(text) => text,
        }
    }

    /// Whether this is a terminal notice.
    pub fn is_notice(&self) -> bool {
        matches!(self, Self::Notice(_))
    }
}

impl std::fmt::Display for StreamLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

/// A container attached to a network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkMember {
    pub id: String,
    pub name: String,
}

/// A network and the containers attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: String,
    pub name: String,
    pub containers: Vec<NetworkMember>,
}
