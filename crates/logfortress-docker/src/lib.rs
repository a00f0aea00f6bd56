//! Docker access for logfortress.
//!
//! This crate defines the control-plane capability the rest of the
//! workspace depends on, its bollard implementation, and the streamer
//! that turns container output into cancellable line streams.

mod control_plane;
mod docker;
mod lines;
mod logs;

pub use control_plane::{ByteStream, ControlPlane};
pub use docker::DockerControlPlane;
pub use lines::LineDecoder;
pub use logs::LogStream;
