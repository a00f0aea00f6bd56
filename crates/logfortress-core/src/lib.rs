//! Core types and configuration for logfortress.
//!
//! This crate provides the shared data model, the error taxonomy,
//! configuration loading and the durable registry of custom log sources.

mod config;
mod error;
mod registry;
mod source;

pub use config::{Config, StreamOptions, CONFIG_DIR_ENV};
pub use error::{Error, Result};
pub use registry::{LogSourceEntry, RegistryState, RegistryStore, REGISTRY_FILE_NAME};
pub use source::{
    ContainerHandle, ContainerStatus, ContainerSummary, CustomSourceRow, NetworkMember,
    NetworkSummary, StreamLine, StreamMode, StreamSession, NOT_FOUND, NO_TAG,
};
