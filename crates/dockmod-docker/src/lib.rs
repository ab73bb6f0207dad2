//! Docker image builds for automation modules
//!
//! This crate turns a local directory or gzip archive into a build context,
//! submits it to the Docker engine and relays the build log, capturing a
//! transcript and the resulting image id.

pub mod build;
pub mod client;
pub mod context;
pub mod error;
pub mod image;
pub mod options;
pub mod progress;
pub mod relay;
pub mod service;
pub mod types;

pub use build::run_build;
pub use client::{ClientOptions, DockerService};
pub use context::{BuildContext, ContextKind};
pub use error::{DockerError, Result};
pub use image::ImageManager;
pub use options::{BuildRequest, ImageBuildOptions};
pub use progress::{BuildResult, ErrorDetail, JsonMessage, ProgressEvent};
pub use relay::{BuildLogRelay, BuildOutcome, DuplicatingSink};
pub use service::{EventStream, ImageBuildService};
pub use types::{AuthConfig, CpuArgument, Isolation};
