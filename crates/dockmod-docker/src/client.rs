//! Docker client wrapper

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::{ClientVersion, Docker};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::BuildContext;
use crate::error::{DockerError, Result};
use crate::image::ImageManager;
use crate::options::ImageBuildOptions;
use crate::service::{EventStream, ImageBuildService};

/// Engine address used when neither the options nor `DOCKER_HOST` name one
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Request timeout handed to the client, in seconds
///
/// The client wraps each request, including the context upload and the wait
/// for the build response, in a timer. This value overflows the runtime's
/// deadline arithmetic, which leaves requests without a deadline.
pub const NO_TIMEOUT_SECS: u64 = u64::MAX;

/// How to reach the Docker engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Engine address (`unix://`, `tcp://` or `http://`)
    pub host: String,
    /// API version such as `1.41`
    pub version: String,
    /// Extra HTTP headers
    pub http_headers: HashMap<String, String>,
}

impl ClientOptions {
    /// Engine address: explicit host, then `DOCKER_HOST`, then the local socket
    pub fn resolve_host(&self) -> String {
        if !self.host.is_empty() {
            return self.host.clone();
        }
        std::env::var("DOCKER_HOST")
            .ok()
            .filter(|host| !host.is_empty())
            .unwrap_or_else(|| DEFAULT_DOCKER_HOST.to_string())
    }

    /// Parse the requested API version, `None` for the client default
    pub fn client_version(&self) -> Result<Option<ClientVersion>> {
        let version = self.version.trim().trim_start_matches('v');
        if version.is_empty() {
            return Ok(None);
        }

        let invalid = || DockerError::InvalidConfig {
            reason: format!("invalid API version {:?}, expected MAJOR.MINOR", self.version),
        };
        let (major, minor) = version.split_once('.').ok_or_else(invalid)?;

        Ok(Some(ClientVersion {
            major_version: major.parse().map_err(|_| invalid())?,
            minor_version: minor.parse().map_err(|_| invalid())?,
        }))
    }
}

/// Docker engine connection
pub struct DockerService {
    client: Docker,
}

impl DockerService {
    /// Create a client for the engine described by `options`
    ///
    /// No request is made until the first API call.
    pub fn connect(options: &ClientOptions) -> Result<Self> {
        if !options.http_headers.is_empty() {
            warn!("Custom HTTP headers are not supported by the Docker client, ignoring");
        }

        let host = options.resolve_host();
        let version = options.client_version()?;
        let version = version.as_ref().unwrap_or(bollard::API_DEFAULT_VERSION);
        debug!("Connecting to Docker at {}", host);

        let client = if host.starts_with("unix://") {
            Docker::connect_with_socket(&host, NO_TIMEOUT_SECS, version)
        } else if host.starts_with("tcp://") || host.starts_with("http://") {
            Docker::connect_with_http(&host, NO_TIMEOUT_SECS, version)
        } else {
            return Err(DockerError::InvalidConfig {
                reason: format!("unsupported Docker host {host:?}"),
            });
        }
        .map_err(DockerError::Client)?;

        Ok(Self { client })
    }

    /// Get the underlying Docker client
    pub fn client(&self) -> &Docker {
        &self.client
    }
}

#[async_trait]
impl ImageBuildService for DockerService {
    async fn build_image<'a>(
        &'a self,
        options: &ImageBuildOptions,
        context: BuildContext,
    ) -> Result<EventStream<'a>> {
        ImageManager::new(&self.client).build(options, context).await
    }

    async fn tag_image(&self, image: &str, reference: &str) -> Result<()> {
        ImageManager::new(&self.client).tag(image, reference).await
    }
}
