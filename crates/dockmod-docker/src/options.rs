//! Build requests and the engine's build options
//!
//! [`BuildRequest`] is the flat record supplied by the caller.
//! [`ImageBuildOptions`] is the shape of the engine's image-build request.
//! [`BuildRequest::compile`] maps one onto the other and does nothing else.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{DockerError, Result};
use crate::types::{AuthConfig, CpuArgument, Isolation};

/// Image build request as supplied by the caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildRequest {
    /// Directory or gzip archive used as the build context
    pub src: PathBuf,
    /// Tags applied to the resulting image
    pub tags: Vec<String>,
    /// Git URL or remote tarball used instead of a local context
    pub remote_context: String,
    /// Do not use the build cache
    pub no_cache: bool,
    /// Remove intermediate containers after a successful build
    pub remove: bool,
    /// Always remove intermediate containers
    pub force_remove: bool,
    /// Always attempt to pull a newer parent image
    pub pull_parent: bool,
    /// Isolation technology
    pub isolation: Isolation,
    /// CPU controls
    pub cpu: CpuArgument,
    /// Memory limit in bytes
    pub memory: i64,
    /// Memory plus swap limit in bytes, -1 for unlimited swap
    pub memory_swap: i64,
    /// Parent cgroup for build containers
    pub cgroup_parent: String,
    /// Network mode for RUN instructions
    pub network_mode: String,
    /// Size of /dev/shm in bytes
    pub shm_size: i64,
    /// Dockerfile path within the context
    pub dockerfile: String,
    /// Build-time variables; a missing value is taken from the environment
    pub build_args: HashMap<String, Option<String>>,
    /// Registry credentials keyed by registry
    pub auth_configs: HashMap<String, AuthConfig>,
    /// Labels applied to the resulting image
    pub labels: HashMap<String, String>,
    /// Squash the resulting layers
    pub squash: bool,
    /// Images used as cache sources
    pub cache_from: Vec<String>,
    /// Security options for build containers
    pub security_opt: Vec<String>,
    /// Extra `host:ip` entries for /etc/hosts
    pub extra_hosts: Vec<String>,
    /// Target build stage
    pub target: String,
    /// Build session id
    pub session_id: String,
    /// Target platform (`linux/amd64`)
    pub platform: String,
}

/// Options for the engine's image-build endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageBuildOptions {
    pub tags: Vec<String>,
    pub suppress_output: bool,
    pub remote_context: String,
    pub no_cache: bool,
    pub remove: bool,
    pub force_remove: bool,
    pub pull_parent: bool,
    pub isolation: Isolation,
    pub cpu_set_cpus: String,
    pub cpu_set_mems: String,
    pub cpu_shares: i64,
    pub cpu_quota: i64,
    pub cpu_period: i64,
    pub memory: i64,
    pub memory_swap: i64,
    pub cgroup_parent: String,
    pub network_mode: String,
    pub shm_size: i64,
    pub dockerfile: String,
    pub build_args: HashMap<String, Option<String>>,
    pub auth_configs: HashMap<String, AuthConfig>,
    pub labels: HashMap<String, String>,
    pub squash: bool,
    pub cache_from: Vec<String>,
    pub security_opt: Vec<String>,
    pub extra_hosts: Vec<String>,
    pub target: String,
    pub session_id: String,
    pub platform: String,
}

impl BuildRequest {
    /// Create a request for a context path
    pub fn new(src: impl Into<PathBuf>) -> Self {
        Self { src: src.into(), ..Default::default() }
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Set a build argument
    pub fn with_build_arg(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.build_args.insert(name.into(), value);
        self
    }

    /// Check the request before anything touches the filesystem or engine
    pub fn validate(&self) -> Result<()> {
        if self.src.as_os_str().is_empty() {
            return Err(DockerError::InvalidRequest {
                reason: "src field cannot be empty, specify a directory or a tar.gz file"
                    .to_string(),
            });
        }
        Ok(())
    }

    /// Map the request onto the engine's build options
    pub fn compile(&self) -> ImageBuildOptions {
        ImageBuildOptions {
            tags: self.tags.clone(),
            suppress_output: false,
            remote_context: self.remote_context.clone(),
            no_cache: self.no_cache,
            remove: self.remove,
            force_remove: self.force_remove,
            pull_parent: self.pull_parent,
            isolation: self.isolation.clone(),
            cpu_set_cpus: self.cpu.set_cpus.clone(),
            cpu_set_mems: self.cpu.set_mems.clone(),
            cpu_shares: self.cpu.shares,
            cpu_quota: self.cpu.quota,
            cpu_period: self.cpu.period,
            memory: self.memory,
            memory_swap: self.memory_swap,
            cgroup_parent: self.cgroup_parent.clone(),
            network_mode: self.network_mode.clone(),
            shm_size: self.shm_size,
            dockerfile: self.dockerfile.clone(),
            build_args: self.build_args.clone(),
            auth_configs: self.auth_configs.clone(),
            labels: self.labels.clone(),
            squash: self.squash,
            cache_from: self.cache_from.clone(),
            security_opt: self.security_opt.clone(),
            extra_hosts: self.extra_hosts.clone(),
            target: self.target.clone(),
            session_id: self.session_id.clone(),
            platform: self.platform.clone(),
        }
    }
}
