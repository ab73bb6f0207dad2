//! Docker-related types and structures

use serde::{Deserialize, Serialize};

/// CPU controls for build containers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuArgument {
    /// CPUs the build may use (`0-3`, `0,1`)
    pub set_cpus: String,
    /// Memory nodes the build may use
    pub set_mems: String,
    /// Relative CPU weight
    pub shares: i64,
    /// Microseconds of CPU time per period
    pub quota: i64,
    /// CPU period in microseconds
    pub period: i64,
}

/// Container isolation technology
///
/// Names are matched case-insensitively. Names the daemon may accept but
/// this crate does not know are kept as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Isolation {
    /// Daemon default
    #[default]
    Default,
    /// Process isolation (Windows)
    Process,
    /// Hyper-V isolation (Windows)
    HyperV,
    /// Any other technology name
    Other(String),
}

impl Isolation {
    /// Whether this is the daemon default
    pub fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl From<String> for Isolation {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "" | "default" => Self::Default,
            "process" => Self::Process,
            "hyperv" => Self::HyperV,
            _ => Self::Other(name),
        }
    }
}

impl From<Isolation> for String {
    fn from(isolation: Isolation) -> Self {
        match isolation {
            Isolation::Default => "default".to_string(),
            Isolation::Process => "process".to_string(),
            Isolation::HyperV => "hyperv".to_string(),
            Isolation::Other(name) => name,
        }
    }
}

/// Docker registry credentials
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Username
    #[serde(skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Password
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    /// Pre-encoded `user:password`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth: String,
    /// Email
    #[serde(skip_serializing_if = "String::is_empty")]
    pub email: String,
    /// Registry server URL
    #[serde(skip_serializing_if = "String::is_empty")]
    pub serveraddress: String,
    /// Token used to obtain an access token
    #[serde(skip_serializing_if = "String::is_empty")]
    pub identitytoken: String,
    /// Bearer token sent to the registry
    #[serde(skip_serializing_if = "String::is_empty")]
    pub registrytoken: String,
}

impl AuthConfig {
    /// Convert to Bollard credentials
    pub fn to_credentials(&self) -> bollard::auth::DockerCredentials {
        fn non_empty(value: &str) -> Option<String> {
            (!value.is_empty()).then(|| value.to_string())
        }

        bollard::auth::DockerCredentials {
            username: non_empty(&self.username),
            password: non_empty(&self.password),
            auth: non_empty(&self.auth),
            email: non_empty(&self.email),
            serveraddress: non_empty(&self.serveraddress),
            identitytoken: non_empty(&self.identitytoken),
            registrytoken: non_empty(&self.registrytoken),
            ..Default::default()
        }
    }
}
