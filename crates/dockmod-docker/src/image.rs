//! Docker image builds

use std::collections::HashMap;
use std::pin::Pin;

use bollard::auth::DockerCredentials;
use bollard::errors::Error as ClientError;
use bollard::image::{BuildImageOptions, TagImageOptions};
use bollard::models::BuildInfo;
use futures::StreamExt;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::context::BuildContext;
use crate::error::{DockerError, Result};
use crate::options::ImageBuildOptions;
use crate::progress::{ErrorDetail, JsonMessage, ProgressDetail};
use crate::service::EventStream;

/// Docker image manager
pub struct ImageManager<'a> {
    client: &'a bollard::Docker,
}

impl<'a> ImageManager<'a> {
    /// Create a new image manager
    pub fn new(client: &'a bollard::Docker) -> Self {
        Self { client }
    }

    /// Submit an image build and return the engine's progress stream
    ///
    /// The context is read into the request body first, which also reports
    /// any error the directory archiver ran into.
    pub async fn build(
        &self,
        options: &ImageBuildOptions,
        context: BuildContext,
    ) -> Result<EventStream<'a>> {
        info!("Building Docker image from {}", context.path().display());

        let skipped = unsupported_options(options);
        if !skipped.is_empty() {
            warn!(
                "Build options not supported by the Docker client, ignoring: {}",
                skipped.join(", ")
            );
        }

        let body = context.into_bytes().await?;
        let credentials = credentials(options);

        let client: &'a bollard::Docker = self.client;
        let stream = client
            .build_image(to_build_image_options(options), credentials, Some(body))
            .map(to_event_message);

        let mut stream = stream.boxed().peekable();
        let rejected = matches!(Pin::new(&mut stream).peek().await, Some(Err(_)));
        if rejected {
            if let Some(Err(e)) = stream.next().await {
                return Err(e);
            }
        }

        Ok(Box::pin(stream))
    }

    /// Tag an image with a `repo[:tag]` reference
    pub async fn tag(&self, image: &str, reference: &str) -> Result<()> {
        let (repo, tag) = split_reference(reference);
        info!("Tagging image {} as {}:{}", image, repo, tag);

        let options = TagImageOptions { repo, tag };
        self.client
            .tag_image(image, Some(options))
            .await
            .map_err(DockerError::Client)
    }
}

/// Convert to Bollard build options
///
/// Only the first tag is sent; [`unsupported_options`] lists what is dropped.
pub fn to_build_image_options(options: &ImageBuildOptions) -> BuildImageOptions<String> {
    BuildImageOptions {
        dockerfile: options.dockerfile.clone(),
        t: options.tags.first().cloned().unwrap_or_default(),
        extrahosts: (!options.extra_hosts.is_empty()).then(|| options.extra_hosts.join(",")),
        remote: options.remote_context.clone(),
        q: options.suppress_output,
        nocache: options.no_cache,
        cachefrom: options.cache_from.clone(),
        pull: options.pull_parent,
        rm: options.remove,
        forcerm: options.force_remove,
        memory: positive(options.memory),
        memswap: (options.memory_swap != 0).then_some(options.memory_swap),
        cpushares: positive(options.cpu_shares),
        cpusetcpus: options.cpu_set_cpus.clone(),
        cpuperiod: positive(options.cpu_period),
        cpuquota: positive(options.cpu_quota),
        buildargs: resolve_build_args(&options.build_args),
        shmsize: positive(options.shm_size),
        squash: options.squash,
        labels: options.labels.clone(),
        networkmode: options.network_mode.clone(),
        platform: options.platform.clone(),
        ..Default::default()
    }
}

/// Options set on the request that the Docker client cannot forward
pub fn unsupported_options(options: &ImageBuildOptions) -> Vec<&'static str> {
    let mut skipped = Vec::new();
    if !options.cpu_set_mems.is_empty() {
        skipped.push("cpu.set_mems");
    }
    if !options.cgroup_parent.is_empty() {
        skipped.push("cgroup_parent");
    }
    if !options.isolation.is_default() {
        skipped.push("isolation");
    }
    if !options.security_opt.is_empty() {
        skipped.push("security_opt");
    }
    if !options.session_id.is_empty() {
        skipped.push("session_id");
    }
    if !options.target.is_empty() {
        skipped.push("target");
    }
    skipped
}

fn credentials(options: &ImageBuildOptions) -> Option<HashMap<String, DockerCredentials>> {
    if options.auth_configs.is_empty() {
        return None;
    }

    Some(
        options
            .auth_configs
            .iter()
            .map(|(registry, auth)| (registry.clone(), auth.to_credentials()))
            .collect(),
    )
}

/// Fill in build args without a value from the environment, dropping unset ones
fn resolve_build_args(args: &HashMap<String, Option<String>>) -> HashMap<String, String> {
    args.iter()
        .filter_map(|(name, value)| match value {
            Some(value) => Some((name.clone(), value.clone())),
            None => match std::env::var(name) {
                Ok(value) => Some((name.clone(), value)),
                Err(_) => {
                    debug!("Build arg {} has no value and is not set in the environment", name);
                    None
                }
            },
        })
        .collect()
}

fn positive(value: i64) -> Option<u64> {
    u64::try_from(value).ok().filter(|v| *v > 0)
}

/// Convert one item of the client's build stream
///
/// The client decodes `aux` strictly as an image id, so a line carrying any
/// other auxiliary payload arrives as a decode error. Such lines are handed
/// on as auxiliary messages. The client's line decoder stops after any
/// decode error, so nothing after that line is received.
pub fn to_event_message(
    item: std::result::Result<BuildInfo, ClientError>,
) -> Result<JsonMessage> {
    match item {
        Ok(info) => Ok(to_json_message(info)),
        Err(ClientError::JsonDataError { message, contents, column }) => {
            match serde_json::from_str::<JsonMessage>(&contents) {
                Ok(line) if line.aux.is_some() => {
                    warn!("Build log ends at an auxiliary message the client cannot decode");
                    Ok(line)
                }
                _ => Err(DockerError::Client(ClientError::JsonDataError {
                    message,
                    contents,
                    column,
                })),
            }
        }
        Err(e) => Err(DockerError::Client(e)),
    }
}

fn to_json_message(info: BuildInfo) -> JsonMessage {
    JsonMessage {
        stream: info.stream,
        status: info.status,
        progress: info.progress,
        progress_detail: info.progress_detail.map(|detail| ProgressDetail {
            current: detail.current.unwrap_or_default(),
            total: detail.total.unwrap_or_default(),
        }),
        id: info.id,
        error: info.error,
        error_detail: info.error_detail.map(|detail| ErrorDetail {
            code: detail.code.unwrap_or_default(),
            message: detail.message.unwrap_or_default(),
        }),
        aux: info.aux.map(|image| json!({ "ID": image.id })),
        ..Default::default()
    }
}

/// Split `repo[:tag]` into repository and tag, defaulting the tag to `latest`
fn split_reference(reference: &str) -> (String, String) {
    match reference.rfind(':') {
        Some(pos) if !reference[pos + 1..].contains('/') => {
            (reference[..pos].to_string(), reference[pos + 1..].to_string())
        }
        _ => (reference.to_string(), "latest".to_string()),
    }
}
