//! Build command implementation

use std::path::PathBuf;

use dockmod_core::{load_arguments, Response};
use dockmod_docker::{run_build, BuildOutcome, BuildRequest, ClientOptions, DockerService};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

/// Arguments accepted by the docker_build module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildArguments {
    /// Engine connection settings
    #[serde(flatten)]
    pub client: ClientOptions,
    /// What to build
    #[serde(flatten)]
    pub request: BuildRequest,
}

/// Build command implementation
pub struct BuildCommand {
    args_file: PathBuf,
}

impl BuildCommand {
    pub fn new(args_file: PathBuf) -> Self {
        Self { args_file }
    }

    /// Run the build and describe the result for the runner
    pub async fn execute(&self) -> Response {
        let arguments: BuildArguments = match load_arguments(&self.args_file) {
            Ok(arguments) => arguments,
            Err(e) => return Response::failure(e.to_string()),
        };

        if let Err(e) = arguments.request.validate() {
            return Response::failure(e.to_string());
        }

        let docker = match DockerService::connect(&arguments.client) {
            Ok(docker) => docker,
            Err(e) => return Response::failure(e.to_string()),
        };

        info!("Starting image build from {}", arguments.request.src.display());
        let mut display = tokio::io::stderr();
        match run_build(&docker, &arguments.request, &mut display).await {
            Ok(outcome) => outcome_response(outcome),
            Err(e) => {
                error!("Build could not be started: {}", e);
                Response::failure(e.to_string())
            }
        }
    }
}

/// Describe a build outcome, keeping the partial transcript on failure
pub fn outcome_response(outcome: BuildOutcome) -> Response {
    let mut response = Response::new();
    response.insert_info("image_id", outcome.image_id);
    response.insert_info("stdout", outcome.stdout);
    response.insert_info("stdout_lines", outcome.stdout_lines);
    response.warnings = outcome.warnings;

    match outcome.error {
        Some(e) => {
            response.msg = e.to_string();
            response.failed = true;
        }
        None => response.changed = true,
    }

    response
}
