//! Image build pipeline
//!
//! Validates the request, assembles the context, submits the build, relays
//! its log and applies the remaining tags.

use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

use crate::context::BuildContext;
use crate::error::Result;
use crate::options::BuildRequest;
use crate::relay::{BuildLogRelay, BuildOutcome};
use crate::service::ImageBuildService;

/// Build an image for `request`, relaying progress to `display`
///
/// Input and transport errors are returned as `Err` before any progress is
/// relayed. Errors raised while the build is running are carried in the
/// returned outcome together with the partial transcript.
pub async fn run_build<S, W>(
    service: &S,
    request: &BuildRequest,
    display: &mut W,
) -> Result<BuildOutcome>
where
    S: ImageBuildService + ?Sized,
    W: AsyncWrite + Unpin,
{
    request.validate()?;

    let context = BuildContext::from_path(&request.src).await?;
    debug!("Assembled {:?} build context from {}", context.kind(), request.src.display());

    let options = request.compile();
    let events = service.build_image(&options, context).await?;

    let mut outcome = BuildLogRelay::new().relay(events, display).await;
    if !outcome.is_success() {
        return Ok(outcome);
    }

    let extra_tags = options.tags.get(1..).unwrap_or_default();
    if outcome.image_id.is_empty() {
        if !extra_tags.is_empty() {
            let skipped = format!(
                "No image id reported by the build, tags not applied: {}",
                extra_tags.join(", ")
            );
            warn!("{}", skipped);
            outcome.warnings.push(skipped);
        }
        return Ok(outcome);
    }

    for reference in extra_tags {
        if let Err(e) = service.tag_image(&outcome.image_id, reference).await {
            return Ok(BuildOutcome { error: Some(e), ..outcome });
        }
    }

    info!("Built image {}", outcome.image_id);
    Ok(outcome)
}
