//! Image build service trait

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::context::BuildContext;
use crate::error::Result;
use crate::options::ImageBuildOptions;
use crate::progress::JsonMessage;

/// Live progress stream returned by an image build
pub type EventStream<'a> = Pin<Box<dyn Stream<Item = Result<JsonMessage>> + Send + 'a>>;

/// Engine operations needed to build and tag an image
#[async_trait]
pub trait ImageBuildService: Send + Sync {
    /// Submit a build and return its progress stream
    ///
    /// The context is consumed whether or not the call succeeds. Only the
    /// first of `options.tags` is applied by the build itself.
    async fn build_image<'a>(
        &'a self,
        options: &ImageBuildOptions,
        context: BuildContext,
    ) -> Result<EventStream<'a>>;

    /// Add a `repo:tag` reference to an existing image
    async fn tag_image(&self, image: &str, reference: &str) -> Result<()>;
}
