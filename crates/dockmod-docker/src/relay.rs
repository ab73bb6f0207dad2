//! Build log relay
//!
//! Drains the engine's progress stream while
//! - writing rendered messages to a display sink,
//! - capturing the same bytes as a transcript, and
//! - tracking the image id announced by auxiliary messages.
//!
//! Rendered output goes through a [`DuplicatingSink`]: every write lands in
//! the display sink and in a bounded in-memory pipe. A spawned task drains
//! the pipe into the transcript buffer. The relay closes the pipe when the
//! stream ends or fails, then joins the capture task before building the
//! [`BuildOutcome`], so the transcript is always complete.

use futures::{Stream, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream};
use tracing::{debug, warn};

use crate::error::{DockerError, Result};
use crate::progress::{BuildResult, JsonMessage, ProgressEvent};

/// Default capacity of the transcript pipe
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// Final result of relaying one build
#[derive(Debug, Default)]
pub struct BuildOutcome {
    /// Image id from the last decodable auxiliary message, empty if none
    pub image_id: String,
    /// Everything written to the display sink
    pub stdout: String,
    /// `stdout` split on newlines
    pub stdout_lines: Vec<String>,
    /// Error that ended the relay early
    pub error: Option<DockerError>,
    /// Auxiliary payloads that could not be decoded
    pub warnings: Vec<String>,
}

impl BuildOutcome {
    fn new(
        image_id: String,
        transcript: Vec<u8>,
        error: Option<DockerError>,
        warnings: Vec<String>,
    ) -> Self {
        let stdout = String::from_utf8_lossy(&transcript).into_owned();
        let stdout_lines = stdout.split('\n').map(str::to_string).collect();
        Self { image_id, stdout, stdout_lines, error, warnings }
    }

    /// Whether the build ran to completion without an error
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Writer forwarding every write to a display sink and a second sink
pub struct DuplicatingSink<D, T> {
    display: D,
    tee: T,
}

impl<D, T> DuplicatingSink<D, T>
where
    D: AsyncWrite + Unpin,
    T: AsyncWrite + Unpin,
{
    /// Create a sink writing to both `display` and `tee`
    pub fn new(display: D, tee: T) -> Self {
        Self { display, tee }
    }

    /// Write the whole buffer to the display, then to the tee
    pub async fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.display.write_all(buf).await?;
        self.tee.write_all(buf).await
    }

    /// Flush the display and close the tee
    pub async fn close(mut self) -> std::io::Result<()> {
        let flushed = self.display.flush().await;
        self.tee.shutdown().await?;
        flushed
    }
}

/// Relays a build's progress stream to a display sink
#[derive(Debug, Clone)]
pub struct BuildLogRelay {
    pipe_capacity: usize,
}

impl Default for BuildLogRelay {
    fn default() -> Self {
        Self { pipe_capacity: DEFAULT_PIPE_CAPACITY }
    }
}

/// State the relay carries across messages
#[derive(Debug, Default)]
struct RelayState {
    image_id: String,
    warnings: Vec<String>,
}

impl BuildLogRelay {
    /// Create a relay with the default pipe capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the transcript pipe capacity in bytes
    pub fn with_pipe_capacity(mut self, capacity: usize) -> Self {
        self.pipe_capacity = capacity.max(1);
        self
    }

    /// Drain `events` into `display`, returning the build outcome
    ///
    /// Never returns early: errors from the stream, the display or the
    /// capture task are recorded in [`BuildOutcome::error`] alongside the
    /// transcript and image id gathered so far.
    pub async fn relay<S, W>(&self, events: S, display: &mut W) -> BuildOutcome
    where
        S: Stream<Item = Result<JsonMessage>> + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (pipe_reader, pipe_writer) = tokio::io::duplex(self.pipe_capacity);
        let capture = tokio::spawn(capture_transcript(pipe_reader));

        let mut sink = DuplicatingSink::new(display, pipe_writer);
        let mut state = RelayState::default();

        let relayed = relay_events(events, &mut sink, &mut state).await;
        let closed = sink.close().await;

        let captured = match capture.await {
            Ok(result) => result.map_err(DockerError::from),
            Err(e) => Err(DockerError::StreamError {
                reason: format!("Transcript capture task failed: {e}"),
            }),
        };

        // A failed capture task also breaks the pipe; report the capture error.
        let (transcript, capture_error) = match captured {
            Ok(transcript) => (transcript, None),
            Err(e) => (Vec::new(), Some(e)),
        };
        let error = capture_error
            .or(relayed.err())
            .or(closed.err().map(DockerError::from));

        if let Some(e) = &error {
            debug!("Build log relay ended with error: {}", e);
        }

        BuildOutcome::new(state.image_id, transcript, error, state.warnings)
    }
}

async fn relay_events<S, D>(
    mut events: S,
    sink: &mut DuplicatingSink<D, DuplexStream>,
    state: &mut RelayState,
) -> Result<()>
where
    S: Stream<Item = Result<JsonMessage>> + Unpin,
    D: AsyncWrite + Unpin,
{
    while let Some(message) = events.next().await {
        match message?.into_event() {
            ProgressEvent::Message(message) => {
                sink.write_all(message.render().as_bytes()).await?;
            }
            ProgressEvent::Aux(payload) => match BuildResult::from_aux(payload) {
                Ok(result) => {
                    debug!("Build produced image {}", result.id);
                    state.image_id = result.id;
                }
                Err(e) => {
                    warn!("Failed to parse aux message: {}", e);
                    state.warnings.push(format!("Failed to parse aux message: {e}"));
                }
            },
            ProgressEvent::Error(detail) => return Err(detail.into_error()),
        }
    }
    Ok(())
}

async fn capture_transcript(mut pipe: DuplexStream) -> std::io::Result<Vec<u8>> {
    let mut transcript = Vec::new();
    pipe.read_to_end(&mut transcript).await?;
    Ok(transcript)
}
