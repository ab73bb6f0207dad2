//! Build progress messages
//!
//! The engine reports a build as a sequence of JSON messages. Each message is
//! either displayable status text, an error that ends the build, or an
//! auxiliary payload with structured metadata such as the built image id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DockerError;

/// One message of the engine's JSON progress stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Pre-rendered progress bar
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<String>,
    #[serde(default, rename = "progressDetail", skip_serializing_if = "Option::is_none")]
    pub progress_detail: Option<ProgressDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, rename = "errorDetail", skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<ErrorDetail>,
    /// Raw auxiliary payload, decoded lazily
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aux: Option<Value>,
}

/// Byte counters attached to pull and push progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressDetail {
    pub current: i64,
    pub total: i64,
}

/// Error reported by the engine in place of further progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorDetail {
    pub code: i64,
    pub message: String,
}

/// Auxiliary payload announcing the built image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    #[serde(rename = "ID")]
    pub id: String,
}

/// Classified progress message
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Displayable status or build output
    Message(JsonMessage),
    /// Structured side-channel payload
    Aux(Value),
    /// Build error; nothing after it is relayed
    Error(ErrorDetail),
}

impl JsonMessage {
    /// Message carrying build output text
    pub fn stream(text: impl Into<String>) -> Self {
        Self { stream: Some(text.into()), ..Default::default() }
    }

    /// Message carrying a status line
    pub fn status(text: impl Into<String>) -> Self {
        Self { status: Some(text.into()), ..Default::default() }
    }

    /// Auxiliary message
    pub fn aux(payload: Value) -> Self {
        Self { aux: Some(payload), ..Default::default() }
    }

    /// Error message
    pub fn error(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            error: Some(message.clone()),
            error_detail: Some(ErrorDetail { code, message }),
            ..Default::default()
        }
    }

    /// Classify the message; auxiliary payloads take precedence over errors
    pub fn into_event(self) -> ProgressEvent {
        if let Some(aux) = self.aux {
            return ProgressEvent::Aux(aux);
        }

        match (self.error_detail, self.error) {
            (Some(mut detail), error) => {
                if detail.message.is_empty() {
                    detail.message = error.unwrap_or_default();
                }
                ProgressEvent::Error(detail)
            }
            (None, Some(message)) => ProgressEvent::Error(ErrorDetail { code: 0, message }),
            (None, None) => ProgressEvent::Message(Self {
                aux: None,
                error: None,
                error_detail: None,
                ..self
            }),
        }
    }

    /// Render the message the way a non-terminal display shows it
    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(id) = self.id.as_deref().filter(|id| !id.is_empty()) {
            out.push_str(id);
            out.push_str(": ");
        }
        if let Some(from) = self.from.as_deref().filter(|from| !from.is_empty()) {
            out.push_str("(from ");
            out.push_str(from);
            out.push_str(") ");
        }

        let status = self.status.as_deref().unwrap_or_default();
        match (self.progress.as_deref(), self.stream.as_deref()) {
            (Some(progress), _) if !progress.is_empty() => {
                out.push_str(status);
                out.push(' ');
                out.push_str(progress);
                out.push('\n');
            }
            (_, Some(stream)) if !stream.is_empty() => out.push_str(stream),
            _ => {
                out.push_str(status);
                out.push('\n');
            }
        }

        out
    }
}

impl ErrorDetail {
    /// Convert to the error that terminates a build relay
    pub fn into_error(self) -> DockerError {
        if self.code == 401 {
            DockerError::AuthenticationRequired
        } else {
            DockerError::BuildFailed { reason: self.message }
        }
    }
}

impl BuildResult {
    /// Decode an auxiliary payload
    pub fn from_aux(payload: Value) -> serde_json::Result<Self> {
        serde_json::from_value(payload)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_engine_messages() {
        let message: JsonMessage =
            serde_json::from_str(r#"{"stream":"Step 1/2 : FROM alpine\n"}"#).unwrap();
        assert_eq!(message.stream.as_deref(), Some("Step 1/2 : FROM alpine\n"));

        let message: JsonMessage = serde_json::from_str(
            r#"{"status":"Downloading","progressDetail":{"current":10,"total":20},"progress":"[=====>     ]","id":"a1b2"}"#,
        )
        .unwrap();
        assert_eq!(message.progress_detail, Some(ProgressDetail { current: 10, total: 20 }));
        assert_eq!(message.id.as_deref(), Some("a1b2"));

        let message: JsonMessage =
            serde_json::from_str(r#"{"aux":{"ID":"sha256:abc"}}"#).unwrap();
        assert_eq!(message.aux, Some(json!({"ID": "sha256:abc"})));
    }

    #[test]
    fn test_classify_events() {
        match JsonMessage::aux(json!({"ID": "sha256:abc"})).into_event() {
            ProgressEvent::Aux(payload) => {
                assert_eq!(BuildResult::from_aux(payload).unwrap().id, "sha256:abc");
            }
            other => panic!("Wrong event type: {other:?}"),
        }

        match JsonMessage::error(1, "RUN failed").into_event() {
            ProgressEvent::Error(detail) => {
                assert_eq!(detail, ErrorDetail { code: 1, message: "RUN failed".to_string() });
            }
            other => panic!("Wrong event type: {other:?}"),
        }

        let bare = JsonMessage { error: Some("boom".to_string()), ..Default::default() };
        match bare.into_event() {
            ProgressEvent::Error(detail) => assert_eq!(detail.message, "boom"),
            other => panic!("Wrong event type: {other:?}"),
        }

        let status = JsonMessage::status("Pulling");
        assert_eq!(status.clone().into_event(), ProgressEvent::Message(status));
    }

    #[test]
    fn test_render() {
        assert_eq!(
            JsonMessage::stream("Step 1/2 : FROM alpine\n").render(),
            "Step 1/2 : FROM alpine\n"
        );
        assert_eq!(JsonMessage::status("Pulling fs layer").render(), "Pulling fs layer\n");

        let message = JsonMessage {
            status: Some("Downloading".to_string()),
            progress: Some("[==>   ] 1kB/2kB".to_string()),
            id: Some("a1b2".to_string()),
            ..Default::default()
        };
        assert_eq!(message.render(), "a1b2: Downloading [==>   ] 1kB/2kB\n");

        let message = JsonMessage {
            status: Some("Pulling".to_string()),
            from: Some("alpine".to_string()),
            ..Default::default()
        };
        assert_eq!(message.render(), "(from alpine) Pulling\n");
    }

    #[test]
    fn test_auth_error_code() {
        let err = ErrorDetail { code: 401, message: "unauthorized".to_string() }.into_error();
        assert!(matches!(err, DockerError::AuthenticationRequired));

        let err = ErrorDetail { code: 1, message: "RUN failed".to_string() }.into_error();
        assert_eq!(err.to_string(), "Docker build failed: RUN failed");
    }

    #[test]
    fn test_malformed_aux() {
        assert!(BuildResult::from_aux(json!({"id": 5})).is_err());
        assert!(BuildResult::from_aux(json!("trace")).is_err());
    }
}
