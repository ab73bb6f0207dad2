//! Structured module result
//!
//! Every module run ends by writing exactly one JSON object to standard
//! output and exiting with 0 on success or 1 on failure.

use std::io::Write;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result envelope read by the automation runner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Failure message, or a diagnostic on success
    pub msg: String,
    /// Whether the module changed anything
    pub changed: bool,
    /// Whether the module failed
    pub failed: bool,
    /// Module-specific result data
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub info: Map<String, Value>,
    /// Non-fatal problems the runner should display
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl Response {
    /// Create an empty response
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a failed response carrying a message
    pub fn failure(msg: impl Into<String>) -> Self {
        Self { msg: msg.into(), failed: true, ..Self::default() }
    }

    /// Set an `info` entry
    pub fn insert_info(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.info.insert(key.into(), value.into());
    }

    /// Process exit code for this response
    pub fn exit_code(&self) -> i32 {
        if self.failed {
            1
        } else {
            0
        }
    }

    /// Serialize as a single line, falling back to a fixed failure object
    pub fn to_json_line(&self) -> Vec<u8> {
        let mut line = serde_json::to_vec(self).unwrap_or_else(|_| {
            br#"{"msg":"Invalid response object","changed":false,"failed":true}"#.to_vec()
        });
        line.push(b'\n');
        line
    }

    /// Write the response line and return the exit code to use
    pub fn emit(&self, out: &mut impl Write) -> std::io::Result<i32> {
        out.write_all(&self.to_json_line())?;
        out.flush()?;
        Ok(self.exit_code())
    }

    /// Report success: marks the response changed and exits the process
    pub fn exit_json(mut self) -> ! {
        self.failed = false;
        self.changed = true;
        self.finish()
    }

    /// Report failure and exit the process
    pub fn fail_json(mut self) -> ! {
        self.failed = true;
        self.changed = false;
        self.finish()
    }

    fn finish(self) -> ! {
        let code = self.emit(&mut std::io::stdout().lock()).unwrap_or(1);
        std::process::exit(code)
    }
}
