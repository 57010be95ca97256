// ABOUTME: Wire protocol spoken with the sandbox worker process
// ABOUTME: Newline-delimited JSON requests on stdin and events on stdout

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::session::{SandboxEventSink, SandboxStatus};

/// Requests sent to the worker
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerRequest {
    Ping,
    Preload { packages: Vec<String> },
    Run { code: String },
    Stop,
    /// `content` is base64 encoded
    PutFile { path: String, content: String },
    Input { text: String },
    CancelInput,
    ClearOutput,
}

impl WorkerRequest {
    pub fn put_file(path: &str, content: &[u8]) -> Self {
        WorkerRequest::PutFile {
            path: path.to_string(),
            content: BASE64.encode(content),
        }
    }
}

/// Events received from the worker
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    Pong,
    Output {
        text: String,
        #[serde(default = "default_append")]
        append: bool,
    },
    Input {
        #[serde(default)]
        prompt: String,
    },
    Error {
        message: String,
    },
    Terminated,
    Figure {
        data: String,
    },
    Status {
        status: SandboxStatus,
    },
}

fn default_append() -> bool {
    true
}

impl WorkerEvent {
    /// Forward the event to a sink. Returns false for handshake events the
    /// sink has no method for.
    pub fn dispatch(self, sink: &dyn SandboxEventSink) -> bool {
        match self {
            WorkerEvent::Pong => return false,
            WorkerEvent::Output { text, append } => sink.on_output(&text, append),
            WorkerEvent::Input { prompt } => sink.on_input(&prompt),
            WorkerEvent::Error { message } => sink.on_error(&message),
            WorkerEvent::Terminated => sink.on_terminated(),
            WorkerEvent::Figure { data } => sink.on_figure(&data),
            WorkerEvent::Status { status } => sink.on_status_update(status),
        }
        true
    }
}
