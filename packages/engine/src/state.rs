// ABOUTME: Session state machine and the caller-visible console state
// ABOUTME: Defines controller statuses, console events and the snapshot readers receive

use std::fmt;

/// Lifecycle status of the active execution session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplStatus {
    /// Sandbox environment is booting
    Loading,
    Ready,
    Running,
    /// Program is suspended on an input prompt
    WaitingForInput,
    Stopped,
    Error,
}

impl ReplStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplStatus::Loading => "loading",
            ReplStatus::Ready => "ready",
            ReplStatus::Running => "running",
            ReplStatus::WaitingForInput => "waiting_for_input",
            ReplStatus::Stopped => "stopped",
            ReplStatus::Error => "error",
        }
    }

    /// Statuses a new run may start from
    pub fn can_run(&self) -> bool {
        matches!(
            self,
            ReplStatus::Ready | ReplStatus::Stopped | ReplStatus::Error
        )
    }

    /// A program is live in the sandbox
    pub fn is_executing(&self) -> bool {
        matches!(self, ReplStatus::Running | ReplStatus::WaitingForInput)
    }
}

impl fmt::Display for ReplStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change published to console subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleEvent {
    Status(ReplStatus),
    Output { text: String, append: bool },
    /// Output and figures were wiped
    Cleared,
    InputRequested { prompt: String },
    InputResolved,
    Figure(String),
    Error(String),
}

/// Point-in-time copy of everything a console renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleSnapshot {
    pub status: ReplStatus,
    pub output: String,
    pub figures: Vec<String>,
    /// Pending input prompt, present only while waiting for input
    pub prompt: Option<String>,
    pub last_error: Option<String>,
}

impl ConsoleSnapshot {
    pub fn is_waiting_for_input(&self) -> bool {
        self.prompt.is_some()
    }
}

impl Default for ConsoleSnapshot {
    fn default() -> Self {
        Self {
            status: ReplStatus::Loading,
            output: String::new(),
            figures: Vec::new(),
            prompt: None,
            last_error: None,
        }
    }
}

/// Why `run` did or did not start a program
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Started,
    /// A program is already running or waiting for input
    AlreadyRunning,
    /// No usable session, e.g. the sandbox is still booting
    NotReady(ReplStatus),
    /// Header, body and footer are blank
    EmptyProgram,
}

/// Result of answering or dismissing an input prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Accepted,
    /// No prompt was pending
    NotWaiting,
}
