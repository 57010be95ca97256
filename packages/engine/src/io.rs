// ABOUTME: I/O coordinator between the sandbox session and the caller
// ABOUTME: Owns console state, the input handshake and stale-event fencing across sessions

use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tutor_core::ActionType;
use tutor_sandbox::{SandboxEventSink, SandboxStatus};

use crate::state::{ConsoleEvent, ConsoleSnapshot, ReplStatus};
use crate::telemetry::ActionReporter;

const EVENT_CHANNEL_SIZE: usize = 256;

/// What a stop request interrupted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupted {
    /// A pending prompt was dismissed
    Prompt(String),
    Execution,
    Nothing,
}

/// Single writer of the console state.
///
/// Sandbox events reach it through a [`SessionSink`] bound to one session
/// generation; events from earlier generations are dropped.
pub struct IoCoordinator {
    state: Mutex<ConsoleSnapshot>,
    generation: AtomicU64,
    events: broadcast::Sender<ConsoleEvent>,
    reporter: ActionReporter,
}

impl IoCoordinator {
    pub fn new(reporter: ActionReporter) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            state: Mutex::new(ConsoleSnapshot::default()),
            generation: AtomicU64::new(0),
            events,
            reporter,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        self.lock().clone()
    }

    pub fn status(&self) -> ReplStatus {
        self.lock().status
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Retire the current session and reset the console for a fresh one.
    ///
    /// Returns the generation the next session's events must carry.
    pub fn begin_session(&self) -> u64 {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = self.lock();
            *state = ConsoleSnapshot::default();
        }
        debug!("Console reset for session generation {}", generation);
        self.publish(ConsoleEvent::Cleared);
        self.publish(ConsoleEvent::Status(ReplStatus::Loading));
        generation
    }

    /// Event sink handed to the sandbox created for `generation`
    pub fn sink_for(self: &Arc<Self>, generation: u64) -> Arc<dyn SandboxEventSink> {
        Arc::new(SessionSink {
            generation,
            coordinator: self.clone(),
        })
    }

    /// Move to `Running` if a run may start, wiping output, figures and the last error.
    ///
    /// On refusal the current status is returned unchanged.
    pub fn try_begin_run(&self) -> Result<(), ReplStatus> {
        {
            let mut state = self.lock();
            if !state.status.can_run() {
                return Err(state.status);
            }
            state.status = ReplStatus::Running;
            state.output.clear();
            state.figures.clear();
            state.last_error = None;
        }
        self.publish(ConsoleEvent::Cleared);
        self.publish(ConsoleEvent::Status(ReplStatus::Running));
        Ok(())
    }

    /// Resolve the pending prompt with an answer, resuming the run
    pub fn resolve_prompt(&self) -> Option<String> {
        self.take_prompt(ReplStatus::Running)
    }

    /// Dismiss the pending prompt, returning to `Ready`
    pub fn dismiss_prompt(&self) -> Option<String> {
        self.take_prompt(ReplStatus::Ready)
    }

    /// Apply a stop request; idle and booting sessions are left as they are
    pub fn interrupt(&self) -> Interrupted {
        let status = self.status();
        match status {
            ReplStatus::WaitingForInput => match self.dismiss_prompt() {
                Some(prompt) => Interrupted::Prompt(prompt),
                None => Interrupted::Nothing,
            },
            ReplStatus::Running => {
                if self.transition(|s| s == ReplStatus::Running, ReplStatus::Ready) {
                    Interrupted::Execution
                } else {
                    Interrupted::Nothing
                }
            }
            _ => Interrupted::Nothing,
        }
    }

    /// Record a failure raised on the engine side of the boundary
    /// Put the session of `generation` into `Error`.
    ///
    /// Returns false and changes nothing when that session has already been replaced.
    pub fn fail(&self, generation: u64, message: &str) -> bool {
        {
            let mut state = self.lock();
            if !self.is_current(generation) {
                return false;
            }
            state.status = ReplStatus::Error;
            state.prompt = None;
            state.last_error = Some(message.to_string());
        }
        self.publish(ConsoleEvent::Error(message.to_string()));
        self.publish(ConsoleEvent::Status(ReplStatus::Error));
        true
    }

    fn take_prompt(&self, next: ReplStatus) -> Option<String> {
        let prompt = {
            let mut state = self.lock();
            if state.status != ReplStatus::WaitingForInput {
                return None;
            }
            state.status = next;
            state.prompt.take()
        };
        self.publish(ConsoleEvent::InputResolved);
        self.publish(ConsoleEvent::Status(next));
        Some(prompt.unwrap_or_default())
    }

    /// Set `next` when the current status satisfies `from`
    fn transition(&self, from: impl Fn(ReplStatus) -> bool, next: ReplStatus) -> bool {
        {
            let mut state = self.lock();
            if !from(state.status) || state.status == next {
                return false;
            }
            if next != ReplStatus::WaitingForInput {
                state.prompt = None;
            }
            state.status = next;
        }
        self.publish(ConsoleEvent::Status(next));
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        let current = self.generation();
        if generation != current {
            debug!(
                "Dropping event from retired session {} (current {})",
                generation, current
            );
            return false;
        }
        true
    }

    fn publish(&self, event: ConsoleEvent) {
        // Send only fails when nobody is subscribed
        let _ = self.events.send(event);
    }

    fn lock(&self) -> MutexGuard<'_, ConsoleSnapshot> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn on_output(&self, chunk: &str, append: bool) {
        {
            let mut state = self.lock();
            if !state.status.is_executing() {
                debug!("Ignoring output while {}", state.status);
                return;
            }
            if append {
                state.output.push_str(chunk);
            } else {
                state.output = chunk.to_string();
            }
        }
        self.publish(ConsoleEvent::Output {
            text: chunk.to_string(),
            append,
        });
    }

    fn on_input(&self, prompt: &str) {
        {
            let mut state = self.lock();
            if state.status != ReplStatus::Running {
                warn!("Ignoring input request while {}", state.status);
                return;
            }
            state.status = ReplStatus::WaitingForInput;
            state.prompt = Some(prompt.to_string());
        }
        self.publish(ConsoleEvent::InputRequested {
            prompt: prompt.to_string(),
        });
        self.publish(ConsoleEvent::Status(ReplStatus::WaitingForInput));
    }

    fn on_error(&self, message: &str) {
        warn!("Sandbox reported an error: {}", message);
        self.lock().last_error = Some(message.to_string());
        self.publish(ConsoleEvent::Error(message.to_string()));
    }

    fn on_terminated(&self) {
        if self.transition(|s| s.is_executing(), ReplStatus::Ready) {
            info!("Program terminated");
        }
    }

    fn on_figure(&self, data: &str) {
        {
            let mut state = self.lock();
            if !state.status.is_executing() {
                debug!("Ignoring figure while {}", state.status);
                return;
            }
            state.figures.push(data.to_string());
        }
        self.publish(ConsoleEvent::Figure(data.to_string()));
        self.reporter
            .report(ActionType::NewFigure, json!({ "figure": data }));
    }

    fn on_status_update(&self, status: SandboxStatus) {
        debug!("Sandbox status: {}", status.as_str());
        match status {
            SandboxStatus::Ready => {
                if self.transition(|s| s == ReplStatus::Loading, ReplStatus::Ready) {
                    info!("Sandbox is ready");
                }
            }
            SandboxStatus::Stopped => {
                self.transition(
                    |s| matches!(s, ReplStatus::Ready) || s.is_executing(),
                    ReplStatus::Stopped,
                );
            }
            SandboxStatus::Error => {
                self.transition(|_| true, ReplStatus::Error);
            }
            SandboxStatus::Loading
            | SandboxStatus::Installing
            | SandboxStatus::Running
            | SandboxStatus::WaitingInput => {}
        }
    }
}

/// Sink bound to one session generation
struct SessionSink {
    generation: u64,
    coordinator: Arc<IoCoordinator>,
}

impl SandboxEventSink for SessionSink {
    fn on_output(&self, chunk: &str, append: bool) {
        if self.coordinator.is_current(self.generation) {
            self.coordinator.on_output(chunk, append);
        }
    }

    fn on_input(&self, prompt: &str) {
        if self.coordinator.is_current(self.generation) {
            self.coordinator.on_input(prompt);
        }
    }

    fn on_error(&self, message: &str) {
        if self.coordinator.is_current(self.generation) {
            self.coordinator.on_error(message);
        }
    }

    fn on_terminated(&self) {
        if self.coordinator.is_current(self.generation) {
            self.coordinator.on_terminated();
        }
    }

    fn on_figure(&self, data: &str) {
        if self.coordinator.is_current(self.generation) {
            self.coordinator.on_figure(data);
        }
    }

    fn on_status_update(&self, status: SandboxStatus) {
        if self.coordinator.is_current(self.generation) {
            self.coordinator.on_status_update(status);
        }
    }
}
