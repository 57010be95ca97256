// ABOUTME: In-process sandbox doubles for tests
// ABOUTME: Records every command and lets a test emit sandbox events by hand

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{Result, SandboxError};
use crate::session::{SandboxEventSink, SandboxFactory, SandboxSession, SandboxStatus};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Command received by a [`ScriptedSandbox`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxCall {
    Preload(Vec<String>),
    Run(String),
    Stop,
    PutFile(String, Vec<u8>),
    SubmitInput(String),
    CancelInput,
    ClearOutput,
    Shutdown,
}

/// Sink that flattens every event into a string, for ordering assertions
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<String> {
        lock(&self.events).clone()
    }

    fn push(&self, event: String) {
        lock(&self.events).push(event);
    }
}

impl SandboxEventSink for RecordingSink {
    fn on_output(&self, chunk: &str, append: bool) {
        self.push(format!("output:{}:{}", chunk, append));
    }

    fn on_input(&self, prompt: &str) {
        self.push(format!("input:{}", prompt));
    }

    fn on_error(&self, message: &str) {
        self.push(format!("error:{}", message));
    }

    fn on_terminated(&self) {
        self.push("terminated".to_string());
    }

    fn on_figure(&self, data: &str) {
        self.push(format!("figure:{}", data));
    }

    fn on_status_update(&self, status: SandboxStatus) {
        self.push(format!("status:{}", status.as_str()));
    }
}

/// A sandbox that does nothing on its own.
///
/// It records commands; tests drive the event side with the `emit_*` methods.
pub struct ScriptedSandbox {
    sink: Arc<dyn SandboxEventSink>,
    calls: Mutex<Vec<SandboxCall>>,
    ready_on_preload: bool,
    clear_output_delay: Duration,
    shut_down: AtomicBool,
}

impl ScriptedSandbox {
    pub fn new(sink: Arc<dyn SandboxEventSink>, ready_on_preload: bool) -> Self {
        Self {
            sink,
            calls: Mutex::new(Vec::new()),
            ready_on_preload,
            clear_output_delay: Duration::ZERO,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Make `clear_output` take `delay` before it is acknowledged
    pub fn with_clear_output_delay(mut self, delay: Duration) -> Self {
        self.clear_output_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<SandboxCall> {
        lock(&self.calls).clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn emit_output(&self, chunk: &str, append: bool) {
        self.sink.on_output(chunk, append);
    }

    pub fn emit_input(&self, prompt: &str) {
        self.sink.on_input(prompt);
    }

    pub fn emit_error(&self, message: &str) {
        self.sink.on_error(message);
    }

    pub fn emit_terminated(&self) {
        self.sink.on_terminated();
    }

    pub fn emit_figure(&self, data: &str) {
        self.sink.on_figure(data);
    }

    pub fn emit_status(&self, status: SandboxStatus) {
        self.sink.on_status_update(status);
    }

    fn record(&self, call: SandboxCall) -> Result<()> {
        if self.is_shut_down() {
            return Err(SandboxError::WorkerNotRunning);
        }
        lock(&self.calls).push(call);
        Ok(())
    }
}

#[async_trait]
impl SandboxSession for ScriptedSandbox {
    async fn preload(&self, packages: &[String]) -> Result<()> {
        self.record(SandboxCall::Preload(packages.to_vec()))?;
        if self.ready_on_preload {
            self.sink.on_status_update(SandboxStatus::Ready);
        }
        Ok(())
    }

    async fn run(&self, code: &str) -> Result<()> {
        self.record(SandboxCall::Run(code.to_string()))
    }

    async fn stop(&self) -> Result<()> {
        self.record(SandboxCall::Stop)
    }

    async fn put_file(&self, path: &str, content: &[u8]) -> Result<()> {
        self.record(SandboxCall::PutFile(path.to_string(), content.to_vec()))
    }

    async fn submit_input(&self, text: &str) -> Result<()> {
        self.record(SandboxCall::SubmitInput(text.to_string()))
    }

    async fn cancel_input(&self) -> Result<()> {
        self.record(SandboxCall::CancelInput)
    }

    async fn clear_output(&self) -> Result<()> {
        if !self.clear_output_delay.is_zero() {
            tokio::time::sleep(self.clear_output_delay).await;
        }
        self.record(SandboxCall::ClearOutput)
    }

    async fn shutdown(&self) -> Result<()> {
        self.record(SandboxCall::Shutdown)?;
        self.shut_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out [`ScriptedSandbox`] instances and keeping them for inspection
pub struct ScriptedFactory {
    sessions: Mutex<Vec<Arc<ScriptedSandbox>>>,
    ready_on_preload: bool,
    fail_create: AtomicBool,
    clear_output_delay: Mutex<Duration>,
}

impl ScriptedFactory {
    /// Sessions report `ready` as soon as they are preloaded
    pub fn new() -> Self {
        Self::with_boot(true)
    }

    /// Sessions stay in their loading state until a test emits a status
    pub fn stalled() -> Self {
        Self::with_boot(false)
    }

    fn with_boot(ready_on_preload: bool) -> Self {
        Self {
            sessions: Mutex::new(Vec::new()),
            ready_on_preload,
            fail_create: AtomicBool::new(false),
            clear_output_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Sessions created from now on acknowledge `clear_output` only after `delay`
    pub fn set_clear_output_delay(&self, delay: Duration) {
        *lock(&self.clear_output_delay) = delay;
    }

    /// Make subsequent `create` calls fail as if the sandbox could not boot
    pub fn set_unreachable(&self, unreachable: bool) {
        self.fail_create.store(unreachable, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn session(&self, index: usize) -> Option<Arc<ScriptedSandbox>> {
        lock(&self.sessions).get(index).cloned()
    }

    pub fn latest(&self) -> Option<Arc<ScriptedSandbox>> {
        lock(&self.sessions).last().cloned()
    }
}

impl Default for ScriptedFactory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SandboxFactory for ScriptedFactory {
    async fn create(&self, sink: Arc<dyn SandboxEventSink>) -> Result<Arc<dyn SandboxSession>> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(SandboxError::WorkerStartFailed(
                "bootstrap resource unreachable".to_string(),
            ));
        }
        let delay = *lock(&self.clear_output_delay);
        let session = Arc::new(
            ScriptedSandbox::new(sink, self.ready_on_preload).with_clear_output_delay(delay),
        );
        lock(&self.sessions).push(session.clone());
        Ok(session)
    }
}
