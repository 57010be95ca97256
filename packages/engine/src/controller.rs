// ABOUTME: Session controller composing sandbox, console I/O, data files and review
// ABOUTME: Exposes the caller-facing operations and owns the one live sandbox session

use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tutor_ai::ReviewService;
use tutor_appdata::{ActionSink, CodeStore, FileContentSource};
use tutor_core::{
    compose_program, latest_code, review_snapshot, ActionType, AppData, AppDataType,
    CodeExecutionSettings, DataFileListSettings, FileSetting, NewAppData,
};
use tutor_sandbox::{SandboxFactory, SandboxSession};

use crate::error::Result;
use crate::io::{Interrupted, IoCoordinator};
use crate::provisioner::FileProvisioner;
use crate::review::{ReviewDispatcher, ReviewOutcome, ReviewScheduler};
use crate::state::{ConsoleEvent, ConsoleSnapshot, InputOutcome, ReplStatus, RunOutcome};
use crate::telemetry::ActionReporter;

/// Remote collaborators the engine talks to
#[derive(Clone)]
pub struct EngineServices {
    pub sandboxes: Arc<dyn SandboxFactory>,
    pub store: Arc<dyn CodeStore>,
    pub actions: Arc<dyn ActionSink>,
    pub files: Arc<dyn FileContentSource>,
    pub reviewer: Arc<dyn ReviewService>,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub settings: CodeExecutionSettings,
    /// Disables both the timer and the per-run review
    pub review_enabled: bool,
    pub review_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            settings: CodeExecutionSettings::default(),
            review_enabled: true,
            review_interval: Duration::from_secs(tutor_core::DEFAULT_REVIEW_INTERVAL_SECS),
        }
    }
}

/// Live sandbox handle tagged with the generation its events carry
#[derive(Clone)]
struct ActiveSession {
    generation: u64,
    handle: Arc<dyn SandboxSession>,
}

/// Editor buffer and the code last persisted or loaded
#[derive(Default)]
struct EditorBuffer {
    code: String,
    saved: String,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Root of the engine.
///
/// Exactly one sandbox session is live at a time; `clear` discards it and creates a
/// new one. Background work (preload, telemetry, reviews) never blocks an operation.
pub struct SessionController {
    sandboxes: Arc<dyn SandboxFactory>,
    store: Arc<dyn CodeStore>,
    reporter: ActionReporter,
    io: Arc<IoCoordinator>,
    provisioner: FileProvisioner,
    dispatcher: Arc<ReviewDispatcher>,
    scheduler: Mutex<ReviewScheduler>,
    options: EngineOptions,
    preloaded_packages: Vec<String>,
    editor: Arc<Mutex<EditorBuffer>>,
    session: Mutex<Option<ActiveSession>>,
    /// Serialises session creation and replacement
    lifecycle: tokio::sync::Mutex<()>,
    initialized: AtomicBool,
    review_timer_started: AtomicBool,
}

impl SessionController {
    pub fn new(services: EngineServices, options: EngineOptions) -> Self {
        let reporter = ActionReporter::new(services.actions.clone());
        let dispatcher = Arc::new(ReviewDispatcher::new(
            services.reviewer,
            services.store.clone(),
            reporter.clone(),
        ));
        Self {
            sandboxes: services.sandboxes,
            store: services.store,
            io: Arc::new(IoCoordinator::new(reporter.clone())),
            provisioner: FileProvisioner::new(services.files),
            dispatcher,
            scheduler: Mutex::new(ReviewScheduler::idle()),
            preloaded_packages: options.settings.preloaded_packages(),
            options,
            reporter,
            editor: Arc::new(Mutex::new(EditorBuffer::default())),
            session: Mutex::new(None),
            lifecycle: tokio::sync::Mutex::new(()),
            initialized: AtomicBool::new(false),
            review_timer_started: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleEvent> {
        self.io.subscribe()
    }

    pub fn snapshot(&self) -> ConsoleSnapshot {
        self.io.snapshot()
    }

    pub fn status(&self) -> ReplStatus {
        self.io.status()
    }

    pub fn set_code(&self, code: impl Into<String>) {
        lock(&self.editor).code = code.into();
    }

    pub fn code(&self) -> String {
        lock(&self.editor).code.clone()
    }

    /// True when the buffer matches the last saved or loaded code
    pub fn is_saved(&self) -> bool {
        let editor = lock(&self.editor);
        editor.code == editor.saved
    }

    /// Data files must be written into the sandbox before the next run
    pub fn reload_pending(&self) -> bool {
        self.provisioner.needs_reload()
    }

    pub fn is_review_timer_active(&self) -> bool {
        lock(&self.scheduler).is_active()
    }

    /// Start the review timer and create the first sandbox session.
    ///
    /// The timer starts on the first call. A session is created only if neither
    /// `initialize` nor `clear` has created one yet, and the return value says whether
    /// this call did. When the sandbox cannot be created the failure is logged and the
    /// status stays `Loading`; `clear` retries.
    pub async fn initialize(&self) -> bool {
        self.start_review_timer();

        let _guard = self.lifecycle.lock().await;
        if self.initialized.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!(
            "Initializing execution engine ({} preloaded package(s))",
            self.preloaded_packages.len()
        );
        let started = self.start_session().await;
        if started {
            self.reporter
                .report(ActionType::InitializeExecution, json!({}));
        }
        started
    }

    /// Start `header`, `body` and `footer` as one program.
    ///
    /// Also fires a review of `body` followed by `footer`.
    pub async fn run(&self, header: &str, body: &str, footer: &str) -> Result<RunOutcome> {
        let program = compose_program(header, body, footer);
        if program.trim().is_empty() {
            return Ok(RunOutcome::EmptyProgram);
        }
        let Some(ActiveSession {
            generation,
            handle: session,
        }) = self.current_session()
        else {
            return Ok(RunOutcome::NotReady(self.io.status()));
        };
        if let Err(status) = self.io.try_begin_run() {
            if status.is_executing() {
                return Ok(RunOutcome::AlreadyRunning);
            }
            return Ok(RunOutcome::NotReady(status));
        }

        if let Err(e) = session.clear_output().await {
            self.fail_run(generation, &e.to_string());
            return Err(e.into());
        }
        if let Err(e) = self.provisioner.materialize(session.as_ref()).await {
            warn!("Failed to load data files before run: {}", e);
        }
        if let Err(e) = session.run(&program).await {
            self.fail_run(generation, &e.to_string());
            return Err(e.into());
        }

        info!("Program started");
        self.reporter
            .report(ActionType::RunCode, json!({ "code": body }));
        if self.options.review_enabled {
            self.dispatcher.fire(review_snapshot(body, footer));
        }
        Ok(RunOutcome::Started)
    }

    /// Run the editor buffer with the configured header and footer
    pub async fn run_editor(&self) -> Result<RunOutcome> {
        let body = self.code();
        let settings = &self.options.settings;
        self.run(&settings.header_code, &body, &settings.footer_code)
            .await
    }

    /// Interrupt the running program or the pending prompt
    pub async fn stop(&self) -> Result<()> {
        let Some(session) = self.current_handle() else {
            return Ok(());
        };
        match self.io.interrupt() {
            Interrupted::Prompt(prompt) => {
                session.cancel_input().await?;
                session.stop().await?;
                info!("Stopped program during input prompt");
                self.reporter.report(
                    ActionType::StopExecutionDuringPrompt,
                    json!({ "prompt": prompt }),
                );
            }
            Interrupted::Execution => {
                session.stop().await?;
                info!("Stopped program");
                self.reporter
                    .report(ActionType::StopExecution, json!({ "code": self.code() }));
            }
            Interrupted::Nothing => {
                session.stop().await?;
            }
        }
        Ok(())
    }

    /// Discard the sandbox session and start a fresh one.
    ///
    /// Output and figures are emptied and data files are written again before the next run.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        self.initialized.store(true, Ordering::SeqCst);

        let retired = lock(&self.session).take();
        if let Some(retired) = retired {
            info!("Discarding sandbox session {}", retired.generation);
            if let Err(e) = retired.handle.shutdown().await {
                warn!("Failed to shut down sandbox session: {}", e);
            }
        }
        self.provisioner.mark_reload();
        self.start_session().await;
        self.reporter.report(ActionType::ClearOutput, json!({}));
        Ok(())
    }

    /// Append `code` to the remote store as a new snapshot
    pub async fn save(&self, code: &str) -> Result<AppData> {
        let stored = self
            .store
            .post_app_data(NewAppData {
                data_type: AppDataType::LiveCode,
                data: json!({ "code": code }),
            })
            .await?;
        lock(&self.editor).saved = code.to_string();
        info!("Saved code snapshot {}", stored.id);
        self.reporter
            .report(ActionType::SaveCode, json!({ "code": code }));
        Ok(stored)
    }

    /// Save the editor buffer
    pub async fn save_editor(&self) -> Result<AppData> {
        let code = self.code();
        self.save(&code).await
    }

    /// Answer the pending input prompt
    pub async fn submit_input(&self, text: &str) -> Result<InputOutcome> {
        let Some(session) = self.current_handle() else {
            return Ok(InputOutcome::NotWaiting);
        };
        if self.io.resolve_prompt().is_none() {
            return Ok(InputOutcome::NotWaiting);
        }
        session.submit_input(text).await?;
        self.reporter
            .report(ActionType::SubmittedInput, json!({ "input": text }));
        Ok(InputOutcome::Accepted)
    }

    /// Review the editor buffer now and wait for the verdict
    pub async fn request_review(&self) -> ReviewOutcome {
        let snapshot = review_snapshot(&self.code(), &self.options.settings.footer_code);
        self.dispatcher.review(&snapshot).await
    }

    /// Dismiss the pending input prompt; `text` is whatever had been typed so far
    pub async fn cancel_input(&self, text: &str) -> Result<InputOutcome> {
        let Some(session) = self.current_handle() else {
            return Ok(InputOutcome::NotWaiting);
        };
        if self.io.dismiss_prompt().is_none() {
            return Ok(InputOutcome::NotWaiting);
        }
        session.cancel_input().await?;
        session.stop().await?;
        self.reporter
            .report(ActionType::CancelPrompt, json!({ "input": text }));
        Ok(InputOutcome::Accepted)
    }

    /// Resolve the code to edit: the newest saved snapshot, else `seed`
    pub async fn load_current_code(&self, seed: Option<&str>) -> Result<String> {
        let records = self.store.list_app_data(AppDataType::LiveCode).await?;
        let code = latest_code(records, seed);
        let mut editor = lock(&self.editor);
        editor.code = code.clone();
        editor.saved = code.clone();
        Ok(code)
    }

    /// Run a provisioning cycle and write the files if a session is live.
    ///
    /// Returns the number of staged files.
    pub async fn provision_data_files(
        &self,
        settings: &[FileSetting],
        list: &DataFileListSettings,
    ) -> usize {
        let staged = self.provisioner.provision(settings, list).await;
        if let Some(session) = self.current_handle() {
            if let Err(e) = self.provisioner.materialize(session.as_ref()).await {
                warn!("Failed to load data files into the sandbox: {}", e);
            }
        }
        staged.len()
    }

    /// Stop the review timer, let fired reviews finish, stop the sandbox session and
    /// drain pending telemetry
    pub async fn shutdown(&self) {
        lock(&self.scheduler).shutdown();
        self.dispatcher.flush().await;
        let retired = lock(&self.session).take();
        if let Some(retired) = retired {
            if let Err(e) = retired.handle.shutdown().await {
                warn!("Failed to shut down sandbox session: {}", e);
            }
        }
        self.reporter.flush().await;
        info!("Execution engine shut down");
    }

    /// Reviews fired by runs or the timer that have not finished yet
    pub fn reviews_in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    fn start_review_timer(&self) {
        if !self.options.review_enabled || self.review_timer_started.swap(true, Ordering::SeqCst)
        {
            return;
        }
        let editor = self.editor.clone();
        let footer = self.options.settings.footer_code.clone();
        let scheduler = ReviewScheduler::start(
            self.dispatcher.clone(),
            self.options.review_interval,
            move || review_snapshot(&lock(&editor).code, &footer),
        );
        *lock(&self.scheduler) = scheduler;
    }

    /// Report a failed run unless `clear` replaced its session in the meantime
    fn fail_run(&self, generation: u64, message: &str) {
        if self.io.fail(generation, message) {
            error!("Failed to start program: {}", message);
        } else {
            warn!(
                "Run on retired sandbox session {} failed: {}",
                generation, message
            );
        }
    }

    fn current_session(&self) -> Option<ActiveSession> {
        lock(&self.session).clone()
    }

    fn current_handle(&self) -> Option<Arc<dyn SandboxSession>> {
        self.current_session().map(|active| active.handle)
    }

    /// Create a session for a new generation and preload it in the background
    async fn start_session(&self) -> bool {
        let generation = self.io.begin_session();
        let sink = self.io.sink_for(generation);
        let handle = match self.sandboxes.create(sink).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Failed to create sandbox session: {}", e);
                return false;
            }
        };

        *lock(&self.session) = Some(ActiveSession {
            generation,
            handle: handle.clone(),
        });

        let io = self.io.clone();
        let packages = self.preloaded_packages.clone();
        tokio::spawn(async move {
            if let Err(e) = handle.preload(&packages).await {
                error!("Sandbox preload failed: {}", e);
                io.fail(generation, &e.to_string());
            }
        });
        info!("Created sandbox session {}", generation);
        true
    }
}
