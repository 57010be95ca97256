// ABOUTME: Shared fixtures for engine integration tests
// ABOUTME: Builds a controller wired to scripted sandboxes, in-memory remote data and a canned reviewer

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;
use tutor_ai::testing::CannedReviewer;
use tutor_appdata::testing::InMemoryAppData;
use tutor_core::CodeExecutionSettings;
use tutor_engine::{EngineOptions, EngineServices, SessionController};
use tutor_sandbox::testing::{ScriptedFactory, ScriptedSandbox};

pub struct Harness {
    pub controller: SessionController,
    pub sandboxes: Arc<ScriptedFactory>,
    pub remote: Arc<InMemoryAppData>,
    pub reviewer: Arc<CannedReviewer>,
}

impl Harness {
    pub fn build(
        sandboxes: ScriptedFactory,
        reviewer: CannedReviewer,
        options: EngineOptions,
    ) -> Self {
        let sandboxes = Arc::new(sandboxes);
        let remote = Arc::new(InMemoryAppData::new());
        let reviewer = Arc::new(reviewer);
        let services = EngineServices {
            sandboxes: sandboxes.clone(),
            store: remote.clone(),
            actions: remote.clone(),
            files: remote.clone(),
            reviewer: reviewer.clone(),
        };
        Self {
            controller: SessionController::new(services, options),
            sandboxes,
            remote,
            reviewer,
        }
    }

    /// Review disabled, sandboxes report ready once preloaded
    pub fn quiet() -> Self {
        Self::build(ScriptedFactory::new(), CannedReviewer::replying("no"), quiet_options())
    }

    /// Current sandbox session
    pub fn sandbox(&self) -> Arc<ScriptedSandbox> {
        self.sandboxes.latest().expect("no sandbox session was created")
    }
}

pub fn quiet_options() -> EngineOptions {
    quiet_with(CodeExecutionSettings::default())
}

pub fn quiet_with(settings: CodeExecutionSettings) -> EngineOptions {
    EngineOptions {
        settings,
        review_enabled: false,
        ..EngineOptions::default()
    }
}

/// Review enabled with a timer too slow to fire during a test
pub fn reviewing_options(settings: CodeExecutionSettings) -> EngineOptions {
    EngineOptions {
        settings,
        review_enabled: true,
        review_interval: Duration::from_secs(3600),
    }
}

/// Let spawned background work (preload, telemetry, reviews) finish
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

/// Initialized harness whose sandbox has finished booting
pub async fn booted(harness: Harness) -> Harness {
    harness.controller.initialize().await;
    settle().await;
    harness
}
