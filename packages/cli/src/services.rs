// ABOUTME: Builds the engine's collaborators from the loaded configuration
// ABOUTME: Uses the remote app API when configured and local stand-ins otherwise

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tutor_ai::{ChatTurn, ChatbotClient, ReviewError, ReviewResponse, ReviewResult, ReviewService};
use tutor_appdata::{
    ActionSink, AppDataError, AppDataResult, AppsApiClient, CodeStore, FileContentSource,
};
use tutor_config::EngineConfig;
use tutor_core::{AppAction, AppData, AppDataType, CodeExecutionSettings, NewAppData};
use tutor_engine::{EngineOptions, EngineServices};
use tutor_sandbox::WorkerBridgeFactory;

/// Collaborators plus whether a remote app API backs them
pub struct Wiring {
    pub services: EngineServices,
    pub remote: bool,
}

pub fn build_services(config: &EngineConfig) -> Result<Wiring> {
    let sandboxes = Arc::new(WorkerBridgeFactory::new(
        config.worker_command.clone(),
        config.boot_timeout,
    ));

    let Some(endpoint) = config.remote() else {
        warn!("No remote app API configured; snapshots, telemetry and reviews are unavailable");
        let offline = Arc::new(OfflineRemote);
        return Ok(Wiring {
            services: EngineServices {
                sandboxes,
                store: offline.clone(),
                actions: offline.clone(),
                files: offline,
                reviewer: Arc::new(OfflineReviewer),
            },
            remote: false,
        });
    };

    info!("Using app API at {}", endpoint.api_host);
    let client = Arc::new(
        AppsApiClient::new(
            endpoint.api_host.clone(),
            endpoint.item_id.clone(),
            endpoint.token.clone(),
            config.http_timeout,
        )
        .context("Failed to create app API client")?,
    );
    let reviewer = ChatbotClient::new(
        &endpoint.api_host,
        &endpoint.item_id,
        &endpoint.token,
        config.http_timeout,
    )
    .context("Failed to create review client")?;

    Ok(Wiring {
        services: EngineServices {
            sandboxes,
            store: client.clone(),
            actions: client.clone(),
            files: client,
            reviewer: Arc::new(reviewer),
        },
        remote: true,
    })
}

/// Engine options from configuration; review needs a remote API
pub fn engine_options(config: &EngineConfig, remote: bool) -> EngineOptions {
    EngineOptions {
        settings: CodeExecutionSettings {
            header_code: config.header_code.clone(),
            footer_code: config.footer_code.clone(),
            pre_loaded_libraries: config.preloaded_packages.join(" "),
        },
        review_enabled: remote && config.review_enabled,
        review_interval: config.review_interval,
    }
}

/// Stand-in for the app API when none is configured
struct OfflineRemote;

#[async_trait]
impl CodeStore for OfflineRemote {
    async fn post_app_data(&self, _record: NewAppData) -> AppDataResult<AppData> {
        Err(AppDataError::config(
            "no remote app API configured (set TUTOR_API_HOST, TUTOR_ITEM_ID and TUTOR_API_TOKEN)",
        ))
    }

    async fn list_app_data(&self, _data_type: AppDataType) -> AppDataResult<Vec<AppData>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl ActionSink for OfflineRemote {
    async fn post_action(&self, action: AppAction) -> AppDataResult<()> {
        debug!("Offline, not posting {} action", action.action_type);
        Ok(())
    }
}

#[async_trait]
impl FileContentSource for OfflineRemote {
    async fn file_content(&self, setting_id: &str) -> AppDataResult<Bytes> {
        Err(AppDataError::NotFound(setting_id.to_string()))
    }
}

struct OfflineReviewer;

#[async_trait]
impl ReviewService for OfflineReviewer {
    async fn request(&self, _turns: Vec<ChatTurn>) -> ReviewResult<ReviewResponse> {
        Err(ReviewError::ApiError(
            "no remote app API configured".to_string(),
        ))
    }
}
