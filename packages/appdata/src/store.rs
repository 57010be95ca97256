// ABOUTME: Interfaces to the remote collaborators of the engine
// ABOUTME: Snapshot store, telemetry sink and file content endpoint

use async_trait::async_trait;
use bytes::Bytes;
use tutor_core::{AppAction, AppData, AppDataType, NewAppData};

use crate::error::AppDataResult;

/// Append-only store for code snapshots and comments
#[async_trait]
pub trait CodeStore: Send + Sync {
    /// Append a record; existing records are never mutated
    async fn post_app_data(&self, record: NewAppData) -> AppDataResult<AppData>;

    /// All records of one kind, in store order
    async fn list_app_data(&self, data_type: AppDataType) -> AppDataResult<Vec<AppData>>;
}

/// Telemetry sink; no response contract beyond success or failure
#[async_trait]
pub trait ActionSink: Send + Sync {
    async fn post_action(&self, action: AppAction) -> AppDataResult<()>;
}

/// Download endpoint for files uploaded as app settings
#[async_trait]
pub trait FileContentSource: Send + Sync {
    async fn file_content(&self, setting_id: &str) -> AppDataResult<Bytes>;
}
