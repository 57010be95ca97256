// ABOUTME: In-memory doubles of the remote collaborators for tests
// ABOUTME: Records posted data and actions, serves files from a map, can simulate outages

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tutor_core::{ActionType, AppAction, AppData, AppDataType, NewAppData};

use crate::error::{AppDataError, AppDataResult};
use crate::store::{ActionSink, CodeStore, FileContentSource};

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Implements every remote interface against process memory
#[derive(Default)]
pub struct InMemoryAppData {
    records: Mutex<Vec<AppData>>,
    actions: Mutex<Vec<AppAction>>,
    files: Mutex<HashMap<String, Bytes>>,
    file_fetches: Mutex<Vec<String>>,
    next_id: AtomicUsize,
    store_offline: AtomicBool,
}

impl InMemoryAppData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing record, e.g. a previously saved snapshot
    pub fn insert(&self, record: AppData) {
        lock(&self.records).push(record);
    }

    pub fn add_file(&self, setting_id: &str, content: impl Into<Bytes>) {
        lock(&self.files).insert(setting_id.to_string(), content.into());
    }

    /// Make the store reject writes and reads
    pub fn set_store_offline(&self, offline: bool) {
        self.store_offline.store(offline, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<AppData> {
        lock(&self.records).clone()
    }

    pub fn records_of(&self, data_type: AppDataType) -> Vec<AppData> {
        self.records()
            .into_iter()
            .filter(|r| r.data_type == data_type)
            .collect()
    }

    pub fn actions(&self) -> Vec<AppAction> {
        lock(&self.actions).clone()
    }

    pub fn actions_of(&self, action_type: ActionType) -> Vec<AppAction> {
        self.actions()
            .into_iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    /// Setting ids requested from the file endpoint, in request order
    pub fn file_fetches(&self) -> Vec<String> {
        lock(&self.file_fetches).clone()
    }

    fn check_online(&self) -> AppDataResult<()> {
        if self.store_offline.load(Ordering::SeqCst) {
            return Err(AppDataError::Network("store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CodeStore for InMemoryAppData {
    async fn post_app_data(&self, record: NewAppData) -> AppDataResult<AppData> {
        self.check_online()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = AppData {
            id: format!("data-{}", id),
            data_type: record.data_type,
            data: record.data,
            created_at: Utc::now(),
        };
        lock(&self.records).push(stored.clone());
        Ok(stored)
    }

    async fn list_app_data(&self, data_type: AppDataType) -> AppDataResult<Vec<AppData>> {
        self.check_online()?;
        Ok(self.records_of(data_type))
    }
}

#[async_trait]
impl ActionSink for InMemoryAppData {
    async fn post_action(&self, action: AppAction) -> AppDataResult<()> {
        lock(&self.actions).push(action);
        Ok(())
    }
}

#[async_trait]
impl FileContentSource for InMemoryAppData {
    async fn file_content(&self, setting_id: &str) -> AppDataResult<Bytes> {
        lock(&self.file_fetches).push(setting_id.to_string());
        lock(&self.files)
            .get(setting_id)
            .cloned()
            .ok_or_else(|| AppDataError::NotFound(setting_id.to_string()))
    }
}
