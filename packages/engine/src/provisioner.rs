// ABOUTME: Data file provisioning into the sandbox virtual filesystem
// ABOUTME: Fetches remote file contents once per descriptor set and writes them on demand

use bytes::Bytes;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use tutor_appdata::FileContentSource;
use tutor_core::{DataFileDescriptor, DataFileListSettings, FileSetting};
use tutor_sandbox::SandboxSession;

use crate::error::Result;

/// File staged for the sandbox filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub virtual_path: String,
    pub content: Bytes,
}

struct ProvisionState {
    /// Descriptor set of the last completed cycle
    descriptors: Option<BTreeSet<DataFileDescriptor>>,
    /// Present once every requested file has resolved
    staged: Option<Arc<Vec<DataFile>>>,
    reload: bool,
}

pub struct FileProvisioner {
    source: Arc<dyn FileContentSource>,
    state: Mutex<ProvisionState>,
}

impl FileProvisioner {
    pub fn new(source: Arc<dyn FileContentSource>) -> Self {
        Self {
            source,
            state: Mutex::new(ProvisionState {
                descriptors: None,
                staged: None,
                reload: true,
            }),
        }
    }

    /// Run a provisioning cycle for the uploaded file settings.
    ///
    /// Only settings listed in `list` are fetched; the rest have no virtual path and are
    /// skipped. A cycle with the same descriptor set as the last one reuses the staged files.
    pub async fn provision(
        &self,
        settings: &[FileSetting],
        list: &DataFileListSettings,
    ) -> Arc<Vec<DataFile>> {
        let requested: Vec<DataFileDescriptor> = settings
            .iter()
            .filter_map(|setting| {
                let descriptor = list
                    .files
                    .iter()
                    .find(|file| file.app_setting_id == setting.id);
                if descriptor.is_none() {
                    debug!("No virtual path for data file {}, skipping", setting.id);
                }
                descriptor.cloned()
            })
            .collect();
        let key: BTreeSet<DataFileDescriptor> = requested.iter().cloned().collect();

        if let Some(staged) = self.cached(&key) {
            debug!("Data file descriptors unchanged, reusing {} staged file(s)", staged.len());
            return staged;
        }

        info!("Fetching {} data file(s)", requested.len());
        let fetches = requested.into_iter().map(|descriptor| async move {
            debug!("Loading data file (id: {})", descriptor.app_setting_id);
            match self.source.file_content(&descriptor.app_setting_id).await {
                Ok(content) => Some(DataFile {
                    virtual_path: descriptor.virtual_path,
                    content,
                }),
                Err(e) => {
                    warn!(
                        "Dropping data file {}: {}",
                        descriptor.app_setting_id, e
                    );
                    None
                }
            }
        });
        let files: Vec<DataFile> = join_all(fetches).await.into_iter().flatten().collect();
        let staged = Arc::new(files);

        let mut state = self.lock();
        state.descriptors = Some(key);
        state.staged = Some(staged.clone());
        state.reload = true;
        staged
    }

    /// Require the staged files to be written again, e.g. after the session was recreated
    pub fn mark_reload(&self) {
        self.lock().reload = true;
    }

    pub fn needs_reload(&self) -> bool {
        self.lock().reload
    }

    /// Write staged files into `session` when a cycle is ready and a reload is pending.
    ///
    /// Returns the number of files written.
    pub async fn materialize(&self, session: &dyn SandboxSession) -> Result<usize> {
        let files = {
            let mut state = self.lock();
            let Some(staged) = state.staged.clone() else {
                return Ok(0);
            };
            if !state.reload {
                return Ok(0);
            }
            state.reload = false;
            staged
        };

        info!("Loading {} data file(s) into the sandbox filesystem", files.len());
        for file in files.iter() {
            if let Err(e) = session.put_file(&file.virtual_path, &file.content).await {
                self.lock().reload = true;
                return Err(e.into());
            }
        }
        Ok(files.len())
    }

    fn cached(&self, key: &BTreeSet<DataFileDescriptor>) -> Option<Arc<Vec<DataFile>>> {
        let state = self.lock();
        match (&state.descriptors, &state.staged) {
            (Some(previous), Some(staged)) if previous == key => Some(staged.clone()),
            _ => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProvisionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
