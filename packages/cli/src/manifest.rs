// ABOUTME: Data file manifest read by `tutor run --data-files`
// ABOUTME: Lists uploaded file settings and the virtual paths they are mounted at

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tutor_core::{DataFileDescriptor, DataFileListSettings, FileSetting};

/// JSON manifest:
///
/// ```json
/// { "settings": [{"id": "s1", "name": "scores.csv"}],
///   "files": [{"appSettingId": "s1", "virtualPath": "data/scores.csv"}] }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DataFilesManifest {
    #[serde(default)]
    pub settings: Vec<FileSetting>,
    #[serde(default)]
    pub files: Vec<DataFileDescriptor>,
}

impl DataFilesManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read data file manifest {}", path.display()))?;
        Self::parse(&raw)
            .with_context(|| format!("Invalid data file manifest {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn list(&self) -> DataFileListSettings {
        DataFileListSettings {
            files: self.files.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_parse_manifest() {
        let manifest = DataFilesManifest::parse(
            r#"{
                "settings": [{"id": "s1", "name": "scores.csv"}],
                "files": [{"appSettingId": "s1", "virtualPath": "data/scores.csv"}]
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.settings[0].id, "s1");
        assert_eq!(
            manifest.list().files,
            vec![DataFileDescriptor {
                app_setting_id: "s1".to_string(),
                virtual_path: "data/scores.csv".to_string(),
            }]
        );
    }

    #[test]
    fn test_empty_manifest() {
        assert_eq!(
            DataFilesManifest::parse("{}").unwrap(),
            DataFilesManifest::default()
        );
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let err = DataFilesManifest::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid data file manifest"));
    }
}
