// ABOUTME: Records exchanged with the remote app store and the execution settings
// ABOUTME: Snapshot, comment, action and data-file descriptor types shared by every package

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of record persisted in the append-only app data store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppDataType {
    LiveCode,
    BotComment,
}

impl AppDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppDataType::LiveCode => "live_code",
            AppDataType::BotComment => "bot_comment",
        }
    }
}

/// Kind of telemetry action posted to the action sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    InitializeExecution,
    RunCode,
    StopExecution,
    StopExecutionDuringPrompt,
    ClearOutput,
    SaveCode,
    SubmittedInput,
    CancelPrompt,
    BotRunfeedback,
    CreateComment,
    NewFigure,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::InitializeExecution => "initialize_execution",
            ActionType::RunCode => "run_code",
            ActionType::StopExecution => "stop_execution",
            ActionType::StopExecutionDuringPrompt => "stop_execution_during_prompt",
            ActionType::ClearOutput => "clear_output",
            ActionType::SaveCode => "save_code",
            ActionType::SubmittedInput => "submitted_input",
            ActionType::CancelPrompt => "cancel_prompt",
            ActionType::BotRunfeedback => "bot_runfeedback",
            ActionType::CreateComment => "create_comment",
            ActionType::NewFigure => "new_figure",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted app data record as returned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppData {
    pub id: String,
    #[serde(rename = "type")]
    pub data_type: AppDataType,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Payload for appending a record to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAppData {
    #[serde(rename = "type")]
    pub data_type: AppDataType,
    pub data: Value,
}

/// Fire-and-forget telemetry record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppAction {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub data: Value,
}

impl AppAction {
    pub fn new(action_type: ActionType, data: Value) -> Self {
        Self { action_type, data }
    }
}

/// Payload of a `LiveCode` snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeVersion {
    pub code: String,
}

/// A line comment attached to a code snapshot.
///
/// Field names on the wire follow the store schema: the author travels as
/// `codeId` and the parent comment as `parent`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub line: u32,
    #[serde(rename = "parent")]
    pub parent_id: Option<String>,
    #[serde(rename = "codeId")]
    pub author_id: String,
    pub content: String,
}

/// Execution settings configured by the instructor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeExecutionSettings {
    #[serde(default)]
    pub header_code: String,
    #[serde(default)]
    pub footer_code: String,
    /// Space separated package names installed before the first run
    #[serde(default)]
    pub pre_loaded_libraries: String,
}

impl CodeExecutionSettings {
    pub fn preloaded_packages(&self) -> Vec<String> {
        crate::utils::parse_package_list(&self.pre_loaded_libraries)
    }
}

/// Maps an uploaded file setting onto a path inside the sandbox filesystem
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFileDescriptor {
    pub app_setting_id: String,
    pub virtual_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFileListSettings {
    #[serde(default)]
    pub files: Vec<DataFileDescriptor>,
}

/// An uploaded file known to the remote store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileSetting {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_comment_uses_store_field_names() {
        let comment = Comment {
            line: 0,
            parent_id: None,
            author_id: "instructor".to_string(),
            content: "use a loop".to_string(),
        };
        let value = serde_json::to_value(&comment).unwrap();
        assert_eq!(
            value,
            json!({"line": 0, "parent": null, "codeId": "instructor", "content": "use a loop"})
        );
    }

    #[test]
    fn test_action_type_matches_wire_name() {
        let action = AppAction::new(ActionType::StopExecutionDuringPrompt, json!({}));
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["type"], ActionType::StopExecutionDuringPrompt.as_str());
    }

    #[test]
    fn test_execution_settings_defaults_missing_fields() {
        let settings: CodeExecutionSettings =
            serde_json::from_str(r#"{"headerCode": "import math"}"#).unwrap();
        assert_eq!(settings.header_code, "import math");
        assert!(settings.footer_code.is_empty());
        assert!(settings.preloaded_packages().is_empty());
    }

    #[test]
    fn test_data_file_descriptor_camel_case() {
        let list: DataFileListSettings = serde_json::from_value(json!({
            "files": [{"appSettingId": "s1", "virtualPath": "data/a.csv"}]
        }))
        .unwrap();
        assert_eq!(list.files[0].app_setting_id, "s1");
        assert_eq!(list.files[0].virtual_path, "data/a.csv");
    }
}
