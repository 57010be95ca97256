// ABOUTME: Core types, constants, and utilities for the tutor execution engine
// ABOUTME: Foundational package providing shared records across all tutor packages

pub mod constants;
pub mod types;
pub mod utils;

// Re-export main types
pub use types::{
    ActionType, AppAction, AppData, AppDataType, CodeExecutionSettings, CodeVersion, Comment,
    DataFileDescriptor, DataFileListSettings, FileSetting, NewAppData,
};

// Re-export constants
pub use constants::{
    DEFAULT_REVIEW_INTERVAL_SECS, INSTRUCTOR_CODE_ID, NO_FEEDBACK_VERDICT, REVIEW_INSTRUCTION,
};

// Re-export utilities
pub use utils::{
    compose_program, is_no_feedback, latest_code, parse_package_list, review_snapshot,
    sort_newest_first,
};
