// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names read by the tutor engine

// Remote App API
pub const TUTOR_API_HOST: &str = "TUTOR_API_HOST";
pub const TUTOR_ITEM_ID: &str = "TUTOR_ITEM_ID";
pub const TUTOR_API_TOKEN: &str = "TUTOR_API_TOKEN";
pub const TUTOR_HTTP_TIMEOUT_SECS: &str = "TUTOR_HTTP_TIMEOUT_SECS";

// Automated Review
pub const TUTOR_REVIEW_ENABLED: &str = "TUTOR_REVIEW_ENABLED";
pub const TUTOR_REVIEW_INTERVAL_SECS: &str = "TUTOR_REVIEW_INTERVAL_SECS";

// Sandbox Worker
pub const TUTOR_WORKER_COMMAND: &str = "TUTOR_WORKER_COMMAND";
pub const TUTOR_BOOT_TIMEOUT_SECS: &str = "TUTOR_BOOT_TIMEOUT_SECS";
pub const TUTOR_PRELOADED_PACKAGES: &str = "TUTOR_PRELOADED_PACKAGES";

// Execution Settings
pub const TUTOR_HEADER_CODE: &str = "TUTOR_HEADER_CODE";
pub const TUTOR_FOOTER_CODE: &str = "TUTOR_FOOTER_CODE";
