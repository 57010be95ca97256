/// Author id stamped on every comment produced by the automated reviewer
pub const INSTRUCTOR_CODE_ID: &str = "instructor";

/// Verdict the review service returns when it has nothing to say
pub const NO_FEEDBACK_VERDICT: &str = "no";

/// Period between two unsolicited review firings
pub const DEFAULT_REVIEW_INTERVAL_SECS: u64 = 10;

/// Instruction sent ahead of the code snapshot in every review request
pub const REVIEW_INSTRUCTION: &str =
    "What do you think about this code? If you think the code is working, answer only with \"no\"";
