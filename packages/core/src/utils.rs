// ABOUTME: Shared utility functions for the tutor engine
// ABOUTME: Program composition, review verdict normalisation, snapshot ordering

use crate::constants::NO_FEEDBACK_VERDICT;
use crate::types::{AppData, CodeVersion};

/// Join header, learner code and footer into the program sent to the sandbox
pub fn compose_program(header: &str, body: &str, footer: &str) -> String {
    format!("{}\n{}\n{}", header, body, footer)
}

/// Code the reviewer sees: the learner's buffer followed by the footer
pub fn review_snapshot(body: &str, footer: &str) -> String {
    format!("{}\n{}", body, footer)
}

/// True when the reviewer answered with the "nothing to add" verdict
pub fn is_no_feedback(verdict: &str) -> bool {
    verdict.trim().eq_ignore_ascii_case(NO_FEEDBACK_VERDICT)
}

/// Split a space separated package list, dropping empty entries
pub fn parse_package_list(raw: &str) -> Vec<String> {
    raw.split(' ')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Order app data from the most recent to the oldest
pub fn sort_newest_first(mut records: Vec<AppData>) -> Vec<AppData> {
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    records
}

/// Resolve the code the editor should start from.
///
/// The newest snapshot carrying a non-empty `code` wins; otherwise the seed.
pub fn latest_code(records: Vec<AppData>, seed: Option<&str>) -> String {
    sort_newest_first(records)
        .into_iter()
        .next()
        .and_then(|record| serde_json::from_value::<CodeVersion>(record.data).ok())
        .map(|version| version.code)
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| seed.unwrap_or_default().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AppDataType;
    use chrono::{Duration, Utc};
    use rstest::rstest;
    use serde_json::json;

    fn snapshot(id: &str, code: &str, age_secs: i64) -> AppData {
        AppData {
            id: id.to_string(),
            data_type: AppDataType::LiveCode,
            data: json!({ "code": code }),
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_compose_program() {
        assert_eq!(compose_program("", "print(1)", ""), "\nprint(1)\n");
        assert_eq!(
            compose_program("import os", "x = 1", "print(x)"),
            "import os\nx = 1\nprint(x)"
        );
    }

    #[test]
    fn test_review_snapshot() {
        assert_eq!(review_snapshot("print(1)", ""), "print(1)\n");
    }

    #[rstest]
    #[case("no", true)]
    #[case("No", true)]
    #[case("NO\n", true)]
    #[case("no, use a loop", false)]
    #[case("", false)]
    #[case("nope", false)]
    fn test_is_no_feedback(#[case] verdict: &str, #[case] expected: bool) {
        assert_eq!(is_no_feedback(verdict), expected);
    }

    #[test]
    fn test_parse_package_list() {
        assert_eq!(
            parse_package_list("numpy  pandas matplotlib "),
            vec!["numpy", "pandas", "matplotlib"]
        );
        assert!(parse_package_list("").is_empty());
    }

    #[test]
    fn test_latest_code_prefers_newest_snapshot() {
        let records = vec![
            snapshot("a", "old", 60),
            snapshot("b", "newest", 1),
            snapshot("c", "middle", 30),
        ];
        assert_eq!(latest_code(records, Some("seed")), "newest");
    }

    #[test]
    fn test_latest_code_falls_back_to_seed() {
        assert_eq!(latest_code(vec![], Some("seed")), "seed");
        assert_eq!(latest_code(vec![], None), "");
    }
}
