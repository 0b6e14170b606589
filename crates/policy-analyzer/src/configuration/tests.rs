//! Unit tests for the configuration handshake.

use rstest::rstest;

use super::*;

#[rstest]
#[case::blank_stack("", "infra", "stack name must not be empty")]
#[case::whitespace_stack("  ", "infra", "stack name must not be empty")]
#[case::blank_project("prod", "", "project name must not be empty")]
#[case::both_blank("", "", "stack name must not be empty")]
fn incomplete_configuration_is_rejected(
    #[case] stack: &str,
    #[case] project: &str,
    #[case] expected: &str,
) {
    let error = AnalyzerConfiguration::new(stack, project, false)
        .validate("baseline")
        .expect_err("invalid configuration");
    assert!(
        matches!(
            &error,
            AnalyzerError::Configuration { analyzer, message }
                if analyzer == "baseline" && message == expected
        ),
        "unexpected error: {error:?}"
    );
}

#[test]
fn dry_run_defaults_to_false_on_the_wire() {
    let config: AnalyzerConfiguration =
        serde_json::from_str(r#"{"stack_name":"prod","project_name":"infra"}"#)
            .expect("deserialise");
    assert!(!config.is_dry_run());
    assert!(config.validate("baseline").is_ok());
}
