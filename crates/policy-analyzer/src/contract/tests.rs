//! Unit tests for diagnostic contract checks.

use rstest::rstest;

use super::*;
use crate::diagnostic::PolicyIdentity;

const BUCKET: &str = "urn:a::bucket";
const QUEUE: &str = "urn:a::queue";

fn resources() -> Vec<AnalyzerResource> {
    vec![
        AnalyzerResource::new(BUCKET, "aws:s3/bucket", "bucket"),
        AnalyzerResource::new(QUEUE, "aws:sqs/queue", "queue"),
    ]
}

fn diagnostic(policy: &str, urn: &str, level: EnforcementLevel) -> AnalyzeDiagnostic {
    AnalyzeDiagnostic::new(
        PolicyIdentity::new(policy, "pack", "1.0.0"),
        urn,
        level,
        "message",
    )
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[rstest]
#[case::advisory(diagnostic("p", BUCKET, EnforcementLevel::Advisory))]
#[case::mandatory(diagnostic("p", BUCKET, EnforcementLevel::Mandatory))]
fn well_formed_diagnostic_passes(#[case] diagnostic: AnalyzeDiagnostic) {
    let set = resources();
    let bucket = set.first().expect("bucket");
    assert_eq!(DiagnosticValidator::for_resource(bucket).check(&diagnostic), Ok(()));
}

#[test]
fn disabled_level_is_a_violation() {
    let set = resources();
    let bucket = set.first().expect("bucket");
    let result = DiagnosticValidator::for_resource(bucket)
        .check(&diagnostic("p", BUCKET, EnforcementLevel::Disabled));
    assert!(matches!(
        result,
        Err(ContractViolation::DisabledDiagnostic { ref policy, .. }) if policy == "p"
    ));
}

#[test]
fn per_resource_call_rejects_other_subjects() {
    let set = resources();
    let bucket = set.first().expect("bucket");
    let result = DiagnosticValidator::for_resource(bucket)
        .check(&diagnostic("p", QUEUE, EnforcementLevel::Advisory));
    assert!(matches!(
        result,
        Err(ContractViolation::UnknownSubject { ref urn, .. }) if urn.as_str() == QUEUE
    ));
}

#[rstest]
#[case::first(BUCKET)]
#[case::second(QUEUE)]
fn stack_call_accepts_any_member(#[case] urn: &str) {
    let set = resources();
    let validator = DiagnosticValidator::for_stack(&set);
    assert!(validator.check(&diagnostic("p", urn, EnforcementLevel::Advisory)).is_ok());
}

#[test]
fn stack_call_rejects_strangers() {
    let set = resources();
    let result = DiagnosticValidator::for_stack(&set)
        .check(&diagnostic("p", "urn:a::ghost", EnforcementLevel::Advisory));
    assert!(matches!(result, Err(ContractViolation::UnknownSubject { .. })));
}

#[test]
fn missing_identity_is_reported_before_other_problems() {
    let set = resources();
    let bucket = set.first().expect("bucket");
    let result = DiagnosticValidator::for_resource(bucket)
        .check(&diagnostic("", "urn:a::ghost", EnforcementLevel::Disabled));
    assert!(matches!(
        result,
        Err(ContractViolation::MissingPolicyIdentity { field: "policy name", .. })
    ));
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

fn mixed_batch() -> Vec<AnalyzeDiagnostic> {
    vec![
        diagnostic("first", BUCKET, EnforcementLevel::Mandatory),
        diagnostic("stray", "urn:a::ghost", EnforcementLevel::Advisory),
        diagnostic("second", QUEUE, EnforcementLevel::Advisory),
    ]
}

#[test]
fn reject_fails_on_first_violation() {
    let set = resources();
    let error = DiagnosticValidator::for_stack(&set)
        .apply("baseline", ViolationPolicy::Reject, mixed_batch())
        .expect_err("stray diagnostic is rejected");
    assert_eq!(error.analyzer(), "baseline");
    assert!(matches!(
        error,
        AnalyzerError::ContractViolation {
            violation: ContractViolation::UnknownSubject { ref policy, .. },
            ..
        } if policy == "stray"
    ));
}

#[test]
fn discard_drops_violations_and_keeps_order() {
    let set = resources();
    let accepted = DiagnosticValidator::for_stack(&set)
        .apply("baseline", ViolationPolicy::Discard, mixed_batch())
        .expect("discard never fails");
    let names: Vec<&str> = accepted.iter().map(AnalyzeDiagnostic::policy_name).collect();
    assert_eq!(names, ["first", "second"]);
}

#[rstest]
#[case::reject("reject", ViolationPolicy::Reject)]
#[case::discard("DISCARD", ViolationPolicy::Discard)]
fn violation_policy_parses(#[case] input: &str, #[case] expected: ViolationPolicy) {
    assert_eq!(input.parse::<ViolationPolicy>().expect("known policy"), expected);
}

#[test]
fn violation_policy_defaults_to_reject() {
    assert_eq!(ViolationPolicy::default(), ViolationPolicy::Reject);
}
