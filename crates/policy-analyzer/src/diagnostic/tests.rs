//! Unit tests for diagnostic records.

use rstest::rstest;
use serde_json::json;

use super::*;

fn identity() -> PolicyIdentity {
    PolicyIdentity::new("no-public-buckets", "baseline", "1.0.0")
}

// ---------------------------------------------------------------------------
// EnforcementLevel
// ---------------------------------------------------------------------------

#[rstest]
#[case::advisory("advisory", EnforcementLevel::Advisory)]
#[case::mandatory("mandatory", EnforcementLevel::Mandatory)]
#[case::disabled("disabled", EnforcementLevel::Disabled)]
#[case::mixed_case("Mandatory", EnforcementLevel::Mandatory)]
fn level_parses(#[case] input: &str, #[case] expected: EnforcementLevel) {
    let level: EnforcementLevel = input.parse().expect("known level");
    assert_eq!(level, expected);
}

#[test]
fn unknown_level_is_rejected() {
    assert!("blocking".parse::<EnforcementLevel>().is_err());
}

#[rstest]
#[case::advisory(EnforcementLevel::Advisory, Disposition::Warning, false)]
#[case::mandatory(EnforcementLevel::Mandatory, Disposition::Blocking, true)]
#[case::disabled(EnforcementLevel::Disabled, Disposition::Anomaly, false)]
fn level_disposition(
    #[case] level: EnforcementLevel,
    #[case] disposition: Disposition,
    #[case] blocking: bool,
) {
    assert_eq!(level.disposition(), disposition);
    assert_eq!(level.is_blocking(), blocking);
    assert_eq!(level.to_string(), level.as_str());
}

#[test]
fn level_serialises_in_snake_case() {
    let json = serde_json::to_string(&EnforcementLevel::Mandatory).expect("serialise");
    assert_eq!(json, r#""mandatory""#);
}

// ---------------------------------------------------------------------------
// PolicyIdentity
// ---------------------------------------------------------------------------

#[rstest]
#[case::complete(identity(), None)]
#[case::blank_policy(PolicyIdentity::new(" ", "baseline", "1.0.0"), Some("policy name"))]
#[case::blank_pack(PolicyIdentity::new("p", "", "1.0.0"), Some("policy pack name"))]
#[case::blank_version(PolicyIdentity::new("p", "baseline", ""), Some("policy pack version"))]
#[case::first_blank_wins(PolicyIdentity::new("", "", ""), Some("policy name"))]
fn identity_missing_field(#[case] identity: PolicyIdentity, #[case] expected: Option<&str>) {
    assert_eq!(identity.missing_field(), expected);
}

// ---------------------------------------------------------------------------
// AnalyzeDiagnostic
// ---------------------------------------------------------------------------

#[test]
fn diagnostic_builders_and_accessors() {
    let diagnostic = AnalyzeDiagnostic::new(
        identity(),
        "urn:pulumi:prod::infra::aws:s3/bucket:Bucket::my-bucket",
        EnforcementLevel::Advisory,
        "bucket my-bucket has public ACL",
    )
    .with_description("Buckets must not be world readable")
    .with_tags(["security", "storage"]);

    assert_eq!(diagnostic.policy_name(), "no-public-buckets");
    assert_eq!(diagnostic.policy().policy_pack_name(), "baseline");
    assert_eq!(diagnostic.description(), "Buckets must not be world readable");
    assert_eq!(diagnostic.tags(), ["security", "storage"]);
    assert_eq!(diagnostic.disposition(), Disposition::Warning);
    assert!(!diagnostic.is_blocking());
}

#[test]
fn diagnostic_wire_shape_is_flat() {
    let diagnostic = AnalyzeDiagnostic::new(
        identity(),
        "urn:a::b",
        EnforcementLevel::Mandatory,
        "bad",
    );
    let value = serde_json::to_value(&diagnostic).expect("serialise");
    assert_eq!(
        value,
        json!({
            "policy_name": "no-public-buckets",
            "policy_pack_name": "baseline",
            "policy_pack_version": "1.0.0",
            "description": "",
            "message": "bad",
            "tags": [],
            "enforcement_level": "mandatory",
            "urn": "urn:a::b",
        })
    );
}

#[test]
fn diagnostic_optional_fields_default() {
    let diagnostic: AnalyzeDiagnostic = serde_json::from_value(json!({
        "policy_name": "p",
        "policy_pack_name": "pack",
        "policy_pack_version": "1",
        "message": "m",
        "enforcement_level": "advisory",
        "urn": "urn:a::b",
    }))
    .expect("deserialise");
    assert!(diagnostic.description().is_empty());
    assert!(diagnostic.tags().is_empty());
    assert_eq!(diagnostic.urn().name(), "b");
}

#[test]
fn diagnostic_with_unknown_level_is_rejected() {
    let result = serde_json::from_value::<AnalyzeDiagnostic>(json!({
        "policy_name": "p",
        "policy_pack_name": "pack",
        "policy_pack_version": "1",
        "message": "m",
        "enforcement_level": "fatal",
        "urn": "urn:a::b",
    }));
    assert!(result.is_err());
}
