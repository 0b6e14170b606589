//! Unit and behavioural tests for the baseline policy pack.


use std::io::Cursor;

use policy_analyzer::{
    Analyzer, AnalyzerConfiguration, AnalyzerResource, AnalyzerSession, EnforcementLevel,
    ErrorCategory, PropertyValue,
};
use rstest::{fixture, rstest};
use serde_json::Value;

use crate::{
    BaselineAnalyzer, NO_PUBLIC_BUCKETS, PACK_NAME, STACK_HAS_OWNER_TAG, is_public_bucket,
    policies, run,
};

pub(crate) fn bucket(name: &str, acl: impl Into<PropertyValue>) -> AnalyzerResource {
    AnalyzerResource::new(
        format!("urn:pulumi:prod::infra::aws:s3/bucket:Bucket::{name}"),
        "aws:s3/bucket",
        name,
    )
    .with_property("acl", acl)
}

pub(crate) fn owned(resource: AnalyzerResource, owner: &str) -> AnalyzerResource {
    let tags: PropertyValue = [("owner", owner)].into_iter().collect();
    resource.with_property("tags", tags)
}

#[fixture]
fn configured() -> BaselineAnalyzer {
    let mut analyzer = BaselineAnalyzer::new();
    analyzer
        .configure(&AnalyzerConfiguration::new("prod", "infra", true))
        .expect("valid configuration");
    analyzer
}

// ---------------------------------------------------------------------------
// no-public-buckets
// ---------------------------------------------------------------------------

#[rstest]
#[case::public_read(bucket("b", "public-read"), true)]
#[case::public_read_write(bucket("b", "public-read-write"), true)]
#[case::private(bucket("b", "private"), false)]
#[case::unknown_during_preview(bucket("b", PropertyValue::Unknown), false)]
#[case::secret_public(
    bucket("b", PropertyValue::Secret(Box::new(PropertyValue::from("public-read")))),
    true
)]
#[case::no_acl(AnalyzerResource::new("urn:a::b", "aws:s3/bucket", "b"), false)]
#[case::other_type(
    AnalyzerResource::new("urn:a::q", "aws:sqs/queue", "q").with_property("acl", "public-read"),
    false
)]
fn public_bucket_detection(#[case] resource: AnalyzerResource, #[case] expected: bool) {
    assert_eq!(is_public_bucket(&resource), expected);
}

#[rstest]
fn public_bucket_yields_mandatory_diagnostic(mut configured: BaselineAnalyzer) {
    let resource = bucket("my-bucket", "public-read");
    let diagnostics = configured.analyze(&resource).expect("analyze");

    assert_eq!(diagnostics.len(), 1);
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.policy_name(), NO_PUBLIC_BUCKETS);
    assert_eq!(diagnostic.policy().policy_pack_name(), PACK_NAME);
    assert_eq!(diagnostic.enforcement_level(), EnforcementLevel::Mandatory);
    assert_eq!(diagnostic.message(), "bucket my-bucket has public ACL");
    assert_eq!(diagnostic.urn(), resource.urn());
    assert_eq!(diagnostic.tags(), ["security", "storage"]);
}

// ---------------------------------------------------------------------------
// stack-has-owner-tag
// ---------------------------------------------------------------------------

#[rstest]
fn stack_without_owner_is_flagged_on_first_resource(mut configured: BaselineAnalyzer) {
    let resources = [bucket("a", "private"), bucket("b", "private")];
    let diagnostics = configured.analyze_stack(&resources).expect("analyze stack");

    assert_eq!(diagnostics.len(), 1);
    let diagnostic = &diagnostics[0];
    assert_eq!(diagnostic.policy_name(), STACK_HAS_OWNER_TAG);
    assert_eq!(diagnostic.enforcement_level(), EnforcementLevel::Advisory);
    assert_eq!(diagnostic.urn(), resources[0].urn());
    assert_eq!(
        diagnostic.message(),
        "no resource in stack prod carries an owner tag"
    );
}

#[rstest]
#[case::named_owner(owned(bucket("b", "private"), "platform"))]
#[case::unknown_owner(
    bucket("b", "private").with_property(
        "tags",
        [("owner", PropertyValue::Unknown)].into_iter().collect::<PropertyValue>(),
    )
)]
fn owned_stack_is_clean(mut configured: BaselineAnalyzer, #[case] tagged: AnalyzerResource) {
    let resources = [bucket("a", "private"), tagged];
    assert!(configured.analyze_stack(&resources).expect("analyze stack").is_empty());
}

#[rstest]
fn blank_owner_does_not_count(mut configured: BaselineAnalyzer) {
    let resources = [owned(bucket("a", "private"), "  ")];
    assert_eq!(configured.analyze_stack(&resources).expect("analyze stack").len(), 1);
}

#[rstest]
fn empty_stack_is_clean(mut configured: BaselineAnalyzer) {
    assert!(configured.analyze_stack(&[]).expect("analyze stack").is_empty());
}

// ---------------------------------------------------------------------------
// Metadata and configuration
// ---------------------------------------------------------------------------

#[test]
fn blank_stack_name_is_rejected() {
    let mut analyzer = BaselineAnalyzer::new();
    let error = analyzer
        .configure(&AnalyzerConfiguration::new("", "infra", false))
        .expect_err("blank stack");
    assert_eq!(error.category(), ErrorCategory::Configuration);
    assert!(analyzer.config().is_none());
}

#[test]
fn metadata_passes_session_validation() {
    let mut session = AnalyzerSession::new(BaselineAnalyzer::new());
    let info = session.analyzer_info().expect("valid analyzer info");
    let plugin = session.plugin_info().expect("plugin info");

    assert_eq!(info.policies(), policies().as_slice());
    assert_eq!(
        info.policy(NO_PUBLIC_BUCKETS).map(|policy| policy.display_name()),
        Some("No public buckets")
    );
    assert!(plugin.is_compatible());
    session.close().expect("close");
}

// ---------------------------------------------------------------------------
// Protocol loop
// ---------------------------------------------------------------------------

pub(crate) fn exchange(lines: &[String]) -> Vec<Value> {
    let mut input = Cursor::new(lines.join("\n"));
    let mut output = Vec::new();
    run(&mut input, &mut output).expect("plugin loop completes");
    String::from_utf8(output)
        .expect("utf-8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("response is json"))
        .collect()
}

#[test]
fn run_serves_the_protocol() {
    let lines = [
        String::from(
            r#"{"id":1,"method":"configure","config":{"stack_name":"prod","project_name":"infra","dry_run":true}}"#,
        ),
        serde_json::json!({
            "id": 2,
            "method": "analyze",
            "resource": bucket("my-bucket", "public-read"),
        })
        .to_string(),
        String::from(r#"{"id":3,"method":"close"}"#),
    ];
    let responses = exchange(&lines);

    assert_eq!(responses.len(), 3);
    assert_eq!(responses[0]["result"], "configured");
    assert_eq!(responses[1]["diagnostics"][0]["policy_name"], NO_PUBLIC_BUCKETS);
    assert_eq!(responses[2]["result"], "closed");
}
