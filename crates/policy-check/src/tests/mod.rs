//! Runtime tests for the policy check.


use std::fs;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use policy_analyzer::{
    AnalyzeDiagnostic, Analyzer, AnalyzerConfiguration, AnalyzerError, AnalyzerInfo,
    AnalyzerManifest, AnalyzerResource, PluginInfo, PropertyValue, RunOptions, TransportError,
};
use policy_analyzer_baseline::{BaselineAnalyzer, NO_PUBLIC_BUCKETS, STACK_HAS_OWNER_TAG};
use rstest::rstest;
use serde_json::Value;
use tempfile::TempDir;

use crate::{AppError, analyze, exit_code, launch_all, output, spawn_all};

fn bucket(name: &str, acl: &str) -> AnalyzerResource {
    AnalyzerResource::new(
        format!("urn:pulumi:prod::infra::aws:s3/bucket:Bucket::{name}"),
        "aws:s3/bucket",
        name,
    )
    .with_property("acl", acl)
}

fn owned(resource: AnalyzerResource) -> AnalyzerResource {
    let tags: PropertyValue = [("owner", "platform")].into_iter().collect();
    resource.with_property("tags", tags)
}

fn prod() -> AnalyzerConfiguration {
    AnalyzerConfiguration::new("prod", "infra", true)
}

fn report_lines(resources: &[AnalyzerResource], concurrent: bool) -> Vec<Value> {
    let outcome = analyze(
        vec![BaselineAnalyzer::new()],
        &prod(),
        RunOptions::new(),
        resources,
        concurrent,
    )
    .expect("analysis completes");
    let mut stdout = Vec::new();
    output::write_report(&mut stdout, outcome.report()).expect("report written");
    String::from_utf8(stdout)
        .expect("utf-8 report")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is JSON"))
        .collect()
}

#[test]
fn public_bucket_blocks_the_check() {
    let outcome = analyze(
        vec![BaselineAnalyzer::new()],
        &prod(),
        RunOptions::new(),
        &[owned(bucket("logs", "public-read"))],
        false,
    )
    .expect("analysis completes");

    assert!(outcome.has_blocking());
    assert_eq!(exit_code(&outcome), ExitCode::from(1));
}

#[test]
fn owned_private_buckets_pass() {
    let outcome = analyze(
        vec![BaselineAnalyzer::new()],
        &prod(),
        RunOptions::new(),
        &[owned(bucket("logs", "private"))],
        false,
    )
    .expect("analysis completes");

    assert!(outcome.report().is_empty());
    assert_eq!(exit_code(&outcome), ExitCode::SUCCESS);
}

#[test]
fn advisories_alone_do_not_block() {
    let outcome = analyze(
        vec![BaselineAnalyzer::new()],
        &prod(),
        RunOptions::new(),
        &[bucket("logs", "private")],
        false,
    )
    .expect("analysis completes");

    assert_eq!(outcome.report().summary().advisory, 1);
    assert_eq!(exit_code(&outcome), ExitCode::SUCCESS);
}

#[test]
fn report_lines_carry_analyzer_phase_and_diagnostic() {
    let lines = report_lines(&[bucket("logs", "public-read")], false);

    assert_eq!(lines.len(), 2);
    let first = lines.first().expect("resource diagnostic");
    assert_eq!(first["analyzer"], "baseline");
    assert_eq!(first["phase"], "resource");
    assert_eq!(first["policy_name"], NO_PUBLIC_BUCKETS);
    assert_eq!(first["enforcement_level"], "mandatory");
    assert_eq!(
        first["urn"],
        "urn:pulumi:prod::infra::aws:s3/bucket:Bucket::logs"
    );
    let last = lines.last().expect("stack diagnostic");
    assert_eq!(last["phase"], "stack");
    assert_eq!(last["policy_name"], STACK_HAS_OWNER_TAG);
    assert_eq!(last["enforcement_level"], "advisory");
}

#[rstest]
#[case::single_bucket(&["public-read"])]
#[case::mixed_buckets(&["private", "public-read-write", "public-read"])]
fn concurrent_runs_write_the_same_report(#[case] acls: &[&str]) {
    let resources: Vec<AnalyzerResource> = acls
        .iter()
        .enumerate()
        .map(|(index, acl)| bucket(&format!("bucket-{index}"), acl))
        .collect();

    assert_eq!(
        report_lines(&resources, true),
        report_lines(&resources, false)
    );
}

#[test]
fn configuration_failures_surface_as_analysis_errors() {
    let error = analyze(
        vec![BaselineAnalyzer::new()],
        &AnalyzerConfiguration::new("", "infra", true),
        RunOptions::new(),
        &[bucket("logs", "private")],
        false,
    )
    .expect_err("blank stack is rejected");

    assert!(
        matches!(
            error,
            AppError::Analysis(AnalyzerError::Configuration { .. })
        ),
        "unexpected error: {error}"
    );
    assert!(error.to_string().starts_with("policy analysis failed"));
}

/// Analyzer that only counts how often it is closed.
#[derive(Debug)]
struct CloseCounter {
    name: String,
    closes: Arc<AtomicUsize>,
}

impl Analyzer for CloseCounter {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, _config: &AnalyzerConfiguration) -> Result<(), AnalyzerError> {
        Ok(())
    }

    fn analyze(
        &mut self,
        _resource: &AnalyzerResource,
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        Ok(Vec::new())
    }

    fn analyze_stack(
        &mut self,
        _resources: &[AnalyzerResource],
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        Ok(Vec::new())
    }

    fn analyzer_info(&mut self) -> Result<AnalyzerInfo, AnalyzerError> {
        Ok(AnalyzerInfo::new(self.name.clone(), self.name.clone()))
    }

    fn plugin_info(&mut self) -> Result<PluginInfo, AnalyzerError> {
        Ok(PluginInfo::new(self.name.clone(), "0.1.0"))
    }

    fn close(&mut self) -> Result<(), AnalyzerError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn manifests(names: &[&str]) -> Vec<AnalyzerManifest> {
    names
        .iter()
        .map(|name| AnalyzerManifest::new(*name, "0.1.0", format!("/opt/analyzers/{name}")))
        .collect()
}

#[test]
fn failed_launch_closes_the_analyzers_already_running() {
    let closes = Arc::new(AtomicUsize::new(0));
    let error = launch_all(&manifests(&["first", "second", "broken", "never"]), |manifest| {
        if manifest.name() == "broken" {
            return Err(TransportError::Spawn {
                message: String::from("cannot execute"),
                source: None,
            });
        }
        Ok(CloseCounter {
            name: manifest.name().to_owned(),
            closes: Arc::clone(&closes),
        })
    })
    .expect_err("third launch fails");

    assert!(matches!(error, AppError::Spawn { ref analyzer, .. } if analyzer == "broken"));
    assert_eq!(closes.load(Ordering::SeqCst), 2);
}

#[test]
fn successful_launches_leave_analyzers_open() {
    let closes = Arc::new(AtomicUsize::new(0));
    let analyzers = launch_all(&manifests(&["first", "second"]), |manifest| {
        Ok(CloseCounter {
            name: manifest.name().to_owned(),
            closes: Arc::clone(&closes),
        })
    })
    .expect("every launch succeeds");

    let names: Vec<&str> = analyzers.iter().map(Analyzer::name).collect();
    assert_eq!(names, ["first", "second"]);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
}

#[cfg(unix)]
#[test]
fn spawned_plugins_receive_close_when_a_later_launch_fails() {
    let temp_dir = TempDir::new().expect("create temp dir");
    let log = temp_dir.path().join("requests.log");
    let script = r#"while IFS= read -r line; do
  printf '%s\n' "$line" >> "$1"
  printf '%s\n' '{"id":1,"result":"closed"}'
done"#;
    let recording = AnalyzerManifest::new("recording", "0.1.0", "/bin/sh").with_args(vec![
        String::from("-c"),
        script.to_owned(),
        String::from("sh"),
        log.to_string_lossy().into_owned(),
    ]);
    let ghost = AnalyzerManifest::new("ghost", "0.1.0", "/nonexistent/plugin");

    let error = spawn_all(&[recording, ghost]).expect_err("ghost cannot start");

    assert!(matches!(error, AppError::Spawn { ref analyzer, .. } if analyzer == "ghost"));
    let requests = fs::read_to_string(&log).expect("recording plugin wrote its log");
    assert!(
        requests.contains(r#""method":"close""#),
        "requests: {requests}"
    );
}
