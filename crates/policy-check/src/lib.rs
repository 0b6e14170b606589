//! Command-line policy check.
//!
//! `policy-check` loads its [`Config`], launches every analyzer plugin named
//! in the manifest list, runs them over a JSON array of resources, and writes
//! the resulting report to stdout, one JSON object per diagnostic. The exit
//! status is `0` when nothing blocks the operation, `1` when a mandatory
//! diagnostic was reported, and `2` when the check itself failed.

mod config;
mod errors;
mod inputs;
mod output;
pub mod telemetry;

#[cfg(test)]
mod tests;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use policy_analyzer::{
    AnalysisRun, Analyzer, AnalyzerConfiguration, AnalyzerManifest, AnalyzerResource,
    ProcessTransport, RemoteAnalyzer, RunOptions, RunOutcome, TransportError,
};
use tracing::{info, warn};

pub use self::config::{
    Config, DEFAULT_LOG_FILTER, DEFAULT_PLUGINS_PATH, DEFAULT_PROJECT, DEFAULT_RESOURCES_PATH,
    DEFAULT_STACK, LogFormat,
};
pub(crate) use self::config::{ConfigLoader, OrthoConfigLoader};
pub(crate) use self::errors::AppError;

/// Tracing target for the check runtime.
const CHECK_TARGET: &str = "policy_check";

/// Exit status when a mandatory diagnostic was reported.
const EXIT_BLOCKED: u8 = 1;

/// Exit status when the check could not complete.
const EXIT_FAILED: u8 = 2;

/// Runs the policy check with the process arguments and standard streams.
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with_loader(args, stdout, stderr, &OrthoConfigLoader)
}

pub(crate) fn run_with_loader<I, W, E, L>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let result = loader
        .load(&args)
        .and_then(|config| {
            telemetry::initialise(&config)?;
            check(&config)
        })
        .and_then(|outcome| {
            output::write_report(stdout, outcome.report())?;
            Ok(outcome)
        });

    match result {
        Ok(outcome) => exit_code(&outcome),
        Err(error) => {
            writeln!(stderr, "{error}").ok();
            ExitCode::from(EXIT_FAILED)
        }
    }
}

/// Maps a completed run to the process exit status.
pub(crate) fn exit_code(outcome: &RunOutcome) -> ExitCode {
    if outcome.has_blocking() {
        ExitCode::from(EXIT_BLOCKED)
    } else {
        ExitCode::SUCCESS
    }
}

fn check(config: &Config) -> Result<RunOutcome, AppError> {
    let manifests = inputs::read_manifests(config.plugins_path())?;
    let resources = inputs::read_resources(config.resources_path())?;
    let analyzers = spawn_all(&manifests)?;
    analyze(
        analyzers,
        &config.analyzer_configuration(),
        config.run_options(),
        &resources,
        config.concurrent(),
    )
}

fn spawn_all(
    manifests: &[AnalyzerManifest],
) -> Result<Vec<RemoteAnalyzer<ProcessTransport>>, AppError> {
    launch_all(manifests, RemoteAnalyzer::<ProcessTransport>::spawn)
}

/// Launches one analyzer per manifest, in order.
///
/// When a launch fails, every analyzer already running is closed before the
/// error is returned.
pub(crate) fn launch_all<A, F>(
    manifests: &[AnalyzerManifest],
    mut launch: F,
) -> Result<Vec<A>, AppError>
where
    A: Analyzer,
    F: FnMut(&AnalyzerManifest) -> Result<A, TransportError>,
{
    let mut analyzers = Vec::with_capacity(manifests.len());
    for manifest in manifests {
        match launch(manifest) {
            Ok(analyzer) => analyzers.push(analyzer),
            Err(source) => {
                close_launched(analyzers);
                return Err(AppError::Spawn {
                    analyzer: manifest.name().to_owned(),
                    source,
                });
            }
        }
    }
    Ok(analyzers)
}

fn close_launched<A: Analyzer>(analyzers: Vec<A>) {
    for mut analyzer in analyzers {
        if let Err(error) = analyzer.close() {
            warn!(
                target: CHECK_TARGET,
                analyzer = error.analyzer(),
                %error,
                "analyzer did not shut down cleanly"
            );
        }
    }
}

/// Runs `analyzers` over `resources` and logs what the run left behind.
pub(crate) fn analyze<A: Analyzer + Send>(
    analyzers: Vec<A>,
    configuration: &AnalyzerConfiguration,
    options: RunOptions,
    resources: &[AnalyzerResource],
    concurrent: bool,
) -> Result<RunOutcome, AppError> {
    info!(
        target: CHECK_TARGET,
        analyzers = analyzers.len(),
        resources = resources.len(),
        stack = configuration.stack_name(),
        concurrent,
        "starting policy check"
    );
    let outcome = if concurrent {
        AnalysisRun::execute_concurrently(analyzers, configuration, options, resources)
    } else {
        AnalysisRun::execute(analyzers, configuration, options, resources)
    }?;

    for error in outcome.disposal_errors() {
        warn!(
            target: CHECK_TARGET,
            analyzer = error.analyzer(),
            %error,
            "analyzer did not shut down cleanly"
        );
    }
    let summary = outcome.report().summary();
    info!(
        target: CHECK_TARGET,
        mandatory = summary.mandatory,
        advisory = summary.advisory,
        disabled = summary.disabled,
        "policy check finished"
    );
    Ok(outcome)
}
