//! Caller-side orchestration of one analysis run.
//!
//! An [`AnalysisRun`] owns one [`AnalyzerSession`] per analyzer, in the
//! order the caller supplied them. It configures every analyzer, feeds
//! resources to each as the engine produces them, runs every stack-wide pass
//! once at the end, and collects the results in a [`DiagnosticReport`].
//!
//! Any configuration or analysis failure ends the analysis phase. Closing is
//! always performed, and disposal failures are logged and handed back
//! without affecting the outcome.


use std::collections::HashSet;
use std::panic;
use std::thread;

use tracing::{debug, info, warn};

use crate::analyzer::Analyzer;
use crate::configuration::AnalyzerConfiguration;
use crate::contract::ViolationPolicy;
use crate::diagnostic::AnalyzeDiagnostic;
use crate::error::AnalyzerError;
use crate::policy::{AnalyzerInfo, PluginInfo};
use crate::report::{AnalysisPhase, DiagnosticReport};
use crate::resource::AnalyzerResource;
use crate::session::AnalyzerSession;

/// Tracing target for run orchestration.
const RUN_TARGET: &str = "policy_analyzer::run";

/// Settings shared by every analyzer in a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    violation_policy: ViolationPolicy,
}

impl RunOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how malformed diagnostics are handled.
    #[must_use]
    pub const fn with_violation_policy(mut self, violation_policy: ViolationPolicy) -> Self {
        self.violation_policy = violation_policy;
        self
    }

    /// Returns the violation policy.
    #[must_use]
    pub const fn violation_policy(&self) -> ViolationPolicy {
        self.violation_policy
    }
}

/// The result of a completed run.
#[derive(Debug)]
pub struct RunOutcome {
    report: DiagnosticReport,
    disposal_errors: Vec<AnalyzerError>,
}

impl RunOutcome {
    /// Returns the aggregated diagnostics.
    #[must_use]
    pub const fn report(&self) -> &DiagnosticReport {
        &self.report
    }

    /// Returns the errors raised while closing analyzers. They have already
    /// been logged.
    #[must_use]
    pub fn disposal_errors(&self) -> &[AnalyzerError] {
        &self.disposal_errors
    }

    /// Returns `true` if any diagnostic blocks the operation.
    #[must_use]
    pub fn has_blocking(&self) -> bool {
        self.report.has_blocking()
    }

    /// Consumes the outcome, returning the report.
    #[must_use]
    pub fn into_report(self) -> DiagnosticReport {
        self.report
    }
}

/// The sessions and accumulated diagnostics of one run.
///
/// # Example
///
/// ```
/// use policy_analyzer::{
///     AnalysisRun, AnalyzeDiagnostic, Analyzer, AnalyzerConfiguration, AnalyzerError,
///     AnalyzerInfo, AnalyzerResource, PluginInfo, RunOptions,
/// };
///
/// # struct Silent;
/// # impl Analyzer for Silent {
/// #     fn name(&self) -> &str { "silent" }
/// #     fn configure(&mut self, _: &AnalyzerConfiguration) -> Result<(), AnalyzerError> { Ok(()) }
/// #     fn analyze(&mut self, _: &AnalyzerResource) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> { Ok(Vec::new()) }
/// #     fn analyze_stack(&mut self, _: &[AnalyzerResource]) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> { Ok(Vec::new()) }
/// #     fn analyzer_info(&mut self) -> Result<AnalyzerInfo, AnalyzerError> { Ok(AnalyzerInfo::new("silent", "Silent")) }
/// #     fn plugin_info(&mut self) -> Result<PluginInfo, AnalyzerError> { Ok(PluginInfo::new("silent", "0.1.0")) }
/// #     fn close(&mut self) -> Result<(), AnalyzerError> { Ok(()) }
/// # }
/// let resources = vec![AnalyzerResource::new("urn:a::b", "t:m/r", "b")];
/// let config = AnalyzerConfiguration::new("dev", "app", false);
///
/// let mut run = AnalysisRun::start([Silent], &config, RunOptions::new()).unwrap();
/// for resource in &resources {
///     run.analyze_resource(resource).unwrap();
/// }
/// run.finish(&resources).unwrap();
/// let outcome = run.close();
/// assert!(outcome.report().is_empty());
/// assert!(outcome.disposal_errors().is_empty());
/// ```
#[derive(Debug)]
pub struct AnalysisRun<A: Analyzer> {
    sessions: Vec<AnalyzerSession<A>>,
    report: DiagnosticReport,
    resources_analyzed: usize,
}

impl<A: Analyzer> AnalysisRun<A> {
    /// Acquires `analyzers` and configures each, in order.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::DuplicateAnalyzer`] if two analyzers share a
    /// name, or the first configuration failure. Every analyzer is closed
    /// before the error is returned.
    pub fn start(
        analyzers: impl IntoIterator<Item = A>,
        config: &AnalyzerConfiguration,
        options: RunOptions,
    ) -> Result<Self, AnalyzerError> {
        let mut sessions = acquire(analyzers, options)?;
        info!(
            target: RUN_TARGET,
            analyzers = sessions.len(),
            stack = config.stack_name(),
            project = config.project_name(),
            "starting analysis run"
        );
        if let Err(error) = sessions
            .iter_mut()
            .try_for_each(|session| session.configure(config))
        {
            close_sessions(sessions);
            return Err(error);
        }

        let report = DiagnosticReport::with_analyzers(
            sessions.iter().map(|session| session.name().to_owned()),
        );
        Ok(Self {
            sessions,
            report,
            resources_analyzed: 0,
        })
    }

    /// Returns the analyzer names in run order.
    pub fn analyzers(&self) -> impl Iterator<Item = &str> {
        self.sessions.iter().map(AnalyzerSession::name)
    }

    /// Returns the number of resources fed so far.
    #[must_use]
    pub const fn resources_analyzed(&self) -> usize {
        self.resources_analyzed
    }

    /// Returns the diagnostics collected so far.
    #[must_use]
    pub const fn report(&self) -> &DiagnosticReport {
        &self.report
    }

    /// Feeds one resource to every analyzer.
    ///
    /// # Errors
    ///
    /// Returns the first analysis error. The run must then be closed.
    pub fn analyze_resource(&mut self, resource: &AnalyzerResource) -> Result<(), AnalyzerError> {
        for session in &mut self.sessions {
            let diagnostics = session.analyze(resource)?;
            self.report
                .record(session.name(), AnalysisPhase::Resource, diagnostics);
        }
        self.resources_analyzed += 1;
        Ok(())
    }

    /// Runs every analyzer's stack-wide pass over the final resource set.
    ///
    /// # Errors
    ///
    /// Returns the first analysis error, or an ordering error if the stack
    /// pass already ran. The run must then be closed.
    pub fn finish(&mut self, resources: &[AnalyzerResource]) -> Result<(), AnalyzerError> {
        for session in &mut self.sessions {
            let diagnostics = session.analyze_stack(resources)?;
            self.report
                .record(session.name(), AnalysisPhase::Stack, diagnostics);
        }
        debug!(
            target: RUN_TARGET,
            resources = resources.len(),
            diagnostics = self.report.len(),
            "stack analysis finished"
        );
        Ok(())
    }

    /// Queries every analyzer's policy pack metadata, in run order.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub fn analyzer_info(&mut self) -> Result<Vec<AnalyzerInfo>, AnalyzerError> {
        self.sessions
            .iter_mut()
            .map(AnalyzerSession::analyzer_info)
            .collect()
    }

    /// Queries every analyzer's plugin metadata, in run order.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub fn plugin_info(&mut self) -> Result<Vec<PluginInfo>, AnalyzerError> {
        self.sessions
            .iter_mut()
            .map(AnalyzerSession::plugin_info)
            .collect()
    }

    /// Closes every analyzer and returns the report.
    #[must_use]
    pub fn close(self) -> RunOutcome {
        let disposal_errors = close_sessions(self.sessions);
        let summary = self.report.summary();
        info!(
            target: RUN_TARGET,
            mandatory = summary.mandatory,
            advisory = summary.advisory,
            disabled = summary.disabled,
            disposal_errors = disposal_errors.len(),
            "analysis run closed"
        );
        RunOutcome {
            report: self.report,
            disposal_errors,
        }
    }

    /// Runs the whole contract over a fixed resource set.
    ///
    /// # Errors
    ///
    /// Returns the first configuration or analysis error. Analyzers are
    /// closed either way.
    pub fn execute(
        analyzers: impl IntoIterator<Item = A>,
        config: &AnalyzerConfiguration,
        options: RunOptions,
        resources: &[AnalyzerResource],
    ) -> Result<RunOutcome, AnalyzerError> {
        let mut run = Self::start(analyzers, config, options)?;
        let analysis = resources
            .iter()
            .try_for_each(|resource| run.analyze_resource(resource))
            .and_then(|()| run.finish(resources));
        let outcome = run.close();
        analysis.map(|()| outcome)
    }
}

/// Per-analyzer results gathered on a worker thread.
type ThreadResult = Result<(Vec<AnalyzeDiagnostic>, Vec<AnalyzeDiagnostic>), AnalyzerError>;

impl<A: Analyzer + Send> AnalysisRun<A> {
    /// Runs the whole contract with each analyzer on its own thread.
    ///
    /// Calls to any one analyzer stay sequential. The report has the same
    /// order as [`AnalysisRun::execute`] would produce, and when several
    /// analyzers fail the error of the earliest one in run order is returned.
    ///
    /// # Errors
    ///
    /// Returns a configuration or analysis error as described above.
    /// Analyzers are closed either way.
    pub fn execute_concurrently(
        analyzers: impl IntoIterator<Item = A>,
        config: &AnalyzerConfiguration,
        options: RunOptions,
        resources: &[AnalyzerResource],
    ) -> Result<RunOutcome, AnalyzerError> {
        let acquired = acquire(analyzers, options)?;
        info!(
            target: RUN_TARGET,
            analyzers = acquired.len(),
            stack = config.stack_name(),
            project = config.project_name(),
            "starting concurrent analysis run"
        );

        let results: Vec<(AnalyzerSession<A>, ThreadResult)> = thread::scope(|scope| {
            let handles: Vec<_> = acquired
                .into_iter()
                .map(|mut session| {
                    scope.spawn(move || {
                        let result = drive(&mut session, config, resources);
                        (session, result)
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload)))
                .collect()
        });

        let mut report = DiagnosticReport::with_analyzers(
            results.iter().map(|(session, _)| session.name().to_owned()),
        );
        let mut sessions = Vec::with_capacity(results.len());
        let mut stacks = Vec::with_capacity(results.len());
        let mut failure = None;
        for (session, result) in results {
            let analyzer = session.name().to_owned();
            sessions.push(session);
            result.map_or_else(
                |error| {
                    failure.get_or_insert(error);
                },
                |(resource, stack)| {
                    report.record(&analyzer, AnalysisPhase::Resource, resource);
                    stacks.push((analyzer, stack));
                },
            );
        }
        for (analyzer, stack) in stacks {
            report.record(&analyzer, AnalysisPhase::Stack, stack);
        }

        let run = Self {
            sessions,
            report,
            resources_analyzed: resources.len(),
        };
        let outcome = run.close();
        failure.map_or(Ok(outcome), Err)
    }
}

fn drive<A: Analyzer>(
    session: &mut AnalyzerSession<A>,
    config: &AnalyzerConfiguration,
    resources: &[AnalyzerResource],
) -> ThreadResult {
    session.configure(config)?;
    let mut resource_diagnostics = Vec::new();
    for resource in resources {
        resource_diagnostics.extend(session.analyze(resource)?);
    }
    let stack_diagnostics = session.analyze_stack(resources)?;
    Ok((resource_diagnostics, stack_diagnostics))
}

fn acquire<A: Analyzer>(
    analyzers: impl IntoIterator<Item = A>,
    options: RunOptions,
) -> Result<Vec<AnalyzerSession<A>>, AnalyzerError> {
    let sessions: Vec<_> = analyzers
        .into_iter()
        .map(|analyzer| {
            AnalyzerSession::new(analyzer).with_violation_policy(options.violation_policy())
        })
        .collect();
    let mut seen = HashSet::new();
    let duplicate = sessions
        .iter()
        .map(AnalyzerSession::name)
        .find(|name| !seen.insert(*name))
        .map(str::to_owned);
    if let Some(analyzer) = duplicate {
        close_sessions(sessions);
        return Err(AnalyzerError::DuplicateAnalyzer { analyzer });
    }
    Ok(sessions)
}

fn close_sessions<A: Analyzer>(sessions: Vec<AnalyzerSession<A>>) -> Vec<AnalyzerError> {
    sessions
        .into_iter()
        .filter_map(|session| {
            let result = session.close();
            if let Err(error) = &result {
                warn!(
                    target: RUN_TARGET,
                    analyzer = error.analyzer(),
                    %error,
                    "failed to close analyzer"
                );
            }
            result.err()
        })
        .collect()
}
