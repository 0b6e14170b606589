//! Owned analyzer handles that enforce the invocation order.
//!
//! An [`AnalyzerSession`] wraps one analyzer for one run and tracks a
//! [`LifecycleState`]. Configuration must come first and only once, every
//! `analyze` call precedes the single `analyze_stack`, and `close` is terminal.
//! Any configuration or analysis failure leaves the session `Failed`, after
//! which only metadata queries and closing are allowed.
//!
//! Closing consumes the session, so nothing can be invoked afterwards. A
//! session that goes out of scope without being closed is closed on drop and
//! any disposal failure is logged.


use std::fmt;

use tracing::{debug, info, warn};

use crate::analyzer::{Analyzer, Operation};
use crate::configuration::AnalyzerConfiguration;
use crate::contract::{DiagnosticValidator, ViolationPolicy};
use crate::diagnostic::AnalyzeDiagnostic;
use crate::error::AnalyzerError;
use crate::policy::{AnalyzerInfo, PluginInfo};
use crate::resource::AnalyzerResource;

/// Tracing target for session lifecycle events.
const SESSION_TARGET: &str = "policy_analyzer::session";

/// Position of a session in the analyzer lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Acquired but not yet configured.
    Created,
    /// Configured and accepting `analyze` calls.
    Configured,
    /// The stack-wide pass has run; no further analysis is allowed.
    StackAnalyzed,
    /// A configuration or analysis call failed; the analyzer is unusable.
    Failed,
    /// Resources have been released.
    Closed,
}

impl LifecycleState {
    /// Returns a lowercase description of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Configured => "configured",
            Self::StackAnalyzed => "stack-analyzed",
            Self::Failed => "failed",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An analyzer handle bound to one run.
///
/// # Example
///
/// ```
/// use policy_analyzer::{
///     AnalyzeDiagnostic, Analyzer, AnalyzerConfiguration, AnalyzerError, AnalyzerInfo,
///     AnalyzerResource, AnalyzerSession, LifecycleState, PluginInfo,
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
/// let resource = AnalyzerResource::new("urn:a::b", "t:m/r", "b");
/// let mut session = AnalyzerSession::new(Silent);
///
/// // Analysis before configuration is refused.
/// assert!(session.analyze(&resource).is_err());
///
/// session.configure(&AnalyzerConfiguration::new("dev", "app", true)).unwrap();
/// assert_eq!(session.state(), LifecycleState::Configured);
/// assert!(session.analyze(&resource).unwrap().is_empty());
/// session.close().unwrap();
/// ```
#[derive(Debug)]
pub struct AnalyzerSession<A: Analyzer> {
    analyzer: A,
    name: String,
    state: LifecycleState,
    violation_policy: ViolationPolicy,
    analyze_calls: usize,
}

impl<A: Analyzer> AnalyzerSession<A> {
    /// Wraps a freshly acquired analyzer.
    #[must_use]
    pub fn new(analyzer: A) -> Self {
        let name = analyzer.name().to_owned();
        Self {
            analyzer,
            name,
            state: LifecycleState::Created,
            violation_policy: ViolationPolicy::default(),
            analyze_calls: 0,
        }
    }

    /// Sets how malformed diagnostics are handled.
    #[must_use]
    pub fn with_violation_policy(mut self, violation_policy: ViolationPolicy) -> Self {
        self.violation_policy = violation_policy;
        self
    }

    /// Returns the analyzer name captured at acquisition.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns the number of `analyze` calls issued so far.
    #[must_use]
    pub const fn analyze_calls(&self) -> usize {
        self.analyze_calls
    }

    /// Returns the active violation policy.
    #[must_use]
    pub const fn violation_policy(&self) -> ViolationPolicy {
        self.violation_policy
    }

    fn ensure(&self, operation: Operation, allowed: LifecycleState) -> Result<(), AnalyzerError> {
        if self.state == allowed {
            return Ok(());
        }
        Err(AnalyzerError::OutOfOrder {
            analyzer: self.name.clone(),
            operation,
            state: self.state,
        })
    }

    fn fail<T>(&mut self, error: AnalyzerError) -> Result<T, AnalyzerError> {
        self.state = LifecycleState::Failed;
        Err(error)
    }

    /// Sends the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::OutOfOrder`] if the session was already
    /// configured, or the analyzer's own error, which leaves the session
    /// `Failed`.
    pub fn configure(&mut self, config: &AnalyzerConfiguration) -> Result<(), AnalyzerError> {
        self.ensure(Operation::Configure, LifecycleState::Created)?;
        if let Err(error) = self.analyzer.configure(config) {
            return self.fail(error);
        }
        self.state = LifecycleState::Configured;
        info!(
            target: SESSION_TARGET,
            analyzer = %self.name,
            stack = config.stack_name(),
            project = config.project_name(),
            dry_run = config.is_dry_run(),
            "analyzer configured"
        );
        Ok(())
    }

    /// Analyzes one resource and checks the returned diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::OutOfOrder`] unless the session is
    /// `Configured`. Analyzer failures and rejected contract violations leave
    /// the session `Failed`.
    pub fn analyze(
        &mut self,
        resource: &AnalyzerResource,
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        self.ensure(Operation::Analyze, LifecycleState::Configured)?;
        self.analyze_calls += 1;
        let diagnostics = match self.analyzer.analyze(resource) {
            Ok(diagnostics) => diagnostics,
            Err(error) => return self.fail(error),
        };
        debug!(
            target: SESSION_TARGET,
            analyzer = %self.name,
            urn = %resource.urn(),
            count = diagnostics.len(),
            "resource analyzed"
        );
        DiagnosticValidator::for_resource(resource)
            .apply(&self.name, self.violation_policy, diagnostics)
            .or_else(|error| self.fail(error))
    }

    /// Runs the single stack-wide pass over the final resource set.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::OutOfOrder`] unless the session is
    /// `Configured`, which also rules out a second call. Analyzer failures and
    /// rejected contract violations leave the session `Failed`.
    pub fn analyze_stack(
        &mut self,
        resources: &[AnalyzerResource],
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        self.ensure(Operation::AnalyzeStack, LifecycleState::Configured)?;
        let diagnostics = match self.analyzer.analyze_stack(resources) {
            Ok(diagnostics) => diagnostics,
            Err(error) => return self.fail(error),
        };
        let accepted = DiagnosticValidator::for_stack(resources)
            .apply(&self.name, self.violation_policy, diagnostics)
            .or_else(|error| self.fail(error))?;
        self.state = LifecycleState::StackAnalyzed;
        info!(
            target: SESSION_TARGET,
            analyzer = %self.name,
            resources = resources.len(),
            count = accepted.len(),
            "stack analyzed"
        );
        Ok(accepted)
    }

    /// Queries the policy pack metadata.
    ///
    /// # Errors
    ///
    /// Returns the analyzer's error, or
    /// [`AnalyzerError::ContractViolation`] if the metadata is malformed.
    pub fn analyzer_info(&mut self) -> Result<AnalyzerInfo, AnalyzerError> {
        let info = self.analyzer.analyzer_info()?;
        info.validate()
            .map_err(|violation| AnalyzerError::ContractViolation {
                analyzer: self.name.clone(),
                violation,
            })?;
        Ok(info)
    }

    /// Queries plugin metadata.
    ///
    /// # Errors
    ///
    /// Returns the analyzer's error.
    pub fn plugin_info(&mut self) -> Result<PluginInfo, AnalyzerError> {
        let info = self.analyzer.plugin_info()?;
        if !info.is_compatible() {
            warn!(
                target: SESSION_TARGET,
                analyzer = %self.name,
                protocol_version = info.protocol_version(),
                "analyzer speaks a different protocol version"
            );
        }
        Ok(info)
    }

    /// Releases the analyzer. This is the terminal call.
    ///
    /// # Errors
    ///
    /// Returns the disposal error so the caller can log it; the session is
    /// considered closed either way.
    pub fn close(mut self) -> Result<(), AnalyzerError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), AnalyzerError> {
        if self.state == LifecycleState::Closed {
            return Ok(());
        }
        let previous = self.state;
        self.state = LifecycleState::Closed;
        self.analyzer.close()?;
        debug!(
            target: SESSION_TARGET,
            analyzer = %self.name,
            from = %previous,
            "analyzer closed"
        );
        Ok(())
    }
}

impl<A: Analyzer> Drop for AnalyzerSession<A> {
    fn drop(&mut self) {
        if self.state == LifecycleState::Closed {
            return;
        }
        if let Err(error) = self.release() {
            warn!(
                target: SESSION_TARGET,
                analyzer = %self.name,
                %error,
                "failed to close analyzer on drop"
            );
        }
    }
}
