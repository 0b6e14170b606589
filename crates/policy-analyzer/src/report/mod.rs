//! Ordered aggregation of diagnostics across analyzers.
//!
//! The report keeps one bucket per analyzer, in the order analyzers were
//! added, with the resource-phase and stack-phase diagnostics held apart. Its
//! flattened view is every analyzer's resource-phase diagnostics in analyzer
//! order, followed by every analyzer's stack-phase diagnostics, each in the
//! order the analyzer returned them. That ordering is the same whether
//! resources were fed one at a time across all analyzers or one analyzer at a
//! time, and nothing is reordered or deduplicated.


use serde::Serialize;

use crate::diagnostic::{AnalyzeDiagnostic, EnforcementLevel};
use crate::resource::Urn;

/// Which pass produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    /// A per-resource `analyze` call.
    Resource,
    /// The stack-wide `analyze_stack` call.
    Stack,
}

#[derive(Debug, Clone, Default)]
struct Bucket {
    analyzer: String,
    resource: Vec<AnalyzeDiagnostic>,
    stack: Vec<AnalyzeDiagnostic>,
}

/// A diagnostic together with the analyzer and pass that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReportEntry<'a> {
    analyzer: &'a str,
    phase: AnalysisPhase,
    #[serde(flatten)]
    diagnostic: &'a AnalyzeDiagnostic,
}

impl<'a> ReportEntry<'a> {
    /// Returns the producing analyzer's name.
    #[must_use]
    pub const fn analyzer(&self) -> &'a str {
        self.analyzer
    }

    /// Returns the producing pass.
    #[must_use]
    pub const fn phase(&self) -> AnalysisPhase {
        self.phase
    }

    /// Returns the diagnostic.
    #[must_use]
    pub const fn diagnostic(&self) -> &'a AnalyzeDiagnostic {
        self.diagnostic
    }
}

/// Counts of diagnostics per enforcement level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    /// Diagnostics that block the operation.
    pub mandatory: usize,
    /// Diagnostics reported as warnings.
    pub advisory: usize,
    /// Disabled-level diagnostics, which indicate a misbehaving analyzer.
    pub disabled: usize,
}

impl ReportSummary {
    /// Returns the total number of diagnostics counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.mandatory + self.advisory + self.disabled
    }
}

/// The ordered diagnostics of one run.
///
/// # Example
///
/// ```
/// use policy_analyzer::report::{AnalysisPhase, DiagnosticReport};
/// use policy_analyzer::{AnalyzeDiagnostic, EnforcementLevel, PolicyIdentity};
///
/// let diagnostic = |policy: &str| {
///     AnalyzeDiagnostic::new(
///         PolicyIdentity::new(policy, "pack", "1.0"),
///         "urn:a::b",
///         EnforcementLevel::Advisory,
///         "message",
///     )
/// };
///
/// let mut report = DiagnosticReport::with_analyzers(["first", "second"]);
/// report.record("second", AnalysisPhase::Resource, vec![diagnostic("s1")]);
/// report.record("first", AnalysisPhase::Stack, vec![diagnostic("f-stack")]);
/// report.record("first", AnalysisPhase::Resource, vec![diagnostic("f1")]);
///
/// let order: Vec<&str> = report.diagnostics().map(AnalyzeDiagnostic::policy_name).collect();
/// assert_eq!(order, ["f1", "s1", "f-stack"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DiagnosticReport {
    buckets: Vec<Bucket>,
}

impl DiagnosticReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a report with the analyzer order fixed up front.
    #[must_use]
    pub fn with_analyzers<I, S>(analyzers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            buckets: analyzers
                .into_iter()
                .map(|analyzer| Bucket {
                    analyzer: analyzer.into(),
                    ..Bucket::default()
                })
                .collect(),
        }
    }

    #[expect(
        clippy::indexing_slicing,
        reason = "the index comes from `position` or `push` on the same vector"
    )]
    fn bucket_mut(&mut self, analyzer: &str) -> &mut Bucket {
        let index = self
            .buckets
            .iter()
            .position(|bucket| bucket.analyzer == analyzer)
            .unwrap_or_else(|| {
                self.buckets.push(Bucket {
                    analyzer: analyzer.to_owned(),
                    ..Bucket::default()
                });
                self.buckets.len() - 1
            });
        &mut self.buckets[index]
    }

    /// Appends diagnostics returned by one call, preserving their order.
    ///
    /// Analyzers not seen before are appended to the analyzer order.
    pub fn record(
        &mut self,
        analyzer: &str,
        phase: AnalysisPhase,
        diagnostics: impl IntoIterator<Item = AnalyzeDiagnostic>,
    ) {
        let bucket = self.bucket_mut(analyzer);
        match phase {
            AnalysisPhase::Resource => bucket.resource.extend(diagnostics),
            AnalysisPhase::Stack => bucket.stack.extend(diagnostics),
        }
    }

    /// Iterates over entries in report order.
    pub fn entries(&self) -> impl Iterator<Item = ReportEntry<'_>> {
        let resource = self.buckets.iter().flat_map(|bucket| {
            bucket.resource.iter().map(|diagnostic| ReportEntry {
                analyzer: bucket.analyzer.as_str(),
                phase: AnalysisPhase::Resource,
                diagnostic,
            })
        });
        let stack = self.buckets.iter().flat_map(|bucket| {
            bucket.stack.iter().map(|diagnostic| ReportEntry {
                analyzer: bucket.analyzer.as_str(),
                phase: AnalysisPhase::Stack,
                diagnostic,
            })
        });
        resource.chain(stack)
    }

    /// Iterates over diagnostics in report order.
    pub fn diagnostics(&self) -> impl Iterator<Item = &AnalyzeDiagnostic> {
        self.entries().map(|entry| entry.diagnostic)
    }

    /// Consumes the report, returning the flat diagnostic sequence.
    #[must_use]
    pub fn into_diagnostics(self) -> Vec<AnalyzeDiagnostic> {
        let (resource, stack): (Vec<_>, Vec<_>) = self
            .buckets
            .into_iter()
            .map(|bucket| (bucket.resource, bucket.stack))
            .unzip();
        resource.into_iter().chain(stack).flatten().collect()
    }

    /// Returns the analyzer names in report order.
    pub fn analyzers(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|bucket| bucket.analyzer.as_str())
    }

    /// Returns the number of diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets
            .iter()
            .map(|bucket| bucket.resource.len() + bucket.stack.len())
            .sum()
    }

    /// Returns `true` when no diagnostics were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over mandatory diagnostics.
    pub fn blocking(&self) -> impl Iterator<Item = &AnalyzeDiagnostic> {
        self.at_level(EnforcementLevel::Mandatory)
    }

    /// Iterates over advisory diagnostics.
    pub fn advisories(&self) -> impl Iterator<Item = &AnalyzeDiagnostic> {
        self.at_level(EnforcementLevel::Advisory)
    }

    /// Iterates over disabled-level diagnostics.
    pub fn anomalies(&self) -> impl Iterator<Item = &AnalyzeDiagnostic> {
        self.at_level(EnforcementLevel::Disabled)
    }

    fn at_level(&self, level: EnforcementLevel) -> impl Iterator<Item = &AnalyzeDiagnostic> {
        self.diagnostics()
            .filter(move |diagnostic| diagnostic.enforcement_level() == level)
    }

    /// Iterates over diagnostics attributed to one resource.
    pub fn for_resource<'a>(&'a self, urn: &'a Urn) -> impl Iterator<Item = &'a AnalyzeDiagnostic> {
        self.diagnostics()
            .filter(move |diagnostic| diagnostic.urn() == urn)
    }

    /// Returns `true` if any diagnostic blocks the operation.
    #[must_use]
    pub fn has_blocking(&self) -> bool {
        self.blocking().next().is_some()
    }

    /// Counts diagnostics per enforcement level.
    #[must_use]
    pub fn summary(&self) -> ReportSummary {
        self.diagnostics()
            .fold(ReportSummary::default(), |mut summary, diagnostic| {
                match diagnostic.enforcement_level() {
                    EnforcementLevel::Mandatory => summary.mandatory += 1,
                    EnforcementLevel::Advisory => summary.advisory += 1,
                    EnforcementLevel::Disabled => summary.disabled += 1,
                }
                summary
            })
    }
}
