//! Analyzer plugin contract and diagnostic aggregation.
//!
//! The `policy-analyzer` crate defines how a deployment engine consults
//! pluggable policy analyzers. Each analyzer inspects the resources of a
//! stack, one at a time and then as a whole, and reports policy violations as
//! [`AnalyzeDiagnostic`] values classified by [`EnforcementLevel`]: mandatory
//! diagnostics block the operation, advisory ones are warnings.
//!
//! # Architecture
//!
//! The operation set is the [`Analyzer`] trait. Analyzers normally run as
//! separate plugin processes: the engine talks to them through a
//! [`RemoteAnalyzer`] over a line-oriented JSON [`protocol`], and a plugin
//! binary answers through [`host::serve`]. On the engine side every handle is
//! wrapped in an [`AnalyzerSession`], which enforces the call order and
//! checks returned diagnostics against the contract, and an [`AnalysisRun`]
//! drives a set of sessions and aggregates their results into a
//! [`DiagnosticReport`].
//!
//! # Example
//!
//! ```rust,no_run
//! use policy_analyzer::{
//!     AnalysisRun, AnalyzerConfiguration, AnalyzerManifest, AnalyzerResource, RemoteAnalyzer,
//!     RunOptions,
//! };
//!
//! let manifest = AnalyzerManifest::new("baseline", "0.1.0", "/usr/bin/policy-analyzer-baseline");
//! let analyzer = RemoteAnalyzer::spawn(&manifest).expect("plugin starts");
//!
//! let resources = vec![
//!     AnalyzerResource::new("urn:pulumi:prod::infra::aws:s3/bucket:Bucket::my-bucket", "aws:s3/bucket", "my-bucket")
//!         .with_property("acl", "public-read"),
//! ];
//! let config = AnalyzerConfiguration::new("prod", "infra", true);
//! let outcome = AnalysisRun::execute([analyzer], &config, RunOptions::new(), &resources)
//!     .expect("analysis completes");
//! assert!(outcome.has_blocking());
//! ```

pub mod analyzer;
pub mod configuration;
pub mod contract;
pub mod diagnostic;
pub mod error;
pub mod host;
pub mod manifest;
pub mod policy;
pub mod process;
pub mod protocol;
pub mod remote;
pub mod report;
pub mod resource;
pub mod run;
pub mod session;

#[cfg(test)]
mod tests;

pub use self::analyzer::{Analyzer, Operation};
pub use self::configuration::AnalyzerConfiguration;
pub use self::contract::{ContractViolation, ViolationPolicy};
pub use self::diagnostic::{AnalyzeDiagnostic, Disposition, EnforcementLevel, PolicyIdentity};
pub use self::error::{AnalyzerError, ErrorCategory, ManifestError, TransportError};
pub use self::host::HostError;
pub use self::manifest::{AnalyzerManifest, load_manifests};
pub use self::policy::{AnalyzerInfo, PluginInfo, PolicyDescriptor};
pub use self::process::ProcessTransport;
pub use self::protocol::PROTOCOL_VERSION;
pub use self::remote::{RemoteAnalyzer, Transport};
pub use self::report::{AnalysisPhase, DiagnosticReport, ReportEntry, ReportSummary};
pub use self::resource::{AnalyzerResource, PropertyMap, PropertyValue, TypeToken, Urn};
pub use self::run::{AnalysisRun, RunOptions, RunOutcome};
pub use self::session::{AnalyzerSession, LifecycleState};
