//! Crate-level test doubles, end-to-end and BDD tests.

use std::io::{self, BufRead, BufReader, PipeReader, PipeWriter, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::analyzer::{Analyzer, Operation};
use crate::configuration::AnalyzerConfiguration;
use crate::diagnostic::{AnalyzeDiagnostic, EnforcementLevel, PolicyIdentity};
use crate::error::{AnalyzerError, TransportError};
use crate::host::{HostError, serve};
use crate::policy::{AnalyzerInfo, PluginInfo, PolicyDescriptor};
use crate::remote::{RemoteAnalyzer, Transport};
use crate::resource::AnalyzerResource;
use crate::run::{AnalysisRun, RunOptions};


// ---------------------------------------------------------------------------
// Scripted analyzer
// ---------------------------------------------------------------------------

/// Ways a scripted analyzer can break the diagnostic contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Misbehaviour {
    DisabledLevel,
    ForeignUrn,
    BlankPack,
}

/// Shared record of the calls an analyzer received.
pub(crate) type CallLog = Arc<Mutex<Vec<String>>>;

/// In-memory analyzer with configurable output and failures.
#[derive(Debug, Clone)]
pub(crate) struct ScriptedAnalyzer {
    name: String,
    level: EnforcementLevel,
    per_resource: usize,
    per_stack: usize,
    fail_on: Option<Operation>,
    misbehaviour: Option<Misbehaviour>,
    log: CallLog,
}

impl ScriptedAnalyzer {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            level: EnforcementLevel::Advisory,
            per_resource: 0,
            per_stack: 0,
            fail_on: None,
            misbehaviour: None,
            log: CallLog::default(),
        }
    }

    pub(crate) const fn with_level(mut self, level: EnforcementLevel) -> Self {
        self.level = level;
        self
    }

    pub(crate) const fn with_resource_diagnostics(mut self, count: usize) -> Self {
        self.per_resource = count;
        self
    }

    pub(crate) const fn with_stack_diagnostics(mut self, count: usize) -> Self {
        self.per_stack = count;
        self
    }

    pub(crate) const fn failing_on(mut self, operation: Operation) -> Self {
        self.fail_on = Some(operation);
        self
    }

    pub(crate) const fn misbehaving(mut self, misbehaviour: Misbehaviour) -> Self {
        self.misbehaviour = Some(misbehaviour);
        self
    }

    pub(crate) fn log(&self) -> CallLog {
        Arc::clone(&self.log)
    }

    fn record(&self, call: String) {
        self.log.lock().expect("call log lock").push(call);
    }

    fn check(&self, operation: Operation) -> Result<(), AnalyzerError> {
        if self.fail_on != Some(operation) {
            return Ok(());
        }
        let analyzer = self.name.clone();
        let message = format!("scripted {operation} failure");
        Err(match operation {
            Operation::Configure => AnalyzerError::Configuration { analyzer, message },
            Operation::Close => AnalyzerError::Disposal { analyzer, message },
            _ => AnalyzerError::Analysis {
                analyzer,
                operation,
                message,
            },
        })
    }

    fn diagnostic(&self, policy: String, urn: &str) -> AnalyzeDiagnostic {
        let name = self.name.as_str();
        let (pack, level, subject) = match self.misbehaviour {
            Some(Misbehaviour::DisabledLevel) => (name, EnforcementLevel::Disabled, urn),
            Some(Misbehaviour::ForeignUrn) => (name, self.level, "urn:elsewhere::ghost"),
            Some(Misbehaviour::BlankPack) => ("", self.level, urn),
            None => (name, self.level, urn),
        };
        AnalyzeDiagnostic::new(
            PolicyIdentity::new(policy, pack, "1.0.0"),
            subject,
            level,
            format!("{name} flagged {subject}"),
        )
    }
}

impl Analyzer for ScriptedAnalyzer {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, config: &AnalyzerConfiguration) -> Result<(), AnalyzerError> {
        self.record(format!("configure:{}", config.stack_name()));
        self.check(Operation::Configure)
    }

    fn analyze(
        &mut self,
        resource: &AnalyzerResource,
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        self.record(format!("analyze:{}", resource.name()));
        self.check(Operation::Analyze)?;
        let urn = resource.urn().as_str();
        Ok((0..self.per_resource)
            .map(|i| self.diagnostic(format!("{}-{}-{i}", self.name, resource.name()), urn))
            .collect())
    }

    fn analyze_stack(
        &mut self,
        resources: &[AnalyzerResource],
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        self.record(format!("analyze_stack:{}", resources.len()));
        self.check(Operation::AnalyzeStack)?;
        let Some(first) = resources.first() else {
            return Ok(Vec::new());
        };
        let urn = first.urn().as_str();
        Ok((0..self.per_stack)
            .map(|i| self.diagnostic(format!("{}-stack-{i}", self.name), urn))
            .collect())
    }

    fn analyzer_info(&mut self) -> Result<AnalyzerInfo, AnalyzerError> {
        self.check(Operation::GetAnalyzerInfo)?;
        Ok(AnalyzerInfo::new(self.name.clone(), format!("{} pack", self.name))
            .with_policies(vec![PolicyDescriptor::new(
                format!("{}-policy", self.name),
                self.level,
            )]))
    }

    fn plugin_info(&mut self) -> Result<PluginInfo, AnalyzerError> {
        self.check(Operation::GetPluginInfo)?;
        Ok(PluginInfo::new(self.name.clone(), "1.0.0"))
    }

    fn close(&mut self) -> Result<(), AnalyzerError> {
        self.record(String::from("close"));
        self.check(Operation::Close)
    }
}

pub(crate) fn calls(log: &CallLog) -> Vec<String> {
    log.lock().expect("call log lock").clone()
}

pub(crate) fn resources(names: &[&str]) -> Vec<AnalyzerResource> {
    names
        .iter()
        .map(|name| {
            AnalyzerResource::new(
                format!("urn:pulumi:dev::app::test:index/thing:Thing::{name}"),
                "test:index/thing",
                *name,
            )
        })
        .collect()
}

pub(crate) fn dev_config() -> AnalyzerConfiguration {
    AnalyzerConfiguration::new("dev", "app", true)
}

// ---------------------------------------------------------------------------
// Pipe transport: a real `host::serve` loop on a thread
// ---------------------------------------------------------------------------

/// Transport connected to a `serve` loop running on a background thread.
pub(crate) struct PipeTransport {
    requests: Option<PipeWriter>,
    responses: BufReader<PipeReader>,
    host: Option<JoinHandle<Result<(), HostError>>>,
}

impl PipeTransport {
    pub(crate) fn serve<A: Analyzer + Send + 'static>(analyzer: A) -> io::Result<Self> {
        let (request_reader, requests) = io::pipe()?;
        let (response_reader, mut response_writer) = io::pipe()?;
        let host = thread::spawn(move || {
            let mut input = BufReader::new(request_reader);
            serve(&mut input, &mut response_writer, analyzer)
        });
        Ok(Self {
            requests: Some(requests),
            responses: BufReader::new(response_reader),
            host: Some(host),
        })
    }
}

impl Transport for PipeTransport {
    fn round_trip(&mut self, line: &str) -> Result<String, TransportError> {
        let requests = self.requests.as_mut().ok_or(TransportError::Closed)?;
        writeln!(requests, "{line}")?;
        requests.flush()?;
        let mut reply = String::new();
        if self.responses.read_line(&mut reply)? == 0 {
            return Err(TransportError::Closed);
        }
        Ok(reply)
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        drop(self.requests.take());
        match self.host.take().map(JoinHandle::join) {
            Some(Ok(Err(error))) => Err(TransportError::InvalidOutput {
                message: error.to_string(),
            }),
            Some(Err(_)) => Err(TransportError::NonZeroExit { status: 101 }),
            Some(Ok(Ok(()))) | None => Ok(()),
        }
    }
}

pub(crate) fn remote(analyzer: ScriptedAnalyzer) -> RemoteAnalyzer<PipeTransport> {
    let name = analyzer.name().to_owned();
    RemoteAnalyzer::new(name, PipeTransport::serve(analyzer).expect("pipe transport"))
}

// ---------------------------------------------------------------------------
// End-to-end tests
// ---------------------------------------------------------------------------

#[test]
fn remote_analyzers_produce_the_same_report_as_in_process_ones() {
    let set = resources(&["a", "b", "c"]);
    let scripted = || {
        [
            ScriptedAnalyzer::new("first")
                .with_resource_diagnostics(1)
                .with_stack_diagnostics(1),
            ScriptedAnalyzer::new("second").with_resource_diagnostics(2),
        ]
    };

    let local = AnalysisRun::execute(scripted(), &dev_config(), RunOptions::new(), &set)
        .expect("local run");
    let remote_run = AnalysisRun::execute(
        scripted().map(remote),
        &dev_config(),
        RunOptions::new(),
        &set,
    )
    .expect("remote run");

    let local_diagnostics: Vec<_> = local.report().diagnostics().cloned().collect();
    let remote_diagnostics: Vec<_> = remote_run.report().diagnostics().cloned().collect();
    assert_eq!(local_diagnostics.len(), 3 + 6 + 1);
    assert_eq!(remote_diagnostics, local_diagnostics);
    assert!(remote_run.disposal_errors().is_empty());
}

#[test]
fn remote_configuration_failure_is_attributed_and_closes_the_plugin() {
    let analyzer = ScriptedAnalyzer::new("broken").failing_on(Operation::Configure);
    let log = analyzer.log();

    let error = AnalysisRun::execute(
        [remote(analyzer)],
        &dev_config(),
        RunOptions::new(),
        &resources(&["a"]),
    )
    .expect_err("configuration should fail");

    assert!(matches!(error, AnalyzerError::Configuration { .. }));
    assert_eq!(error.analyzer(), "broken");
    assert_eq!(calls(&log), ["configure:dev", "close"]);
}

#[test]
fn remote_metadata_crosses_the_boundary() {
    let mut analyzer = remote(ScriptedAnalyzer::new("meta"));
    let info = analyzer.analyzer_info().expect("analyzer info");
    let plugin = analyzer.plugin_info().expect("plugin info");
    analyzer.close().expect("close");

    assert_eq!(info.name(), "meta");
    assert!(info.policy("meta-policy").is_some());
    assert_eq!(plugin.version(), "1.0.0");
}
