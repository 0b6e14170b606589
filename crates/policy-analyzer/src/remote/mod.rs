//! Engine-side stub that forwards the contract to an analyzer plugin.
//!
//! [`RemoteAnalyzer`] implements [`Analyzer`] by encoding each call as a
//! [`RequestEnvelope`], handing the line to a [`Transport`], and decoding the
//! reply. The transport abstraction lets tests script replies without
//! spawning processes; the production transport is
//! [`ProcessTransport`](crate::process::ProcessTransport).


use std::borrow::Cow;

use tracing::debug;

use crate::analyzer::{Analyzer, Operation};
use crate::configuration::AnalyzerConfiguration;
use crate::diagnostic::AnalyzeDiagnostic;
use crate::error::{AnalyzerError, TransportError};
use crate::policy::{AnalyzerInfo, PluginInfo};
use crate::protocol::{
    AnalyzerRequest, AnalyzerResponse, RequestEnvelope, decode_response, encode_request,
};
use crate::resource::AnalyzerResource;

/// Tracing target for remote calls.
const REMOTE_TARGET: &str = "policy_analyzer::remote";

/// A bidirectional line channel to one analyzer plugin.
///
/// # Example
///
/// ```
/// use policy_analyzer::TransportError;
/// use policy_analyzer::remote::Transport;
///
/// struct Echo;
///
/// impl Transport for Echo {
///     fn round_trip(&mut self, line: &str) -> Result<String, TransportError> {
///         Ok(line.to_owned())
///     }
///     fn shutdown(&mut self) -> Result<(), TransportError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Transport {
    /// Sends one request line and waits for one response line.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the line cannot be delivered or no
    /// response arrives.
    fn round_trip(&mut self, line: &str) -> Result<String, TransportError>;

    /// Sends the `close` request and waits for its reply.
    ///
    /// Transports with a shutdown grace period bound the wait by it. The
    /// default waits as long as [`Transport::round_trip`].
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the line cannot be delivered or no
    /// response arrives in time.
    fn close_round_trip(&mut self, line: &str) -> Result<String, TransportError> {
        self.round_trip(line)
    }

    /// Tears the channel down after the close exchange.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the plugin did not exit cleanly.
    fn shutdown(&mut self) -> Result<(), TransportError>;
}

/// An analyzer living on the far side of a [`Transport`].
#[derive(Debug)]
pub struct RemoteAnalyzer<T> {
    name: String,
    transport: T,
    next_id: u64,
    closed: bool,
}

impl<T: Transport> RemoteAnalyzer<T> {
    /// Creates a stub for the named analyzer over `transport`.
    #[must_use]
    pub fn new(name: impl Into<String>, transport: T) -> Self {
        Self {
            name: name.into(),
            transport,
            next_id: 1,
            closed: false,
        }
    }

    /// Returns the underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    fn transport_error(&self, operation: Operation, source: TransportError) -> AnalyzerError {
        AnalyzerError::Transport {
            analyzer: self.name.clone(),
            operation,
            source,
        }
    }

    fn call(&mut self, request: AnalyzerRequest<'_>) -> Result<AnalyzerResponse, AnalyzerError> {
        let operation = request.operation();
        let id = self.next_id;
        self.next_id += 1;

        let line = encode_request(&RequestEnvelope::new(id, request))
            .map_err(|source| self.transport_error(operation, source))?;
        debug!(
            target: REMOTE_TARGET,
            analyzer = %self.name,
            %operation,
            id,
            request_bytes = line.len(),
            "sending request"
        );
        let reply = if operation == Operation::Close {
            self.transport.close_round_trip(&line)
        } else {
            self.transport.round_trip(&line)
        }
        .map_err(|source| self.transport_error(operation, source))?;
        let (reply_id, response) = decode_response(&reply)
            .map_err(|source| self.transport_error(operation, source))?
            .into_parts();
        if reply_id != id {
            return Err(self.transport_error(
                operation,
                TransportError::InvalidOutput {
                    message: format!("expected response to request {id}, got {reply_id}"),
                },
            ));
        }

        match response {
            AnalyzerResponse::Error { message } => Err(self.remote_failure(operation, message)),
            other => Ok(other),
        }
    }

    fn remote_failure(&self, operation: Operation, message: String) -> AnalyzerError {
        let analyzer = self.name.clone();
        match operation {
            Operation::Configure => AnalyzerError::Configuration { analyzer, message },
            Operation::Close => AnalyzerError::Disposal { analyzer, message },
            _ => AnalyzerError::Analysis {
                analyzer,
                operation,
                message,
            },
        }
    }

    fn unexpected(&self, operation: Operation, response: &AnalyzerResponse) -> AnalyzerError {
        self.transport_error(
            operation,
            TransportError::InvalidOutput {
                message: format!("unexpected '{}' response to {operation}", response.kind()),
            },
        )
    }

    fn diagnostics(
        &mut self,
        request: AnalyzerRequest<'_>,
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        let operation = request.operation();
        match self.call(request)? {
            AnalyzerResponse::Diagnostics { diagnostics } => Ok(diagnostics),
            other => Err(self.unexpected(operation, &other)),
        }
    }
}

impl<T: Transport> Analyzer for RemoteAnalyzer<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, config: &AnalyzerConfiguration) -> Result<(), AnalyzerError> {
        match self.call(AnalyzerRequest::Configure {
            config: Cow::Borrowed(config),
        })? {
            AnalyzerResponse::Configured => Ok(()),
            other => Err(self.unexpected(Operation::Configure, &other)),
        }
    }

    fn analyze(
        &mut self,
        resource: &AnalyzerResource,
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        self.diagnostics(AnalyzerRequest::Analyze {
            resource: Cow::Borrowed(resource),
        })
    }

    fn analyze_stack(
        &mut self,
        resources: &[AnalyzerResource],
    ) -> Result<Vec<AnalyzeDiagnostic>, AnalyzerError> {
        self.diagnostics(AnalyzerRequest::AnalyzeStack {
            resources: Cow::Borrowed(resources),
        })
    }

    fn analyzer_info(&mut self) -> Result<AnalyzerInfo, AnalyzerError> {
        match self.call(AnalyzerRequest::GetAnalyzerInfo)? {
            AnalyzerResponse::AnalyzerInfo { info } => Ok(info),
            other => Err(self.unexpected(Operation::GetAnalyzerInfo, &other)),
        }
    }

    fn plugin_info(&mut self) -> Result<PluginInfo, AnalyzerError> {
        match self.call(AnalyzerRequest::GetPluginInfo)? {
            AnalyzerResponse::PluginInfo { info } => Ok(info),
            other => Err(self.unexpected(Operation::GetPluginInfo, &other)),
        }
    }

    /// Sends `close`, then shuts the transport down even if the plugin
    /// answered with an error. Repeated calls are no-ops.
    fn close(&mut self) -> Result<(), AnalyzerError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let exchange = match self.call(AnalyzerRequest::Close) {
            Ok(AnalyzerResponse::Closed) => Ok(()),
            Ok(other) => Err(self.unexpected(Operation::Close, &other)),
            Err(error) => Err(error),
        };
        let shutdown = self
            .transport
            .shutdown()
            .map_err(|source| self.transport_error(Operation::Close, source));
        exchange.and(shutdown)
    }
}
