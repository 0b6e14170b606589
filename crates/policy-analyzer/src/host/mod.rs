//! Plugin-side request loop.
//!
//! A plugin binary wraps its in-process [`Analyzer`] and hands it to
//! [`serve`], which reads request lines from stdin until `close` or end of
//! input, dispatching each to the analyzer and writing one response line per
//! request. Calls are driven through an [`AnalyzerSession`], so a request
//! arriving out of order is answered with an error response instead of
//! reaching the analyzer.


use std::io::{self, BufRead, Write};

use thiserror::Error;
use tracing::{debug, warn};

use crate::analyzer::Analyzer;
use crate::error::{AnalyzerError, TransportError};
use crate::protocol::{
    AnalyzerRequest, AnalyzerResponse, ResponseEnvelope, UNPARSEABLE_REQUEST_ID, decode_request,
    encode_response,
};
use crate::session::AnalyzerSession;

/// Tracing target for the plugin request loop.
const HOST_TARGET: &str = "policy_analyzer::host";

/// Errors that stop the request loop.
#[derive(Debug, Error)]
pub enum HostError {
    /// Reading a request line failed.
    #[error("failed to read analyzer request: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Writing a response line failed.
    #[error("failed to write analyzer response: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A response could not be serialised.
    #[error("failed to encode analyzer response: {source}")]
    Encode {
        /// Underlying encoding error.
        #[source]
        source: TransportError,
    },
}

/// Serves `analyzer` over a line-oriented request stream.
///
/// Returns once a `close` request has been answered or the input ends. In
/// the latter case the analyzer is closed before returning.
///
/// # Errors
///
/// Returns [`HostError`] if the streams fail. Analyzer failures and
/// malformed requests are reported to the engine as error responses.
pub fn serve<A: Analyzer>(
    stdin: &mut impl BufRead,
    stdout: &mut impl Write,
    analyzer: A,
) -> Result<(), HostError> {
    let mut session = AnalyzerSession::new(analyzer);
    let mut line = String::new();
    loop {
        line.clear();
        let bytes_read = stdin
            .read_line(&mut line)
            .map_err(|source| HostError::Read { source })?;
        if bytes_read == 0 {
            debug!(target: HOST_TARGET, analyzer = session.name(), "input closed");
            if let Err(error) = session.close() {
                warn!(target: HOST_TARGET, %error, "failed to close analyzer at end of input");
            }
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }

        let (id, request) = match decode_request(&line) {
            Ok(envelope) => envelope.into_parts(),
            Err(error) => {
                warn!(target: HOST_TARGET, %error, "rejecting malformed request");
                respond(
                    stdout,
                    UNPARSEABLE_REQUEST_ID,
                    AnalyzerResponse::error(error.to_string()),
                )?;
                continue;
            }
        };

        if matches!(request, AnalyzerRequest::Close) {
            let response = session.close().map_or_else(
                |error| AnalyzerResponse::error(error.reason()),
                |()| AnalyzerResponse::Closed,
            );
            return respond(stdout, id, response);
        }

        let response = dispatch(&mut session, &request).unwrap_or_else(|error| {
            debug!(
                target: HOST_TARGET,
                analyzer = error.analyzer(),
                %error,
                "request failed"
            );
            AnalyzerResponse::error(error.reason())
        });
        respond(stdout, id, response)?;
    }
}

fn dispatch<A: Analyzer>(
    session: &mut AnalyzerSession<A>,
    request: &AnalyzerRequest<'_>,
) -> Result<AnalyzerResponse, AnalyzerError> {
    match request {
        AnalyzerRequest::Configure { config } => session
            .configure(config)
            .map(|()| AnalyzerResponse::Configured),
        AnalyzerRequest::Analyze { resource } => session
            .analyze(resource)
            .map(|diagnostics| AnalyzerResponse::Diagnostics { diagnostics }),
        AnalyzerRequest::AnalyzeStack { resources } => session
            .analyze_stack(resources)
            .map(|diagnostics| AnalyzerResponse::Diagnostics { diagnostics }),
        AnalyzerRequest::GetAnalyzerInfo => session
            .analyzer_info()
            .map(|info| AnalyzerResponse::AnalyzerInfo { info }),
        AnalyzerRequest::GetPluginInfo => session
            .plugin_info()
            .map(|info| AnalyzerResponse::PluginInfo { info }),
        AnalyzerRequest::Close => Ok(AnalyzerResponse::Closed),
    }
}

fn respond(
    stdout: &mut impl Write,
    id: u64,
    response: AnalyzerResponse,
) -> Result<(), HostError> {
    let payload = encode_response(&ResponseEnvelope::new(id, response))
        .map_err(|source| HostError::Encode { source })?;
    stdout
        .write_all(payload.as_bytes())
        .map_err(|source| HostError::Write { source })?;
    stdout
        .write_all(b"\n")
        .map_err(|source| HostError::Write { source })?;
    stdout
        .flush()
        .map_err(|source| HostError::Write { source })
}
