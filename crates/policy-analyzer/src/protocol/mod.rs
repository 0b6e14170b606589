//! JSONL protocol spoken between the engine and analyzer plugins.
//!
//! The analyzer process stays alive for the whole run. For each contract
//! operation the engine writes one [`RequestEnvelope`] line to the plugin's
//! stdin and reads one [`ResponseEnvelope`] line from its stdout. Envelopes
//! carry a request id chosen by the engine; the plugin echoes it so that a
//! desynchronised stream is detected instead of misattributing results.
//! Plugin stderr is captured for logging but is not part of the protocol.
//!
//! ```text
//! -> {"id":1,"method":"configure","config":{"stack_name":"prod","project_name":"infra","dry_run":true}}
//! <- {"id":1,"result":"configured"}
//! -> {"id":2,"method":"analyze","resource":{"urn":"urn:pkg:aws:s3/bucket::b","type":"aws:s3/bucket","name":"b","properties":{}}}
//! <- {"id":2,"result":"diagnostics","diagnostics":[]}
//! ```


use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::analyzer::Operation;
use crate::configuration::AnalyzerConfiguration;
use crate::diagnostic::AnalyzeDiagnostic;
use crate::error::TransportError;
use crate::policy::{AnalyzerInfo, PluginInfo};
use crate::resource::AnalyzerResource;

/// Version of the wire protocol implemented by this crate.
pub const PROTOCOL_VERSION: u32 = 1;

/// Request id used for responses to lines that could not be parsed.
pub const UNPARSEABLE_REQUEST_ID: u64 = 0;

/// A contract operation with its arguments.
///
/// Arguments are borrowed when the engine encodes a request and owned when a
/// plugin decodes one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AnalyzerRequest<'a> {
    /// Supplies the run configuration.
    Configure {
        /// Run context.
        config: Cow<'a, AnalyzerConfiguration>,
    },
    /// Analyzes one resource.
    Analyze {
        /// Resource under analysis.
        resource: Cow<'a, AnalyzerResource>,
    },
    /// Analyzes the full resource set.
    AnalyzeStack {
        /// Every resource of the run.
        resources: Cow<'a, [AnalyzerResource]>,
    },
    /// Requests policy pack metadata.
    GetAnalyzerInfo,
    /// Requests plugin metadata.
    GetPluginInfo,
    /// Asks the plugin to release its resources and exit.
    Close,
}

impl AnalyzerRequest<'_> {
    /// Returns the operation this request invokes.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::Configure { .. } => Operation::Configure,
            Self::Analyze { .. } => Operation::Analyze,
            Self::AnalyzeStack { .. } => Operation::AnalyzeStack,
            Self::GetAnalyzerInfo => Operation::GetAnalyzerInfo,
            Self::GetPluginInfo => Operation::GetPluginInfo,
            Self::Close => Operation::Close,
        }
    }
}

/// A request line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: AnalyzerRequest<'a>,
}

impl<'a> RequestEnvelope<'a> {
    /// Wraps a request with its id.
    #[must_use]
    pub const fn new(id: u64, request: AnalyzerRequest<'a>) -> Self {
        Self { id, request }
    }

    /// Returns the request id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the request.
    #[must_use]
    pub const fn request(&self) -> &AnalyzerRequest<'a> {
        &self.request
    }

    /// Splits the envelope into id and request.
    #[must_use]
    pub fn into_parts(self) -> (u64, AnalyzerRequest<'a>) {
        (self.id, self.request)
    }
}

/// The outcome of one operation as reported by a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum AnalyzerResponse {
    /// Configuration was accepted.
    Configured,
    /// Analysis completed with the given diagnostics.
    Diagnostics {
        /// Diagnostics in the order the policies produced them.
        #[serde(default)]
        diagnostics: Vec<AnalyzeDiagnostic>,
    },
    /// Policy pack metadata.
    AnalyzerInfo {
        /// The metadata.
        info: AnalyzerInfo,
    },
    /// Plugin metadata.
    PluginInfo {
        /// The metadata.
        info: PluginInfo,
    },
    /// The plugin released its resources and is about to exit.
    Closed,
    /// The operation failed.
    Error {
        /// Failure description.
        message: String,
    },
}

impl AnalyzerResponse {
    /// Creates an error response.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns the result tag as written on the wire.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configured => "configured",
            Self::Diagnostics { .. } => "diagnostics",
            Self::AnalyzerInfo { .. } => "analyzer_info",
            Self::PluginInfo { .. } => "plugin_info",
            Self::Closed => "closed",
            Self::Error { .. } => "error",
        }
    }
}

/// A response line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    id: u64,
    #[serde(flatten)]
    response: AnalyzerResponse,
}

impl ResponseEnvelope {
    /// Wraps a response with the id of the request it answers.
    #[must_use]
    pub const fn new(id: u64, response: AnalyzerResponse) -> Self {
        Self { id, response }
    }

    /// Returns the id of the answered request.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the response.
    #[must_use]
    pub const fn response(&self) -> &AnalyzerResponse {
        &self.response
    }

    /// Splits the envelope into id and response.
    #[must_use]
    pub fn into_parts(self) -> (u64, AnalyzerResponse) {
        (self.id, self.response)
    }
}

/// Serialises a request envelope as a single line without the terminator.
///
/// # Errors
///
/// Returns [`TransportError::Serialize`] if serialisation fails.
pub fn encode_request(envelope: &RequestEnvelope<'_>) -> Result<String, TransportError> {
    serde_json::to_string(envelope).map_err(|source| TransportError::Serialize { source })
}

/// Parses a request line.
///
/// # Errors
///
/// Returns [`TransportError::Deserialize`] if the line is not a valid request.
pub fn decode_request(line: &str) -> Result<RequestEnvelope<'static>, TransportError> {
    serde_json::from_str(line.trim()).map_err(|source| TransportError::Deserialize {
        message: format!("invalid request line: {source}"),
        source: Some(source),
    })
}

/// Serialises a response envelope as a single line without the terminator.
///
/// # Errors
///
/// Returns [`TransportError::Serialize`] if serialisation fails.
pub fn encode_response(envelope: &ResponseEnvelope) -> Result<String, TransportError> {
    serde_json::to_string(envelope).map_err(|source| TransportError::Serialize { source })
}

/// Parses a response line.
///
/// # Errors
///
/// Returns [`TransportError::Deserialize`] if the line is not a valid
/// response.
pub fn decode_response(line: &str) -> Result<ResponseEnvelope, TransportError> {
    serde_json::from_str(line.trim()).map_err(|source| TransportError::Deserialize {
        message: format!("invalid response line: {source}"),
        source: Some(source),
    })
}
