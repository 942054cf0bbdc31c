// Error types for reqcraft
// User-input problems never surface here; they land in the serialization report.

use thiserror::Error;

/// Raised when a string-typed kind coming from the API model or a config
/// file does not name anything this crate knows about.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unsupported HTTP method: {0}")]
    Method(String),

    #[error("unknown parameter binding: {0}")]
    Binding(String),

    #[error("unknown scalar data type: {0}")]
    DataType(String),

    #[error("unknown authorization method: {0}")]
    AuthKind(String),

    #[error("unknown token delivery method: {0}")]
    DeliveryMethod(String),

    #[error("unknown server selection kind: {0}")]
    ServerKind(String),
}

/// Errors produced by a transport while dispatching a request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    #[error("failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("invalid request method: {0}")]
    Method(#[from] ParseError),

    #[error("invalid header `{name}`")]
    Header { name: String },

    #[error("HTTP request {id} failed")]
    RequestFailed {
        id: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to read response body for request {id}")]
    ResponseRead {
        id: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors returned by the request assembler.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssembleError {
    #[error("no operation selected")]
    NoOperation,

    #[error("invalid parameters: {}", .0.join(", "))]
    InvalidParameters(Vec<String>),

    #[error(transparent)]
    Transport(#[from] TransportError),
}
