//! Error types for the client library.

use thiserror::Error;

use rowhouse_data::{DecodeError, EncodeError, SchemaError, ValueError};

/// Configuration errors; raised while building a client, never by a call.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// More than one authentication method was configured.
    #[error("Only one of password, access token or SSL authentication may be configured")]
    ExclusiveAuth,

    /// No endpoint was configured.
    #[error("at least one endpoint is required")]
    NoEndpoints,

    /// An endpoint URL could not be parsed.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The offending endpoint string.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The endpoint scheme is not supported by this transport.
    #[error("unsupported endpoint scheme {scheme:?}; the TLS material is carried as configuration but this transport dials plain TCP")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// A numeric option has an invalid value.
    #[error("invalid option {option}: {reason}")]
    InvalidOption {
        /// Option name.
        option: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Transport-level failures, classified for retry decisions.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No pooled connection became free within the checkout window.
    #[error("connection request timeout after {0}ms")]
    ConnectionRequestTimeout(u64),

    /// Establishing the TCP connection timed out.
    #[error("connect timeout to {0}")]
    ConnectTimeout(String),

    /// A read or write exceeded the socket timeout.
    #[error("socket timeout after {0}ms")]
    SocketTimeout(u64),

    /// The server accepted the request but closed without a response.
    #[error("no response from server")]
    NoResponse,

    /// The connection was reset mid-exchange.
    #[error("connection reset")]
    ConnectionReset,

    /// Any other I/O failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// Transport failure.
    #[error("transport failed: {0}")]
    Transport(#[from] TransportError),

    /// Error reported by the server, extracted from headers or body.
    #[error("{message}")]
    Server {
        /// Server error code.
        code: i32,
        /// Server message, folded to a single line.
        message: String,
    },

    /// Authentication rejected by the server.
    #[error("authentication failed: {message}")]
    Auth {
        /// Server message.
        message: String,
    },

    /// The response head could not be parsed.
    #[error("malformed http response: {0}")]
    MalformedResponse(String),

    /// Schema or type-string failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Value encoding failure.
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// Stream decoding failure; the connection is closed.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Typed accessor failure.
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl ClientError {
    /// The server error code, if this is a server-reported failure.
    pub fn server_code(&self) -> Option<i32> {
        match self {
            ClientError::Server { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Server code for failed authentication.
pub(crate) const AUTHENTICATION_FAILED: i32 = 516;

/// Server codes that signal the cached schema has drifted.
pub(crate) const SCHEMA_DRIFT_CODES: &[i32] = &[
    16, // NO_SUCH_COLUMN_IN_TABLE
    47, // UNKNOWN_IDENTIFIER
    60, // UNKNOWN_TABLE
];
