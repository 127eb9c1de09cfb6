//! Error types for wsfgate
//!
//! Every failure the core can surface is a variant of [`WsfError`]. Each
//! variant has a fixed `{id, name, description, level}` payload so the
//! serialization layer can render it without inspecting messages.

use serde::Serialize;
use thiserror::Error;

use crate::grant::Operation;

/// Severity attached to an error report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorLevel {
    Notice,
    Warning,
    Fatal,
}

/// Coarse classification used by callers to pick a response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Denied,
    BadRequest,
    Fatal,
}

/// The main error type for wsfgate operations
#[derive(Debug, Clone, Error)]
pub enum WsfError {
    #[error("{identity} lacks {operation} on {graph}")]
    Denied {
        identity: String,
        graph: String,
        operation: Operation,
    },

    #[error("No query specified for this request")]
    NoQuery,

    #[error("No dataset specified for this request")]
    NoDataset,

    #[error("Limit {requested} exceeds the maximum of {max}")]
    LimitTooLarge { requested: u32, max: u32 },

    #[error("SPARUL not permitted")]
    MutationNotPermitted,

    #[error("GRAPH not permitted without FROM NAMED clauses")]
    UnboundedGraphClause,

    #[error("Unknown listing mode: {0}")]
    UnknownListingMode(String),

    #[error("No target dataset URI defined for this request")]
    NoTargetDataset,

    #[error("Invalid identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid grant: {0}")]
    InvalidGrant(String),

    #[error("Grant store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Upstream store answered {status}")]
    UpstreamError { status: u16, body: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Result type alias for wsfgate operations
pub type Result<T> = std::result::Result<T, WsfError>;

impl From<heed::Error> for WsfError {
    fn from(e: heed::Error) -> Self {
        WsfError::Storage(e.to_string())
    }
}

impl From<std::io::Error> for WsfError {
    fn from(e: std::io::Error) -> Self {
        WsfError::Storage(e.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for WsfError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        WsfError::StoreUnavailable("grant store read timed out".into())
    }
}

struct Code {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    level: ErrorLevel,
}

impl WsfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WsfError::Denied { .. } => ErrorKind::Denied,
            WsfError::StoreUnavailable(_)
            | WsfError::UpstreamError { .. }
            | WsfError::Storage(_)
            | WsfError::Configuration(_) => ErrorKind::Fatal,
            _ => ErrorKind::BadRequest,
        }
    }

    pub fn level(&self) -> ErrorLevel {
        self.code().level
    }

    /// HTTP status equivalent for this error
    pub fn status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Denied => 403,
            ErrorKind::BadRequest => 400,
            ErrorKind::Fatal => 500,
        }
    }

    fn code(&self) -> Code {
        use ErrorLevel::*;
        match self {
            WsfError::Denied { .. } => Code {
                id: "WS-AUTH-VALIDATOR-303",
                name: "No access defined",
                description: "No access defined for this requester IP, dataset and web service",
                level: Warning,
            },
            WsfError::NoQuery => Code {
                id: "WS-SPARQL-200",
                name: "No query specified for this request",
                description: "No query specified for this request",
                level: Warning,
            },
            WsfError::NoDataset => Code {
                id: "WS-SPARQL-201",
                name: "No dataset specified for this request",
                description: "No dataset specified for this request",
                level: Warning,
            },
            WsfError::LimitTooLarge { .. } => Code {
                id: "WS-SPARQL-202",
                name: "The maximum number of records returned within the same slice is 2000",
                description: "Use multiple queries with the OFFSET parameter to build-up the entire resultset.",
                level: Warning,
            },
            WsfError::MutationNotPermitted => Code {
                id: "WS-SPARQL-203",
                name: "SPARUL not permitted.",
                description: "No SPARUL queries are permitted for this sparql endpoint.",
                level: Warning,
            },
            WsfError::UnboundedGraphClause => Code {
                id: "WS-SPARQL-205",
                name: "GRAPH not permitted without FROM NAMED clauses.",
                description: "GRAPH clauses are only permitted when the query is bound by one, or a series of FROM NAMED clauses.",
                level: Warning,
            },
            WsfError::UnknownListingMode(_) => Code {
                id: "WS-AUTH-LISTER-200",
                name: "Unknown Listing Mode",
                description: "The mode you specified for the 'mode' parameter is unknown.",
                level: Warning,
            },
            WsfError::NoTargetDataset => Code {
                id: "WS-AUTH-LISTER-201",
                name: "No Target Dataset URI",
                description: "A target dataset URI is needed for the mode 'access_dataset'",
                level: Warning,
            },
            WsfError::InvalidIdentity(_) => Code {
                id: "WS-AUTH-REGISTRAR-200",
                name: "Invalid identity",
                description: "The registered identity is empty, unresolved or nests the reserved '::' delimiter",
                level: Warning,
            },
            WsfError::InvalidGrant(_) => Code {
                id: "WS-AUTH-REGISTRAR-201",
                name: "Invalid access",
                description: "The access record is missing its dataset or identity",
                level: Warning,
            },
            WsfError::StoreUnavailable(_) => Code {
                id: "WS-AUTH-VALIDATOR-300",
                name: "Can't get the access records",
                description: "An error occured when we tried to read the access records of the dataset",
                level: Fatal,
            },
            WsfError::UpstreamError { .. } => Code {
                id: "WS-SPARQL-300",
                name: "Connection to the sparql endpoint failed",
                description: "Connection to the sparql endpoint failed",
                level: Fatal,
            },
            WsfError::Storage(_) => Code {
                id: "WS-AUTH-VALIDATOR-301",
                name: "Grant storage failure",
                description: "The access-control storage could not be read or written",
                level: Fatal,
            },
            WsfError::Configuration(_) => Code {
                id: "WS-FRAMEWORK-300",
                name: "Invalid configuration",
                description: "The web service network configuration could not be loaded",
                level: Fatal,
            },
        }
    }

    /// Structured report for the serialization layer
    pub fn report(&self, webservice: &str) -> ErrorReport {
        let code = self.code();
        let debug_info = match self {
            WsfError::UpstreamError { body, .. } => body.clone(),
            WsfError::StoreUnavailable(m) | WsfError::Storage(m) | WsfError::Configuration(m) => m.clone(),
            other => other.to_string(),
        };
        ErrorReport {
            id: code.id.to_string(),
            webservice: webservice.to_string(),
            name: code.name.to_string(),
            description: code.description.to_string(),
            debug_info,
            level: code.level,
        }
    }
}

/// Error shape consumed by the serialization layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub id: String,
    pub webservice: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "debugInfo")]
    pub debug_info: String,
    pub level: ErrorLevel,
}

impl ErrorReport {
    /// Informational condition that never blocks the response
    pub fn notice(id: &str, webservice: &str, name: &str, description: &str) -> Self {
        ErrorReport {
            id: id.to_string(),
            webservice: webservice.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            debug_info: String::new(),
            level: ErrorLevel::Notice,
        }
    }
}
