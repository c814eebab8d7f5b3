//! Error types with credential redaction.
//!
//! Driver failures are carried through unchanged apart from the password in
//! connection strings, which is masked before it can reach a log line or an
//! error message.

use thiserror::Error;

/// SQLSTATE DB2 reports when a named object does not exist.
pub const SQLSTATE_UNDEFINED_OBJECT: &str = "42704";

/// Main error type for connector operations.
#[derive(Debug, Error)]
pub enum IbmDbError {
    /// Opening a connection through the driver failed
    #[error("Database connection failed: {context}")]
    Connection {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The native driver rejected a statement or a transaction call
    #[error("{message}")]
    Driver {
        message: String,
        sqlstate: Option<String>,
    },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No connection could be obtained because the settings are incomplete
    #[error("Not connected: {reason}")]
    NotConnected { reason: String },

    /// The targeted row does not exist
    #[error("{message}")]
    NotFound { message: String, status: u16 },

    /// Identifier placeholders are a programmer error for this dialect
    #[error("Placeholder for identifiers is not supported: {key}")]
    UnsupportedPlaceholder { key: String },

    /// Unsupported feature or operation
    #[error("Unsupported operation: {feature} not supported for {context}")]
    UnsupportedFeature { feature: String, context: String },

    /// An operator received operands it cannot express
    #[error("Invalid operand for '{operator}': {reason}")]
    InvalidOperand { operator: String, reason: String },

    /// Placeholder count and bound value count disagree
    #[error("Statement has {placeholders} placeholders but {params} bound values")]
    ParameterMismatch { placeholders: usize, params: usize },

    /// A column value could not be converted to the declared property type
    #[error("Cannot convert column value for '{property}': {reason}")]
    Conversion { property: String, reason: String },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience type alias for Results with IbmDbError
pub type Result<T> = std::result::Result<T, IbmDbError>;

/// Masks the `PWD` entry of a semicolon-delimited connection string.
///
/// Keys are matched case-insensitively; every other entry is kept as is so the
/// result still shows which host and database were targeted.
///
/// # Example
///
/// ```rust
/// use ibmdb_core::error::redact_connection_string;
///
/// let sanitized = redact_connection_string("DATABASE=testdb;UID=db2inst1;PWD=secret;PORT=50000");
/// assert_eq!(sanitized, "DATABASE=testdb;UID=db2inst1;PWD=****;PORT=50000");
/// ```
pub fn redact_connection_string(connection_string: &str) -> String {
    connection_string
        .split(';')
        .map(|entry| match entry.split_once('=') {
            Some((key, _)) if key.trim().eq_ignore_ascii_case("PWD") => format!("{key}=****"),
            _ => entry.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

impl IbmDbError {
    /// Creates a connection error, redacting the connection string it mentions
    pub fn connection_failed<E>(connection_string: &str, error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            context: format!(
                "could not open {}",
                redact_connection_string(connection_string)
            ),
            source: Box::new(error),
        }
    }

    /// Creates a driver error carrying an optional SQLSTATE
    pub fn driver(message: impl Into<String>, sqlstate: Option<String>) -> Self {
        Self::Driver {
            message: message.into(),
            sqlstate,
        }
    }

    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a not-connected error
    pub fn not_connected(reason: impl Into<String>) -> Self {
        Self::NotConnected {
            reason: reason.into(),
        }
    }

    /// Creates the error returned when a replace targets a missing row
    pub fn replace_target_not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound {
            message: format!("Could not replace. Object with id {id} does not exist!"),
            status: 404,
        }
    }

    /// Creates an unsupported feature error
    pub fn unsupported_feature(feature: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnsupportedFeature {
            feature: feature.into(),
            context: context.into(),
        }
    }

    /// Creates an invalid operand error
    pub fn invalid_operand(operator: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperand {
            operator: operator.into(),
            reason: reason.into(),
        }
    }

    /// Creates a value conversion error
    pub fn conversion(property: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conversion {
            property: property.into(),
            reason: reason.into(),
        }
    }

    /// HTTP-style status code for domain errors, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::NotFound { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// SQLSTATE reported by the driver, if any
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::Driver { sqlstate, .. } => sqlstate.as_deref(),
            _ => None,
        }
    }

    /// Whether the driver reported that the referenced object does not exist.
    ///
    /// Falls back to scanning the message because some driver paths only
    /// embed the SQLSTATE in the diagnostic text.
    pub fn is_undefined_object(&self) -> bool {
        match self {
            Self::Driver { message, sqlstate } => {
                sqlstate.as_deref() == Some(SQLSTATE_UNDEFINED_OBJECT)
                    || message.contains(SQLSTATE_UNDEFINED_OBJECT)
            }
            _ => false,
        }
    }
}
