//! Error types for the register connector.

use thiserror::Error;

/// Errors raised while building a register schema.
///
/// Schema problems are configuration-time failures: they surface when the
/// connector is constructed and are fatal to startup, never during polling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A layout declared a register kind this crate does not know.
    #[error("unknown register kind '{0}'")]
    UnknownKind(String),

    /// A layout line could not be parsed (missing colon, non-numeric offset).
    #[error("malformed layout entry '{0}'")]
    Malformed(String),

    /// A field name was used that the schema does not define.
    #[error("no field named '{0}' in the register layout")]
    UnknownField(String),
}

/// Errors raised while packing a value into registers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    /// The value cannot be converted to the numeric domain of the field kind.
    #[error("cannot encode {value:?} as {kind}")]
    NotNumeric {
        /// Debug rendering of the offending value.
        value: String,
        /// Kind string of the target field.
        kind: &'static str,
    },

    /// The value is numeric but outside the representable range of the kind.
    #[error("value {value} is out of range for {kind}")]
    OutOfRange {
        /// The offending value.
        value: i64,
        /// Kind string of the target field.
        kind: &'static str,
    },
}

/// Top-level error type for connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Opening the transport to the device failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A register read or write transaction failed at the transport layer.
    #[error("transport failure: {0}")]
    Transport(String),

    /// An operation was attempted while no transport is open.
    #[error("not connected")]
    NotConnected,

    /// The register schema is invalid or a field lookup failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// A value could not be packed into its register field.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl ConnectorError {
    /// Shorthand for a transport failure with a message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Shorthand for a connect failure with a message.
    pub fn connect(msg: impl Into<String>) -> Self {
        Self::Connect(msg.into())
    }

    /// True if this error is transient (device/network), false if it is a
    /// configuration problem that will not go away by retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connect(_) | Self::Transport(_) | Self::NotConnected
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_display() {
        let e = SchemaError::UnknownKind("datetime64".into());
        assert_eq!(e.to_string(), "unknown register kind 'datetime64'");

        let e = SchemaError::Malformed("\"Day\" {".into());
        assert!(e.to_string().contains("malformed"));
    }

    #[test]
    fn test_error_conversion() {
        let e: ConnectorError = SchemaError::UnknownField("U12".into()).into();
        assert!(matches!(e, ConnectorError::Schema(_)));
        assert!(!e.is_transient());

        let e = ConnectorError::transport("read timed out");
        assert!(e.is_transient());
    }
}
