//! Rich diagnostic error types for the bridge.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so callers know whether a
//! failure came from the wire, the atom model, or the memory layer.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the bridge.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the caller.
#[derive(Debug, Error, Diagnostic)]
pub enum BridgeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Atom(#[from] AtomError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Notation(#[from] NotationError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TransportError {
    #[error("transport unavailable: {message}")]
    #[diagnostic(
        code(cogbridge::transport::unavailable),
        help(
            "There is no live connection and the command could not be written to the \
             fallback staging directory either. Check that the staging directory is \
             writable and that the disk is not full."
        )
    )]
    Unavailable { message: String },

    #[error("reasoning server rejected the exchange: {message}")]
    #[diagnostic(
        code(cogbridge::transport::remote_rejected),
        help(
            "The socket write or read failed and the connection was marked lost. \
             Reconnect explicitly; the bridge never reconnects on its own."
        )
    )]
    RemoteRejected { message: String },

    #[error("failed to connect to {endpoint}")]
    #[diagnostic(
        code(cogbridge::transport::connect),
        help("Is the reasoning server running and listening on this host and port?")
    )]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("not connected to the reasoning server")]
    #[diagnostic(
        code(cogbridge::transport::not_connected),
        help("Call `connect` first. Raw sends need a live socket; use `dispatch` to queue offline.")
    )]
    NotConnected,

    #[error("fallback queue error at {path}")]
    #[diagnostic(
        code(cogbridge::transport::fallback),
        help("Check that the staging directory exists, has correct permissions, and is not full.")
    )]
    Fallback {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Atom errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AtomError {
    #[error("link of kind {kind} has no outgoing atoms")]
    #[diagnostic(
        code(cogbridge::atom::empty_outgoing),
        help("Links encode argument positions; supply at least one outgoing atom.")
    )]
    EmptyOutgoing { kind: String },

    #[error("invalid truth value ({strength}, {confidence})")]
    #[diagnostic(
        code(cogbridge::atom::truth_value),
        help("Strength and confidence must both lie in [0, 1].")
    )]
    InvalidTruthValue { strength: f64, confidence: f64 },

    #[error("number node value {value} is not finite")]
    #[diagnostic(
        code(cogbridge::atom::number),
        help("NumberNode names are canonical decimal text; NaN and infinities have none.")
    )]
    InvalidNumber { value: f64 },

    #[error("number node name \"{text}\" is not a number")]
    #[diagnostic(
        code(cogbridge::atom::number_text),
        help("Use decimal text such as `3`, `-0.5` or `1e9`.")
    )]
    InvalidNumberText { text: String },

    #[error("atom ID allocator exhausted")]
    #[diagnostic(
        code(cogbridge::atom::exhausted),
        help("The 64-bit atom ID space has been exhausted. Create a fresh connector.")
    )]
    AllocatorExhausted,
}

// ---------------------------------------------------------------------------
// Notation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum NotationError {
    #[error("malformed command expression: {message}")]
    #[diagnostic(
        code(cogbridge::notation::parse),
        help("Command notation is parenthesised: `(Kind \"name\")` or `(Kind <atom> <atom> ...)`.")
    )]
    Parse { message: String },

    #[error("operator identifier '{token}' already occurs in client text: {context}")]
    #[diagnostic(
        code(cogbridge::notation::ambiguous),
        help(
            "The text contains a long-form operator name as ordinary text, so translating \
             back to client notation would turn it into a glyph. Rename the identifier \
             or accept the lossy round trip."
        )
    )]
    Ambiguous { token: String, context: String },
}

// ---------------------------------------------------------------------------
// Memory errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MemoryError {
    #[error("{operation} requires a live connection")]
    #[diagnostic(
        code(cogbridge::memory::not_connected),
        help("Space-scoped operations are gated on the connection. Connect and retry.")
    )]
    NotConnected { operation: String },

    #[error("memory space \"{space}\" not found")]
    #[diagnostic(
        code(cogbridge::memory::not_found),
        help("Spaces are created on first store; nothing has been stored into this one yet.")
    )]
    NotFound { space: String },

    #[error("snapshot error: {message}")]
    #[diagnostic(
        code(cogbridge::memory::snapshot),
        help("The snapshot file could not be read or written, or is not valid snapshot JSON.")
    )]
    Snapshot { message: String },
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config: {path}")]
    #[diagnostic(
        code(cogbridge::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {path}: {message}")]
    #[diagnostic(
        code(cogbridge::config::parse),
        help("Check the TOML syntax and field types in the config file.")
    )]
    Parse { path: String, message: String },
}

/// Convenience result type for bridge operations.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

/// Result type for transport-only operations.
pub type TransportResult<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_wraps_transparently() {
        let err: BridgeError = TransportError::NotConnected.into();
        assert_eq!(err.to_string(), "not connected to the reasoning server");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("cogbridge::transport::not_connected"));
    }

    #[test]
    fn atom_error_message_names_kind() {
        let err = AtomError::EmptyOutgoing {
            kind: "InheritanceLink".into(),
        };
        assert!(err.to_string().contains("InheritanceLink"));
    }
}
