//! Format and framing errors.

use map_core::{EditorError, ErrorSeverity};

/// Errors raised by the node stream codec and the OTBM schema layer.
///
/// Framing violations are fatal to the current load or save: once the node
/// structure is broken, everything downstream is ambiguous and there is no
/// silent recovery. I/O failures from the underlying channel propagate
/// unchanged instead of being reinterpreted as format errors.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// Node start/end markers do not pair up.
    #[error("unbalanced node markers in stream")]
    UnbalancedNodes,

    /// The stream ended inside an open node or a typed field.
    #[error("stream ended inside an open node")]
    TruncatedStream,

    /// Header declares a schema this layer cannot interpret.
    #[error("unsupported map format version {0}")]
    UnsupportedVersion(u32),

    /// The fixed preamble is malformed.
    #[error("malformed map file header")]
    BadHeader,

    /// A node of this kind is not valid at the position it appeared in.
    #[error("unexpected node kind {0:#04x}")]
    UnexpectedNode(u8),

    /// A string field is too long for its length prefix.
    #[error("string of {0} bytes exceeds the u16 length prefix")]
    StringTooLong(usize),

    /// Failure of the underlying byte channel.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EditorError for FormatError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            FormatError::UnbalancedNodes
            | FormatError::TruncatedStream
            | FormatError::Io(_) => ErrorSeverity::Fatal,
            FormatError::UnsupportedVersion(_)
            | FormatError::BadHeader
            | FormatError::UnexpectedNode(_)
            | FormatError::StringTooLong(_) => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            FormatError::UnbalancedNodes => "OTBM_UNBALANCED_NODES",
            FormatError::TruncatedStream => "OTBM_TRUNCATED_STREAM",
            FormatError::UnsupportedVersion(_) => "OTBM_UNSUPPORTED_VERSION",
            FormatError::BadHeader => "OTBM_BAD_HEADER",
            FormatError::UnexpectedNode(_) => "OTBM_UNEXPECTED_NODE",
            FormatError::StringTooLong(_) => "OTBM_STRING_TOO_LONG",
            FormatError::Io(_) => "OTBM_IO",
        }
    }
}
