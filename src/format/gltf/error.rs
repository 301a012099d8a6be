use std::io;

/// Errors raised while encoding or decoding glTF and GLB data.
///
/// Container-level problems (bad magic, truncated chunks, unknown accessor types) always abort
/// the whole operation. Problems with a single image are not represented here because they are
/// logged and skipped where they happen.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The data is not glTF 2.0, or it references something that doesn't exist.
    #[error("invalid glTF data: {0}")]
    Format(String),
    /// A declared length doesn't match the number of bytes available.
    #[error("truncated {what}: expected {expected} bytes, found {actual}")]
    Truncation {
        what: String,
        expected: usize,
        actual: usize,
    },
    /// A component type or element type outside of the glTF enumeration.
    #[error("unsupported accessor type: {0}")]
    UnsupportedType(String),
    /// The resolver couldn't produce the bytes of a referenced resource.
    #[error("failed to resolve \"{uri}\": {reason}")]
    ResourceResolution { uri: String, reason: String },
    /// The JSON tree didn't pass schema validation. Only raised in strict mode.
    #[error("glTF validation failed: {0}")]
    Validation(String),
    /// An optional capability, like image decoding, wasn't provided.
    #[error("{0} is unavailable")]
    CapabilityUnavailable(&'static str),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    pub(crate) fn truncation(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        Self::Truncation {
            what: what.into(),
            expected,
            actual,
        }
    }
}
