use std::io::ErrorKind;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The blob does not have the structure of a self-relative security descriptor.
    #[error("malformed security descriptor at offset {offset}: {reason}")]
    MalformedDescriptor { offset: usize, reason: String },

    #[error("security descriptor does not fit in an ACL ({size} bytes)")]
    DescriptorTooLarge { size: usize },

    #[error("failed to read security descriptor of {object}: {message}")]
    FetchFailure { object: String, message: String },

    /// The directory refused the re-encoded descriptor. The in-memory copy is left as is.
    #[error("failed to write security descriptor of {object}: {message}")]
    PersistFailure { object: String, message: String },

    #[error("invalid SID string {0:?}")]
    InvalidSid(String),

    #[error("invalid GUID string {0:?}")]
    InvalidGuid(String),

    #[error("invalid rights configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Error {
        Error::MalformedDescriptor {
            offset,
            reason: reason.into(),
        }
    }

    /// Maps a codec failure on a blob of `len` bytes.
    pub(crate) fn from_binrw(err: &binrw::Error, len: usize) -> Error {
        match err.root_cause() {
            binrw::Error::AssertFail { pos, message } => Error::malformed(*pos as usize, message.as_str()),
            binrw::Error::NoVariantMatch { pos } => Error::malformed(*pos as usize, "unsupported ACE type"),
            binrw::Error::Io(e) if e.kind() == ErrorKind::UnexpectedEof => {
                Error::malformed(len, "unexpected end of data")
            }
            binrw::Error::BadMagic { pos, .. }
            | binrw::Error::Custom { pos, .. }
            | binrw::Error::EnumErrors { pos, .. } => Error::malformed(*pos as usize, "invalid structure"),
            other => Error::malformed(len, other.to_string()),
        }
    }
}
