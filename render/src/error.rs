//! Error type.
//!
//! This is the shared error type for the whole interface. Failures that
//! occur while decoding or executing a command stream are not reported
//! through this type: the device logs them and drops the offending packet
//! or primitive.

use std::{error, fmt};

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Handle is null, out of range, or its generation is stale.
    InvalidHandle,
    /// An operation would read or write past the end of a buffer.
    BufferOverflow,
    /// Pixel source format/type combination not implemented.
    UnsupportedFormat,
    /// Pipeline references a shader that was never registered.
    UnknownShader,
    /// Begin/End pass pairing violated at encode time.
    InvalidPassState,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidHandle => write!(f, "invalid or stale resource handle"),
            Error::BufferOverflow => write!(f, "read or write past the end of a buffer"),
            Error::UnsupportedFormat => write!(f, "unsupported pixel format/type combination"),
            Error::UnknownShader => write!(f, "pipeline references an unregistered shader"),
            Error::InvalidPassState => write!(f, "render pass begin/end mismatch"),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = ::std::result::Result<T, Error>;
