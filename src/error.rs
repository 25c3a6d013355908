//! Error taxonomy.
//!
//! Library functions return `anyhow::Result`. The variants here are attached as the root
//! cause of those errors so callers (and tests) can tell a broken binary apart from a broken
//! environment with `downcast_ref::<Error>()`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The binary could not be read as a well-formed program-header table plus section mapping.
    MalformedBinary(String),
    /// An external introspection tool could not be launched or exited unsuccessfully.
    ExternalToolFailure { tool: String, reason: String },
}

impl Error {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedBinary(reason.into())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedBinary(reason) => write!(f, "malformed binary: {}", reason),
            Error::ExternalToolFailure { tool, reason } => {
                write!(f, "external tool `{}` failed: {}", tool, reason)
            }
        }
    }
}

impl std::error::Error for Error {}
