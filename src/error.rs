//! Error types shared by the cape model, codec, engine and library.
//!
//! Every error that reaches a user carries a short title (`title()`) and a
//! longer cause (its `Display` output).

use std::path::PathBuf;
use thiserror::Error;

/// Failure to turn bytes into a [`Cape`](crate::model::cape::Cape).
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Cape file is not a valid property list: {0}")]
    Malformed(String),

    #[error("Cape file has no identifier")]
    MissingIdentifier,

    #[error("Cape requires format version {minimum:.1}, this build reads up to {supported:.1}")]
    UnsupportedVersion { minimum: f64, supported: f64 },

    #[error("Could not read cape file: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque failure reported by a cursor registration provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Registration of {name} was rejected: {reason}")]
    Rejected { name: String, reason: String },

    #[error("Provider I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Provider does not support {0}")]
    Unsupported(&'static str),
}

#[derive(Error, Debug)]
pub enum CapeError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("Multiple cursors with the name(s): {} exist.", names.join(", "))]
    DuplicateIdentifiers { names: Vec<String> },

    #[error("Another cape with the identifier {0} is already in the library.")]
    IdentifierInUse(String),

    #[error("The destination, {}, is not writable.", path.display())]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Frame count of {identifier} out of range [1...24] (got {frame_count})")]
    InvalidFrameCount { identifier: String, frame_count: u32 },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Refusing to set cursor scale {0}, it must be above 0 and at most 32")]
    ScaleOutOfRange(f32),

    #[error("No cape with the identifier {0} is in the library.")]
    UnknownCape(String),

    #[error("{0}")]
    InvalidCape(String),

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CapeError {
    /// Short headline suitable for an alert title or a log prefix.
    pub fn title(&self) -> &'static str {
        match self {
            CapeError::Decode(_) => "Could not open cape",
            CapeError::DuplicateIdentifiers { .. }
            | CapeError::IdentifierInUse(_)
            | CapeError::WriteFailure { .. } => "Save failed",
            CapeError::InvalidFrameCount { .. } | CapeError::Provider(_) => "Apply failed",
            CapeError::ScaleOutOfRange(_) => "Scale not changed",
            CapeError::UnknownCape(_) => "Unknown cape",
            CapeError::InvalidCape(_) => "Failed to create cape file",
            CapeError::Cancelled => "Cancelled",
            CapeError::Io(_) => "I/O error",
        }
    }
}

pub type Result<T> = std::result::Result<T, CapeError>;
