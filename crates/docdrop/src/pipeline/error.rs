use thiserror::Error;

use crate::error::{DecodeError, IdResolutionError};
use crate::writer::FailureCode;

/// Failures that end a File Load Task before any store call.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("Id resolution failed: {0}")]
    Id(#[from] IdResolutionError),
}

impl LoadError {
    pub fn code(&self) -> FailureCode {
        match self {
            LoadError::Decode(DecodeError::ReadFile { .. }) => FailureCode::Exception,
            LoadError::Decode(_) => FailureCode::Decode,
            LoadError::Id(_) => FailureCode::IdResolution,
        }
    }
}
