use std::fmt::{self, Display};

/// Errors produced by model constructors and parsing routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The raw value could not be read as a finite playback speed.
    InvalidSpeed(String),
    /// The value parsed as a speed but is not one of the selectable presets.
    UnknownPreset(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidSpeed(raw) => {
                write!(f, "invalid playback speed: {raw:?}")
            }
            ModelError::UnknownPreset(raw) => {
                write!(f, "not a speed preset: {raw:?}")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
