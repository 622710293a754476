use paceline_contracts::store::StoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Please enter a channel name or ID")]
    EmptyChannelName,

    #[error("No YouTube channel detected")]
    NoChannelDetected,
}

pub type Result<T> = std::result::Result<T, SettingsError>;
