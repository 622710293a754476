//! Core value types shared across Paceline crates.
#![allow(missing_docs)]

pub mod error;
pub mod ids;
pub mod messages;
pub mod prelude;
pub mod speed;

// Intentionally curated re-exports for downstream consumers.
pub use error::{ModelError, Result as ModelResult};
pub use ids::{ChannelName, TabId, VideoId};
pub use messages::{ContentRequest, ContentResponse, ProcessingStatus};
pub use speed::{Speed, SpeedOverrides, SpeedPolicy, SpeedPreset, SpeedValue};
