//! Request/response shapes exchanged between extension contexts.
//!
//! The JSON layout is fixed by the extension host scripts:
//! `{"action":"videoLoaded"}`, `{"action":"getChannelInfo"}` and
//! `{"action":"setSpeed","speed":"1.5"}`.

use crate::ids::ChannelName;
use crate::speed::SpeedValue;

/// Requests handled by the page-embedded context.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "action", rename_all = "camelCase"))]
pub enum ContentRequest {
    /// The background context saw a completed load or history update.
    VideoLoaded,
    /// Settings surface asks which channel the page shows.
    GetChannelInfo,
    /// Apply `speed` right away, bypassing de-duplication.
    SetSpeed { speed: SpeedValue },
}

impl ContentRequest {
    pub fn set_speed(speed: impl Into<SpeedValue>) -> Self {
        ContentRequest::SetSpeed {
            speed: speed.into(),
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            ContentRequest::VideoLoaded => "videoLoaded",
            ContentRequest::GetChannelInfo => "getChannelInfo",
            ContentRequest::SetSpeed { .. } => "setSpeed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProcessingStatus {
    Processing,
}

/// Replies sent back by the page-embedded context.
// Variant order matters for untagged decoding: `ChannelInfo` has only an
// optional field and would swallow the other shapes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ContentResponse {
    Processing {
        status: ProcessingStatus,
    },
    SpeedSet {
        success: bool,
    },
    ChannelInfo {
        #[cfg_attr(feature = "serde", serde(rename = "channelName"))]
        channel_name: Option<ChannelName>,
    },
}

impl ContentResponse {
    pub fn processing() -> Self {
        ContentResponse::Processing {
            status: ProcessingStatus::Processing,
        }
    }

    pub fn channel_name(&self) -> Option<&ChannelName> {
        match self {
            ContentResponse::ChannelInfo { channel_name } => channel_name.as_ref(),
            _ => None,
        }
    }
}
