pub use crate::error::{ModelError, Result as ModelResult};
pub use crate::ids::{ChannelName, TabId, VideoId};
pub use crate::messages::{ContentRequest, ContentResponse};
pub use crate::speed::{
    Speed, SpeedOverrides, SpeedPolicy, SpeedPreset, SpeedValue,
};
