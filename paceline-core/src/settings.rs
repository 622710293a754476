//! Operations behind the settings surface.
//!
//! The panel edits the shared store and, where the change affects the video
//! the user is looking at, pushes `setSpeed` into the active tab.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use paceline_contracts::messaging::{
    ActiveTabLookup, Delivery, DeliveryError, TabInfo, TabMessenger,
};
use paceline_contracts::store::SettingsStore;
use paceline_model::{ChannelName, ContentRequest, Speed, SpeedPreset, TabId};
use tracing::{debug, warn};

use crate::error::{Result, SettingsError};
use crate::page::WatchPageMatcher;
use crate::policy::SpeedPolicyStore;

/// Confirmation text shown after a successful action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusMessage {
    ChannelSaved,
    ChannelAdded,
    SpeedUpdated,
    ChannelRemoved,
    DefaultSaved,
}

impl StatusMessage {
    pub fn text(self) -> &'static str {
        match self {
            StatusMessage::ChannelSaved => "Channel speed saved!",
            StatusMessage::ChannelAdded => "Channel added successfully!",
            StatusMessage::SpeedUpdated => "Speed updated!",
            StatusMessage::ChannelRemoved => "Channel removed!",
            StatusMessage::DefaultSaved => "Using Default Speed",
        }
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Everything the settings surface renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsSnapshot {
    /// Sorted by channel name.
    pub overrides: Vec<(ChannelName, Speed)>,
    pub default_speed: Speed,
    pub current_channel: Option<ChannelName>,
    pub current_channel_speed: Option<Speed>,
}

pub struct SettingsPanel<S, T> {
    policy: SpeedPolicyStore<S>,
    tabs: Arc<T>,
    matcher: WatchPageMatcher,
    current_channel: Option<ChannelName>,
}

impl<S, T> fmt::Debug for SettingsPanel<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsPanel")
            .field("policy", &self.policy)
            .field("matcher", &self.matcher)
            .field("current_channel", &self.current_channel)
            .finish_non_exhaustive()
    }
}

impl<S, T> SettingsPanel<S, T>
where
    S: SettingsStore,
    T: TabMessenger + ActiveTabLookup,
{
    /// Build the panel and ask the active tab which channel it shows.
    pub async fn open(store: Arc<S>, tabs: Arc<T>, matcher: WatchPageMatcher) -> Self {
        let mut panel = Self {
            policy: SpeedPolicyStore::new(store),
            tabs,
            matcher,
            current_channel: None,
        };
        panel.refresh_current_channel().await;
        panel
    }

    pub fn current_channel(&self) -> Option<&ChannelName> {
        self.current_channel.as_ref()
    }

    pub fn policy(&self) -> &SpeedPolicyStore<S> {
        &self.policy
    }

    pub async fn refresh_current_channel(&mut self) -> Option<&ChannelName> {
        self.current_channel = match self.on_site_tab().await {
            Some(tab) => match self.tabs.send(tab.id, ContentRequest::GetChannelInfo).await {
                Ok(response) => response.channel_name().cloned(),
                Err(err) => {
                    debug!(tab = %tab.id, error = %err, "Could not ask the tab for its channel");
                    None
                }
            },
            None => None,
        };
        self.current_channel.as_ref()
    }

    pub async fn snapshot(&self) -> Result<SettingsSnapshot> {
        let policy = self.policy.snapshot().await?;
        let current_channel_speed = self
            .current_channel
            .as_ref()
            .and_then(|channel| policy.overrides.get(channel.as_str()));
        Ok(SettingsSnapshot {
            overrides: policy.overrides.sorted(),
            default_speed: policy.default_speed,
            current_channel: self.current_channel.clone(),
            current_channel_speed,
        })
    }

    /// Store `preset` for the detected channel and apply it right away.
    pub async fn save_current_channel(&self, preset: SpeedPreset) -> Result<StatusMessage> {
        let channel = self
            .current_channel
            .as_ref()
            .ok_or(SettingsError::NoChannelDetected)?;
        self.policy.set_override(channel, preset.speed()).await?;
        self.push_speed(preset.speed()).await;
        Ok(StatusMessage::ChannelSaved)
    }

    /// Add an override for a typed-in channel name. Nothing is pushed.
    pub async fn add_override(&self, name: &str, preset: SpeedPreset) -> Result<StatusMessage> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SettingsError::EmptyChannelName);
        }
        self.policy
            .set_override(&ChannelName::new(name), preset.speed())
            .await?;
        Ok(StatusMessage::ChannelAdded)
    }

    pub async fn update_override(
        &self,
        channel: &ChannelName,
        preset: SpeedPreset,
    ) -> Result<StatusMessage> {
        self.policy.set_override(channel, preset.speed()).await?;
        if self.is_current(channel.as_str()) {
            self.push_speed(preset.speed()).await;
        }
        Ok(StatusMessage::SpeedUpdated)
    }

    /// Remove an override; the current channel falls back to the default.
    pub async fn delete_override(&self, channel: &str) -> Result<StatusMessage> {
        let existed = self.policy.delete_override(channel).await?;
        debug!(channel, existed, "Deleted channel override");
        if self.is_current(channel) {
            let default_speed = self.policy.default_speed().await?;
            self.push_speed(default_speed).await;
        }
        Ok(StatusMessage::ChannelRemoved)
    }

    /// Save the default and apply it when the video on screen uses it.
    pub async fn set_default(&self, preset: SpeedPreset) -> Result<StatusMessage> {
        self.policy.set_default(preset.speed()).await?;

        let uses_default = match &self.current_channel {
            None => true,
            Some(channel) => !self.policy.overrides().await?.contains(channel.as_str()),
        };
        if uses_default {
            self.push_speed(preset.speed()).await;
        }
        Ok(StatusMessage::DefaultSaved)
    }

    fn is_current(&self, channel: &str) -> bool {
        self.current_channel
            .as_ref()
            .is_some_and(|current| current.as_str() == channel)
    }

    async fn on_site_tab(&self) -> Option<TabInfo> {
        self.tabs
            .active_tab()
            .await
            .filter(|tab| self.matcher.is_on_site(&tab.url))
    }

    async fn push_speed(&self, speed: Speed) -> Option<Delivery> {
        let tab = self.on_site_tab().await?;
        let delivery = self.tabs.send(tab.id, ContentRequest::set_speed(speed)).await;
        if let Err(err) = &delivery {
            warn!(tab = %tab.id, speed = %speed, error = %err, "Could not push speed to tab");
        }
        Some(delivery)
    }
}

/// Tab access for a settings surface running outside the browser: there is
/// never an active tab and nothing can be delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedTabs;

#[async_trait]
impl TabMessenger for DetachedTabs {
    async fn send(&self, tab: TabId, _request: ContentRequest) -> Delivery {
        Err(DeliveryError::NoReceiver(tab))
    }
}

#[async_trait]
impl ActiveTabLookup for DetachedTabs {
    async fn active_tab(&self) -> Option<TabInfo> {
        None
    }
}
