//! Speed application: find the player, work out the rate, write it once.

use std::fmt;
use std::sync::Arc;

use paceline_contracts::page::{PageDom, PlayerHandle};
use paceline_contracts::store::SettingsStore;
use paceline_model::{ChannelName, Speed, SpeedPolicy, VideoId};
use tracing::{debug, info, warn};

use crate::channel::ChannelResolver;
use crate::page::WatchPageMatcher;
use crate::policy::SpeedPolicyStore;

/// What the current page context has already applied.
///
/// Lives only as long as the page context and is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedState {
    pub last_video_id: Option<VideoId>,
    pub last_channel: Option<ChannelName>,
    /// Attempt number of the retry loop currently running, 0 when idle.
    pub retry_count: u32,
}

impl ProcessedState {
    /// Forget both the video and the channel.
    pub fn reset(&mut self) {
        self.last_video_id = None;
        self.last_channel = None;
    }

    /// Forget the video but keep channel tracking.
    pub fn reset_video(&mut self) {
        self.last_video_id = None;
    }

    /// True when `(video, channel)` was already applied. An empty recorded
    /// video id never matches, so the first resolution after a reset always
    /// goes through.
    pub fn already_applied(&self, video: Option<&VideoId>, channel: &ChannelName) -> bool {
        match (&self.last_video_id, video) {
            (Some(last), Some(current)) => {
                last == current && self.last_channel.as_ref() == Some(channel)
            }
            _ => false,
        }
    }

    pub fn record(&mut self, video: Option<VideoId>, channel: ChannelName) {
        self.last_video_id = video;
        self.last_channel = Some(channel);
    }
}

/// Result of one application attempt.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum ApplyOutcome {
    /// No `<video>` yet; worth retrying.
    PlayerMissing,
    /// Owner name not rendered yet; worth retrying.
    ChannelMissing,
    /// Same video and channel as last time; nothing written.
    AlreadyApplied,
    /// The rate was written.
    Applied {
        speed: Speed,
        channel: Option<ChannelName>,
    },
    /// Writing the rate failed. Not retried: the page state that rejected it
    /// will reject it again.
    WriteFailed { speed: Speed },
}

impl ApplyOutcome {
    /// `false` only for the not-ready outcomes the retry loop should repeat.
    pub fn is_settled(&self) -> bool {
        !matches!(self, ApplyOutcome::PlayerMissing | ApplyOutcome::ChannelMissing)
    }
}

/// Resolves the target speed for the current page and applies it.
pub struct SpeedEngine<D, S> {
    dom: Arc<D>,
    policy: SpeedPolicyStore<S>,
    resolver: ChannelResolver,
    matcher: WatchPageMatcher,
}

impl<D, S> fmt::Debug for SpeedEngine<D, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeedEngine")
            .field("dom_type", &std::any::type_name::<D>())
            .field("policy", &self.policy)
            .field("resolver", &self.resolver)
            .field("matcher", &self.matcher)
            .finish()
    }
}

impl<D: PageDom, S: SettingsStore> SpeedEngine<D, S> {
    pub fn new(
        dom: Arc<D>,
        policy: SpeedPolicyStore<S>,
        resolver: ChannelResolver,
        matcher: WatchPageMatcher,
    ) -> Self {
        Self {
            dom,
            policy,
            resolver,
            matcher,
        }
    }

    pub fn current_channel(&self) -> Option<ChannelName> {
        self.resolver.resolve(self.dom.as_ref())
    }

    /// One application attempt.
    ///
    /// With `explicit` set the rate is written unconditionally and
    /// `state` is left untouched. Otherwise the channel must be known, an
    /// unchanged `(video, channel)` pair short-circuits, and a successful
    /// resolution is recorded into `state`.
    pub async fn apply(&self, state: &mut ProcessedState, explicit: Option<Speed>) -> ApplyOutcome {
        let Some(player) = self.dom.player() else {
            debug!("No video element found");
            return ApplyOutcome::PlayerMissing;
        };

        let channel = self.current_channel();

        if let Some(speed) = explicit {
            return write_rate(player.as_ref(), speed, channel);
        }

        let Some(channel) = channel else {
            debug!("No channel detected");
            return ApplyOutcome::ChannelMissing;
        };

        let video_id = self.matcher.video_id(&self.dom.location());
        if state.already_applied(video_id.as_ref(), &channel) {
            debug!(channel = %channel, "Already processed this video/channel combination");
            return ApplyOutcome::AlreadyApplied;
        }

        let policy = match self.policy.snapshot().await {
            Ok(policy) => policy,
            Err(err) => {
                warn!(error = %err, "Could not read speed settings, using defaults");
                SpeedPolicy::default()
            }
        };
        debug!(
            overrides = policy.overrides.len(),
            default_speed = %policy.default_speed,
            "Retrieved settings"
        );

        let speed = policy.resolve(Some(&channel));
        let outcome = write_rate(player.as_ref(), speed, Some(channel.clone()));
        state.record(video_id, channel);
        outcome
    }
}

fn write_rate(
    player: &dyn PlayerHandle,
    speed: Speed,
    channel: Option<ChannelName>,
) -> ApplyOutcome {
    let channel_label = channel.as_ref().map_or("unknown", |c| c.as_str());
    match player.set_playback_rate(speed.get()) {
        Ok(()) => {
            info!(speed = %speed, channel = channel_label, "Set playback speed");
            ApplyOutcome::Applied { speed, channel }
        }
        Err(err) => {
            warn!(
                speed = %speed,
                channel = channel_label,
                error = %err,
                "Error setting playback rate"
            );
            ApplyOutcome::WriteFailed { speed }
        }
    }
}
