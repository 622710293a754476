//! Page lifecycle signals.
//!
//! Three things mean "re-evaluate the speed now": the tab finished a full
//! load, the single-page app routed to another video, or the site swapped the
//! player element without touching the URL. Detection here is pure: callers
//! feed locations and mutation batches in and get events out.

use std::time::Duration;

use paceline_contracts::page::{MutationKind, MutationRecord};
use serde::{Deserialize, Serialize};

use super::url::WatchPageMatcher;

/// Class carried by the element wrapping the `<video>` tag.
pub const PLAYER_CONTAINER_CLASS: &str = "html5-video-container";
/// Id of the outer player element.
pub const PLAYER_ELEMENT_ID: &str = "movie_player";
/// Main content container observed for player swaps.
pub const CONTENT_CONTAINER_SELECTOR: &str = "#content";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The page-embedded context just started on a page.
    PageStarted,
    /// The background context reported a completed load (`videoLoaded`).
    FullLoad,
    /// In-app navigation to another eligible location.
    RouteChanged,
    /// Player element replaced without a location change.
    PlayerReplaced,
}

impl LifecycleEvent {
    /// Player swaps keep the channel so an unchanged channel is not fully
    /// reprocessed; every other event forgets both halves.
    pub fn resets_channel(self) -> bool {
        !matches!(self, LifecycleEvent::PlayerReplaced)
    }

    pub fn settle_delay(self, timing: &PageTiming) -> Duration {
        match self {
            LifecycleEvent::PageStarted => timing.initial_delay(),
            LifecycleEvent::FullLoad => Duration::ZERO,
            LifecycleEvent::RouteChanged => timing.route_settle(),
            LifecycleEvent::PlayerReplaced => timing.player_settle(),
        }
    }
}

/// Delays that give the site time to render before the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageTiming {
    pub initial_delay_ms: u64,
    pub route_settle_ms: u64,
    pub player_settle_ms: u64,
    /// Background-side wait between a history update and `videoLoaded`.
    pub history_settle_ms: u64,
}

impl Default for PageTiming {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            route_settle_ms: 1_000,
            player_settle_ms: 500,
            history_settle_ms: 500,
        }
    }
}

impl PageTiming {
    /// No settle delays at all; handy for simulations.
    pub fn immediate() -> Self {
        Self {
            initial_delay_ms: 0,
            route_settle_ms: 0,
            player_settle_ms: 0,
            history_settle_ms: 0,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn route_settle(&self) -> Duration {
        Duration::from_millis(self.route_settle_ms)
    }

    pub fn player_settle(&self) -> Duration {
        Duration::from_millis(self.player_settle_ms)
    }

    pub fn history_settle(&self) -> Duration {
        Duration::from_millis(self.history_settle_ms)
    }
}

/// A location change noticed while observing the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteChange {
    pub from: String,
    pub to: String,
    /// Whether the new location is a watch page.
    pub eligible: bool,
}

impl RouteChange {
    pub fn lifecycle_event(&self) -> Option<LifecycleEvent> {
        self.eligible.then_some(LifecycleEvent::RouteChanged)
    }
}

/// Remembers the last observed location so repeated DOM churn on the same
/// page does not fire again.
#[derive(Debug, Clone)]
pub struct RouteTracker {
    matcher: WatchPageMatcher,
    last: String,
}

impl RouteTracker {
    pub fn new(matcher: WatchPageMatcher, initial: impl Into<String>) -> Self {
        Self {
            matcher,
            last: initial.into(),
        }
    }

    pub fn last_location(&self) -> &str {
        &self.last
    }

    pub fn observe(&mut self, current: &str) -> Option<RouteChange> {
        if current == self.last {
            return None;
        }
        let from = std::mem::replace(&mut self.last, current.to_string());
        Some(RouteChange {
            from,
            to: current.to_string(),
            eligible: self.matcher.is_watch_page(current),
        })
    }
}

/// Recognises player replacement in a batch of container mutations.
#[derive(Debug, Clone, Default)]
pub struct PlayerSwapDetector {
    matcher: WatchPageMatcher,
}

impl PlayerSwapDetector {
    pub fn new(matcher: WatchPageMatcher) -> Self {
        Self { matcher }
    }

    pub fn detect(
        &self,
        location: &str,
        batch: &[MutationRecord],
    ) -> Option<LifecycleEvent> {
        if !self.matcher.is_watch_page(location) {
            return None;
        }
        batch
            .iter()
            .any(is_player_mutation)
            .then_some(LifecycleEvent::PlayerReplaced)
    }
}

fn is_player_mutation(record: &MutationRecord) -> bool {
    record.kind == MutationKind::ChildList
        && (record.target.has_class(PLAYER_CONTAINER_CLASS)
            || record.target.has_id(PLAYER_ELEMENT_ID))
}

#[cfg(test)]
mod tests {
    use super::*;
    use paceline_contracts::page::NodeMarker;

    const WATCH_A: &str = "https://www.youtube.com/watch?v=aaa";
    const WATCH_B: &str = "https://www.youtube.com/watch?v=bbb";
    const HOME: &str = "https://www.youtube.com/";

    #[test]
    fn route_tracker_suppresses_unchanged_location() {
        let mut routes = RouteTracker::new(WatchPageMatcher::default(), WATCH_A);
        assert!(routes.observe(WATCH_A).is_none());

        let change = routes.observe(WATCH_B).expect("location changed");
        assert_eq!(change.from, WATCH_A);
        assert_eq!(change.lifecycle_event(), Some(LifecycleEvent::RouteChanged));
        assert!(routes.observe(WATCH_B).is_none());
    }

    #[test]
    fn leaving_watch_pages_is_a_change_without_event() {
        let mut routes = RouteTracker::new(WatchPageMatcher::default(), WATCH_A);
        let change = routes.observe(HOME).expect("location changed");
        assert!(!change.eligible);
        assert_eq!(change.lifecycle_event(), None);
        assert_eq!(routes.last_location(), HOME);
    }

    #[test]
    fn player_swap_needs_marker_and_watch_page() {
        let detector = PlayerSwapDetector::default();
        let container = vec![MutationRecord::child_list(NodeMarker::with_class(
            PLAYER_CONTAINER_CLASS,
        ))];
        let player = vec![MutationRecord::child_list(NodeMarker::with_id(
            PLAYER_ELEMENT_ID,
        ))];
        let churn = vec![
            MutationRecord::child_list(NodeMarker::with_id("comments")),
            MutationRecord {
                kind: MutationKind::Attributes,
                target: NodeMarker::with_id(PLAYER_ELEMENT_ID),
            },
        ];

        assert_eq!(
            detector.detect(WATCH_A, &container),
            Some(LifecycleEvent::PlayerReplaced)
        );
        assert_eq!(
            detector.detect(WATCH_A, &player),
            Some(LifecycleEvent::PlayerReplaced)
        );
        assert_eq!(detector.detect(WATCH_A, &churn), None);
        assert_eq!(detector.detect(HOME, &container), None);
    }

    #[test]
    fn only_player_swaps_keep_the_channel() {
        assert!(LifecycleEvent::RouteChanged.resets_channel());
        assert!(LifecycleEvent::FullLoad.resets_channel());
        assert!(!LifecycleEvent::PlayerReplaced.resets_channel());
    }

    #[test]
    fn settle_delays_follow_timing() {
        let timing = PageTiming::default();
        assert_eq!(
            LifecycleEvent::RouteChanged.settle_delay(&timing),
            Duration::from_millis(1_000)
        );
        assert_eq!(
            LifecycleEvent::PlayerReplaced.settle_delay(&timing),
            Duration::from_millis(500)
        );
        assert_eq!(LifecycleEvent::FullLoad.settle_delay(&timing), Duration::ZERO);
    }
}
