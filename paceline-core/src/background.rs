//! Extension-wide relay: watches tab events and tells page contexts that a
//! video finished loading.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use paceline_contracts::clock::RetryClock;
use paceline_contracts::messaging::{Delivery, TabMessenger};
use paceline_model::{ContentRequest, TabId};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::page::{PageTiming, WatchPageMatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabStatus {
    Loading,
    Complete,
}

/// Background-context tab tracking and `videoLoaded` dispatch.
pub struct BackgroundRelay<M, C> {
    messenger: Arc<M>,
    clock: Arc<C>,
    matcher: WatchPageMatcher,
    timing: PageTiming,
    notified: Mutex<HashSet<TabId>>,
}

impl<M, C> fmt::Debug for BackgroundRelay<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackgroundRelay")
            .field("messenger_type", &std::any::type_name::<M>())
            .field("matcher", &self.matcher)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl<M: TabMessenger, C: RetryClock> BackgroundRelay<M, C> {
    pub fn new(
        messenger: Arc<M>,
        clock: Arc<C>,
        matcher: WatchPageMatcher,
        timing: PageTiming,
    ) -> Self {
        Self {
            messenger,
            clock,
            matcher,
            timing,
            notified: Mutex::new(HashSet::new()),
        }
    }

    /// Tab status change. A new load forgets the tab; a completed load of a
    /// watch page notifies it once. Returns the delivery result when a
    /// message was sent.
    pub async fn on_tab_updated(
        &self,
        tab: TabId,
        status: TabStatus,
        url: &str,
    ) -> Option<Delivery> {
        match status {
            TabStatus::Loading => {
                self.notified.lock().await.remove(&tab);
                None
            }
            TabStatus::Complete => {
                if !self.matcher.is_watch_page(url) {
                    return None;
                }
                if !self.notified.lock().await.insert(tab) {
                    debug!(tab = %tab, "Tab already notified for this load");
                    return None;
                }
                info!(tab = %tab, "Tab loaded, sending videoLoaded message");
                Some(self.notify(tab).await)
            }
        }
    }

    pub async fn on_tab_removed(&self, tab: TabId) {
        self.notified.lock().await.remove(&tab);
    }

    /// In-app navigation reported by the browser. Waits for the page to
    /// settle, then notifies the tab regardless of earlier notifications.
    pub async fn on_history_state_updated(&self, tab: TabId, url: &str) -> Option<Delivery> {
        if !self.matcher.is_watch_page(url) {
            return None;
        }
        info!(tab = %tab, "History state updated, sending videoLoaded message");
        self.clock.sleep(self.timing.history_settle()).await;
        Some(self.notify(tab).await)
    }

    pub async fn notified_tabs(&self) -> Vec<TabId> {
        let mut tabs: Vec<_> = self.notified.lock().await.iter().copied().collect();
        tabs.sort_unstable();
        tabs
    }

    async fn notify(&self, tab: TabId) -> Delivery {
        let delivery = self.messenger.send(tab, ContentRequest::VideoLoaded).await;
        if let Err(err) = &delivery {
            info!(tab = %tab, error = %err, "Error sending message to tab");
        }
        delivery
    }
}
