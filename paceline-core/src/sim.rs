//! In-process stand-ins for the browser: a scripted page with a player, a
//! clock that records instead of sleeping, and a tab registry that routes
//! messages to per-tab [`PageController`]s.
//!
//! The CLI simulator and the tests drive the real orchestration code through
//! these types.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use paceline_contracts::clock::RetryClock;
use paceline_contracts::messaging::{
    ActiveTabLookup, ContentEndpoint, Delivery, DeliveryError, TabInfo, TabMessenger,
};
use paceline_contracts::page::{
    MutationRecord, MutationSender, MutationSubscription, NodeMarker, ObserveScope, PageDom,
    PlayerError, PlayerHandle,
};
use paceline_contracts::store::SettingsStore;
use paceline_model::{ContentRequest, TabId};

use crate::channel::CHANNEL_SELECTORS;
use crate::orchestrator::{PageController, PageControllerConfig};
use crate::page::{CONTENT_CONTAINER_SELECTOR, PLAYER_CONTAINER_CLASS};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A `<video>` element. Rate writes are appended to a log shared with the
/// owning page so swaps do not lose history. Once the page drops the element,
/// handles still held elsewhere refuse writes.
#[derive(Debug)]
pub struct SimulatedPlayer {
    rate: Mutex<f64>,
    writes: Arc<Mutex<Vec<f64>>>,
    reject: Arc<AtomicBool>,
    attached: AtomicBool,
}

impl PlayerHandle for SimulatedPlayer {
    fn playback_rate(&self) -> f64 {
        *lock(&self.rate)
    }

    fn set_playback_rate(&self, rate: f64) -> Result<(), PlayerError> {
        if !self.attached.load(Ordering::SeqCst) {
            return Err(PlayerError::Detached);
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(PlayerError::RateRejected {
                rate,
                reason: "NotSupportedError".into(),
            });
        }
        *lock(&self.rate) = rate;
        lock(&self.writes).push(rate);
        Ok(())
    }
}

/// Scripted watch page.
#[derive(Debug)]
pub struct SimulatedPage {
    location: Mutex<String>,
    texts: Mutex<HashMap<String, String>>,
    player: Mutex<Option<Arc<SimulatedPlayer>>>,
    writes: Arc<Mutex<Vec<f64>>>,
    reject: Arc<AtomicBool>,
    content_container: bool,
    observers: Mutex<Vec<(ObserveScope, MutationSender)>>,
}

impl SimulatedPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            location: Mutex::new(url.into()),
            texts: Mutex::new(HashMap::new()),
            player: Mutex::new(None),
            writes: Arc::new(Mutex::new(Vec::new())),
            reject: Arc::new(AtomicBool::new(false)),
            content_container: true,
            observers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_player(self) -> Self {
        self.attach_player();
        self
    }

    /// Page without a `#content` element, so player swaps go unobserved.
    pub fn without_content_container(mut self) -> Self {
        self.content_container = false;
        self
    }

    pub fn set_text(&self, selector: &str, text: &str) {
        lock(&self.texts).insert(selector.to_string(), text.to_string());
    }

    pub fn remove_text(&self, selector: &str) {
        lock(&self.texts).remove(selector);
    }

    /// Render the owner name in the primary layout.
    pub fn set_channel(&self, name: &str) {
        self.set_text(CHANNEL_SELECTORS[0], name);
    }

    /// Remove the owner name from every layout.
    pub fn clear_channel(&self) {
        for selector in CHANNEL_SELECTORS {
            self.remove_text(selector);
        }
    }

    /// Render a fresh player, detaching any previous one.
    pub fn attach_player(&self) {
        let player = Arc::new(SimulatedPlayer {
            rate: Mutex::new(1.0),
            writes: Arc::clone(&self.writes),
            reject: Arc::clone(&self.reject),
            attached: AtomicBool::new(true),
        });
        self.swap_player(Some(player));
    }

    pub fn detach_player(&self) {
        self.swap_player(None);
    }

    fn swap_player(&self, next: Option<Arc<SimulatedPlayer>>) {
        if let Some(previous) = std::mem::replace(&mut *lock(&self.player), next) {
            previous.attached.store(false, Ordering::SeqCst);
        }
    }

    pub fn reject_rates(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    /// In-app navigation: the location changes and the document mutates.
    pub fn navigate(&self, url: impl Into<String>) {
        *lock(&self.location) = url.into();
        self.emit(vec![MutationRecord::child_list(NodeMarker::with_id(
            "page-manager",
        ))]);
    }

    /// Swap in a fresh player element without touching the location.
    pub fn replace_player(&self) {
        self.attach_player();
        self.emit(vec![MutationRecord::child_list(NodeMarker::with_class(
            PLAYER_CONTAINER_CLASS,
        ))]);
    }

    /// Mutations unrelated to navigation or the player.
    pub fn churn(&self) {
        self.emit(vec![MutationRecord::child_list(NodeMarker::with_id(
            "comments",
        ))]);
    }

    pub fn playback_rate(&self) -> Option<f64> {
        lock(&self.player).as_ref().map(|p| p.playback_rate())
    }

    pub fn player_writes(&self) -> Vec<f64> {
        lock(&self.writes).clone()
    }

    pub fn observer_count(&self) -> usize {
        let mut observers = lock(&self.observers);
        observers.retain(|(_, sender)| !sender.is_closed());
        observers.len()
    }

    // Every mutation lands in the content container, which sits inside the
    // document, so both scopes see it.
    fn emit(&self, batch: Vec<MutationRecord>) {
        let mut observers = lock(&self.observers);
        observers.retain(|(_, sender)| sender.deliver(batch.clone()));
    }
}

impl PageDom for SimulatedPage {
    fn location(&self) -> String {
        lock(&self.location).clone()
    }

    fn player(&self) -> Option<Arc<dyn PlayerHandle>> {
        lock(&self.player)
            .as_ref()
            .map(|p| Arc::clone(p) as Arc<dyn PlayerHandle>)
    }

    fn text_content(&self, selector: &str) -> Option<String> {
        lock(&self.texts).get(selector).cloned()
    }

    fn observe(&self, scope: ObserveScope) -> Option<MutationSubscription> {
        if let ObserveScope::Container(selector) = &scope
            && (selector != CONTENT_CONTAINER_SELECTOR || !self.content_container)
        {
            return None;
        }
        let (sender, subscription) = MutationSubscription::channel(scope.clone());
        lock(&self.observers).push((scope, sender));
        Some(subscription)
    }
}

/// Clock that records requested delays and only yields.
#[derive(Debug, Default)]
pub struct RecordingClock {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }

    pub fn total(&self) -> Duration {
        lock(&self.sleeps).iter().sum()
    }
}

#[async_trait]
impl RetryClock for RecordingClock {
    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        tokio::task::yield_now().await;
    }
}

struct SimTab<S, C> {
    page: Arc<SimulatedPage>,
    controller: PageController<SimulatedPage, S, C>,
}

/// Tabs sharing one settings store, each with its own page context.
pub struct SimulatedBrowser<S, C = RecordingClock> {
    store: Arc<S>,
    clock: Arc<C>,
    config: PageControllerConfig,
    tabs: Mutex<HashMap<TabId, SimTab<S, C>>>,
    next_id: AtomicU32,
    active: Mutex<Option<TabId>>,
    sent: Mutex<Vec<(TabId, ContentRequest)>>,
}

impl<S, C> fmt::Debug for SimulatedBrowser<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tabs: Vec<TabId> = lock(&self.tabs).keys().copied().collect();
        tabs.sort_unstable();
        f.debug_struct("SimulatedBrowser")
            .field("tabs", &tabs)
            .field("active", &*lock(&self.active))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, C> SimulatedBrowser<S, C>
where
    S: SettingsStore + 'static,
    C: RetryClock + 'static,
{
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self::with_config(store, clock, PageControllerConfig::default())
    }

    pub fn with_config(store: Arc<S>, clock: Arc<C>, config: PageControllerConfig) -> Self {
        Self {
            store,
            clock,
            config,
            tabs: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            active: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Open `page` in a new tab, make it active and return its id.
    pub fn open_tab(&self, page: Arc<SimulatedPage>) -> TabId {
        let id = TabId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let controller = PageController::new(
            Arc::clone(&page),
            Arc::clone(&self.store),
            Arc::clone(&self.clock),
            self.config.clone(),
        );
        lock(&self.tabs).insert(id, SimTab { page, controller });
        self.activate(id);
        id
    }

    pub fn activate(&self, tab: TabId) {
        *lock(&self.active) = Some(tab);
    }

    pub fn close_tab(&self, tab: TabId) {
        lock(&self.tabs).remove(&tab);
        let mut active = lock(&self.active);
        if *active == Some(tab) {
            *active = None;
        }
    }

    pub fn page(&self, tab: TabId) -> Option<Arc<SimulatedPage>> {
        lock(&self.tabs).get(&tab).map(|t| Arc::clone(&t.page))
    }

    pub fn controller(&self, tab: TabId) -> Option<PageController<SimulatedPage, S, C>> {
        lock(&self.tabs).get(&tab).map(|t| t.controller.clone())
    }

    pub fn sent_to(&self, tab: TabId) -> Vec<ContentRequest> {
        lock(&self.sent)
            .iter()
            .filter(|(id, _)| *id == tab)
            .map(|(_, request)| request.clone())
            .collect()
    }
}

#[async_trait]
impl<S, C> TabMessenger for SimulatedBrowser<S, C>
where
    S: SettingsStore + 'static,
    C: RetryClock + 'static,
{
    async fn send(&self, tab: TabId, request: ContentRequest) -> Delivery {
        lock(&self.sent).push((tab, request.clone()));
        let controller = self
            .controller(tab)
            .ok_or(DeliveryError::NoReceiver(tab))?;
        Ok(controller.handle(request).await)
    }
}

#[async_trait]
impl<S, C> ActiveTabLookup for SimulatedBrowser<S, C>
where
    S: SettingsStore + 'static,
    C: RetryClock + 'static,
{
    async fn active_tab(&self) -> Option<TabInfo> {
        let id = (*lock(&self.active))?;
        let page = self.page(id)?;
        Some(TabInfo {
            id,
            url: page.location(),
        })
    }
}
