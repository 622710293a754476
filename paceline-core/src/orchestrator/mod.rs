//! Per-page orchestration.
//!
//! A [`PageController`] lives for as long as the page-embedded context does.
//! It owns the [`ProcessedState`], turns lifecycle signals into retry loops
//! and answers the requests other contexts send into the page.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use paceline_contracts::clock::RetryClock;
use paceline_contracts::messaging::ContentEndpoint;
use paceline_contracts::page::{MutationRecord, MutationSubscription, ObserveScope, PageDom};
use paceline_contracts::store::SettingsStore;
use paceline_model::{ChannelName, ContentRequest, ContentResponse, Speed};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::channel::ChannelResolver;
use crate::engine::{ApplyOutcome, ProcessedState, SpeedEngine};
use crate::page::{
    CONTENT_CONTAINER_SELECTOR, LifecycleEvent, PageTiming, PlayerSwapDetector, RouteTracker,
    WatchPageMatcher,
};
use crate::policy::SpeedPolicyStore;

pub mod retry;

pub use retry::{RetryOutcome, RetryPolicy};

const REPORT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone, Default)]
pub struct PageControllerConfig {
    pub site: WatchPageMatcher,
    pub retry: RetryPolicy,
    pub timing: PageTiming,
}

/// Published after every finished retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    pub event: LifecycleEvent,
    pub outcome: RetryOutcome,
}

/// A request delivered into the page together with its reply slot.
#[derive(Debug)]
pub struct InboundMessage {
    pub request: ContentRequest,
    pub reply: oneshot::Sender<ContentResponse>,
}

impl InboundMessage {
    pub fn new(request: ContentRequest) -> (Self, oneshot::Receiver<ContentResponse>) {
        let (reply, rx) = oneshot::channel();
        (Self { request, reply }, rx)
    }
}

struct Inner<D, S, C> {
    dom: Arc<D>,
    engine: SpeedEngine<D, S>,
    clock: Arc<C>,
    retry: RetryPolicy,
    timing: PageTiming,
    matcher: WatchPageMatcher,
    state: Mutex<ProcessedState>,
    reports: broadcast::Sender<LoopReport>,
}

/// Orchestrator for one page context. Cheap to clone; clones share state.
pub struct PageController<D, S, C> {
    inner: Arc<Inner<D, S, C>>,
}

impl<D, S, C> Clone for PageController<D, S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D, S, C> fmt::Debug for PageController<D, S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageController")
            .field("engine", &self.inner.engine)
            .field("retry", &self.inner.retry)
            .field("timing", &self.inner.timing)
            .field("report_subscribers", &self.inner.reports.receiver_count())
            .finish()
    }
}

impl<D, S, C> PageController<D, S, C>
where
    D: PageDom + 'static,
    S: SettingsStore + 'static,
    C: RetryClock + 'static,
{
    pub fn new(dom: Arc<D>, store: Arc<S>, clock: Arc<C>, config: PageControllerConfig) -> Self {
        let engine = SpeedEngine::new(
            Arc::clone(&dom),
            SpeedPolicyStore::new(store),
            ChannelResolver::default(),
            config.site.clone(),
        );
        let (reports, _) = broadcast::channel(REPORT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                dom,
                engine,
                clock,
                retry: config.retry,
                timing: config.timing,
                matcher: config.site,
                state: Mutex::new(ProcessedState::default()),
                reports,
            }),
        }
    }

    pub async fn state(&self) -> ProcessedState {
        self.inner.state.lock().await.clone()
    }

    pub fn subscribe_reports(&self) -> broadcast::Receiver<LoopReport> {
        self.inner.reports.subscribe()
    }

    pub fn current_channel(&self) -> Option<ChannelName> {
        self.inner.engine.current_channel()
    }

    /// A single engine call against the shared state.
    pub async fn apply(&self, explicit: Option<Speed>) -> ApplyOutcome {
        let mut state = self.inner.state.lock().await;
        self.inner.engine.apply(&mut state, explicit).await
    }

    /// Reset, settle, then run the retry loop.
    pub async fn on_lifecycle(&self, event: LifecycleEvent) -> RetryOutcome {
        self.reset_for(event).await;

        let delay = event.settle_delay(&self.inner.timing);
        if !delay.is_zero() {
            self.inner.clock.sleep(delay).await;
        }
        self.retry_loop(event).await
    }

    /// Fire-and-forget variant used by observers and message handlers.
    pub fn spawn_lifecycle(&self, event: LifecycleEvent) -> tokio::task::JoinHandle<RetryOutcome> {
        let controller = self.clone();
        tokio::spawn(async move { controller.on_lifecycle(event).await })
    }

    /// Feed one document mutation callback. Any location change resets the
    /// processed state; only eligible destinations start a loop.
    pub async fn on_document_mutation(
        &self,
        routes: &mut RouteTracker,
    ) -> Option<tokio::task::JoinHandle<RetryOutcome>> {
        let change = routes.observe(&self.inner.dom.location())?;
        debug!(from = %change.from, to = %change.to, "URL changed");

        let Some(event) = change.lifecycle_event() else {
            let mut state = self.inner.state.lock().await;
            state.reset();
            state.retry_count = 0;
            return None;
        };
        debug!("New URL is a watch page, setting speed after delay");
        Some(self.spawn_lifecycle(event))
    }

    /// Feed one batch from the content container subscription.
    pub fn on_player_mutations(
        &self,
        detector: &PlayerSwapDetector,
        batch: &[MutationRecord],
    ) -> Option<tokio::task::JoinHandle<RetryOutcome>> {
        let event = detector.detect(&self.inner.dom.location(), batch)?;
        debug!("Video player changed, attempting to set speed");
        Some(self.spawn_lifecycle(event))
    }

    pub async fn handle_request(&self, request: ContentRequest) -> ContentResponse {
        debug!(action = request.action(), "Received message");
        match request {
            ContentRequest::VideoLoaded => {
                self.spawn_lifecycle(LifecycleEvent::FullLoad);
                ContentResponse::processing()
            }
            ContentRequest::GetChannelInfo => {
                let channel_name = self.current_channel();
                debug!(channel = ?channel_name, "Channel info requested");
                ContentResponse::ChannelInfo { channel_name }
            }
            ContentRequest::SetSpeed { speed } => {
                match speed.to_speed() {
                    Ok(speed) => {
                        let outcome = self.apply(Some(speed)).await;
                        debug!(?outcome, "Explicit speed handled");
                    }
                    Err(err) => warn!(error = %err, "Ignoring setSpeed with unreadable speed"),
                }
                ContentResponse::SpeedSet { success: true }
            }
        }
    }

    /// Drive the page context until the inbox closes.
    ///
    /// Starts the initial loop, then multiplexes document mutations,
    /// content-container mutations and inbound requests.
    pub async fn run(&self, mut inbox: mpsc::Receiver<InboundMessage>) {
        let dom = &self.inner.dom;
        let mut routes = RouteTracker::new(self.inner.matcher.clone(), dom.location());
        let swaps = PlayerSwapDetector::new(self.inner.matcher.clone());
        let mut document = dom.observe(ObserveScope::Document);
        let mut content =
            dom.observe(ObserveScope::Container(CONTENT_CONTAINER_SELECTOR.to_string()));
        if content.is_none() {
            debug!("No content container, player swaps will not be observed");
        }

        info!(location = %routes.last_location(), "Page context started");
        self.spawn_lifecycle(LifecycleEvent::PageStarted);

        loop {
            tokio::select! {
                batch = next_batch(&mut document) => match batch {
                    Some(_) => {
                        self.on_document_mutation(&mut routes).await;
                    }
                    None => document = None,
                },
                batch = next_batch(&mut content) => match batch {
                    Some(batch) => {
                        self.on_player_mutations(&swaps, &batch);
                    }
                    None => content = None,
                },
                message = inbox.recv() => match message {
                    Some(InboundMessage { request, reply }) => {
                        let response = self.handle_request(request).await;
                        if reply.send(response).is_err() {
                            debug!("Sender dropped before the reply");
                        }
                    }
                    None => break,
                },
            }
        }

        for subscription in [document, content].into_iter().flatten() {
            subscription.cancel();
        }
        debug!("Page context stopped");
    }

    async fn reset_for(&self, event: LifecycleEvent) {
        let mut state = self.inner.state.lock().await;
        if event.resets_channel() {
            state.reset();
        } else {
            state.reset_video();
        }
        state.retry_count = 0;
    }

    async fn retry_loop(&self, event: LifecycleEvent) -> RetryOutcome {
        let inner: &Inner<D, S, C> = &self.inner;
        let outcome = inner
            .retry
            .run(inner.clock.as_ref(), |attempt| async move {
                debug!(attempt, "Attempting to set playback speed");
                let mut state = inner.state.lock().await;
                state.retry_count = attempt;
                inner.engine.apply(&mut state, None).await.is_settled()
            })
            .await;

        inner.state.lock().await.retry_count = 0;
        match outcome {
            RetryOutcome::Settled { attempts } => {
                debug!(?event, attempts, "Finished setting playback speed");
            }
            RetryOutcome::Exhausted { attempts } => {
                warn!(?event, attempts, "Gave up waiting for the player and channel");
            }
        }
        // No subscribers is the common case.
        let _ = inner.reports.send(LoopReport { event, outcome });
        outcome
    }
}

#[async_trait]
impl<D, S, C> ContentEndpoint for PageController<D, S, C>
where
    D: PageDom + 'static,
    S: SettingsStore + 'static,
    C: RetryClock + 'static,
{
    async fn handle(&self, request: ContentRequest) -> ContentResponse {
        self.handle_request(request).await
    }
}

/// Pending forever once a subscription is gone so `select!` stops polling it.
async fn next_batch(
    subscription: &mut Option<MutationSubscription>,
) -> Option<Vec<MutationRecord>> {
    match subscription {
        Some(sub) => sub.next_batch().await,
        None => std::future::pending().await,
    }
}
