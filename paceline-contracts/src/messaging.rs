//! Request/response messaging between extension contexts.

use async_trait::async_trait;
use paceline_model::{ContentRequest, ContentResponse, TabId};
use thiserror::Error;

/// Why a cross-context message did not get a reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    /// The tab has no page context listening, e.g. it is closed or off-site.
    #[error("could not establish connection: no receiving end in tab {0}")]
    NoReceiver(TabId),
}

/// Outcome of one request/response round trip. Failures are reported, never
/// raised: callers log them and move on.
pub type Delivery = Result<ContentResponse, DeliveryError>;

/// A browser tab as reported by the tab query API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabInfo {
    /// Browser-assigned id, stable for the tab's lifetime.
    pub id: TabId,
    /// Current location of the tab.
    pub url: String,
}

/// Sends requests from the background or settings context into a tab's
/// page-embedded context.
#[async_trait]
pub trait TabMessenger: Send + Sync {
    /// Deliver `request` to `tab` and wait for its reply.
    async fn send(&self, tab: TabId, request: ContentRequest) -> Delivery;
}

/// Resolves the tab the user is looking at (`active: true, currentWindow`).
#[async_trait]
pub trait ActiveTabLookup: Send + Sync {
    /// The focused tab of the current window, if any.
    async fn active_tab(&self) -> Option<TabInfo>;
}

/// Receiving side of [`TabMessenger`] inside the page-embedded context.
#[async_trait]
pub trait ContentEndpoint: Send + Sync {
    /// Answer one request. Every request gets a response.
    async fn handle(&self, request: ContentRequest) -> ContentResponse;
}
