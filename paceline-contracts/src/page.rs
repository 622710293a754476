//! The host page as seen from the page-embedded context.
//!
//! Everything here is an opaque, externally mutated resource: the document
//! can change between any two calls, and the player element comes and goes
//! as the site swaps it out.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

/// Why a playback-rate write did not take effect.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PlayerError {
    /// The element refused the value.
    #[error("player rejected playback rate {rate}: {reason}")]
    RateRejected {
        /// Requested rate.
        rate: f64,
        /// Error name reported by the element.
        reason: String,
    },

    /// The handle outlived the element it pointed to.
    #[error("player element detached from the document")]
    Detached,
}

/// The `<video>` element of the current page.
pub trait PlayerHandle: Send + Sync + fmt::Debug {
    /// Current `playbackRate`.
    fn playback_rate(&self) -> f64;

    /// Assign `playbackRate`.
    fn set_playback_rate(&self, rate: f64) -> Result<(), PlayerError>;
}

/// Read access to the live document plus mutation subscriptions.
pub trait PageDom: Send + Sync {
    /// Full current location (`location.href`).
    fn location(&self) -> String;

    /// The video element, if the page has rendered one yet.
    fn player(&self) -> Option<Arc<dyn PlayerHandle>>;

    /// Text content of the first element matching `selector`.
    fn text_content(&self, selector: &str) -> Option<String>;

    /// Start observing child-list mutations in `scope`. Returns `None` when a
    /// container scope does not exist in the document.
    fn observe(&self, scope: ObserveScope) -> Option<MutationSubscription>;
}

/// Subtree a mutation subscription covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObserveScope {
    /// The whole document subtree.
    Document,
    /// A single container located by CSS selector, e.g. `#content`.
    Container(String),
}

/// The identifying bits of a DOM node involved in a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeMarker {
    /// The node's `id` attribute.
    pub id: Option<String>,
    /// The node's class list.
    pub classes: Vec<String>,
}

impl NodeMarker {
    /// Marker for a node carrying only an id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            classes: Vec::new(),
        }
    }

    /// Marker for a node carrying a single class.
    pub fn with_class(class: impl Into<String>) -> Self {
        Self {
            id: None,
            classes: vec![class.into()],
        }
    }

    /// True when the node's id is `id`.
    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }

    /// True when `class` is in the node's class list.
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Mutation record types the page reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Nodes were added to or removed from `target`.
    ChildList,
    /// An attribute of `target` changed.
    Attributes,
}

/// One entry of an observer callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// What changed.
    pub kind: MutationKind,
    /// The node the change happened on.
    pub target: NodeMarker,
}

impl MutationRecord {
    /// A child-list record on `target`.
    pub fn child_list(target: NodeMarker) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
        }
    }
}

/// Receiving half of a mutation observation.
///
/// Dropping the subscription or calling [`MutationSubscription::cancel`]
/// tears the observation down; the page side notices on its next delivery.
#[derive(Debug)]
pub struct MutationSubscription {
    scope: ObserveScope,
    receiver: mpsc::UnboundedReceiver<Vec<MutationRecord>>,
}

/// Sending half held by the page implementation.
#[derive(Debug, Clone)]
pub struct MutationSender {
    sender: mpsc::UnboundedSender<Vec<MutationRecord>>,
}

impl MutationSubscription {
    /// Pair a page-side sender with a new subscription for `scope`.
    pub fn channel(scope: ObserveScope) -> (MutationSender, MutationSubscription) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            MutationSender { sender },
            MutationSubscription { scope, receiver },
        )
    }

    /// The subtree this subscription covers.
    pub fn scope(&self) -> &ObserveScope {
        &self.scope
    }

    /// Next batch of records, or `None` once the page side is gone.
    pub async fn next_batch(&mut self) -> Option<Vec<MutationRecord>> {
        self.receiver.recv().await
    }

    /// Stop observing.
    pub fn cancel(mut self) {
        self.receiver.close();
    }
}

impl MutationSender {
    /// Deliver one observer callback's worth of records. Returns `false` when
    /// the subscription has been torn down.
    pub fn deliver(&self, batch: Vec<MutationRecord>) -> bool {
        self.sender.send(batch).is_ok()
    }

    /// True once the subscription is gone.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_subscription_rejects_delivery() {
        let (sender, mut sub) = MutationSubscription::channel(ObserveScope::Document);
        assert!(sender.deliver(vec![MutationRecord::child_list(NodeMarker::default())]));
        assert_eq!(sub.next_batch().await.map(|b| b.len()), Some(1));

        sub.cancel();
        assert!(sender.is_closed());
        assert!(!sender.deliver(Vec::new()));
    }

    #[tokio::test]
    async fn subscription_ends_when_page_side_drops() {
        let (sender, mut sub) =
            MutationSubscription::channel(ObserveScope::Container("#content".into()));
        assert_eq!(sub.scope(), &ObserveScope::Container("#content".into()));
        drop(sender);
        assert!(sub.next_batch().await.is_none());
    }
}
