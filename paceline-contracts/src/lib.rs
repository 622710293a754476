//! Trait surfaces that describe the collaborators Paceline drives but does
//! not own: the host page and its player, the extension's key-value store,
//! cross-context messaging and the timer used between retries.

pub mod clock;
pub mod messaging;
pub mod page;
pub mod store;

/// Frequently used contracts for orchestration crates.
pub mod prelude {
    pub use super::clock::{RetryClock, TokioClock};
    pub use super::messaging::{
        ActiveTabLookup, ContentEndpoint, Delivery, DeliveryError, TabInfo, TabMessenger,
    };
    pub use super::page::{
        MutationKind, MutationRecord, MutationSender, MutationSubscription, NodeMarker,
        ObserveScope, PageDom, PlayerError, PlayerHandle,
    };
    pub use super::store::{SettingsStore, StoreEntries, StoreError};
}
