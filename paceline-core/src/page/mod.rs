//! Page signal detection: which URLs are watch pages and which page changes
//! mean the speed has to be re-evaluated.

pub mod signals;
pub mod url;

pub use signals::{
    CONTENT_CONTAINER_SELECTOR, LifecycleEvent, PLAYER_CONTAINER_CLASS,
    PLAYER_ELEMENT_ID, PageTiming, PlayerSwapDetector, RouteChange,
    RouteTracker,
};
pub use url::{WatchPageMatcher, is_watch_page};
