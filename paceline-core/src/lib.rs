//! # Paceline Core
//!
//! Applies a per-channel playback speed to watch pages of the target video
//! site. The crate owns the stateful part of the extension and talks to the
//! browser only through the traits in `paceline-contracts`.
//!
//! ## Architecture
//!
//! - [`page`]: watch-page URL classification and lifecycle signal detection
//! - [`channel`]: channel display-name extraction across page layouts
//! - [`policy`]: typed access to the override mapping and default speed
//! - [`engine`]: resolves and writes the playback rate with de-duplication
//! - [`orchestrator`]: per-page retry loop, processed state and message handling
//! - [`background`]: extension-wide tab tracking and `videoLoaded` dispatch
//! - [`settings`]: operations behind the settings surface
//! - [`sim`]: in-process page, player, browser and clock used by the CLI
//!   simulator and the tests
//!
//! ## Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use paceline_contracts::clock::TokioClock;
//! use paceline_core::orchestrator::{PageController, PageControllerConfig};
//! use paceline_core::page::LifecycleEvent;
//! use paceline_core::policy::MemoryStore;
//! use paceline_core::sim::SimulatedPage;
//!
//! async fn apply_once() {
//!     let page = Arc::new(
//!         SimulatedPage::new("https://www.youtube.com/watch?v=abc").with_player(),
//!     );
//!     page.set_channel("Acme");
//!     let controller = PageController::new(
//!         page.clone(),
//!         Arc::new(MemoryStore::new()),
//!         Arc::new(TokioClock),
//!         PageControllerConfig::default(),
//!     );
//!     let outcome = controller.on_lifecycle(LifecycleEvent::FullLoad).await;
//!     println!("{outcome:?}");
//! }
//! ```

#![allow(missing_docs)]

pub mod background;
pub mod channel;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod page;
pub mod policy;
pub mod settings;
pub mod sim;

pub use error::{Result, SettingsError};
pub use paceline_model as model;
