//! `pathsense-middleware` – Event Routing
//!
//! Carries transitions, per-frame overlay summaries and alerts from the AR
//! screen to whoever is listening (the CLI HUD, loggers, tests) without the
//! screen knowing who that is.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, topic-based publish/subscribe event bus built
//!   on Tokio broadcast channels.

pub mod bus;

pub use bus::{DEFAULT_CAPACITY, EventBus, Topic, TopicReceiver};
