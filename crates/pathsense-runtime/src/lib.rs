//! `pathsense-runtime` – The AR Screen Runtime
//!
//! Wires the synchronous navigation engine to the outside world: a frame
//! clock, a scene classifier behind a network boundary, devices and the
//! event bus.
//!
//! # Modules
//!
//! - [`classifier`] – [`SceneClassifier`][classifier::SceneClassifier]:
//!   a Gemini-style multimodal client and an offline mock, plus
//!   [`classify_with_fallback`][classifier::classify_with_fallback], which
//!   bounds every call and degrades failures to a placeholder result.
//! - [`screen`] – [`ArScreen`][screen::ArScreen]: the screen controller that
//!   owns the session, camera lease, feedback dispatcher and bus handle.
//! - [`driver`] – [`ScreenDriver`][driver::ScreenDriver]: the async loop
//!   that ticks the screen once per frame, runs scans as cancellable tasks
//!   and publishes snapshots on a `watch` channel.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.

pub mod classifier;
pub mod driver;
pub mod screen;
pub mod telemetry;

pub use classifier::{
    ClassifierSettings, GeminiClassifier, MockClassifier, SceneClassifier, classifier_from_config,
    classify_with_fallback,
};
pub use driver::{CancelToken, DEFAULT_FRAME_PERIOD, FrameScheduler, ScreenCommand, ScreenDriver, ScreenHandle};
pub use screen::{
    ArScreen, FrameSnapshot, ScanOutcome, ScanRequest, ScanTiming, ScreenDevices, ScreenOptions,
};
pub use telemetry::{TracerProviderGuard, init_tracing};
