//! `pathsense-hal` – Device Seams
//!
//! The navigation engine never talks to a browser, an OS media stack or a
//! speech engine directly.  It drives these traits, and the outside world
//! plugs drivers in behind them.
//!
//! # Modules
//!
//! - [`camera`] – [`CameraDevice`][camera::CameraDevice] plus
//!   [`CameraLease`][camera::CameraLease], the exclusive owner of the rear
//!   camera that guarantees exactly one release on every exit path.
//! - [`feedback`] – fire-and-forget [`SpeechOutput`][feedback::SpeechOutput]
//!   and [`HapticOutput`][feedback::HapticOutput] channels.
//! - [`sim`] – recording stub drivers and the [`SimRig`][sim::SimRig]
//!   builder for headless runs and tests.

pub mod camera;
pub mod feedback;
pub mod sim;

pub use camera::{CameraDevice, CameraFacing, CameraFrame, CameraLease, FrameFormat};
pub use feedback::{HapticOutput, NullHaptics, NullSpeech, SpeechOutput};
pub use sim::{
    HapticLog, RecordingHaptics, RecordingSpeech, SimCamera, SimCameraTally, SimTallies, SimRig,
    SpeechLog, SpeechRecord,
};
