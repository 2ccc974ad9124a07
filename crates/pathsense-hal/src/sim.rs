//! In-process stub drivers for headless runs and tests.
//!
//! [`SimRig`] assembles a camera, a speech channel and a haptic motor that
//! record everything they are asked to do.  Each driver hands out a cheap
//! clonable tally so a test can keep observing it after the driver itself
//! has been moved into a screen.
//!
//! # Example
//!
//! ```rust
//! use pathsense_hal::sim::SimRig;
//! use pathsense_hal::camera::{CameraFacing, CameraLease};
//!
//! let rig = SimRig::builder().with_camera("rear").build();
//! let tally = rig.tallies.camera.clone();
//!
//! let lease = CameraLease::acquire(rig.camera, CameraFacing::Environment);
//! drop(lease);
//! assert_eq!(tally.releases(), 1);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pathsense_types::NavError;

use crate::camera::{CameraDevice, CameraFacing, CameraFrame, FrameFormat};
use crate::feedback::{HapticOutput, SpeechOutput};

// ────────────────────────────────────────────────────────────────────────────
// Stub camera
// ────────────────────────────────────────────────────────────────────────────

/// Minimal well-formed JPEG (SOI, empty APP0, EOI) used as the sim frame.
const BLANK_JPEG: [u8; 8] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x02, 0xFF, 0xD9];

/// Shared counters observed by tests.
#[derive(Debug, Clone, Default)]
pub struct SimCameraTally {
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    captured: Arc<AtomicUsize>,
}

impl SimCameraTally {
    pub fn acquisitions(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> usize {
        self.captured.load(Ordering::SeqCst)
    }
}

/// A simulated camera that returns a blank JPEG frame.
pub struct SimCamera {
    id: String,
    deny: bool,
    open: bool,
    tally: SimCameraTally,
}

impl SimCamera {
    /// Create a new simulated camera with the given identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            deny: false,
            open: false,
            tally: SimCameraTally::default(),
        }
    }

    /// Make every acquisition fail as if the user denied permission.
    pub fn denied(mut self) -> Self {
        self.deny = true;
        self
    }

    pub fn tally(&self) -> SimCameraTally {
        self.tally.clone()
    }
}

impl CameraDevice for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn acquire(&mut self, _facing: CameraFacing) -> Result<(), NavError> {
        self.tally.acquired.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(NavError::Camera {
                device: self.id.clone(),
                details: "permission denied".to_string(),
            });
        }
        self.open = true;
        Ok(())
    }

    fn capture(&mut self) -> Result<CameraFrame, NavError> {
        if !self.open {
            return Err(NavError::Camera {
                device: self.id.clone(),
                details: "stream not open".to_string(),
            });
        }
        self.tally.captured.fetch_add(1, Ordering::SeqCst);
        Ok(CameraFrame {
            width: 1,
            height: 1,
            format: FrameFormat::Jpeg,
            data: BLANK_JPEG.to_vec(),
        })
    }

    fn release(&mut self) {
        self.open = false;
        self.tally.released.fetch_add(1, Ordering::SeqCst);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recording speech
// ────────────────────────────────────────────────────────────────────────────

/// One call observed by [`RecordingSpeech`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechRecord {
    Spoken(String),
    Cancelled,
}

/// Shared log of speech calls.
#[derive(Debug, Clone, Default)]
pub struct SpeechLog(Arc<Mutex<Vec<SpeechRecord>>>);

impl SpeechLog {
    fn push(&self, record: SpeechRecord) {
        if let Ok(mut log) = self.0.lock() {
            log.push(record);
        }
    }

    /// Every record in call order.
    pub fn records(&self) -> Vec<SpeechRecord> {
        self.0.lock().map(|l| l.clone()).unwrap_or_default()
    }

    /// Only the spoken texts, in order.
    pub fn utterances(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                SpeechRecord::Spoken(text) => Some(text),
                SpeechRecord::Cancelled => None,
            })
            .collect()
    }

    pub fn cancellations(&self) -> usize {
        self.records()
            .iter()
            .filter(|r| matches!(r, SpeechRecord::Cancelled))
            .count()
    }
}

/// Speech channel that records utterances instead of playing them.
#[derive(Default)]
pub struct RecordingSpeech {
    log: SpeechLog,
    unavailable: bool,
}

impl RecordingSpeech {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every `speak` call, as on a device without speech synthesis.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn log(&self) -> SpeechLog {
        self.log.clone()
    }
}

impl SpeechOutput for RecordingSpeech {
    fn speak(&mut self, text: &str) -> Result<(), NavError> {
        if self.unavailable {
            return Err(NavError::Feedback("speech synthesis unavailable".to_string()));
        }
        self.log.push(SpeechRecord::Spoken(text.to_string()));
        Ok(())
    }

    fn cancel(&mut self) {
        self.log.push(SpeechRecord::Cancelled);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recording haptics
// ────────────────────────────────────────────────────────────────────────────

/// Shared log of pulse durations in milliseconds.
#[derive(Debug, Clone, Default)]
pub struct HapticLog(Arc<Mutex<Vec<u32>>>);

impl HapticLog {
    pub fn pulses(&self) -> Vec<u32> {
        self.0.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

/// Vibration motor that records pulses.
#[derive(Default)]
pub struct RecordingHaptics {
    log: HapticLog,
}

impl RecordingHaptics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> HapticLog {
        self.log.clone()
    }
}

impl HapticOutput for RecordingHaptics {
    fn pulse(&mut self, duration_ms: u32) -> Result<(), NavError> {
        if let Ok(mut log) = self.log.0.lock() {
            log.push(duration_ms);
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig builder
// ────────────────────────────────────────────────────────────────────────────

/// Tallies for every driver in a built [`SimRig`].
#[derive(Debug, Clone, Default)]
pub struct SimTallies {
    pub camera: SimCameraTally,
    pub speech: SpeechLog,
    pub haptics: HapticLog,
}

/// A full set of simulated devices for one AR screen.
pub struct SimRig {
    pub camera: Box<dyn CameraDevice>,
    pub speech: Box<dyn SpeechOutput>,
    pub haptics: Box<dyn HapticOutput>,
    pub tallies: SimTallies,
}

impl SimRig {
    /// Start a [`SimRigBuilder`].
    pub fn builder() -> SimRigBuilder {
        SimRigBuilder::default()
    }
}

/// Builder for [`SimRig`].  Unconfigured slots default to a working rear
/// camera and recording speech/haptics.
#[derive(Default)]
pub struct SimRigBuilder {
    camera: Option<SimCamera>,
    mute_speech: bool,
}

impl SimRigBuilder {
    /// Use a working simulated camera with the given identifier.
    pub fn with_camera(mut self, id: impl Into<String>) -> Self {
        self.camera = Some(SimCamera::new(id));
        self
    }

    /// Use a camera whose permission request is always denied.
    pub fn with_denied_camera(mut self, id: impl Into<String>) -> Self {
        self.camera = Some(SimCamera::new(id).denied());
        self
    }

    /// Use a speech channel that fails every call.
    pub fn with_unavailable_speech(mut self) -> Self {
        self.mute_speech = true;
        self
    }

    /// Consume the builder and return the devices with their tallies.
    pub fn build(self) -> SimRig {
        let camera = self.camera.unwrap_or_else(|| SimCamera::new("rear"));
        let speech = if self.mute_speech {
            RecordingSpeech::new().unavailable()
        } else {
            RecordingSpeech::new()
        };
        let haptics = RecordingHaptics::new();

        let tallies = SimTallies {
            camera: camera.tally(),
            speech: speech.log(),
            haptics: haptics.log(),
        };

        SimRig {
            camera: Box::new(camera),
            speech: Box::new(speech),
            haptics: Box::new(haptics),
            tallies,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
