//! Fire-and-forget feedback channels: speech and haptics.
//!
//! Both channels may be unavailable on a given device.  Implementations
//! report that through `Err`, and callers are expected to swallow it; a
//! missing speech engine must never disturb navigation.

use pathsense_types::NavError;

/// A text-to-speech engine with a single utterance slot.
pub trait SpeechOutput: Send {
    /// Start speaking `text`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Feedback`] when no speech engine is available.
    fn speak(&mut self, text: &str) -> Result<(), NavError>;

    /// Stop the current utterance, if any.
    fn cancel(&mut self);
}

/// A vibration motor.
pub trait HapticOutput: Send {
    /// Vibrate for `duration_ms` milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::Feedback`] when the device has no vibration motor.
    fn pulse(&mut self, duration_ms: u32) -> Result<(), NavError>;
}

impl<T: SpeechOutput + ?Sized> SpeechOutput for Box<T> {
    fn speak(&mut self, text: &str) -> Result<(), NavError> {
        (**self).speak(text)
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }
}

impl<T: HapticOutput + ?Sized> HapticOutput for Box<T> {
    fn pulse(&mut self, duration_ms: u32) -> Result<(), NavError> {
        (**self).pulse(duration_ms)
    }
}

/// Haptics for devices without a vibration motor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHaptics;

impl HapticOutput for NullHaptics {
    fn pulse(&mut self, _duration_ms: u32) -> Result<(), NavError> {
        Err(NavError::Feedback("vibration not supported".to_string()))
    }
}

/// Speech for devices without a speech engine.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSpeech;

impl SpeechOutput for NullSpeech {
    fn speak(&mut self, _text: &str) -> Result<(), NavError> {
        Err(NavError::Feedback("speech synthesis not supported".to_string()))
    }

    fn cancel(&mut self) {}
}
