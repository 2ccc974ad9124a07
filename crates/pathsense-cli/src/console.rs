//! Terminal stand-ins for the phone's speech engine and vibration motor,
//! plus a formatter that turns bus traffic into one-line log entries.

use colored::Colorize;
use pathsense_hal::{HapticOutput, SpeechOutput};
use pathsense_types::{EventPayload, NavError, NavTransition};

/// Prints utterances instead of speaking them.
#[derive(Debug, Default)]
pub struct ConsoleSpeech;

impl SpeechOutput for ConsoleSpeech {
    fn speak(&mut self, text: &str) -> Result<(), NavError> {
        println!("  {} {}", "speak:".magenta().bold(), format!("\"{text}\"").magenta());
        Ok(())
    }

    // Printed lines cannot be taken back.
    fn cancel(&mut self) {}
}

/// Prints vibration pulses.
#[derive(Debug, Default)]
pub struct ConsoleHaptics;

impl HapticOutput for ConsoleHaptics {
    fn pulse(&mut self, duration_ms: u32) -> Result<(), NavError> {
        println!("  {} {}", "buzz:".blue().bold(), format!("{duration_ms} ms").dimmed());
        Ok(())
    }
}

/// One-line description of a bus event, or `None` for traffic that should
/// stay off the terminal.
pub fn describe(payload: &EventPayload) -> Option<String> {
    let line = match payload {
        EventPayload::Transition(t) => match t {
            NavTransition::ScanStarted { target } => format!("scanning surroundings for {target}"),
            NavTransition::ScanResolved { target, analysis } => format!(
                "navigating to {target} (from {}, {:.0}% confidence)",
                analysis.location_context,
                analysis.confidence * 100.0
            ),
            NavTransition::ScanFailed { target, reason } => {
                format!("scan for {target} failed: {reason}")
            }
            NavTransition::Aborted => "navigation aborted".to_string(),
            NavTransition::Paused => "paused".to_string(),
            NavTransition::Resumed => "resumed".to_string(),
            NavTransition::SegmentWrapped => "turn passed, next segment".to_string(),
        },
        EventPayload::TurnCue { imminent: true } => "turn right ahead".to_string(),
        EventPayload::TurnCue { imminent: false } => "continue straight".to_string(),
        EventPayload::CameraFault { message } => format!("camera: {message}"),
        EventPayload::Shutdown { reason } => format!("shutdown: {reason}"),
        EventPayload::Overlay(_) => return None,
    };
    Some(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathsense_types::{OverlaySummary, NavState, SceneAnalysis};

    #[test]
    fn describe_skips_overlay_frames() {
        let summary = OverlaySummary {
            state: NavState::Navigating,
            remaining_m: 12.0,
            velocity_mps: 1.4,
            progress_percent: 60.0,
            turn_imminent: false,
            is_moving: true,
        };
        assert!(describe(&EventPayload::Overlay(summary)).is_none());
    }

    #[test]
    fn describe_resolved_scan_shows_confidence() {
        let line = describe(&EventPayload::Transition(NavTransition::ScanResolved {
            target: "SSK Cafe".into(),
            analysis: SceneAnalysis::canned(),
        }))
        .unwrap();
        assert!(line.contains("SSK Cafe"));
        assert!(line.contains("89%"));
    }

    #[test]
    fn describe_turn_cues() {
        assert_eq!(
            describe(&EventPayload::TurnCue { imminent: true }).as_deref(),
            Some("turn right ahead")
        );
        assert_eq!(
            describe(&EventPayload::TurnCue { imminent: false }).as_deref(),
            Some("continue straight")
        );
    }

    #[test]
    fn console_outputs_never_fail() {
        let mut speech = ConsoleSpeech;
        assert!(speech.speak("Turn right ahead").is_ok());
        speech.cancel();
        assert!(ConsoleHaptics.pulse(200).is_ok());
    }
}
