//! Speech and haptic cues for session transitions and turn edges.
//!
//! The dispatcher is edge-triggered: it reacts to [`NavTransition`]s and
//! [`TurnEdge`]s, never to raw per-frame state, so a cue cannot repeat while
//! a flag merely stays set.  Output failures are logged at `debug` and
//! dropped.

use std::fmt;
use std::str::FromStr;

use pathsense_hal::feedback::{HapticOutput, SpeechOutput};
use pathsense_types::NavTransition;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::kinematics::SEGMENT_LENGTH_M;
use crate::turn::TurnEdge;

/// Pulse length when a destination is found.
pub const RESOLVE_PULSE_MS: u32 = 100;
/// Pulse length when a turn becomes imminent.
pub const TURN_PULSE_MS: u32 = 200;

pub const SCAN_FAILED_UTTERANCE: &str = "Unable to determine your location. Please try again.";

/// How chatty the dispatcher is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackMode {
    /// One announcement per submit; nothing else.
    #[default]
    Minimal,
    /// Also announce the resolved destination and pulse on turns.
    Rich,
}

impl FeedbackMode {
    /// One-line description for settings menus.
    pub fn summary(self) -> &'static str {
        match self {
            FeedbackMode::Minimal => "spoken scan and failure announcements, no vibration",
            FeedbackMode::Rich => {
                "also says \"Destination found\" with a vibration, and vibrates before each turn"
            }
        }
    }
}

impl fmt::Display for FeedbackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackMode::Minimal => write!(f, "minimal"),
            FeedbackMode::Rich => write!(f, "rich"),
        }
    }
}

impl FromStr for FeedbackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(FeedbackMode::Minimal),
            "rich" => Ok(FeedbackMode::Rich),
            other => Err(format!("unknown feedback mode '{other}'")),
        }
    }
}

/// Owns the speech and haptic channels for one screen.
pub struct FeedbackDispatcher<S = Box<dyn SpeechOutput>, H = Box<dyn HapticOutput>> {
    speech: S,
    haptics: H,
    mode: FeedbackMode,
    segment_length: f32,
}

impl<S: SpeechOutput, H: HapticOutput> FeedbackDispatcher<S, H> {
    pub fn new(speech: S, haptics: H, mode: FeedbackMode) -> Self {
        Self {
            speech,
            haptics,
            mode,
            segment_length: SEGMENT_LENGTH_M,
        }
    }

    /// Distance quoted in the scan announcement.
    pub fn with_segment_length(mut self, segment_length: f32) -> Self {
        self.segment_length = segment_length;
        self
    }

    pub fn mode(&self) -> FeedbackMode {
        self.mode
    }

    /// React to a session transition.
    pub fn on_transition(&mut self, transition: &NavTransition) {
        match transition {
            NavTransition::ScanStarted { .. } => {
                let text = scan_announcement(self.segment_length);
                self.say(&text);
            }
            NavTransition::ScanResolved { target, .. } if self.mode == FeedbackMode::Rich => {
                self.say(&format!("Destination found. Head towards {target}."));
                self.buzz(RESOLVE_PULSE_MS);
            }
            NavTransition::ScanFailed { .. } => self.say(SCAN_FAILED_UTTERANCE),
            NavTransition::Aborted => self.speech.cancel(),
            _ => {}
        }
    }

    /// React to the turn-imminent flag changing.
    pub fn on_turn_edge(&mut self, edge: TurnEdge) {
        if self.mode == FeedbackMode::Rich && edge == TurnEdge::Rising {
            self.buzz(TURN_PULSE_MS);
        }
    }

    /// Cut off whatever is being spoken.
    pub fn silence(&mut self) {
        self.speech.cancel();
    }

    /// Speak `text`, replacing the current utterance.
    fn say(&mut self, text: &str) {
        self.speech.cancel();
        if let Err(e) = self.speech.speak(text) {
            debug!(error = %e, "speech unavailable; dropping utterance");
        }
    }

    fn buzz(&mut self, duration_ms: u32) {
        if let Err(e) = self.haptics.pulse(duration_ms) {
            debug!(error = %e, duration_ms, "haptics unavailable; dropping pulse");
        }
    }
}

/// Announcement spoken when a scan starts.
pub fn scan_announcement(segment_length: f32) -> String {
    format!(
        "Scanning the area, location detected and the destination will be {} meters so follow the navigation arrows",
        segment_length.round() as u32
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_summaries_match_dispatch() {
        assert!(FeedbackMode::Minimal.summary().contains("no vibration"));
        let rich = FeedbackMode::Rich.summary();
        assert!(rich.contains("Destination found"));
        assert!(rich.contains("vibration"));

        let mut minimal = FeedbackDispatcher::new(
            RecordingSpeech::new(),
            RecordingHaptics::new(),
            FeedbackMode::Minimal,
        );
        let pulses = minimal.haptics.log();
        minimal.on_transition(&NavTransition::ScanResolved {
            target: "SSK Cafe".into(),
            analysis: pathsense_types::SceneAnalysis::canned(),
        });
        minimal.on_turn_edge(TurnEdge::Rising);
        assert!(pulses.pulses().is_empty());
    }
    use pathsense_hal::sim::{RecordingHaptics, RecordingSpeech, SpeechRecord};
    use pathsense_hal::{NullHaptics, NullSpeech};
    use pathsense_types::SceneAnalysis;

    fn started() -> NavTransition {
        NavTransition::ScanStarted {
            target: "CBM Lab 4".into(),
        }
    }

    fn resolved() -> NavTransition {
        NavTransition::ScanResolved {
            target: "CBM Lab 4".into(),
            analysis: SceneAnalysis::canned(),
        }
    }

    fn recording(
        mode: FeedbackMode,
    ) -> (
        FeedbackDispatcher<RecordingSpeech, RecordingHaptics>,
        pathsense_hal::SpeechLog,
        pathsense_hal::HapticLog,
    ) {
        let speech = RecordingSpeech::new();
        let haptics = RecordingHaptics::new();
        let (s, h) = (speech.log(), haptics.log());
        (FeedbackDispatcher::new(speech, haptics, mode), s, h)
    }

    #[test]
    fn submit_cancels_then_announces_distance() {
        let (mut d, speech, _) = recording(FeedbackMode::Minimal);
        d.on_transition(&started());
        assert_eq!(
            speech.records(),
            vec![
                SpeechRecord::Cancelled,
                SpeechRecord::Spoken(
                    "Scanning the area, location detected and the destination will be 30 meters so follow the navigation arrows"
                        .into()
                ),
            ]
        );
    }

    #[test]
    fn minimal_mode_is_silent_on_resolve_and_turns() {
        let (mut d, speech, haptics) = recording(FeedbackMode::Minimal);
        d.on_transition(&resolved());
        d.on_turn_edge(TurnEdge::Rising);
        assert!(speech.utterances().is_empty());
        assert!(haptics.pulses().is_empty());
    }

    #[test]
    fn rich_mode_announces_destination_and_pulses_once_per_edge() {
        let (mut d, speech, haptics) = recording(FeedbackMode::Rich);
        d.on_transition(&resolved());
        assert_eq!(
            speech.utterances(),
            vec!["Destination found. Head towards CBM Lab 4.".to_string()]
        );
        d.on_turn_edge(TurnEdge::Rising);
        d.on_turn_edge(TurnEdge::Falling);
        d.on_turn_edge(TurnEdge::Rising);
        assert_eq!(haptics.pulses(), vec![RESOLVE_PULSE_MS, TURN_PULSE_MS, TURN_PULSE_MS]);
    }

    #[test]
    fn abort_cancels_speech() {
        let (mut d, speech, _) = recording(FeedbackMode::Minimal);
        d.on_transition(&started());
        d.on_transition(&NavTransition::Aborted);
        assert_eq!(speech.records().last(), Some(&SpeechRecord::Cancelled));
    }

    #[test]
    fn scan_failure_is_announced() {
        let (mut d, speech, _) = recording(FeedbackMode::Minimal);
        d.on_transition(&NavTransition::ScanFailed {
            target: "Library".into(),
            reason: "deadline".into(),
        });
        assert_eq!(speech.utterances(), vec![SCAN_FAILED_UTTERANCE.to_string()]);
    }

    #[test]
    fn unavailable_outputs_are_swallowed() {
        let mut d: FeedbackDispatcher = FeedbackDispatcher::new(
            Box::new(NullSpeech),
            Box::new(NullHaptics),
            FeedbackMode::Rich,
        );
        d.on_transition(&started());
        d.on_transition(&resolved());
        d.on_turn_edge(TurnEdge::Rising);
        d.silence();
    }

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("Rich".parse::<FeedbackMode>(), Ok(FeedbackMode::Rich));
        assert_eq!(" minimal ".parse::<FeedbackMode>(), Ok(FeedbackMode::Minimal));
        assert!("loud".parse::<FeedbackMode>().is_err());
        assert_eq!(FeedbackMode::default().to_string(), "minimal");
    }

    #[test]
    fn announcement_follows_segment_length() {
        assert!(scan_announcement(45.0).contains("will be 45 meters"));
    }
}
