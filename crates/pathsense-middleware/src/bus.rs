//! Topic-routed event bus between the AR screen and whoever renders or logs it.
//!
//! Each topic is its own [`tokio::sync::broadcast`] channel: every listener
//! sees every event, and the frame loop never waits on a slow reader (the
//! reader lags instead).
//!
//! # Topics
//!
//! | Topic | Typical traffic |
//! |---|---|
//! | [`Topic::Navigation`] | Session transitions (scan started, navigating, aborted) |
//! | [`Topic::Overlay`] | Per-frame HUD summaries |
//! | [`Topic::Feedback`] | Turn-imminent cues |
//! | [`Topic::SystemAlerts`] | Camera faults, failed scans, shutdown requests |

use pathsense_types::{Event, NavError};
use tokio::sync::broadcast;
use tracing::warn;

/// Events buffered per topic before a slow listener starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

/// Enumeration of all routing topics on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Discrete session transitions.
    Navigation,
    /// High-frequency overlay snapshots, one per frame.
    Overlay,
    /// Turn cues for external feedback devices.
    Feedback,
    /// Faults and operator-level events.
    SystemAlerts,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Navigation,
        Topic::Overlay,
        Topic::Feedback,
        Topic::SystemAlerts,
    ];
}

/// Handle on the four topic channels.  Clones share the channels.
#[derive(Clone, Debug)]
pub struct EventBus {
    navigation: broadcast::Sender<Event>,
    overlay: broadcast::Sender<Event>,
    feedback: broadcast::Sender<Event>,
    system_alerts: broadcast::Sender<Event>,
}

impl EventBus {
    /// Build a bus whose topics each buffer `capacity` events (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (navigation, _) = broadcast::channel(capacity);
        let (overlay, _) = broadcast::channel(capacity);
        let (feedback, _) = broadcast::channel(capacity);
        let (system_alerts, _) = broadcast::channel(capacity);
        Self {
            navigation,
            overlay,
            feedback,
            system_alerts,
        }
    }

    /// Send `event` on `topic` and return how many listeners got it.
    ///
    /// # Errors
    ///
    /// [`NavError::Channel`] when nobody is subscribed to `topic`.  Publishers
    /// on the frame loop treat this as benign.
    pub fn publish_to(&self, topic: Topic, event: Event) -> Result<usize, NavError> {
        self.topic_sender(topic)
            .send(event)
            .map_err(|broadcast::error::SendError(_)| {
                NavError::Channel(format!("No subscribers for topic {topic:?}"))
            })
    }

    /// Start listening on `topic` from now on.
    pub fn subscribe_to(&self, topic: Topic) -> TopicReceiver {
        TopicReceiver {
            topic,
            receiver: self.topic_sender(topic).subscribe(),
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn receiver_count(&self, topic: Topic) -> usize {
        self.topic_sender(topic).receiver_count()
    }

    fn topic_sender(&self, topic: Topic) -> &broadcast::Sender<Event> {
        match topic {
            Topic::Navigation => &self.navigation,
            Topic::Overlay => &self.overlay,
            Topic::Feedback => &self.feedback,
            Topic::SystemAlerts => &self.system_alerts,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Topic-based receiver
// ---------------------------------------------------------------------------

/// Listener for one [`Topic`], from [`EventBus::subscribe_to`].
pub struct TopicReceiver {
    topic: Topic,
    receiver: broadcast::Receiver<Event>,
}

impl TopicReceiver {
    /// Wait for the next event.
    ///
    /// `Lagged(n)` means `n` events were overwritten before this listener read
    /// them; `Closed` means every bus handle is gone.
    pub async fn recv(&mut self) -> Result<Event, broadcast::error::RecvError> {
        self.receiver.recv().await
    }

    /// Take the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Result<Event, broadcast::error::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Wait for the next event, skipping over lag.
    ///
    /// `None` once every bus handle has been dropped.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(topic = ?self.topic, lagged_by = n, "TopicReceiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}
