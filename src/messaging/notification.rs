// Notifications - Scheduler thread → control thread
// State changes the UI or CLI needs to redraw, with a timestamp

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::sequencer::timeline::{Subdivision, Tempo};
use crate::sequencer::transport::TransportState;

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
}

/// Subsystem a notification comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCategory {
    Transport,
    Pattern,
    Audio,
}

/// What changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    TransportChanged(TransportState),
    /// Playhead moved to this step
    StepChanged(usize),
    TempoChanged(Tempo),
    SubdivisionChanged(Subdivision),
    PatternResized { width: usize, height: usize },
    /// Cell contents changed (toggle, set or clear)
    PatternEdited,
    /// A snapshot replaced pattern, tempo and subdivision
    Restored,
    /// The sink refused triggers during one pass
    TriggersDropped(usize),
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::TransportChanged(TransportState::Playing) => write!(f, "playing"),
            HostEvent::TransportChanged(TransportState::Stopped) => write!(f, "stopped"),
            HostEvent::StepChanged(step) => write!(f, "step {}", step + 1),
            HostEvent::TempoChanged(tempo) => write!(f, "tempo {}", tempo),
            HostEvent::SubdivisionChanged(subdivision) => write!(f, "subdivision {}", subdivision),
            HostEvent::PatternResized { width, height } => write!(f, "grid {}x{}", width, height),
            HostEvent::PatternEdited => write!(f, "pattern edited"),
            HostEvent::Restored => write!(f, "snapshot restored"),
            HostEvent::TriggersDropped(count) => write!(f, "{} triggers dropped", count),
        }
    }
}

/// Notification with timestamp and metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: NotificationCategory,
    pub event: HostEvent,
    pub timestamp: u64, // Unix timestamp in milliseconds
}

impl Notification {
    pub fn new(level: NotificationLevel, category: NotificationCategory, event: HostEvent) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        Self {
            level,
            category,
            event,
            timestamp,
        }
    }

    pub fn info(category: NotificationCategory, event: HostEvent) -> Self {
        Self::new(NotificationLevel::Info, category, event)
    }

    pub fn warning(category: NotificationCategory, event: HostEvent) -> Self {
        Self::new(NotificationLevel::Warning, category, event)
    }

    pub fn message(&self) -> String {
        self.event.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_creation() {
        let notif = Notification::warning(NotificationCategory::Audio, HostEvent::TriggersDropped(3));

        assert_eq!(notif.level, NotificationLevel::Warning);
        assert_eq!(notif.category, NotificationCategory::Audio);
        assert_eq!(notif.message(), "3 triggers dropped");
        assert!(notif.timestamp > 0);

        let info = Notification::info(NotificationCategory::Pattern, HostEvent::PatternEdited);
        assert_eq!(info.level, NotificationLevel::Info);
    }

    #[test]
    fn test_event_messages() {
        assert_eq!(HostEvent::StepChanged(0).to_string(), "step 1");
        assert_eq!(
            HostEvent::TransportChanged(TransportState::Playing).to_string(),
            "playing"
        );
        assert_eq!(
            HostEvent::PatternResized { width: 8, height: 2 }.to_string(),
            "grid 8x2"
        );
    }
}
