//! Alert presentation. The core hands over a fired [`AlertEvent`]; this module
//! formats it and walks two ranked channel lists (visual and voice), stopping
//! at the first channel that accepts it.

pub mod channels;
pub mod message;

use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::types::AlertEvent;

pub use channels::{CommandChannel, LogChannel, PopupChannel};

/// A `(title, body)` pair as accepted by every presentation sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

/// One presentation sink. `deliver` is synchronous and must not panic; an
/// error moves the notifier on to the next channel.
pub trait Channel: Send + Sync {
    fn name(&self) -> &'static str;
    fn deliver(&self, notice: &Notice) -> Result<(), NotifyError>;
}

/// Which channel (if any) handled each chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Presented {
    pub visual: Option<&'static str>,
    pub voice: Option<&'static str>,
}

pub struct Notifier {
    visual: Vec<Box<dyn Channel>>,
    voice: Vec<Box<dyn Channel>>,
}

impl Notifier {
    pub fn new(visual: Vec<Box<dyn Channel>>, voice: Vec<Box<dyn Channel>>) -> Self {
        Self { visual, voice }
    }

    /// Rank channels for this process: desktop notification, then the in-app
    /// popup when a dashboard is running, then the log. Voice goes to the
    /// speech synthesizer, then the log.
    pub fn for_environment(
        desktop: bool,
        voice: bool,
        popup: Option<PopupChannel>,
    ) -> Self {
        let mut visual: Vec<Box<dyn Channel>> = Vec::new();
        if desktop {
            if let Some(ch) = CommandChannel::desktop() {
                visual.push(Box::new(ch));
            }
        }
        if let Some(p) = popup {
            visual.push(Box::new(p));
        }
        visual.push(Box::new(LogChannel));

        let mut speech: Vec<Box<dyn Channel>> = Vec::new();
        if voice {
            if let Some(ch) = CommandChannel::speech() {
                speech.push(Box::new(ch));
            }
        }
        speech.push(Box::new(LogChannel));

        Self::new(visual, speech)
    }

    pub fn visual_channels(&self) -> Vec<&'static str> {
        self.visual.iter().map(|c| c.name()).collect()
    }

    /// Present a fired alert once on each chain.
    pub fn present(&self, event: &AlertEvent) -> Presented {
        let notice = message::alert_notice(event);
        let spoken = Notice {
            title: notice.title.clone(),
            body: message::spoken_text(event.direction.verb(), &event.price_text),
        };
        Presented {
            visual: deliver_first(&self.visual, &notice),
            voice: deliver_first(&self.voice, &spoken),
        }
    }

    /// Speak the fixed test sentence.
    pub fn test_voice(&self) -> Option<&'static str> {
        let notice = Notice {
            title: message::ALERT_TITLE.to_string(),
            body: message::spoken_text("测试", message::VOICE_TEST_PRICE),
        };
        deliver_first(&self.voice, &notice)
    }
}

fn deliver_first(chain: &[Box<dyn Channel>], notice: &Notice) -> Option<&'static str> {
    for ch in chain {
        match ch.deliver(notice) {
            Ok(()) => return Some(ch.name()),
            Err(NotifyError::Unavailable(name)) => debug!("Channel {name} unavailable, falling back"),
            Err(e) => warn!("Notification fallback: {e}"),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AlertDirection;
    use chrono::Local;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct Recording {
        name: &'static str,
        fail: bool,
        seen: Arc<Mutex<Vec<Notice>>>,
    }

    impl Channel for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        fn deliver(&self, notice: &Notice) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Failed {
                    channel: self.name,
                    reason: "boom".to_string(),
                });
            }
            self.seen.lock().push(notice.clone());
            Ok(())
        }
    }

    fn recording(name: &'static str, fail: bool) -> (Box<dyn Channel>, Arc<Mutex<Vec<Notice>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        (Box::new(Recording { name, fail, seen: seen.clone() }), seen)
    }

    fn event() -> AlertEvent {
        AlertEvent {
            direction: AlertDirection::Up,
            price: 776.5,
            price_text: "776.50".to_string(),
            source_id: "zheshang".to_string(),
            fired_at: Local::now(),
        }
    }

    #[test]
    fn falls_back_past_failing_channel() {
        let (desktop, desktop_seen) = recording("desktop", true);
        let (popup, popup_seen) = recording("popup", false);
        let (speech, speech_seen) = recording("speech", false);
        let notifier = Notifier::new(vec![desktop, popup], vec![speech]);

        let presented = notifier.present(&event());
        assert_eq!(presented.visual, Some("popup"));
        assert_eq!(presented.voice, Some("speech"));
        assert!(desktop_seen.lock().is_empty());

        let popup_seen = popup_seen.lock();
        assert_eq!(popup_seen.len(), 1);
        assert_eq!(popup_seen[0].body, "涨了，现在776.50元");
        assert_eq!(speech_seen.lock()[0].body, "涨了，现在七七六点五零元");
    }

    #[test]
    fn first_working_channel_wins_exactly_once() {
        let (a, a_seen) = recording("a", false);
        let (b, b_seen) = recording("b", false);
        let notifier = Notifier::new(vec![a, b], vec![]);

        let presented = notifier.present(&event());
        assert_eq!(presented.visual, Some("a"));
        assert_eq!(presented.voice, None);
        assert_eq!(a_seen.lock().len(), 1);
        assert!(b_seen.lock().is_empty());
    }

    #[test]
    fn environment_ranking_ends_with_log() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let notifier = Notifier::for_environment(false, false, Some(PopupChannel::new(tx)));
        assert_eq!(notifier.visual_channels(), vec!["popup", "log"]);
        assert_eq!(notifier.test_voice(), Some("log"));
    }
}
