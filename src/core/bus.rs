//! In-process notifications.
//!
//! `EventBus` fans engine events out to synchronous subscribers.
//! `Notifier` is the user-facing surface: plain messages and yes/no prompts.

use std::io::{self, BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::core::{DominantChange, FailureEvent};

/// Payload of the `event-logged` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogged {
    pub event: FailureEvent,
    /// Reference the event was logged against (task id or document path).
    pub reference: String,
}

type Handler<T> = Box<dyn Fn(&T)>;

/// Synchronous publish/subscribe for engine events.
///
/// Channels: `dominant-changed` and `event-logged`. Handlers run in
/// subscription order on the publishing call.
#[derive(Default)]
pub struct EventBus {
    dominant_changed: Vec<Handler<DominantChange>>,
    event_logged: Vec<Handler<EventLogged>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_dominant_changed(&mut self, handler: impl Fn(&DominantChange) + 'static) {
        self.dominant_changed.push(Box::new(handler));
    }

    pub fn on_event_logged(&mut self, handler: impl Fn(&EventLogged) + 'static) {
        self.event_logged.push(Box::new(handler));
    }

    pub fn publish_dominant_changed(&self, change: &DominantChange) {
        tracing::debug!(
            "dominant-changed: {:?} -> {:?}",
            change.old.as_deref(),
            change.new.as_deref()
        );
        for handler in &self.dominant_changed {
            handler(change);
        }
    }

    pub fn publish_event_logged(&self, logged: &EventLogged) {
        tracing::debug!("event-logged: {} ({})", logged.event.id, logged.reference);
        for handler in &self.event_logged {
            handler(logged);
        }
    }

    /// Number of subscribers across all channels.
    pub fn subscriber_count(&self) -> usize {
        self.dominant_changed.len() + self.event_logged.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("dominant_changed", &self.dominant_changed.len())
            .field("event_logged", &self.event_logged.len())
            .finish()
    }
}

/// User-facing notification surface.
pub trait Notifier {
    fn info(&self, message: &str);

    /// Ask a yes/no question.
    fn confirm(&self, prompt: &str) -> bool;
}

/// Terminal notifier: messages go to stderr, prompts read a line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier {
    /// Answer yes to every prompt without reading stdin.
    pub assume_yes: bool,
}

impl ConsoleNotifier {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl Notifier for ConsoleNotifier {
    fn info(&self, message: &str) {
        eprintln!("{}", message);
    }

    fn confirm(&self, prompt: &str) -> bool {
        if self.assume_yes {
            eprintln!("{} [y/N] y", prompt);
            return true;
        }
        eprint!("{} [y/N] ", prompt);
        // Unflushed prompt still reads fine once the newline arrives
        let _ = io::stderr().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Err(e) => {
                tracing::warn!("could not read confirmation: {}", e);
                false
            }
        }
    }
}

/// Notifier that shows nothing and gives a fixed answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier {
    pub answer: bool,
}

impl SilentNotifier {
    pub fn new(answer: bool) -> Self {
        Self { answer }
    }
}

impl Notifier for SilentNotifier {
    fn info(&self, message: &str) {
        tracing::debug!("notification suppressed: {}", message);
    }

    fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!("prompt auto-answered {}: {}", self.answer, prompt);
        self.answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_dominant_changed_reaches_every_subscriber() {
        let mut bus = EventBus::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            bus.on_dominant_changed(move |change| {
                seen.borrow_mut()
                    .push(format!("{}:{}", tag, change.new.clone().unwrap_or_default()));
            });
        }

        bus.publish_dominant_changed(&DominantChange {
            old: None,
            new: Some("overthinking".to_string()),
        });

        assert_eq!(
            *seen.borrow(),
            vec!["first:overthinking", "second:overthinking"]
        );
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        bus.publish_dominant_changed(&DominantChange { old: None, new: None });
        assert_eq!(format!("{:?}", bus), "EventBus { dominant_changed: 0, event_logged: 0 }");
    }

    #[test]
    fn test_silent_notifier_answers_fixed() {
        assert!(SilentNotifier::new(true).confirm("Log it now?"));
        assert!(!SilentNotifier::default().confirm("Log it now?"));
    }

    #[test]
    fn test_console_notifier_assume_yes() {
        assert!(ConsoleNotifier::new(true).confirm("Log it now?"));
    }
}
