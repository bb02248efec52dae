//! Observer notifications.

use super::SessionState;
use crossbeam_channel::{Receiver, Sender, unbounded};
use modplay_common::{FrameInfo, ModuleInfo};
use parking_lot::Mutex;

/// Notification published by the playback adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// A module was loaded.
    ModuleLoaded(ModuleInfo),
    /// A frame was decoded into a buffer.
    Frame(FrameInfo),
    /// The session changed state.
    StateChanged(SessionState),
    /// The module wrapped; playback drains and stops.
    Ended,
    /// Playback stopped because a frame could not be produced or queued.
    Halted {
        /// Human-readable cause.
        reason: String,
    },
}

/// Fans events out to every live subscriber.
///
/// Channels are unbounded so publishing never waits on a slow consumer.
#[derive(Default)]
pub(crate) struct EventPublisher {
    subscribers: Mutex<Vec<Sender<PlayerEvent>>>,
}

impl EventPublisher {
    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: PlayerEvent) {
        let mut subscribers = self.subscribers.lock();
        // Drop subscribers whose receiver is gone.
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_sees_every_event() {
        let publisher = EventPublisher::default();
        let a = publisher.subscribe();
        let b = publisher.subscribe();

        publisher.publish(PlayerEvent::Ended);

        assert_eq!(a.try_recv().unwrap(), PlayerEvent::Ended);
        assert_eq!(b.try_recv().unwrap(), PlayerEvent::Ended);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let publisher = EventPublisher::default();
        let kept = publisher.subscribe();
        drop(publisher.subscribe());

        publisher.publish(PlayerEvent::StateChanged(SessionState::Stopped));
        assert_eq!(publisher.subscribers.lock().len(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
