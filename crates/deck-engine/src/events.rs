//! Engine state-change notifications.
//!
//! Observers subscribe to a channel and receive one event per transition.
//! Emission is synchronous at the transition point; there is no delivery
//! thread, so a subscriber that never drains its receiver only grows its own
//! queue.

use crossbeam_channel::{Receiver, Sender, unbounded};

/// Notification emitted by the playback engine.
///
/// Natural end of stream and an explicit stop are indistinguishable to
/// observers; both arrive as [`EngineEvent::Stopped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// Audible output began for a newly started file.
    Started,
    /// The active session ended (explicit stop or end of stream).
    Stopped,
}

/// Fan-out of engine events to any number of subscribers.
#[derive(Debug, Default)]
pub(crate) struct EventHub {
    senders: Vec<Sender<EngineEvent>>,
}

impl EventHub {
    /// Register a new subscriber.
    pub(crate) fn subscribe(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = unbounded();
        self.senders.push(tx);
        rx
    }

    /// Deliver `event` to all live subscribers, pruning disconnected ones.
    pub(crate) fn emit(&mut self, event: EngineEvent) {
        self.senders.retain(|tx| tx.send(event).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_each_event() {
        let mut hub = EventHub::default();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.emit(EngineEvent::Started);
        hub.emit(EngineEvent::Stopped);

        assert_eq!(a.try_iter().collect::<Vec<_>>(), vec![
            EngineEvent::Started,
            EngineEvent::Stopped
        ]);
        assert_eq!(b.try_iter().count(), 2);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut hub = EventHub::default();
        let keep = hub.subscribe();
        drop(hub.subscribe());

        hub.emit(EngineEvent::Started);
        assert_eq!(hub.senders.len(), 1);
        assert_eq!(keep.try_recv().unwrap(), EngineEvent::Started);
    }
}
