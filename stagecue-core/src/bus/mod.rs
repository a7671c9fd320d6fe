//! L4 event bus: typed pub-sub of kernel events, guaranteeing in-order
//! delivery per subscriber and isolating subscriber failures from each
//! other and from the publisher (§4.4). Grounded on the subscriber-list
//! shape of `adil-adysh-AudioVerseEngine`'s `EventBusImpl`, simplified from
//! its `TypeId`-keyed map to a flat list since this domain's event set is a
//! single closed enum rather than an open ECS event set.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use stagecue_types::{EventEnvelope, KernelEvent, PlaybackState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn Fn(&EventEnvelope) + Send>;

struct Entry {
    id: SubscriptionId,
    callback: Subscriber,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Entry>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Additions take effect starting with the next published event.
    pub fn subscribe(&self, callback: impl Fn(&EventEnvelope) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().unwrap().push(Entry {
            id,
            callback: Box::new(callback),
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.lock().unwrap().retain(|e| e.id != id);
    }

    /// Publishes `event` to every subscriber in order, then publishes the
    /// `StateChanged` meta event carrying it (§4.4: "fires after
    /// type-specific listeners for that event have been invoked").
    pub fn publish(&self, event: KernelEvent, state: PlaybackState) {
        let envelope = EventEnvelope {
            event: event.clone(),
            state: state.clone(),
        };
        self.dispatch(&envelope);

        let meta = EventEnvelope {
            event: KernelEvent::StateChanged {
                original: Box::new(event),
            },
            state,
        };
        self.dispatch(&meta);
    }

    fn dispatch(&self, envelope: &EventEnvelope) {
        let subscribers = self.subscribers.lock().unwrap();
        for entry in subscribers.iter() {
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                (entry.callback)(envelope)
            }));
            if outcome.is_err() {
                log::error!(target: "bus", "event subscriber panicked; other subscribers unaffected");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex as StdMutex};

    fn state() -> PlaybackState {
        PlaybackState::default()
    }

    #[test]
    fn subscribers_receive_events_in_publish_order() {
        let bus = EventBus::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let seen_clone = seen.clone();
        bus.subscribe(move |envelope| {
            seen_clone.lock().unwrap().push(envelope.event.clone());
        });
        bus.publish(KernelEvent::PlaybackStopped, state());
        bus.publish(KernelEvent::SilenceEnded, state());

        let events = seen.lock().unwrap();
        // each publish yields the event then its StateChanged meta event
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], KernelEvent::PlaybackStopped);
        assert!(matches!(events[1], KernelEvent::StateChanged { .. }));
        assert_eq!(events[2], KernelEvent::SilenceEnded);
        assert!(matches!(events[3], KernelEvent::StateChanged { .. }));
    }

    #[test]
    fn unsubscribe_stops_future_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(StdMutex::new(0));
        let count_clone = count.clone();
        let id = bus.subscribe(move |_| {
            *count_clone.lock().unwrap() += 1;
        });
        bus.publish(KernelEvent::PlaybackStopped, state());
        bus.unsubscribe(id);
        bus.publish(KernelEvent::PlaybackStopped, state());
        // two events (event + meta) from the first publish only
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        bus.subscribe(|_| panic!("boom"));
        let count = Arc::new(StdMutex::new(0));
        let count_clone = count.clone();
        bus.subscribe(move |_| {
            *count_clone.lock().unwrap() += 1;
        });
        bus.publish(KernelEvent::PlaybackStopped, state());
        assert_eq!(*count.lock().unwrap(), 2);
    }
}
