// Note event channel
//
// Producers (the MIDI callback thread, the synthetic generator) share one
// ringbuffer producer behind a mutex; the poller owns the consumer and drains
// it once per update. Pushes wait for the lock rather than skipping, so no
// event is lost or reordered while another producer holds it.

use crate::midi::event::NoteEvent;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::warn;

pub type EventProducer = HeapProd<NoteEvent>;
pub type EventConsumer = HeapCons<NoteEvent>;

pub fn create_event_channel(capacity: usize) -> (EventProducer, EventConsumer) {
    let rb = HeapRb::<NoteEvent>::new(capacity);
    rb.split()
}

/// Producer half that can be cloned into several sender threads
#[derive(Clone)]
pub struct SharedEventProducer {
    inner: Arc<Mutex<EventProducer>>,
}

impl SharedEventProducer {
    pub fn new(producer: EventProducer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(producer)),
        }
    }

    /// Queue one event. Returns false when the queue is full and the event
    /// was dropped.
    pub fn push(&self, event: NoteEvent) -> bool {
        let mut producer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if producer.try_push(event).is_err() {
            warn!(%event, "event queue full, event dropped");
            return false;
        }
        true
    }
}

/// Take every queued event, oldest first
pub fn drain_events(consumer: &mut EventConsumer) -> Vec<NoteEvent> {
    let mut events = Vec::with_capacity(consumer.occupied_len());
    while let Some(event) = consumer.try_pop() {
        events.push(event);
    }
    events
}
