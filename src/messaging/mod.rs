pub mod channels;

pub use channels::{
    EventConsumer, EventProducer, SharedEventProducer, create_event_channel, drain_events,
};
