// MIDI input - note events from a hardware keyboard
//
// midir calls back on its own thread. The callback stamps each message with
// the wall clock at receipt, decodes it and pushes it into the event queue;
// the poller drains the queue on its own schedule.

use crate::audio::timing::{Clock, Millis};
use crate::connection::status::{AtomicDeviceStatus, DeviceStatus};
use crate::error::{ProtocolViolation, TransportError};
use crate::messaging::channels::{
    EventConsumer, SharedEventProducer, create_event_channel, drain_events,
};
use crate::midi::event::NoteEvent;
use crate::midi::source::EventSource;
use midir::{MidiInput as MidirInput, MidiInputConnection};
use std::sync::Arc;
use tracing::{debug, info, warn};

const CLIENT_NAME: &str = "midi_measures input";
const CONNECTION_NAME: &str = "midi-measures-in";

pub struct HardwareSource {
    /// Requested port; the first available one when `None`
    device_name: Option<String>,
    /// Port resolved by `find_and_connect`
    port_name: Option<String>,
    status: AtomicDeviceStatus,
    connection: Option<MidiInputConnection<()>>,
    producer: SharedEventProducer,
    consumer: EventConsumer,
    clock: Arc<dyn Clock>,
}

impl HardwareSource {
    pub fn new(device_name: Option<String>, queue_capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let (producer, consumer) = create_event_channel(queue_capacity);
        Self {
            device_name,
            port_name: None,
            status: AtomicDeviceStatus::default(),
            connection: None,
            producer: SharedEventProducer::new(producer),
            consumer,
            clock,
        }
    }

    /// Connection status, shareable with other threads
    pub fn status(&self) -> AtomicDeviceStatus {
        self.status.clone()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.port_name.as_deref()
    }

    fn open_input() -> Result<MidirInput, TransportError> {
        MidirInput::new(CLIENT_NAME).map_err(|e| TransportError::Init(e.to_string()))
    }

    /// Decode one raw message and queue it. Runs on the MIDI callback thread.
    fn handle_message(bytes: &[u8], timestamp: Millis, producer: &SharedEventProducer) {
        match NoteEvent::from_bytes(bytes, timestamp) {
            Ok(event) => {
                producer.push(event);
            }
            // Clock, control change and the like: not note traffic
            Err(ProtocolViolation::UnknownStatus(status)) => {
                debug!(status = %format!("{:#04X}", status), "non-note message ignored");
            }
            Err(violation) => {
                warn!(%violation, bytes = ?bytes, "malformed MIDI message discarded");
            }
        }
    }
}

impl EventSource for HardwareSource {
    fn find_and_connect(&mut self) -> Result<(), TransportError> {
        self.status.set(DeviceStatus::Connecting);

        let midi_in = match Self::open_input() {
            Ok(input) => input,
            Err(e) => {
                self.status.set(DeviceStatus::Error);
                return Err(e);
            }
        };

        let names: Vec<String> = midi_in
            .ports()
            .iter()
            .filter_map(|port| midi_in.port_name(port).ok())
            .collect();
        for (i, name) in names.iter().enumerate() {
            debug!(index = i, port = %name, "MIDI input port");
        }

        let found = match &self.device_name {
            Some(wanted) => names.into_iter().find(|name| name == wanted),
            None => names.into_iter().next(),
        };

        match found {
            Some(name) => {
                info!(port = %name, "MIDI device found");
                self.port_name = Some(name);
                self.status.set(DeviceStatus::Connected);
                Ok(())
            }
            None => {
                self.status.set(DeviceStatus::Disconnected);
                Err(match &self.device_name {
                    Some(wanted) => TransportError::PortNotFound(wanted.clone()),
                    None => TransportError::NoDevice,
                })
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.status.get() == DeviceStatus::Connected && self.port_name.is_some()
    }

    fn is_receiving(&self) -> bool {
        self.connection.is_some()
    }

    fn start(&mut self) -> Result<(), TransportError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let port_name = match (&self.port_name, self.is_ready()) {
            (Some(name), true) => name.clone(),
            _ => return Err(TransportError::NotReady),
        };

        // midir consumes the input on connect, so look the port up again
        let midi_in = Self::open_input()?;
        let port = midi_in
            .ports()
            .into_iter()
            .find(|p| midi_in.port_name(p).map(|n| n == port_name).unwrap_or(false));
        let Some(port) = port else {
            self.status.set(DeviceStatus::Disconnected);
            return Err(TransportError::PortNotFound(port_name));
        };

        let producer = self.producer.clone();
        let clock = Arc::clone(&self.clock);
        let connection = midi_in
            .connect(
                &port,
                CONNECTION_NAME,
                move |_device_micros, message, _| {
                    Self::handle_message(message, clock.wall_now(), &producer);
                },
                (),
            )
            .map_err(|e| {
                self.status.set(DeviceStatus::Error);
                TransportError::Connect(e.to_string())
            })?;

        info!(port = %port_name, "MIDI input receiving");
        self.connection = Some(connection);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            info!("MIDI input stopped");
        }
    }

    fn drain_events(&mut self) -> Vec<NoteEvent> {
        drain_events(&mut self.consumer)
    }

    fn name(&self) -> String {
        match &self.port_name {
            Some(port) => format!("hardware ({})", port),
            None => "hardware".to_string(),
        }
    }
}

impl Drop for HardwareSource {
    fn drop(&mut self) {
        self.stop();
    }
}
