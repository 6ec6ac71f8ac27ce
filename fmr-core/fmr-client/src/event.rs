//! Registered device events.
//!
//! Devices announce events with `event` class packets. The host keeps the
//! events it cares about here, together with the last value each reported.

use fmr_model::{Packet, WireError};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub identifier: u16,
    pub name: String,
    /// Value carried by the most recent notification
    pub last_value: Option<u32>,
}

#[derive(Debug, Default)]
pub struct EventRegistry {
    events: Vec<Event>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an event, replacing any earlier registration of `identifier`.
    pub fn register(&mut self, identifier: u16, name: &str) {
        self.release(identifier);
        self.events.push(Event {
            identifier,
            name: name.to_string(),
            last_value: None,
        });
    }

    pub fn release(&mut self, identifier: u16) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.identifier != identifier);
        self.events.len() != before
    }

    /// Release every event, returning how many there were.
    pub fn release_all(&mut self) -> usize {
        let count = self.events.len();
        self.events.clear();
        count
    }

    pub fn get(&self, identifier: u16) -> Option<&Event> {
        self.events.iter().find(|e| e.identifier == identifier)
    }

    /// Record a notification. Unregistered events are ignored.
    pub fn notify(&mut self, identifier: u16, value: u32) -> bool {
        match self.events.iter_mut().find(|e| e.identifier == identifier) {
            Some(event) => {
                event.last_value = Some(value);
                true
            }
            None => {
                log::debug!("unregistered event 0x{identifier:04x}");
                false
            }
        }
    }

    /// Decode a received packet and record it if it is a registered event.
    pub fn handle_packet(&mut self, buf: &[u8]) -> Result<bool, WireError> {
        match Packet::decode(buf)? {
            Packet::Event { identifier, value } => Ok(self.notify(identifier, value)),
            _ => Ok(false),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}
