//! Live pitch input from the instrument.
//!
//! Only note-on and note-off codes are understood. Anything else means the
//! device stream is out of step with us and is reported as an error.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::constants::{NOTE_OFF_CODE, NOTE_ON_CODE};
use crate::error::InputError;

/// Offsets inside a BLE-MIDI notification: header, timestamp, status, pitch.
const BLE_STATUS_OFFSET: usize = 2;
const BLE_PITCH_OFFSET: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InputEvent {
    PitchOn(u8),
    PitchOff(u8),
}

impl InputEvent {
    /// Build an event from a status code and pitch.
    pub fn from_code(code: u8, pitch: u8) -> Result<Self, InputError> {
        match code {
            NOTE_ON_CODE => Ok(InputEvent::PitchOn(pitch)),
            NOTE_OFF_CODE => Ok(InputEvent::PitchOff(pitch)),
            _ => Err(InputError::UnknownEvent { code }),
        }
    }

    /// Decode a BLE-MIDI characteristic notification (status at byte 2, pitch at byte 3).
    pub fn from_ble_packet(packet: &[u8]) -> Result<Self, InputError> {
        match (packet.get(BLE_STATUS_OFFSET), packet.get(BLE_PITCH_OFFSET)) {
            (Some(&code), Some(&pitch)) => Self::from_code(code, pitch),
            _ => Err(InputError::ShortPacket { len: packet.len() }),
        }
    }

    pub fn pitch(self) -> u8 {
        match self {
            InputEvent::PitchOn(p) | InputEvent::PitchOff(p) => p,
        }
    }
}

/// Pitches currently held on the instrument.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RingingPitches(BTreeSet<u8>);

impl RingingPitches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event; returns true when the set changed.
    pub fn apply(&mut self, event: InputEvent) -> bool {
        match event {
            InputEvent::PitchOn(p) => self.0.insert(p),
            InputEvent::PitchOff(p) => self.0.remove(&p),
        }
    }

    pub fn contains(&self, pitch: u8) -> bool {
        self.0.contains(&pitch)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_set(&self) -> &BTreeSet<u8> {
        &self.0
    }
}
