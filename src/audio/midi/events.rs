//! MIDI event types and the per-buffer event list passed to generators
//!
//! Events carry a sample offset relative to the start of the buffer they
//! belong to, so generators can apply them with sample-accurate timing.

use serde::Serialize;

/// MIDI event types that can be sent to generators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MidiEvent {
    /// Note on event
    NoteOn {
        /// MIDI note number (0-127)
        note: u8,
        /// Velocity (0-127)
        velocity: u8,
        /// MIDI channel (0-15)
        channel: u8,
    },
    /// Note off event
    NoteOff {
        /// MIDI note number (0-127)
        note: u8,
        /// Velocity (0-127, often ignored)
        velocity: u8,
        /// MIDI channel (0-15)
        channel: u8,
    },
}

impl MidiEvent {
    /// Create a note on event
    #[inline]
    pub fn note_on(note: u8, velocity: u8, channel: u8) -> Self {
        Self::NoteOn {
            note,
            velocity,
            channel,
        }
    }

    /// Create a note off event
    #[inline]
    pub fn note_off(note: u8, velocity: u8, channel: u8) -> Self {
        Self::NoteOff {
            note,
            velocity,
            channel,
        }
    }

    pub fn note(&self) -> u8 {
        match *self {
            Self::NoteOn { note, .. } | Self::NoteOff { note, .. } => note,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self, Self::NoteOn { .. })
    }
}

/// An event positioned inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimedMidiEvent {
    /// Sample offset from the start of the buffer
    pub offset: usize,
    pub event: MidiEvent,
}

/// Events for one process call, kept in offset order
///
/// Storage is retained across `clear()` so the render loop doesn't allocate
/// per buffer.
#[derive(Debug, Default)]
pub struct MidiBuffer {
    events: Vec<TimedMidiEvent>,
}

impl MidiBuffer {
    pub fn new() -> Self {
        Self {
            events: Vec::with_capacity(8),
        }
    }

    /// Clear events for next process cycle
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Insert an event; events with equal offsets keep insertion order
    pub fn add(&mut self, event: MidiEvent, offset: usize) {
        let pos = self.events.partition_point(|e| e.offset <= offset);
        self.events.insert(pos, TimedMidiEvent { offset, event });
    }

    pub fn add_note_on(&mut self, note: u8, velocity: u8, channel: u8, offset: usize) {
        self.add(MidiEvent::note_on(note, velocity, channel), offset);
    }

    pub fn add_note_off(&mut self, note: u8, velocity: u8, channel: u8, offset: usize) {
        self.add(MidiEvent::note_off(note, velocity, channel), offset);
    }

    pub fn events(&self) -> &[TimedMidiEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
