//! Note lifecycle scheduling for offline renders
//!
//! A render plays exactly one note: note-on at sample 0, note-off at
//! `floor(note_length * sample_rate)`. The buffer loop asks the scheduler for
//! each buffer's events in order.

use serde::Serialize;

use super::events::{MidiBuffer, MidiEvent};

/// Channel every render plays on
pub const RENDER_CHANNEL: u8 = 0;

/// Where a note-off lands for a given buffer, if it lands in it at all
///
/// Returns the intra-buffer offset when the note-off sample falls in
/// `[buffer_index * buffer_size, (buffer_index + 1) * buffer_size)`.
pub fn note_off_offset(
    buffer_index: usize,
    note_length: f64,
    sample_rate: f64,
    buffer_size: usize,
) -> Option<usize> {
    if buffer_size == 0 {
        return None;
    }
    let note_off_sample = note_off_sample(note_length, sample_rate);
    let buffer_start = buffer_index * buffer_size;
    let buffer_end = buffer_start + buffer_size;

    if note_off_sample >= buffer_start && note_off_sample < buffer_end {
        Some(note_off_sample - buffer_start)
    } else {
        None
    }
}

/// Absolute sample index of the note-off; negative lengths clamp to 0
#[inline]
pub fn note_off_sample(note_length: f64, sample_rate: f64) -> usize {
    (note_length * sample_rate).max(0.0).floor() as usize
}

/// Lifecycle of the rendered note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteState {
    NotStarted,
    /// Held through the end of the render
    NoteOn,
    /// Sounding, with a note-off due in a later buffer
    NoteOffPending,
    NoteOffSent,
}

/// An event as it was injected, with its absolute buffer position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduledEvent {
    pub buffer_index: usize,
    pub offset: usize,
    pub event: MidiEvent,
}

/// Per-render note scheduler
pub struct NoteScheduler {
    note: u8,
    velocity: u8,
    note_length: f64,
    sample_rate: f64,
    buffer_size: usize,
    /// False when the note is held past the end of the render
    releases: bool,
    state: NoteState,
    log: Vec<ScheduledEvent>,
}

impl NoteScheduler {
    pub fn new(
        note: u8,
        velocity: u8,
        note_length: f64,
        render_length: f64,
        sample_rate: f64,
        buffer_size: usize,
    ) -> Self {
        Self {
            note,
            velocity,
            note_length,
            sample_rate,
            buffer_size,
            releases: note_length < render_length,
            state: NoteState::NotStarted,
            log: Vec::with_capacity(2),
        }
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    /// Every event injected so far, in injection order
    pub fn event_log(&self) -> &[ScheduledEvent] {
        &self.log
    }

    pub fn into_event_log(self) -> Vec<ScheduledEvent> {
        self.log
    }

    /// Fill `midi` with the events for buffer `buffer_index`
    ///
    /// Buffers must be requested in order starting from 0.
    pub fn fill_buffer(&mut self, buffer_index: usize, midi: &mut MidiBuffer) {
        midi.clear();

        if self.state == NoteState::NotStarted {
            self.push(buffer_index, 0, MidiEvent::note_on(self.note, self.velocity, RENDER_CHANNEL), midi);
            self.state = if self.releases {
                NoteState::NoteOffPending
            } else {
                NoteState::NoteOn
            };
        }

        if self.state == NoteState::NoteOffPending {
            if let Some(offset) =
                note_off_offset(buffer_index, self.note_length, self.sample_rate, self.buffer_size)
            {
                log::debug!(
                    "Note-off for note {} in buffer {} at offset {}",
                    self.note,
                    buffer_index,
                    offset
                );
                self.push(buffer_index, offset, MidiEvent::note_off(self.note, self.velocity, RENDER_CHANNEL), midi);
                self.state = NoteState::NoteOffSent;
            }
        }
    }

    fn push(&mut self, buffer_index: usize, offset: usize, event: MidiEvent, midi: &mut MidiBuffer) {
        midi.add(event, offset);
        self.log.push(ScheduledEvent {
            buffer_index,
            offset,
            event,
        });
    }
}
