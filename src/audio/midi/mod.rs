//! MIDI handling for offline renders
//!
//! Provides MIDI event types, the per-buffer event list, and note scheduling.

mod events;
pub mod scheduler;

pub use events::{MidiBuffer, MidiEvent, TimedMidiEvent};
pub use scheduler::{note_off_offset, NoteScheduler, NoteState, ScheduledEvent, RENDER_CHANNEL};
