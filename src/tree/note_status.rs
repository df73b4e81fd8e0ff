//! Per-voice "last printed" octave and duration, used to elide markers
//! that repeat the previous note of the same voice.

use std::collections::BTreeMap;

use super::element::NoteDuration;

/// Voices at or beyond this index are never tracked.
pub const MAX_VOICES: usize = 128;

/// What the last note printed for one voice looked like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteStatus {
    pub octave: i32,
    pub duration: NoteDuration,
}

impl Default for NoteStatus {
    fn default() -> Self {
        Self {
            octave: 1,
            duration: NoteDuration::new(1, 4, 0),
        }
    }
}

/// Formatting context owned by whoever builds a tree of notes.
///
/// A voice gets a status the first time a note is rendered for it.
#[derive(Debug, Clone, Default)]
pub struct FormattingState {
    statuses: BTreeMap<usize, NoteStatus>,
}

impl FormattingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, voice: usize) -> Option<&NoteStatus> {
        self.statuses.get(&voice)
    }

    /// Status for `voice`, created with defaults when absent.
    /// Returns `None` for voices past [`MAX_VOICES`].
    pub fn get_or_create(&mut self, voice: usize) -> Option<&mut NoteStatus> {
        if voice >= MAX_VOICES {
            return None;
        }
        Some(self.statuses.entry(voice).or_default())
    }

    /// Restore every tracked voice to the default octave and duration.
    pub fn reset_all(&mut self) {
        for status in self.statuses.values_mut() {
            *status = NoteStatus::default();
        }
    }

    /// Forget every voice.
    pub fn free_all(&mut self) {
        self.statuses.clear();
    }

    pub fn tracked_voices(&self) -> usize {
        self.statuses.len()
    }
}
