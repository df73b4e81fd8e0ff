//! Antescofo score writer.
//!
//! The writer accumulates notation events into a timeline keyed by
//! absolute beat position, compacts it, and renders it as an Antescofo
//! score. Events arrive one note at a time; chord membership, ties and
//! grace notes are reconstructed from shared positions.
//!
//! ```
//! use antescore::rational::{ratio, zero};
//! use antescore::writer::{AntescofoWriter, EventFlag, EventType};
//!
//! let mut writer = AntescofoWriter::new();
//! writer.set_note_names(true);
//! let mut beat = zero();
//! writer
//!     .add_note(EventType::Note, 60, ratio(1, 4), 1, &mut beat, EventFlag::None, "")
//!     .unwrap();
//! writer.final_compress();
//! assert!(writer.render().contains("NOTE C4 1/4 measure1"));
//! ```

mod accumulate;
mod compress;
pub mod event;
mod serialize;

use std::collections::BTreeMap;

use crate::rational::Rational;

pub use event::{EventFlag, EventType, MeasureElement, Pitch, PitchRole};

/// Tempo label used until a tempo direction is seen.
pub const DEFAULT_BPM: &str = "120";

/// Builds one Antescofo score. Each conversion uses a fresh writer.
#[derive(Debug, Clone)]
pub struct AntescofoWriter {
    timeline: BTreeMap<Rational, MeasureElement>,
    measure_to_beat: BTreeMap<i32, Rational>,
    bpm: String,
    last_stamped_bpm: String,
    note_names: bool,
    header: Vec<String>,
    selected_parts: Vec<String>,
    selected_staves: Vec<i32>,
    selected_voices: Vec<i32>,
    selected_measures: Vec<i32>,
}

impl Default for AntescofoWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl AntescofoWriter {
    pub fn new() -> Self {
        Self {
            timeline: BTreeMap::new(),
            measure_to_beat: BTreeMap::new(),
            bpm: DEFAULT_BPM.to_string(),
            last_stamped_bpm: String::new(),
            note_names: false,
            header: Vec::new(),
            selected_parts: Vec::new(),
            selected_staves: Vec::new(),
            selected_voices: Vec::new(),
            selected_measures: Vec::new(),
        }
    }

    /// Set the running tempo; the next new event gets stamped with it.
    pub fn set_bpm(&mut self, bpm: impl Into<String>) {
        self.bpm = bpm.into();
    }

    pub fn bpm(&self) -> &str {
        &self.bpm
    }

    /// Print pitch names (`C4`) instead of fixed-point codes (`6000`).
    pub fn set_note_names(&mut self, on: bool) {
        self.note_names = on;
    }

    /// Comment lines printed (prefixed with `; `) ahead of the score.
    pub fn set_header(&mut self, lines: Vec<String>) {
        self.header = lines;
    }

    pub fn set_selected_parts(&mut self, parts: Vec<String>) {
        self.selected_parts = parts;
    }

    pub fn set_selected_staves(&mut self, staves: Vec<i32>) {
        self.selected_staves = staves;
    }

    pub fn set_selected_voices(&mut self, voices: Vec<i32>) {
        self.selected_voices = voices;
    }

    /// Only events of these measures are printed; empty prints all.
    pub fn set_selected_measures(&mut self, measures: Vec<i32>) {
        self.selected_measures = measures;
    }

    pub fn part_selected(&self, id: &str) -> bool {
        self.selected_parts.is_empty() || self.selected_parts.iter().any(|p| p == id)
    }

    pub fn staff_selected(&self, staff: i32) -> bool {
        self.selected_staves.is_empty() || self.selected_staves.contains(&staff)
    }

    pub fn voice_selected(&self, voice: i32) -> bool {
        self.selected_voices.is_empty() || self.selected_voices.contains(&voice)
    }

    pub fn measure_selected(&self, measure: i32) -> bool {
        self.selected_measures.is_empty() || self.selected_measures.contains(&measure)
    }

    pub fn timeline(&self) -> &BTreeMap<Rational, MeasureElement> {
        &self.timeline
    }

    pub fn event_at(&self, position: Rational) -> Option<&MeasureElement> {
        self.timeline.get(&position)
    }

    /// Registered start beat of a measure.
    pub fn measure_start(&self, measure: i32) -> Option<Rational> {
        self.measure_to_beat.get(&measure).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }
}
