//! Final compaction of the timeline before it is rendered.

use log::debug;

use super::event::{EventFlag, EventType, MeasureElement};
use super::AntescofoWriter;
use crate::rational::{format_duration, Rational};

impl AntescofoWriter {
    /// Merge neighbouring events that sound as one.
    ///
    /// First pass: in the same measure, adjacent rests, or adjacent
    /// chords/trills/glissandi with identical pitches. Second pass: a
    /// tie-start event followed by its tie-end twin.
    pub fn final_compress(&mut self) {
        let keys: Vec<Rational> = self.timeline.keys().copied().collect();
        let mut current: Option<Rational> = None;
        for key in keys {
            let Some(prev) = current else {
                current = Some(key);
                continue;
            };
            let compactable = match (self.timeline.get(&prev), self.timeline.get(&key)) {
                (Some(a), Some(b)) => continues_sound(a, b),
                _ => false,
            };
            if !(compactable && self.merge_notes(prev, key)) {
                current = Some(key);
            }
        }

        // walk backwards so a chain of ties folds into its first note
        let keys: Vec<Rational> = self.timeline.keys().copied().collect();
        for pair in keys.windows(2).rev() {
            let (a, b) = (pair[0], pair[1]);
            let tied = match (self.timeline.get(&a), self.timeline.get(&b)) {
                (Some(a), Some(b)) => {
                    a.same_sound(b)
                        && a.flag == EventFlag::TiedStart
                        && b.flag == EventFlag::TiedEnd
                }
                _ => false,
            };
            if tied && self.merge_notes(a, b) {
                if let Some(el) = self.timeline.get_mut(&a) {
                    el.flag = EventFlag::TiedEnd;
                }
            }
        }
    }

    /// Fold the event at `b` into the event at `a`. Refused when both carry
    /// a tempo change.
    pub fn merge_notes(&mut self, a: Rational, b: Rational) -> bool {
        let Some(later) = self.timeline.get(&b).cloned() else {
            return false;
        };
        let Some(earlier) = self.timeline.get_mut(&a) else {
            return false;
        };

        if !earlier.bpm.is_empty() && !later.bpm.is_empty() {
            debug!(
                "not merging {} into {}: both change tempo",
                format_duration(b),
                format_duration(a)
            );
            return false;
        }
        if earlier.bpm.is_empty() {
            earlier.bpm = later.bpm;
        }
        if earlier.rehearsal.is_empty() {
            earlier.rehearsal = later.rehearsal;
        }
        earlier.fermata |= later.fermata;
        earlier.duration += later.duration;
        self.timeline.remove(&b);
        debug!("merged {} into {}", format_duration(b), format_duration(a));
        true
    }
}

fn continues_sound(a: &MeasureElement, b: &MeasureElement) -> bool {
    if a.measure != b.measure || a.event_type != b.event_type {
        return false;
    }
    match a.event_type {
        EventType::Rest => a.first_pitch() == b.first_pitch(),
        EventType::Trill | EventType::Multi | EventType::Chord => a.pitches == b.pitches,
        _ => false,
    }
}
