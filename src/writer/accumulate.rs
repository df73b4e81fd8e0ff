//! Event accumulation: placing one note at a time on the timeline.
//!
//! A single call may have to split an earlier rest, turn a note into a
//! chord, or leave a held fragment behind a shorter note. Those secondary
//! insertions go through a worklist drained by [`AntescofoWriter::add_note`]
//! rather than through recursion.

use std::ops::Bound::{Excluded, Unbounded};

use log::{debug, error, trace};

use super::event::{EventFlag, EventType, MeasureElement, Pitch};
use super::AntescofoWriter;
use crate::error::TimelineError;
use crate::rational::{format_duration, rationalise, whole, zero, Rational};

/// Upper bound on fragments one `add_note` call may splice in.
const MAX_SPLICES: usize = 512;

/// How many earlier measures are searched when recovering a beat.
const RECOVERY_LOOKBACK: i32 = 3;

/// One insertion waiting on the worklist.
#[derive(Debug, Clone)]
struct Insertion {
    event_type: EventType,
    pitch: Pitch,
    duration: Rational,
    measure: i32,
    beat: Rational,
    flag: EventFlag,
    /// The caller's own event, as opposed to a spliced fragment.
    root: bool,
}

impl Insertion {
    /// The part of `ins` still sounding from `beat` on, as a held pitch.
    fn held(ins: &Insertion, beat: Rational, duration: Rational) -> Self {
        let event_type = if ins.event_type.is_multi_pitch() {
            ins.event_type
        } else {
            EventType::Note
        };
        Self {
            event_type,
            pitch: Pitch::carryover(ins.pitch.code),
            duration,
            measure: ins.measure,
            beat,
            flag: ins.flag,
            root: false,
        }
    }

    fn rest(measure: i32, beat: Rational, duration: Rational) -> Self {
        Self {
            event_type: EventType::Rest,
            pitch: Pitch::primary(0),
            duration,
            measure,
            beat,
            flag: EventFlag::None,
            root: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Done,
    /// A rest that would have overwritten sounding material.
    Ignored,
    /// The event was re-queued behind the fragments it needs first.
    Requeued,
}

impl AntescofoWriter {
    /// Add one notation event.
    ///
    /// `current_beat` is the beat of the event; on return it holds the
    /// absolute beat the event was placed at. A negative `pitch` marks a
    /// pitch held over from an earlier event. Rests (pitch 0) never
    /// overwrite sounding events.
    #[allow(clippy::too_many_arguments)]
    pub fn add_note(
        &mut self,
        event_type: EventType,
        pitch: i32,
        duration: Rational,
        measure: i32,
        current_beat: &mut Rational,
        flag: EventFlag,
        rehearsal: &str,
    ) -> Result<(), TimelineError> {
        let pitch = if pitch < 0 {
            Pitch::carryover(-pitch)
        } else {
            Pitch::primary(pitch)
        };
        let duration = rationalise(duration);

        let newly_registered = !self.measure_to_beat.contains_key(&measure);
        let mut beat = self.add_beat(*current_beat, measure);

        if measure > 1 && beat == whole(1) {
            if pitch.code == 0 {
                debug!("measure {measure}: rest at ambiguous beat 1 dropped");
                *current_beat = beat;
                return Ok(());
            }
            match self.recover_measure_start(measure) {
                Some(start) => {
                    if newly_registered {
                        self.measure_to_beat.insert(measure, start);
                    }
                    beat = start + beat - whole(1);
                    trace!(
                        "measure {measure}: beat 1 recovered as {}",
                        format_duration(beat)
                    );
                }
                None => {
                    error!(
                        "measure {measure}: cannot place pitch {} at beat 1; timeline has {} events",
                        pitch.code,
                        self.timeline.len()
                    );
                    return Err(TimelineError::Inconsistency {
                        measure,
                        beat,
                        pitch: pitch.code,
                    });
                }
            }
        }
        *current_beat = beat;

        let applied = self.splice(Insertion {
            event_type,
            pitch,
            duration,
            measure,
            beat,
            flag,
            root: true,
        })?;

        if applied {
            if let Some(el) = self.timeline.get_mut(&beat) {
                el.rehearsal = rehearsal.to_string();
            }
        }
        Ok(())
    }

    /// Reconcile a beat against the start beats registered per measure.
    ///
    /// The first beat seen for a measure becomes its start. Later beats
    /// that fall behind that start are clamped up to it.
    pub fn add_beat(&mut self, beat: Rational, measure: i32) -> Rational {
        let Some(&start) = self.measure_to_beat.get(&measure) else {
            self.measure_to_beat.insert(measure, beat);
            return beat;
        };

        let next = self.measure_to_beat.get(&(measure + 1));
        let prev = self.measure_to_beat.get(&(measure - 1));
        if next.is_some_and(|&n| n > beat) && prev.is_some_and(|&p| p < beat) {
            return beat;
        }
        if beat >= start {
            beat
        } else {
            trace!(
                "measure {measure}: beat {} clamped to {}",
                format_duration(beat),
                format_duration(start)
            );
            start
        }
    }

    /// Position of the event at `beat`, or of an earlier event still
    /// sounding at `beat`.
    pub fn find_note(&self, beat: Rational) -> Option<Rational> {
        if self.timeline.contains_key(&beat) {
            return Some(beat);
        }
        self.timeline
            .range(..beat)
            .rev()
            .find(|(_, el)| el.contains(beat))
            .map(|(&position, _)| position)
    }

    /// Estimate where a measure starts from the events already recorded.
    fn recover_measure_start(&self, measure: i32) -> Option<Rational> {
        if let Some(el) = self.timeline.values().find(|el| el.measure == measure) {
            return Some(el.position);
        }

        for back in 1..=RECOVERY_LOOKBACK {
            let earlier = measure - back;
            if earlier < 0 {
                break;
            }
            let Some(first) = self.timeline.values().find(|el| el.measure == earlier) else {
                continue;
            };
            let covered = self
                .timeline
                .values()
                .filter(|el| el.measure >= earlier && el.measure < measure)
                .fold(zero(), |acc, el| acc + el.duration);
            return Some(first.position + covered);
        }
        None
    }

    /// Drain the worklist started by one caller event. Returns whether the
    /// caller's event ended up on the timeline.
    fn splice(&mut self, first: Insertion) -> Result<bool, TimelineError> {
        let (measure, beat) = (first.measure, first.beat);
        let mut pending = vec![first];
        let mut applied = true;
        let mut steps = 0;

        while let Some(insertion) = pending.pop() {
            steps += 1;
            if steps > MAX_SPLICES {
                error!(
                    "measure {measure}: splicing at beat {} did not settle",
                    format_duration(beat)
                );
                return Err(TimelineError::SpliceLimit { measure, beat });
            }
            let root = insertion.root;
            let step = self.insert_one(insertion, &mut pending)?;
            if root && step == Step::Ignored {
                applied = false;
            }
        }
        Ok(applied)
    }

    fn insert_one(
        &mut self,
        ins: Insertion,
        pending: &mut Vec<Insertion>,
    ) -> Result<Step, TimelineError> {
        trace!(
            "insert {:?} pitch {} dur {} at {} (measure {})",
            ins.event_type,
            ins.pitch.code,
            format_duration(ins.duration),
            format_duration(ins.beat),
            ins.measure
        );

        let Some(key) = self.find_note(ins.beat) else {
            self.insert_new(&ins);
            self.clear_ahead(ins.beat, &ins, pending);
            return Ok(Step::Done);
        };

        if ins.event_type == EventType::Rest {
            debug!(
                "rest at {} ignored: beat already occupied",
                format_duration(ins.beat)
            );
            return Ok(Step::Ignored);
        }

        if key != ins.beat {
            return self.split_rest_before(key, ins, pending);
        }

        let Some(existing) = self.timeline.get_mut(&key) else {
            return Ok(Step::Done);
        };
        let grace = ins.duration == zero();

        if existing.duration == ins.duration || grace {
            merge_at_same_length(existing, &ins);
            return Ok(Step::Done);
        }

        let remainder = existing.duration - ins.duration;
        if remainder > zero() {
            let old_pitches = existing.pitches.clone();
            let old_measure = existing.measure;
            let old_flag = existing.flag;
            let tail = key + ins.duration;

            if existing.is_rest() {
                replace_with(existing, &ins);
                pending.push(Insertion::rest(old_measure, tail, remainder));
                return Ok(Step::Done);
            }

            existing.duration = ins.duration;
            existing.event_type = merged_type(existing.event_type, ins.event_type);
            existing.push_pitch(ins.pitch, ins.duration);
            existing.measure = ins.measure;

            for pitch in old_pitches.into_iter().rev() {
                pending.push(Insertion {
                    event_type: EventType::Chord,
                    pitch: Pitch::carryover(pitch.code),
                    duration: remainder,
                    measure: old_measure,
                    beat: tail,
                    flag: old_flag,
                    root: false,
                });
            }
            return Ok(Step::Done);
        }

        let extension = -remainder;
        if existing.is_rest() {
            replace_with(existing, &ins);
            self.clear_ahead(key, &ins, pending);
            return Ok(Step::Done);
        }

        if existing.duration == zero() {
            let held: Vec<Pitch> = existing.pitches.drain(..).collect();
            existing.grace_pitches.extend(held);
            existing.event_type = ins.event_type;
            existing.pitches.push(ins.pitch);
            existing.duration = ins.duration;
            existing.measure = ins.measure;
            existing.flag = ins.flag;
            existing.fermata = ins.flag == EventFlag::Fermata;
            self.clear_ahead(key, &ins, pending);
            return Ok(Step::Done);
        }

        // the new note outlasts the existing event: sound it together
        // with the event, then hold it into whatever follows
        existing.event_type = merged_type(existing.event_type, ins.event_type);
        existing.push_pitch(ins.pitch, ins.duration);
        existing.measure = ins.measure;
        let held_from = key + existing.duration;
        pending.push(Insertion::held(&ins, held_from, extension));
        Ok(Step::Done)
    }

    /// Create a fresh event at an unoccupied beat.
    fn insert_new(&mut self, ins: &Insertion) {
        let mut el = MeasureElement::new(ins.event_type, ins.measure, ins.beat, ins.duration);
        el.flag = ins.flag;
        el.fermata = ins.flag == EventFlag::Fermata;
        if self.bpm != self.last_stamped_bpm {
            el.bpm = self.bpm.clone();
            self.last_stamped_bpm = self.bpm.clone();
        }
        el.push_pitch(ins.pitch, ins.duration);
        self.timeline.insert(ins.beat, el);
    }

    /// The new event starts inside the longer event at `key`. Only rests
    /// can be cut: the rest ends at the new beat, a second rest covers
    /// whatever is left after the new event, and the event is retried.
    fn split_rest_before(
        &mut self,
        key: Rational,
        ins: Insertion,
        pending: &mut Vec<Insertion>,
    ) -> Result<Step, TimelineError> {
        let Some(occupant) = self.timeline.get_mut(&key) else {
            return Ok(Step::Done);
        };
        if !occupant.is_rest() {
            return Err(TimelineError::UnsupportedOverlap {
                measure: ins.measure,
                beat: ins.beat,
                pitch: ins.pitch.code,
                occupant_position: key,
            });
        }

        let original = occupant.duration;
        let shortened = ins.beat - key;
        occupant.duration = shortened;
        let rest_measure = occupant.measure;
        let covered = shortened + ins.duration;
        let gap = (covered < original)
            .then(|| Insertion::rest(rest_measure, ins.beat + ins.duration, original - covered));

        pending.push(ins);
        if let Some(gap) = gap {
            pending.push(gap);
        }
        Ok(Step::Requeued)
    }

    /// The event just placed at `key` runs until the end of `ins`. Rests
    /// inside that span lose the part it covers. A sounding event inside
    /// it cuts the new event short, and the rest of `ins` is held into
    /// that event.
    fn clear_ahead(&mut self, key: Rational, ins: &Insertion, pending: &mut Vec<Insertion>) {
        let end = key + ins.duration;
        while let Some((&next_key, next)) = self.timeline.range((Excluded(key), Unbounded)).next() {
            if next_key >= end {
                return;
            }
            if next.is_rest() {
                let rest_end = next.end();
                let rest_measure = next.measure;
                self.timeline.remove(&next_key);
                if rest_end > end {
                    pending.push(Insertion::rest(rest_measure, end, rest_end - end));
                }
                continue;
            }

            if let Some(el) = self.timeline.get_mut(&key) {
                el.duration = next_key - key;
            }
            if ins.event_type != EventType::Rest {
                trace!(
                    "pitch {} held into the event at {}",
                    ins.pitch.code,
                    format_duration(next_key)
                );
                pending.push(Insertion::held(ins, next_key, end - next_key));
            }
            return;
        }
    }
}

/// Chords absorb everything except a trill or glissando meeting its own kind.
fn merged_type(existing: EventType, incoming: EventType) -> EventType {
    if existing == incoming && existing.is_multi_pitch() {
        existing
    } else {
        EventType::Chord
    }
}

/// Overwrite a rest with the incoming event.
fn replace_with(el: &mut MeasureElement, ins: &Insertion) {
    el.event_type = ins.event_type;
    el.pitches.clear();
    el.grace_pitches.clear();
    el.push_pitch(ins.pitch, ins.duration);
    el.duration = ins.duration;
    el.measure = ins.measure;
    el.position = ins.beat;
    el.flag = ins.flag;
    el.fermata = ins.flag == EventFlag::Fermata;
}

/// Same position and same length, or an incoming grace note.
fn merge_at_same_length(el: &mut MeasureElement, ins: &Insertion) {
    let grace = ins.duration == zero();

    if el.is_rest() {
        replace_with(el, ins);
        return;
    }

    if matches!(el.event_type, EventType::Note | EventType::Chord) && el.duration == zero() {
        if grace {
            el.grace_pitches.push(ins.pitch);
            if el.grace_pitches.len() > 1 {
                el.event_type = EventType::Chord;
            }
        } else {
            el.pitches.push(ins.pitch);
            el.event_type = if el.pitches.len() > 1 {
                EventType::Chord
            } else {
                ins.event_type
            };
        }
        el.duration = ins.duration;
        el.measure = ins.measure;
        el.position = ins.beat;
        el.flag = ins.flag;
        return;
    }

    if grace {
        el.grace_pitches.push(ins.pitch);
    } else {
        el.event_type = merged_type(el.event_type, ins.event_type);
        el.push_pitch(ins.pitch, ins.duration);
    }
    el.measure = ins.measure;
    el.position = ins.beat;
}
