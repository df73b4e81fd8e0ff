//! Timeline events: one [`MeasureElement`] per distinct beat position.

use serde::{Deserialize, Serialize};

use crate::rational::{zero, Rational};

/// What kind of statement an event becomes in the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    Rest,
    Chord,
    Note,
    Trill,
    /// A glissando run.
    Multi,
    /// The note closing a glissando run.
    MultiStop,
}

impl EventType {
    /// Trills and glissandi keep every pitch, including grace-length ones.
    pub fn is_multi_pitch(self) -> bool {
        matches!(self, EventType::Trill | EventType::Multi | EventType::MultiStop)
    }

    pub fn is_glissando(self) -> bool {
        matches!(self, EventType::Multi | EventType::MultiStop)
    }
}

/// Notation flag carried by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EventFlag {
    #[default]
    None,
    TiedStart,
    TiedEnd,
    GlissandoStart,
    GlissandoStop,
    Fermata,
    RepeatBackward,
    RepeatForward,
}

/// Whether a pitch is struck at this event or held over from an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PitchRole {
    Primary,
    Carryover,
}

/// A pitch code (MIDI × 100, or plain MIDI) tagged with its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pitch {
    pub code: i32,
    pub role: PitchRole,
}

impl Pitch {
    pub fn primary(code: i32) -> Self {
        Self {
            code,
            role: PitchRole::Primary,
        }
    }

    pub fn carryover(code: i32) -> Self {
        Self {
            code,
            role: PitchRole::Carryover,
        }
    }

    pub fn is_carryover(&self) -> bool {
        self.role == PitchRole::Carryover
    }
}

/// One notated event of the timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureElement {
    pub event_type: EventType,
    pub duration: Rational,
    pub pitches: Vec<Pitch>,
    /// Zero-length ornaments played ahead of the event.
    pub grace_pitches: Vec<Pitch>,
    pub measure: i32,
    pub position: Rational,
    pub flag: EventFlag,
    pub fermata: bool,
    /// Tempo label; set only where a tempo change lands.
    pub bpm: String,
    pub rehearsal: String,
}

impl MeasureElement {
    pub fn new(event_type: EventType, measure: i32, position: Rational, duration: Rational) -> Self {
        Self {
            event_type,
            duration,
            pitches: Vec::new(),
            grace_pitches: Vec::new(),
            measure,
            position,
            flag: EventFlag::None,
            fermata: false,
            bpm: String::new(),
            rehearsal: String::new(),
        }
    }

    pub fn end(&self) -> Rational {
        self.position + self.duration
    }

    pub fn is_rest(&self) -> bool {
        self.event_type == EventType::Rest
    }

    /// Beat position falls inside `[position, position + duration)`.
    pub fn contains(&self, beat: Rational) -> bool {
        self.position <= beat && beat < self.end()
    }

    /// The `0/0/0` placeholder some encoders leave at the head of a timeline.
    pub fn is_placeholder(&self) -> bool {
        self.position == zero() && self.duration == zero() && self.measure == 0
    }

    pub fn first_pitch(&self) -> Option<i32> {
        self.pitches.first().map(|p| p.code)
    }

    /// File a pitch as grace when its note has no length, unless the
    /// event type keeps every pitch.
    pub fn push_pitch(&mut self, pitch: Pitch, duration: Rational) {
        if duration == zero() && !self.event_type.is_multi_pitch() {
            self.grace_pitches.push(pitch);
        } else {
            self.pitches.push(pitch);
        }
    }

    /// Same type and identical pitch lists.
    pub fn same_sound(&self, other: &MeasureElement) -> bool {
        self.event_type == other.event_type && self.pitches == other.pitches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational::ratio;

    #[test]
    fn zero_length_pitches_become_grace_notes() {
        let mut el = MeasureElement::new(EventType::Note, 1, zero(), zero());
        el.push_pitch(Pitch::primary(6000), zero());
        el.push_pitch(Pitch::primary(6400), ratio(1, 4));
        assert_eq!(el.grace_pitches, vec![Pitch::primary(6000)]);
        assert_eq!(el.pitches, vec![Pitch::primary(6400)]);
    }

    #[test]
    fn trills_keep_zero_length_pitches() {
        let mut el = MeasureElement::new(EventType::Trill, 1, zero(), zero());
        el.push_pitch(Pitch::primary(6000), zero());
        assert!(el.grace_pitches.is_empty());
        assert_eq!(el.first_pitch(), Some(6000));
    }

    #[test]
    fn interval_containment_is_half_open() {
        let el = MeasureElement::new(EventType::Rest, 1, ratio(1, 2), ratio(1, 2));
        assert!(el.contains(ratio(1, 2)));
        assert!(el.contains(ratio(3, 4)));
        assert!(!el.contains(ratio(1, 1)));
        assert!(!el.contains(ratio(1, 4)));
    }
}
