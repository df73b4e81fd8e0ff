//! Data model for a parsed MusicXML score.
//!
//! Only what the Antescofo conversion needs is kept: timing, pitch,
//! the notations that change how a note is played (ties, fermatas,
//! glissandi, trills) and the directions that carry tempo or rehearsal
//! marks.

use serde::{Deserialize, Serialize};

use crate::rational::{ratio, Rational};

/// A complete musical score parsed from MusicXML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Score {
    /// Title of the piece
    pub title: Option<String>,
    /// Composer name
    pub composer: Option<String>,
    /// MusicXML version (e.g., "3.1", "4.0")
    pub version: Option<String>,
    /// Musical parts (instruments)
    pub parts: Vec<Part>,
}

/// A musical part (one instrument or voice).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Part {
    /// Part identifier (e.g., "P1")
    pub id: String,
    /// Part name (e.g., "Flute")
    pub name: String,
    /// Ordered list of measures
    pub measures: Vec<Measure>,
}

/// A single measure (bar) of music.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Measure {
    /// Attributes (divisions, time), only present when they change
    pub attributes: Option<Attributes>,
    /// Notes and rests in document order
    pub notes: Vec<Note>,
    /// Tempo and rehearsal directions
    pub directions: Vec<Direction>,
    /// Barlines (repeat signs)
    pub barlines: Vec<Barline>,
}

/// Musical attributes that may change at the start of a measure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attributes {
    /// Divisions per quarter note
    pub divisions: Option<i32>,
    pub time: Option<TimeSignature>,
}

/// Time signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSignature {
    pub beats: i32,
    pub beat_type: i32,
}

impl TimeSignature {
    /// Measure length in quarter notes.
    pub fn quarters(&self) -> Rational {
        if self.beat_type <= 0 {
            return ratio(self.beats as i64, 1);
        }
        ratio(self.beats as i64 * 4, self.beat_type as i64)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self {
            beats: 4,
            beat_type: 4,
        }
    }
}

/// A single note or rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Note {
    /// Pitch (None for rests and unpitched notes)
    pub pitch: Option<Pitch>,
    /// Duration in divisions; zero for grace notes
    pub duration: i32,
    pub voice: Option<i32>,
    /// Staff number (1-based; for multi-staff parts like piano)
    pub staff: Option<i32>,
    /// Note type: "whole", "half", "quarter", "eighth", ...
    pub note_type: Option<String>,
    pub rest: bool,
    /// Sounds together with the previous note
    pub chord: bool,
    pub grace: bool,
    pub dots: u8,
    /// Accidental as printed: "sharp", "flat", "natural", ...
    pub accidental: Option<String>,
    pub tie_start: bool,
    pub tie_stop: bool,
    pub fermata: bool,
    pub glissando_start: bool,
    pub glissando_stop: bool,
    pub trill: bool,
}

impl Note {
    /// Voice number, defaulting to 1.
    pub fn voice(&self) -> i32 {
        self.voice.unwrap_or(1)
    }

    /// Staff number, defaulting to 1.
    pub fn staff(&self) -> i32 {
        self.staff.unwrap_or(1)
    }
}

/// Pitch of a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
    /// Note name: A, B, C, D, E, F, G
    pub step: String,
    /// Octave number (middle C = C4)
    pub octave: i32,
    /// Chromatic alteration in semitones; fractional for microtones
    pub alter: Option<f64>,
}

impl Pitch {
    fn step_semitone(&self) -> i32 {
        match self.step.as_str() {
            "C" => 0,
            "D" => 2,
            "E" => 4,
            "F" => 5,
            "G" => 7,
            "A" => 9,
            "B" => 11,
            _ => 0,
        }
    }

    /// Convert pitch to MIDI note number. Middle C (C4) = 60.
    pub fn to_midi(&self) -> i32 {
        let alter = self.alter.unwrap_or(0.0).round() as i32;
        (self.octave + 1) * 12 + self.step_semitone() + alter
    }

    /// Pitch in hundredths of a semitone (C4 = 6000). Quarter-tone
    /// alterations survive as 50.
    pub fn code(&self) -> i32 {
        let natural = (self.octave + 1) * 12 + self.step_semitone();
        natural * 100 + (self.alter.unwrap_or(0.0) * 100.0).round() as i32
    }
}

/// A tempo or rehearsal direction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Direction {
    /// Index into `Measure::notes` of the first note after the direction
    pub note_index: usize,
    /// `<sound tempo="...">`, in quarter notes per minute
    pub sound_tempo: Option<f64>,
    pub metronome: Option<MetronomeMark>,
    pub rehearsal: Option<String>,
}

impl Direction {
    /// Tempo in quarter notes per minute. `<sound tempo>` wins over the
    /// printed metronome mark.
    pub fn tempo(&self) -> Option<f64> {
        self.sound_tempo
            .or_else(|| self.metronome.as_ref().map(MetronomeMark::quarters_per_minute))
    }
}

/// A printed metronome mark, e.g. dotted quarter = 60.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetronomeMark {
    pub beat_unit: String,
    pub per_minute: f64,
    pub dotted: bool,
}

impl MetronomeMark {
    pub fn quarters_per_minute(&self) -> f64 {
        let unit = match self.beat_unit.as_str() {
            "whole" => 4.0,
            "half" => 2.0,
            "eighth" => 0.5,
            "16th" => 0.25,
            "32nd" => 0.125,
            _ => 1.0,
        };
        let unit = if self.dotted { unit * 1.5 } else { unit };
        self.per_minute * unit
    }
}

/// A barline (may include repeat signs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Barline {
    /// Location: "left", "right", "middle"
    pub location: String,
    pub repeat: Option<Repeat>,
}

/// A repeat sign on a barline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Repeat {
    Forward,
    Backward,
}

impl Measure {
    pub fn has_repeat(&self, repeat: Repeat) -> bool {
        self.barlines.iter().any(|b| b.repeat == Some(repeat))
    }
}

impl Score {
    /// Number of measures in the first part.
    pub fn measure_count(&self) -> usize {
        self.parts.first().map_or(0, |p| p.measures.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pitch(step: &str, octave: i32, alter: Option<f64>) -> Pitch {
        Pitch {
            step: step.to_string(),
            octave,
            alter,
        }
    }

    #[test]
    fn pitch_codes() {
        assert_eq!(pitch("C", 4, None).to_midi(), 60);
        assert_eq!(pitch("C", 4, None).code(), 6000);
        assert_eq!(pitch("F", 4, Some(1.0)).code(), 6600);
        assert_eq!(pitch("B", 3, Some(-1.0)).code(), 5800);
        assert_eq!(pitch("E", 4, Some(-0.5)).code(), 6350);
        assert_eq!(pitch("A", 0, None).to_midi(), 21);
    }

    #[test]
    fn measure_lengths() {
        assert_eq!(TimeSignature::default().quarters(), ratio(4, 1));
        let six_eight = TimeSignature {
            beats: 6,
            beat_type: 8,
        };
        assert_eq!(six_eight.quarters(), ratio(3, 1));
    }

    #[test]
    fn metronome_in_quarters() {
        let mark = MetronomeMark {
            beat_unit: "quarter".into(),
            per_minute: 60.0,
            dotted: true,
        };
        assert_eq!(mark.quarters_per_minute(), 90.0);
        let direction = Direction {
            sound_tempo: Some(72.0),
            metronome: Some(mark),
            ..Direction::default()
        };
        assert_eq!(direction.tempo(), Some(72.0));
    }
}
