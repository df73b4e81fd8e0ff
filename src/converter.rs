//! Score walk: turns a parsed [`Score`] into writer events and an
//! element tree.
//!
//! Measures are walked in order with a running absolute start, counted
//! in quarter notes. Inside a measure every `(staff, voice)` pair keeps
//! its own cursor, so voices written one after the other (after a
//! `<backup>`) land on the right beats. Chord members reuse the onset of
//! their principal note; grace notes take no time.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, TimelineError};
use crate::model::{Measure, Note, Part, Repeat, Score, TimeSignature};
use crate::rational::{format_duration, ratio, whole, zero, Rational};
use crate::tree::{Element, ElementKind, FormattingState, NoteDuration, Param};
use crate::writer::{AntescofoWriter, EventFlag, EventType, DEFAULT_BPM};

/// Name printed in the score header.
pub const TOOL_NAME: &str = "musicxml2antescofo";

/// A whole tone above the written note, in pitch-code units.
const TRILL_INTERVAL: i32 = 200;

// ═══════════════════════════════════════════════════════════════════════
// Options
// ═══════════════════════════════════════════════════════════════════════

/// What to convert and how to print it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Print pitch names (`C4`) instead of fixed-point codes (`6000`).
    pub note_names: bool,
    /// Emit the leading `;` comment banner.
    pub header: bool,
    /// Part ids to convert; empty converts every part.
    pub parts: Vec<String>,
    pub staves: Vec<i32>,
    pub voices: Vec<i32>,
    /// Measures to print; empty prints all.
    pub measures: Vec<i32>,
    /// Tempo label used until the score sets one.
    pub default_bpm: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            note_names: false,
            header: true,
            parts: Vec::new(),
            staves: Vec::new(),
            voices: Vec::new(),
            measures: Vec::new(),
            default_bpm: DEFAULT_BPM.to_string(),
        }
    }
}

impl ConvertOptions {
    /// Load options from a JSON document; missing fields keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    fn configure(&self, writer: &mut AntescofoWriter) {
        writer.set_note_names(self.note_names);
        writer.set_bpm(self.default_bpm.clone());
        writer.set_selected_parts(self.parts.clone());
        writer.set_selected_staves(self.staves.clone());
        writer.set_selected_voices(self.voices.clone());
        writer.set_selected_measures(self.measures.clone());
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Conversion
// ═══════════════════════════════════════════════════════════════════════

/// The result of converting one score.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// The compacted timeline, ready to render.
    pub writer: AntescofoWriter,
    /// `\score "title" { <part> notes... }`, one sequence per part.
    pub tree: Element,
    /// Overlaps that were skipped while converting.
    pub diagnostics: Vec<TimelineError>,
}

impl Conversion {
    /// The Antescofo score text.
    pub fn score_text(&self) -> String {
        self.writer.render()
    }

    pub fn tree_text(&self) -> String {
        self.tree.to_string()
    }
}

/// Convert a parsed score.
///
/// Unsupported overlaps are logged, recorded in
/// [`Conversion::diagnostics`] and skipped. Any other timeline failure
/// aborts with [`ConvertError::Timeline`], which carries the score
/// rendered from the events accumulated so far.
pub fn convert_score(score: &Score, options: &ConvertOptions) -> Result<Conversion, ConvertError> {
    let mut writer = AntescofoWriter::new();
    options.configure(&mut writer);
    if options.header {
        writer.set_header(header_lines(score));
    }

    let mut tree = Element::tag("\\score");
    tree.add_param(Param::new(score.title.clone().unwrap_or_default(), true));
    tree.separator = String::new();
    tree.start_marker = "{\n".to_string();
    tree.end_marker = "}".to_string();

    let mut walk = ScoreWalk {
        writer,
        state: FormattingState::new(),
        rehearsals: BTreeMap::new(),
        diagnostics: Vec::new(),
        follow_tempo: true,
    };

    for part in &score.parts {
        if !walk.writer.part_selected(&part.id) {
            debug!("part {} not selected", part.id);
            continue;
        }
        match walk.part(part) {
            Ok(sequence) => {
                tree.add(sequence);
            }
            Err(source) => {
                walk.writer.final_compress();
                return Err(ConvertError::Timeline {
                    source,
                    partial: walk.writer.render(),
                });
            }
        }
        // tempo is read from the first converted part only
        walk.follow_tempo = false;
    }

    walk.writer.final_compress();
    info!(
        "converted {} event(s), {} skipped overlap(s)",
        walk.writer.timeline().len(),
        walk.diagnostics.len()
    );
    Ok(Conversion {
        writer: walk.writer,
        tree,
        diagnostics: walk.diagnostics,
    })
}

fn header_lines(score: &Score) -> Vec<String> {
    let mut lines = vec![format!("Antescofo score generated by {TOOL_NAME}")];
    if let Some(title) = &score.title {
        lines.push(format!("title: {title}"));
    }
    if let Some(composer) = &score.composer {
        lines.push(format!("composer: {composer}"));
    }
    lines
}

// ═══════════════════════════════════════════════════════════════════════
// Walk
// ═══════════════════════════════════════════════════════════════════════

type VoiceKey = (i32, i32); // (staff, voice)

struct ScoreWalk {
    writer: AntescofoWriter,
    state: FormattingState,
    /// Rehearsal text by the absolute beat it is attached to.
    rehearsals: BTreeMap<Rational, String>,
    diagnostics: Vec<TimelineError>,
    follow_tempo: bool,
}

/// Running state of one part.
struct PartCursor {
    divisions: i32,
    time: TimeSignature,
    start: Rational,
    glissando: HashMap<VoiceKey, bool>,
}

impl ScoreWalk {
    fn part(&mut self, part: &Part) -> Result<Element, TimelineError> {
        debug!("part {} ({} measures)", part.id, part.measures.len());
        self.state.reset_all();

        let mut sequence = Element::sequence();
        sequence.name = part.id.clone();

        let mut cursor = PartCursor {
            divisions: 1,
            time: TimeSignature::default(),
            start: zero(),
            glissando: HashMap::new(),
        };
        for (index, measure) in part.measures.iter().enumerate() {
            self.measure(measure, index as i32 + 1, &mut cursor, &mut sequence)?;
        }
        Ok(sequence)
    }

    fn measure(
        &mut self,
        measure: &Measure,
        number: i32,
        cursor: &mut PartCursor,
        sequence: &mut Element,
    ) -> Result<(), TimelineError> {
        if let Some(attrs) = &measure.attributes {
            if let Some(divisions) = attrs.divisions.filter(|&d| d > 0) {
                cursor.divisions = divisions;
            }
            if let Some(time) = attrs.time {
                cursor.time = time;
            }
        }

        let (onsets, length) = measure_onsets(measure, cursor);

        if self.follow_tempo {
            for tempo in measure.directions.iter().filter_map(|d| d.tempo()) {
                self.writer.set_bpm(bpm_label(tempo));
            }
        }
        for direction in &measure.directions {
            if let Some(text) = &direction.rehearsal {
                let beat = onsets
                    .get(direction.note_index)
                    .copied()
                    .unwrap_or(cursor.start + length);
                self.rehearsals.entry(beat).or_insert_with(|| text.clone());
            }
        }

        // repeat signs go on the first and last onsets of the measure
        let principal: Vec<usize> = measure
            .notes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.chord && !n.grace)
            .map(|(i, _)| i)
            .collect();
        let forward = measure
            .has_repeat(Repeat::Forward)
            .then(|| principal.first().copied())
            .flatten();
        let backward = measure
            .has_repeat(Repeat::Backward)
            .then(|| principal.last().copied())
            .flatten();

        for (i, note) in measure.notes.iter().enumerate() {
            if !self.writer.staff_selected(note.staff()) || !self.writer.voice_selected(note.voice())
            {
                continue;
            }
            let repeat = if forward == Some(i) {
                EventFlag::RepeatForward
            } else if backward == Some(i) {
                EventFlag::RepeatBackward
            } else {
                EventFlag::None
            };
            self.note(note, onsets[i], number, repeat, cursor, sequence)?;
        }

        trace_measure(number, cursor.start, length);
        cursor.start += length;
        Ok(())
    }

    fn note(
        &mut self,
        note: &Note,
        onset: Rational,
        measure: i32,
        repeat: EventFlag,
        cursor: &mut PartCursor,
        sequence: &mut Element,
    ) -> Result<(), TimelineError> {
        let duration = ratio(note.duration as i64, cursor.divisions as i64);
        let key = (note.staff(), note.voice());
        let in_glissando = cursor.glissando.get(&key).copied().unwrap_or(false);
        let (event_type, flag) = classify(note, in_glissando, repeat);

        if note.glissando_start {
            cursor.glissando.insert(key, true);
        } else if note.glissando_stop {
            cursor.glissando.insert(key, false);
        }

        let pitches = match (&note.pitch, event_type) {
            (Some(pitch), EventType::Trill) => vec![pitch.code(), pitch.code() + TRILL_INTERVAL],
            (Some(pitch), t) if t != EventType::Rest => vec![pitch.code()],
            _ => vec![0],
        };
        let rehearsal = self.rehearsals.get(&onset).cloned().unwrap_or_default();

        for pitch in pitches {
            let mut beat = onset;
            let placed = self.writer.add_note(
                event_type, pitch, duration, measure, &mut beat, flag, &rehearsal,
            );
            self.record(placed)?;
        }

        self.tree_note(note, duration, sequence);
        Ok(())
    }

    /// Overlaps are skipped; anything else stops the walk.
    fn record(&mut self, placed: Result<(), TimelineError>) -> Result<(), TimelineError> {
        match placed {
            Err(err) if err.is_recoverable() => {
                warn!("{err}; event skipped");
                self.diagnostics.push(err);
                Ok(())
            }
            other => other,
        }
    }

    fn tree_note(&mut self, note: &Note, duration: Rational, sequence: &mut Element) {
        let slot = voice_slot(note.staff(), note.voice());
        let length = note_length(note, duration);
        let element = match (&note.pitch, note.rest) {
            (Some(pitch), false) => Element::note(
                &mut self.state,
                slot,
                pitch.step.to_lowercase(),
                pitch.octave,
                length,
                accidental(pitch.alter),
            ),
            _ => Element::note(&mut self.state, slot, "_", 0, length, None),
        };

        if !note.chord {
            sequence.add(element);
            return;
        }
        let chord = match sequence.pop() {
            Some(mut chord) if chord.kind == ElementKind::Chord => {
                chord.add(element);
                chord
            }
            Some(principal) => {
                let mut chord = Element::chord();
                chord.start_marker = "<".to_string();
                chord.end_marker = ">".to_string();
                chord.add(principal);
                chord.add(element);
                chord
            }
            None => element,
        };
        sequence.add(chord);
    }
}

fn trace_measure(number: i32, start: Rational, length: Rational) {
    debug!(
        "measure {number}: start {} length {}",
        format_duration(start),
        format_duration(length)
    );
}

/// Absolute onset of every note of a measure, and the measure length.
fn measure_onsets(measure: &Measure, cursor: &PartCursor) -> (Vec<Rational>, Rational) {
    let mut positions: HashMap<VoiceKey, Rational> = HashMap::new();
    let mut last_onset: HashMap<VoiceKey, Rational> = HashMap::new();
    let mut onsets = Vec::with_capacity(measure.notes.len());

    for note in &measure.notes {
        let key = (note.staff(), note.voice());
        let position = positions.entry(key).or_insert_with(zero);
        // chord notes share the onset of their principal note
        let onset = if note.chord {
            last_onset.get(&key).copied().unwrap_or(*position)
        } else {
            let onset = *position;
            last_onset.insert(key, onset);
            *position += ratio(note.duration as i64, cursor.divisions as i64);
            onset
        };
        onsets.push(cursor.start + onset);
    }

    let length = positions
        .values()
        .copied()
        .max()
        .filter(|&l| l > zero())
        .unwrap_or_else(|| cursor.time.quarters());
    (onsets, length)
}

/// Event type and flag of one note. Glissandi win over fermatas, which
/// win over ties, which win over repeat signs.
fn classify(note: &Note, in_glissando: bool, repeat: EventFlag) -> (EventType, EventFlag) {
    if note.rest || note.pitch.is_none() {
        let flag = if note.fermata {
            EventFlag::Fermata
        } else {
            repeat
        };
        return (EventType::Rest, flag);
    }

    let event_type = if note.glissando_start {
        EventType::Multi
    } else if note.glissando_stop && in_glissando {
        EventType::MultiStop
    } else if in_glissando {
        EventType::Multi
    } else if note.trill {
        EventType::Trill
    } else {
        EventType::Note
    };

    let flag = if note.glissando_start {
        EventFlag::GlissandoStart
    } else if event_type == EventType::MultiStop {
        EventFlag::GlissandoStop
    } else if note.fermata {
        EventFlag::Fermata
    } else if note.tie_start {
        EventFlag::TiedStart
    } else if note.tie_stop {
        EventFlag::TiedEnd
    } else {
        repeat
    };
    (event_type, flag)
}

/// Formatting slot of a voice: staves are 16 voices apart.
fn voice_slot(staff: i32, voice: i32) -> usize {
    ((staff - 1).max(0) * 16 + voice.max(0)) as usize
}

/// Written length of a note as a fraction of a whole note, dots split off.
fn note_length(note: &Note, quarters: Rational) -> NoteDuration {
    let whole_fraction = if quarters > zero() {
        quarters / whole(4)
    } else {
        type_fraction(note.note_type.as_deref())
    };
    // a note with d dots lasts (2^(d+1) - 1) / 2^d of its base value
    let dots = note.dots.min(4);
    let base = if dots > 0 && quarters > zero() {
        let scale = 1i64 << dots;
        whole_fraction * ratio(scale, 2 * scale - 1)
    } else {
        whole_fraction
    };
    NoteDuration::new(*base.numer() as i32, *base.denom() as i32, dots)
}

fn type_fraction(note_type: Option<&str>) -> Rational {
    match note_type {
        Some("breve") => whole(2),
        Some("whole") => whole(1),
        Some("half") => ratio(1, 2),
        Some("quarter") => ratio(1, 4),
        Some("16th") => ratio(1, 16),
        Some("32nd") => ratio(1, 32),
        Some("64th") => ratio(1, 64),
        _ => ratio(1, 8),
    }
}

fn accidental(alter: Option<f64>) -> Option<String> {
    let half_steps = (alter? * 2.0).round() as i32;
    let sign = match half_steps {
        4 => "##",
        2 => "#",
        1 => "+",
        -1 => "-",
        -2 => "b",
        -4 => "bb",
        _ => return None,
    };
    Some(sign.to_string())
}

/// `96` for whole tempi, `92.5` otherwise.
fn bpm_label(tempo: f64) -> String {
    if tempo.fract().abs() < 1e-9 {
        format!("{}", tempo as i64)
    } else {
        format!("{tempo}")
    }
}
