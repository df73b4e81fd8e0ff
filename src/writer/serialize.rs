//! Rendering the compacted timeline as Antescofo score text.

use std::io::{self, Write};

use super::event::{EventFlag, EventType, MeasureElement, Pitch, PitchRole};
use super::AntescofoWriter;
use crate::rational::{format_duration, Rational};

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// An open `MULTI ( ... -> ...` line.
struct Glissando {
    duration: Rational,
    last: String,
}

/// What the stream has already said.
#[derive(Default)]
struct StreamState {
    measure: Option<i32>,
    in_fermata: bool,
    last_bpm: String,
    glissando: Option<Glissando>,
    /// Comments waiting for the current line to end.
    trailer: String,
}

impl AntescofoWriter {
    /// Render the score to a string.
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        // writing into a Vec cannot fail
        let _ = self.write_stream(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }

    /// Write the score: optional header comments, the initial `BPM`, then
    /// one statement per event.
    pub fn write_stream<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for line in &self.header {
            writeln!(out, "; {line}")?;
        }

        let mut events = self.timeline.values().peekable();
        if events.peek().is_some_and(|el| el.is_placeholder()) {
            events.next();
        }

        let initial_bpm = self
            .timeline
            .values()
            .find(|el| !el.is_placeholder())
            .filter(|el| !el.bpm.is_empty())
            .map_or_else(|| self.bpm.clone(), |el| el.bpm.clone());
        writeln!(out, "BPM {initial_bpm}")?;

        let mut state = StreamState {
            last_bpm: initial_bpm,
            ..StreamState::default()
        };

        for el in events {
            if !self.measure_selected(el.measure) {
                continue;
            }
            self.write_event(out, el, &mut state)?;
        }

        if let Some(gliss) = state.glissando.take() {
            close_glissando(out, gliss, &mut state.trailer)?;
        }
        if state.in_fermata {
            writeln!(out, "TEMPO ON")?;
        }
        Ok(())
    }

    fn write_event<W: Write>(
        &self,
        out: &mut W,
        el: &MeasureElement,
        state: &mut StreamState,
    ) -> io::Result<()> {
        let new_measure = state.measure != Some(el.measure);

        if state.glissando.is_some() && !el.event_type.is_glissando() {
            if let Some(gliss) = state.glissando.take() {
                close_glissando(out, gliss, &mut state.trailer)?;
            }
        }
        let open_line = state.glissando.is_some();

        if new_measure {
            state.measure = Some(el.measure);
            if !open_line {
                writeln!(
                    out,
                    "; ----------- measure {} --- beat {} ------",
                    el.measure,
                    format_duration(el.position)
                )?;
            }
        }

        if !open_line {
            if el.fermata && !state.in_fermata {
                writeln!(out, "TEMPO OFF")?;
                state.in_fermata = true;
            } else if !el.fermata && state.in_fermata {
                writeln!(out, "TEMPO ON")?;
                state.in_fermata = false;
            }

            if !el.bpm.is_empty() && el.bpm != state.last_bpm {
                writeln!(out, "BPM {} @modulate", el.bpm)?;
                state.last_bpm = el.bpm.clone();
            }

            for grace in &el.grace_pitches {
                writeln!(out, "NOTE {} 0", self.write_note(grace))?;
            }
        }

        if new_measure {
            state.trailer.push_str(&format!(" measure{}", el.measure));
        }
        if !el.rehearsal.is_empty() {
            state.trailer.push_str(&format!(" ; marker: {}", el.rehearsal));
        }

        let duration = format_duration(el.duration);
        match el.event_type {
            EventType::Rest => {
                writeln!(out, "NOTE 0 {duration}{}", state.trailer)?;
                state.trailer.clear();
            }
            EventType::Note => {
                // a bare grace-note slot keeps its comments for the next line
                if let Some(pitch) = el.pitches.first() {
                    writeln!(out, "NOTE {} {duration}{}", self.write_note(pitch), state.trailer)?;
                    state.trailer.clear();
                }
            }
            // grace notes alone, already printed above
            EventType::Chord | EventType::Trill if el.pitches.is_empty() => {}
            EventType::Chord | EventType::Trill => {
                let keyword = if el.event_type == EventType::Trill {
                    "TRILL"
                } else {
                    "CHORD"
                };
                writeln!(
                    out,
                    "{keyword} ( {} ) {duration}{}",
                    self.pitch_list(&el.pitches),
                    state.trailer
                )?;
                state.trailer.clear();
            }
            EventType::Multi | EventType::MultiStop => {
                let pitches = self.pitch_list(&el.pitches);
                match state.glissando.as_mut() {
                    None => {
                        write!(out, "MULTI ( {pitches}")?;
                        state.glissando = Some(Glissando {
                            duration: el.duration,
                            last: pitches,
                        });
                    }
                    Some(gliss) => {
                        if pitches != gliss.last {
                            write!(out, " -> {pitches}")?;
                        }
                        gliss.duration += el.duration;
                        gliss.last = pitches;
                    }
                }
                let closes =
                    el.event_type == EventType::MultiStop || el.flag == EventFlag::GlissandoStop;
                if closes {
                    if let Some(gliss) = state.glissando.take() {
                        close_glissando(out, gliss, &mut state.trailer)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Sorted, de-duplicated pitch labels separated by spaces.
    fn pitch_list(&self, pitches: &[Pitch]) -> String {
        let mut sorted: Vec<Pitch> = pitches.iter().copied().filter(|p| p.code != 0).collect();
        sorted.sort_by_key(|p| (p.code, p.role == PitchRole::Carryover));
        sorted.dedup_by_key(|p| p.code);
        sorted
            .iter()
            .map(|p| self.write_note(p))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Format one pitch: a fixed-point code (`6000`) or, with note names
    /// on, a name and octave (`C4`). Held pitches get a leading `-`.
    pub fn write_note(&self, pitch: &Pitch) -> String {
        let prefix = if pitch.code < 0 || pitch.is_carryover() {
            "-"
        } else {
            ""
        };
        let code = pitch.code.abs();

        if !self.note_names {
            return if code > 1000 {
                format!("{prefix}{code}")
            } else {
                format!("{prefix}{code}00")
            };
        }

        let midi = if code > 1000 { code / 100 } else { code };
        let name = NOTE_NAMES[(midi % 12) as usize];
        format!("{prefix}{name}{}", octave_band(midi))
    }
}

/// 12-23 is octave 0, 24-35 octave 1, up to 108-120 as octave 8.
fn octave_band(midi: i32) -> i32 {
    match midi {
        120 => 8,
        _ => midi / 12 - 1,
    }
}

fn close_glissando<W: Write>(out: &mut W, gliss: Glissando, trailer: &mut String) -> io::Result<()> {
    writeln!(out, " ) {}{trailer}", format_duration(gliss.duration))?;
    trailer.clear();
    Ok(())
}
