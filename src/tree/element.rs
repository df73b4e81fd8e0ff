//! Generic named elements with ordered parameters and children.
//!
//! An element prints as `name [params] [start child... end]`. The closed
//! [`ElementKind`] decides the few rendering differences between notes,
//! sequences, chords and tags.

use std::fmt;

use super::note_status::FormattingState;

/// A rational note length with optional dots, e.g. `1/4` or `3/8.`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteDuration {
    pub num: i32,
    pub denom: i32,
    pub dots: u8,
}

impl NoteDuration {
    pub fn new(num: i32, denom: i32, dots: u8) -> Self {
        Self { num, denom, dots }
    }
}

/// A textual parameter, optionally printed in quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub value: String,
    pub quote: bool,
}

impl Param {
    pub fn new(value: impl Into<String>, quote: bool) -> Self {
        Self {
            value: value.into(),
            quote,
        }
    }

    pub fn from_int(value: i64) -> Self {
        Self::new(value.to_string(), false)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quote {
            write!(f, "\"{}\"", self.value)
        } else {
            f.write_str(&self.value)
        }
    }
}

/// The musical data behind a note element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteData {
    pub voice: usize,
    pub pitch: String,
    pub octave: i32,
    pub duration: NoteDuration,
    pub accidental: Option<String>,
}

impl NoteData {
    /// Rests are named `_...`; `empty` is an unpitched placeholder.
    pub fn is_unpitched(&self) -> bool {
        self.pitch.starts_with('_') || self.pitch == "empty"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Generic,
    Note(NoteData),
    Sequence,
    Chord,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub start_marker: String,
    pub end_marker: String,
    pub separator: String,
    pub kind: ElementKind,
    params: Vec<Param>,
    elements: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_separator(name, " ")
    }

    pub fn with_separator(name: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start_marker: String::new(),
            end_marker: String::new(),
            separator: separator.into(),
            kind: ElementKind::Generic,
            params: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn sequence() -> Self {
        Self {
            kind: ElementKind::Sequence,
            ..Self::new("")
        }
    }

    pub fn chord() -> Self {
        Self {
            kind: ElementKind::Chord,
            ..Self::new("")
        }
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Tag,
            ..Self::new(name)
        }
    }

    /// Build a note whose printed name omits whatever octave and duration
    /// markers repeat the previous note of the same voice.
    pub fn note(
        state: &mut FormattingState,
        voice: usize,
        pitch: impl Into<String>,
        octave: i32,
        duration: NoteDuration,
        accidental: Option<String>,
    ) -> Self {
        let data = NoteData {
            voice,
            pitch: pitch.into(),
            octave,
            duration,
            accidental,
        };
        let name = render_note_name(state, &data);
        Self {
            kind: ElementKind::Note(data),
            ..Self::new(name)
        }
    }

    /// Change the length of a note element and re-render its name.
    /// Does nothing on other kinds.
    pub fn set_duration(&mut self, state: &mut FormattingState, duration: NoteDuration) {
        if let ElementKind::Note(data) = &mut self.kind {
            data.duration = duration;
            self.name = render_note_name(state, data);
        }
    }

    /// Change the pitch of a note element and re-render its name.
    pub fn set_pitch(
        &mut self,
        state: &mut FormattingState,
        pitch: impl Into<String>,
        octave: i32,
        accidental: Option<String>,
    ) {
        if let ElementKind::Note(data) = &mut self.kind {
            data.pitch = pitch.into();
            data.octave = octave;
            data.accidental = accidental;
            self.name = render_note_name(state, data);
        }
    }

    /// Append a child; returns its index.
    pub fn add(&mut self, element: Element) -> usize {
        self.elements.push(element);
        self.elements.len() - 1
    }

    /// Append a parameter; returns its index.
    pub fn add_param(&mut self, param: Param) -> usize {
        self.params.push(param);
        self.params.len() - 1
    }

    /// Detach the last child.
    pub fn pop(&mut self) -> Option<Element> {
        self.elements.pop()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn is_note(&self) -> bool {
        matches!(self.kind, ElementKind::Note(_))
    }

    fn is_note_or_sequence(&self) -> bool {
        matches!(self.kind, ElementKind::Note(_) | ElementKind::Sequence)
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;

        if !self.params.is_empty() {
            f.write_str(" ")?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{param}")?;
            }
            f.write_str(" ")?;
        } else if !self.name.is_empty() && !self.elements.is_empty() {
            f.write_str(&self.separator)?;
        }

        if !self.elements.is_empty() {
            f.write_str(&self.start_marker)?;
            for (i, child) in self.elements.iter().enumerate() {
                if i > 0 {
                    let prev = &self.elements[i - 1];
                    if self.kind == ElementKind::Chord
                        && prev.is_note_or_sequence()
                        && child.is_note_or_sequence()
                    {
                        f.write_str(",")?;
                    } else {
                        f.write_str(&self.separator)?;
                    }
                }
                write!(f, "{child}")?;
            }
            f.write_str(&self.end_marker)?;
        }

        if self.kind == ElementKind::Sequence {
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Render `pitch[accidental][octave][*num][/denom][dots]`, consulting and
/// then updating the voice status.
fn render_note_name(state: &mut FormattingState, note: &NoteData) -> String {
    let previous = state.get(note.voice).copied();
    let mut name = note.pitch.clone();

    if !note.is_unpitched() {
        if let Some(accidental) = &note.accidental {
            name.push_str(accidental);
        }
        if previous.map_or(true, |status| status.octave != note.octave) {
            name.push_str(&note.octave.to_string());
            if let Some(status) = state.get_or_create(note.voice) {
                status.octave = note.octave;
            }
        }
    }

    if previous.map_or(true, |status| status.duration != note.duration) {
        if note.duration.num != 1 {
            name.push_str(&format!("*{}", note.duration.num));
        }
        name.push_str(&format!("/{}", note.duration.denom));
        if let Some(status) = state.get_or_create(note.voice) {
            status.duration = note.duration;
        }
    }
    for _ in 0..note.duration.dots {
        name.push('.');
    }

    name
}
