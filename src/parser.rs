//! MusicXML parser: reads a `score-partwise` document into the [`Score`] model.

use log::debug;
use roxmltree::{Document, Node};

use crate::error::ConvertError;
use crate::model::*;

/// Parse a MusicXML XML string into a Score.
pub fn parse_musicxml(xml: &str) -> Result<Score, ConvertError> {
    // MusicXML files include a DOCTYPE declaration, so we must allow DTDs
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| ConvertError::Xml(e.to_string()))?;
    let root = doc.root_element();

    if root.tag_name().name() != "score-partwise" {
        return Err(ConvertError::UnsupportedRoot(
            root.tag_name().name().to_string(),
        ));
    }

    let mut score = Score {
        version: root.attribute("version").map(String::from),
        ..Score::default()
    };

    for child in elements(&root) {
        match child.tag_name().name() {
            "work" => parse_work(&child, &mut score),
            "movement-title" => {
                if score.title.is_none() {
                    score.title = text(&child);
                }
            }
            "identification" => parse_identification(&child, &mut score),
            "part-list" => parse_part_list(&child, &mut score),
            "part" => parse_part(&child, &mut score),
            _ => {}
        }
    }

    debug!(
        "parsed {} part(s), {} measure(s)",
        score.parts.len(),
        score.measure_count()
    );
    Ok(score)
}

// ─── Header ──────────────────────────────────────────────────────────

fn parse_work(node: &Node, score: &mut Score) {
    for child in elements(node) {
        if child.tag_name().name() == "work-title" {
            score.title = text(&child);
        }
    }
}

fn parse_identification(node: &Node, score: &mut Score) {
    for child in elements(node) {
        if child.tag_name().name() == "creator" && child.attribute("type") == Some("composer") {
            score.composer = text(&child);
        }
    }
}

// ─── Part List ───────────────────────────────────────────────────────

fn parse_part_list(node: &Node, score: &mut Score) {
    for child in elements(node) {
        if child.tag_name().name() != "score-part" {
            continue;
        }
        let name = elements(&child)
            .find(|n| n.tag_name().name() == "part-name")
            .and_then(|n| text(&n))
            .unwrap_or_default();
        score.parts.push(Part {
            id: child.attribute("id").unwrap_or("").to_string(),
            name,
            measures: Vec::new(),
        });
    }
}

// ─── Part (measures) ─────────────────────────────────────────────────

fn parse_part(node: &Node, score: &mut Score) {
    let part_id = node.attribute("id").unwrap_or("");

    let Some(part) = score.parts.iter_mut().find(|p| p.id == part_id) else {
        debug!("part '{part_id}' is missing from the part list; skipped");
        return;
    };

    for child in elements(node) {
        if child.tag_name().name() == "measure" {
            part.measures.push(parse_measure(&child));
        }
    }
}

// ─── Measure ─────────────────────────────────────────────────────────

fn parse_measure(node: &Node) -> Measure {
    let mut measure = Measure::default();

    for child in elements(node) {
        match child.tag_name().name() {
            "attributes" => {
                let attrs = parse_attributes(&child);
                measure.attributes = Some(match measure.attributes.take() {
                    Some(earlier) => merge_attributes(earlier, attrs),
                    None => attrs,
                });
            }
            "note" => measure.notes.push(parse_note(&child)),
            "forward" => measure.notes.push(parse_forward(&child)),
            "barline" => measure.barlines.push(parse_barline(&child)),
            "direction" => {
                if let Some(mut dir) = parse_direction(&child) {
                    dir.note_index = measure.notes.len();
                    measure.directions.push(dir);
                }
            }
            "sound" => {
                // <sound> can appear directly in <measure> (not inside <direction>)
                if let Some(tempo) = parse_attr_f64(&child, "tempo") {
                    measure.directions.push(Direction {
                        note_index: measure.notes.len(),
                        sound_tempo: Some(tempo),
                        ..Direction::default()
                    });
                }
            }
            _ => {}
        }
    }

    measure
}

// ─── Attributes ──────────────────────────────────────────────────────

fn parse_attributes(node: &Node) -> Attributes {
    let mut attrs = Attributes::default();

    for child in elements(node) {
        match child.tag_name().name() {
            "divisions" => attrs.divisions = parse_i32(&child),
            "time" => attrs.time = Some(parse_time(&child)),
            _ => {}
        }
    }

    attrs
}

/// A measure may carry several `<attributes>` blocks; later values win.
fn merge_attributes(earlier: Attributes, later: Attributes) -> Attributes {
    Attributes {
        divisions: later.divisions.or(earlier.divisions),
        time: later.time.or(earlier.time),
    }
}

fn parse_time(node: &Node) -> TimeSignature {
    let mut ts = TimeSignature::default();
    for child in elements(node) {
        match child.tag_name().name() {
            // compound signatures such as "3+2" are summed
            "beats" => {
                ts.beats = child
                    .text()
                    .map(|t| t.split('+').filter_map(|b| b.trim().parse::<i32>().ok()).sum())
                    .filter(|&b: &i32| b > 0)
                    .unwrap_or(4)
            }
            "beat-type" => ts.beat_type = parse_i32(&child).unwrap_or(4),
            _ => {}
        }
    }
    ts
}

// ─── Note ────────────────────────────────────────────────────────────

fn parse_note(node: &Node) -> Note {
    let mut note = Note::default();

    for child in elements(node) {
        match child.tag_name().name() {
            "pitch" => note.pitch = Some(parse_pitch(&child)),
            "duration" => note.duration = parse_i32(&child).unwrap_or(0),
            "voice" => note.voice = parse_i32(&child),
            "staff" => note.staff = parse_i32(&child),
            "type" => note.note_type = text(&child),
            "rest" => note.rest = true,
            "grace" => note.grace = true,
            "chord" => note.chord = true,
            "dot" => note.dots += 1,
            "accidental" => note.accidental = text(&child),
            "tie" => match child.attribute("type") {
                Some("start") => note.tie_start = true,
                Some("stop") => note.tie_stop = true,
                _ => {}
            },
            "notations" => parse_notations(&child, &mut note),
            _ => {}
        }
    }

    // a grace note takes no time even when the file gives it a duration
    if note.grace {
        note.duration = 0;
    }
    note
}

fn parse_notations(node: &Node, note: &mut Note) {
    for nc in elements(node) {
        match nc.tag_name().name() {
            "tied" => match nc.attribute("type") {
                Some("start") | Some("continue") => note.tie_start = true,
                Some("stop") => note.tie_stop = true,
                _ => {}
            },
            "fermata" => note.fermata = true,
            "glissando" | "slide" => match nc.attribute("type") {
                Some("start") => note.glissando_start = true,
                Some("stop") => note.glissando_stop = true,
                _ => {}
            },
            "ornaments" => {
                if elements(&nc).any(|o| o.tag_name().name() == "trill-mark") {
                    note.trill = true;
                }
            }
            _ => {}
        }
    }
}

/// `<forward>` moves a voice ahead without sounding; it is read as a rest.
fn parse_forward(node: &Node) -> Note {
    let mut note = Note {
        rest: true,
        ..Note::default()
    };
    for child in elements(node) {
        match child.tag_name().name() {
            "duration" => note.duration = parse_i32(&child).unwrap_or(0),
            "voice" => note.voice = parse_i32(&child),
            "staff" => note.staff = parse_i32(&child),
            _ => {}
        }
    }
    note
}

fn parse_pitch(node: &Node) -> Pitch {
    let mut pitch = Pitch {
        step: "C".to_string(),
        octave: 4,
        alter: None,
    };
    for child in elements(node) {
        match child.tag_name().name() {
            "step" => {
                pitch.step = child.text().unwrap_or("C").trim().to_string();
            }
            "octave" => pitch.octave = parse_i32(&child).unwrap_or(4),
            "alter" => pitch.alter = parse_f64(&child),
            _ => {}
        }
    }
    pitch
}

// ─── Barline ─────────────────────────────────────────────────────────

fn parse_barline(node: &Node) -> Barline {
    let location = node.attribute("location").unwrap_or("right").to_string();
    let repeat = elements(node)
        .find(|n| n.tag_name().name() == "repeat")
        .map(|r| match r.attribute("direction") {
            Some("backward") => Repeat::Backward,
            _ => Repeat::Forward,
        });
    Barline { location, repeat }
}

// ─── Direction ───────────────────────────────────────────────────────

fn parse_direction(node: &Node) -> Option<Direction> {
    let mut direction = Direction::default();

    for child in elements(node) {
        match child.tag_name().name() {
            "direction-type" => {
                for dt_child in elements(&child) {
                    match dt_child.tag_name().name() {
                        "metronome" => {
                            direction.metronome = parse_metronome(&dt_child);
                        }
                        "rehearsal" => direction.rehearsal = text(&dt_child),
                        _ => {}
                    }
                }
            }
            "sound" => {
                if let Some(tempo) = parse_attr_f64(&child, "tempo") {
                    direction.sound_tempo = Some(tempo);
                }
            }
            _ => {}
        }
    }

    let has_content = direction.sound_tempo.is_some()
        || direction.metronome.is_some()
        || direction.rehearsal.is_some();
    has_content.then_some(direction)
}

fn parse_metronome(node: &Node) -> Option<MetronomeMark> {
    let mut beat_unit = "quarter".to_string();
    let mut per_minute = None;
    let mut dotted = false;

    for child in elements(node) {
        match child.tag_name().name() {
            "beat-unit" => {
                beat_unit = child.text().unwrap_or("quarter").trim().to_string();
            }
            "beat-unit-dot" => dotted = true,
            "per-minute" => per_minute = parse_f64(&child),
            _ => {}
        }
    }

    // marks like "quarter = half" carry no number
    Some(MetronomeMark {
        beat_unit,
        per_minute: per_minute?,
        dotted,
    })
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn elements<'a, 'input>(node: &Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

fn text(node: &Node) -> Option<String> {
    node.text()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn parse_i32(node: &Node) -> Option<i32> {
    node.text()?.trim().parse().ok()
}

fn parse_f64(node: &Node) -> Option<f64> {
    node.text()?.trim().parse().ok()
}

fn parse_attr_f64(node: &Node, name: &str) -> Option<f64> {
    node.attribute(name)?.trim().parse().ok()
}
