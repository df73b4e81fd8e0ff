//! Timeline properties of the Antescofo writer, driven through its public API.

use antescore::rational::{ratio, whole, zero, Rational};
use antescore::writer::{AntescofoWriter, EventFlag, EventType, Pitch};
use antescore::TimelineError;
use pretty_assertions::assert_eq;

fn add(
    writer: &mut AntescofoWriter,
    event_type: EventType,
    pitch: i32,
    duration: Rational,
    measure: i32,
    beat: Rational,
    flag: EventFlag,
) {
    let mut beat = beat;
    writer
        .add_note(event_type, pitch, duration, measure, &mut beat, flag, "")
        .unwrap();
}

fn note(writer: &mut AntescofoWriter, pitch: i32, duration: Rational, beat: Rational) {
    add(writer, EventType::Note, pitch, duration, 1, beat, EventFlag::None);
}

fn rest(writer: &mut AntescofoWriter, duration: Rational, beat: Rational) {
    add(writer, EventType::Rest, 0, duration, 1, beat, EventFlag::None);
}

/// Every event sits at its own key and ends no later than the next one starts.
fn assert_well_formed(writer: &AntescofoWriter) {
    let events: Vec<_> = writer.timeline().iter().collect();
    for (key, el) in &events {
        assert_eq!(**key, el.position);
    }
    for pair in events.windows(2) {
        let (_, a) = pair[0];
        let (next, _) = pair[1];
        assert!(a.end() <= *next, "event at {} runs past {}", a.position, next);
    }
}

#[test]
fn one_event_per_beat_while_splicing() {
    let mut writer = AntescofoWriter::new();
    rest(&mut writer, whole(1), zero());
    assert_well_formed(&writer);
    note(&mut writer, 60, ratio(1, 4), ratio(1, 4));
    assert_well_formed(&writer);
    // outlasts the note at 1/4 and is held into the rest behind it
    note(&mut writer, 64, ratio(1, 2), ratio(1, 4));
    assert_well_formed(&writer);

    let layout: Vec<(Rational, EventType, Rational)> = writer
        .timeline()
        .values()
        .map(|el| (el.position, el.event_type, el.duration))
        .collect();
    assert_eq!(
        layout,
        vec![
            (zero(), EventType::Rest, ratio(1, 4)),
            (ratio(1, 4), EventType::Chord, ratio(1, 4)),
            (ratio(1, 2), EventType::Note, ratio(1, 4)),
            (ratio(3, 4), EventType::Rest, ratio(1, 4)),
        ]
    );
    assert_eq!(
        writer.event_at(ratio(1, 2)).unwrap().pitches,
        vec![Pitch::carryover(64)]
    );
}

#[test]
fn held_notes_never_overlap_their_followers() {
    // voice 1: rest, D, rest; voice 2 then holds C for a half note
    let mut writer = AntescofoWriter::new();
    rest(&mut writer, ratio(1, 4), zero());
    note(&mut writer, 62, ratio(1, 4), ratio(1, 4));
    rest(&mut writer, ratio(1, 2), ratio(1, 2));
    note(&mut writer, 60, ratio(1, 2), zero());
    assert_well_formed(&writer);

    let total = writer
        .timeline()
        .values()
        .fold(zero(), |acc, el| acc + el.duration);
    assert_eq!(total, whole(1));

    writer.final_compress();
    assert_eq!(
        writer.render(),
        "BPM 120\n\
         ; ----------- measure 1 --- beat 0 ------\n\
         NOTE 6000 1/4 measure1\n\
         CHORD ( -6000 6200 ) 1/4\n\
         NOTE 0 1/2\n"
    );
}

#[test]
fn durations_are_stored_in_lowest_terms() {
    let mut writer = AntescofoWriter::new();
    note(&mut writer, 60, Rational::new_raw(2, 8), zero());
    let stored = writer.event_at(zero()).unwrap().duration;
    assert_eq!((*stored.numer(), *stored.denom()), (1, 4));
}

#[test]
fn rests_never_disturb_sounding_events() {
    let mut writer = AntescofoWriter::new();
    note(&mut writer, 60, ratio(1, 2), zero());
    let before = writer.timeline().clone();

    rest(&mut writer, ratio(1, 4), zero());
    rest(&mut writer, ratio(1, 8), ratio(1, 4));
    assert_eq!(writer.timeline(), &before);
}

#[test]
fn notes_on_one_beat_form_a_chord() {
    let mut writer = AntescofoWriter::new();
    note(&mut writer, 60, ratio(1, 4), zero());
    note(&mut writer, 64, ratio(1, 4), zero());

    assert_eq!(writer.timeline().len(), 1);
    let chord = writer.event_at(zero()).unwrap();
    assert_eq!(chord.event_type, EventType::Chord);
    assert_eq!(chord.duration, ratio(1, 4));
    let mut codes: Vec<i32> = chord.pitches.iter().map(|p| p.code).collect();
    codes.sort();
    assert_eq!(codes, vec![60, 64]);
}

#[test]
fn tied_pair_compacts_into_one_event() {
    let mut writer = AntescofoWriter::new();
    add(&mut writer, EventType::Note, 60, ratio(1, 4), 1, zero(), EventFlag::TiedStart);
    add(&mut writer, EventType::Note, 60, ratio(1, 4), 1, ratio(1, 4), EventFlag::TiedEnd);
    writer.final_compress();

    assert_eq!(writer.timeline().len(), 1);
    let el = writer.event_at(zero()).unwrap();
    assert_eq!(el.duration, ratio(1, 2));
    assert_eq!(el.pitches, vec![Pitch::primary(60)]);
}

#[test]
fn grace_note_attaches_to_the_following_note() {
    let mut writer = AntescofoWriter::new();
    note(&mut writer, 60, zero(), zero());
    note(&mut writer, 64, ratio(1, 4), zero());

    let el = writer.event_at(zero()).unwrap();
    assert_eq!(el.grace_pitches, vec![Pitch::primary(60)]);
    assert_eq!(el.pitches, vec![Pitch::primary(64)]);
    assert_eq!(el.duration, ratio(1, 4));
}

#[test]
fn note_at_the_head_of_a_rest_splits_it() {
    let mut writer = AntescofoWriter::new();
    rest(&mut writer, whole(1), zero());
    note(&mut writer, 60, ratio(1, 4), zero());

    let layout: Vec<(Rational, EventType, Rational)> = writer
        .timeline()
        .values()
        .map(|el| (el.position, el.event_type, el.duration))
        .collect();
    assert_eq!(
        layout,
        vec![
            (zero(), EventType::Note, ratio(1, 4)),
            (ratio(1, 4), EventType::Rest, ratio(3, 4)),
        ]
    );
}

#[test]
fn pitch_codes_and_names() {
    let mut writer = AntescofoWriter::new();
    assert_eq!(writer.write_note(&Pitch::primary(60)), "6000");
    writer.set_note_names(true);
    assert_eq!(writer.write_note(&Pitch::primary(60)), "C4");
}

#[test]
fn skipped_measures_cannot_place_beat_one() {
    let mut writer = AntescofoWriter::new();
    note(&mut writer, 60, ratio(1, 4), zero());

    let mut beat = whole(1);
    let err = writer
        .add_note(EventType::Note, 62, ratio(1, 4), 5, &mut beat, EventFlag::None, "")
        .unwrap_err();
    assert_eq!(
        err,
        TimelineError::Inconsistency {
            measure: 5,
            beat: whole(1),
            pitch: 62,
        }
    );
    assert_eq!(
        err.to_string(),
        "inconsistent beat position: measure 5, beat 1, pitch 62"
    );
}

#[test]
fn single_measure_score() {
    let mut writer = AntescofoWriter::new();
    writer.set_note_names(true);
    note(&mut writer, 60, ratio(1, 4), zero());
    note(&mut writer, 64, ratio(1, 4), ratio(1, 4));
    rest(&mut writer, ratio(1, 2), ratio(1, 2));
    writer.final_compress();

    assert_eq!(
        writer.render(),
        "BPM 120\n\
         ; ----------- measure 1 --- beat 0 ------\n\
         NOTE C4 1/4 measure1\n\
         NOTE E4 1/4\n\
         NOTE 0 1/2\n"
    );
}
