//! Convert the MusicXML fixtures under tests/fixtures/ end to end.

use std::io::{Cursor, Write};
use std::path::PathBuf;

use antescore::rational::whole;
use antescore::{
    convert_bytes, convert_file, convert_score, parse_file, parse_musicxml, ConvertError,
    ConvertOptions, TimelineError,
};
use pretty_assertions::assert_eq;

const TIED_FERMATA: &str = include_str!("fixtures/tied_fermata.musicxml");
const TWO_STAVES: &str = include_str!("fixtures/two_staves.musicxml");

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn bare() -> ConvertOptions {
    ConvertOptions {
        header: false,
        ..ConvertOptions::default()
    }
}

fn convert(xml: &str, options: &ConvertOptions) -> String {
    let score = parse_musicxml(xml).expect("fixture should parse");
    convert_score(&score, options)
        .expect("fixture should convert")
        .score_text()
}

// ─── Single voice ───────────────────────────────────────────────────

#[test]
fn ties_grace_notes_and_fermatas() {
    assert_eq!(
        convert(TIED_FERMATA, &bare()),
        "BPM 96\n\
         ; ----------- measure 1 --- beat 0 ------\n\
         NOTE 7400 0\n\
         NOTE 7200 4 measure1 ; marker: A\n\
         ; ----------- measure 2 --- beat 4 ------\n\
         TEMPO OFF\n\
         NOTE 7600 1 measure2\n\
         TEMPO ON\n\
         NOTE 7400 1\n\
         NOTE 0 2\n"
    );
}

#[test]
fn header_and_note_names() {
    let options = ConvertOptions {
        note_names: true,
        ..ConvertOptions::default()
    };
    let text = convert(TIED_FERMATA, &options);
    assert!(text.starts_with(
        "; Antescofo score generated by musicxml2antescofo\n\
         ; title: Tied Fermata\n\
         ; composer: Test Suite\n\
         BPM 96\n"
    ));
    assert!(text.contains("NOTE D5 0\nNOTE C5 4 measure1 ; marker: A\n"));
}

#[test]
fn measure_selection_prints_only_those_measures() {
    let options = ConvertOptions {
        measures: vec![2],
        ..bare()
    };
    assert_eq!(
        convert(TIED_FERMATA, &options),
        "BPM 96\n\
         ; ----------- measure 2 --- beat 4 ------\n\
         TEMPO OFF\n\
         NOTE 7600 1 measure2\n\
         TEMPO ON\n\
         NOTE 7400 1\n\
         NOTE 0 2\n"
    );
}

#[test]
fn repeat_sign_lands_on_the_last_event() {
    let score = parse_musicxml(TIED_FERMATA).unwrap();
    let conversion = convert_score(&score, &bare()).unwrap();
    let last = conversion.writer.timeline().values().last().unwrap();
    assert!(last.is_rest());
    assert_eq!(last.flag, antescore::writer::EventFlag::RepeatBackward);
}

// ─── Several staves ─────────────────────────────────────────────────

#[test]
fn staves_merge_into_chords_with_held_notes() {
    assert_eq!(
        convert(TWO_STAVES, &bare()),
        "BPM 120\n\
         ; ----------- measure 1 --- beat 0 ------\n\
         CHORD ( 4800 7200 7600 ) 2 measure1\n\
         CHORD ( -4800 7900 ) 2\n"
    );
}

#[test]
fn staff_selection() {
    let upper = ConvertOptions {
        staves: vec![1],
        ..bare()
    };
    assert_eq!(
        convert(TWO_STAVES, &upper),
        "BPM 120\n\
         ; ----------- measure 1 --- beat 0 ------\n\
         CHORD ( 7200 7600 ) 2 measure1\n\
         NOTE 7900 2\n"
    );

    let lower = ConvertOptions {
        staves: vec![2],
        ..bare()
    };
    assert_eq!(
        convert(TWO_STAVES, &lower),
        "BPM 120\n\
         ; ----------- measure 1 --- beat 0 ------\n\
         NOTE 4800 4 measure1\n"
    );
}

#[test]
fn element_tree_of_a_piano_part() {
    let score = parse_musicxml(TWO_STAVES).unwrap();
    let conversion = convert_score(&score, &bare()).unwrap();
    assert_eq!(
        conversion.tree_text(),
        "\\score \"Chorale\" {\nP1 <c5/2,e> g c3/1\n}"
    );
}

#[test]
fn unknown_part_selection_converts_nothing() {
    let options = ConvertOptions {
        parts: vec!["P9".into()],
        ..bare()
    };
    assert_eq!(convert(TWO_STAVES, &options), "BPM 120\n");
}

// ─── Files and archives ─────────────────────────────────────────────

#[test]
fn files_convert_like_strings() {
    let path = fixtures_dir().join("tied_fermata.musicxml");
    let score = parse_file(&path).expect("Failed to parse tied_fermata.musicxml");
    assert_eq!(score.parts[0].name, "Violin");

    let conversion = convert_file(&path, &bare()).unwrap();
    assert_eq!(conversion.score_text(), convert(TIED_FERMATA, &bare()));
}

#[test]
fn compressed_archives_convert_like_plain_files() {
    let stored = || {
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored)
    };
    let mut archive = zip::ZipWriter::new(Cursor::new(Vec::new()));
    archive.start_file("META-INF/container.xml", stored()).unwrap();
    archive
        .write_all(
            br#"<container><rootfiles><rootfile full-path="score.xml"/></rootfiles></container>"#,
        )
        .unwrap();
    archive.start_file("score.xml", stored()).unwrap();
    archive.write_all(TWO_STAVES.as_bytes()).unwrap();
    let data = archive.finish().unwrap().into_inner();

    let conversion = convert_bytes(&data, Some("mxl"), &bare()).unwrap();
    assert_eq!(conversion.score_text(), convert(TWO_STAVES, &bare()));
}

#[test]
fn missing_files_report_the_path() {
    let err = parse_file(fixtures_dir().join("missing.musicxml")).unwrap_err();
    assert!(matches!(err, ConvertError::Io { .. }));
    assert!(err.to_string().contains("missing.musicxml"));
}

// ─── Timeline failures ──────────────────────────────────────────────

#[test]
fn unplaceable_beat_keeps_the_partial_score() {
    // an empty one-beat measure leaves nothing to recover measure 2 from
    let xml = r#"<score-partwise>
      <part-list><score-part id="P1"><part-name>Solo</part-name></score-part></part-list>
      <part id="P1">
        <measure number="1">
          <attributes><divisions>1</divisions><time><beats>1</beats><beat-type>4</beat-type></time></attributes>
        </measure>
        <measure number="2">
          <note><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
        </measure>
      </part>
    </score-partwise>"#;
    let score = parse_musicxml(xml).unwrap();
    let err = convert_score(&score, &bare()).unwrap_err();

    assert_eq!(err.partial_score(), Some("BPM 120\n"));
    match err {
        ConvertError::Timeline { source, .. } => assert_eq!(
            source,
            TimelineError::Inconsistency {
                measure: 2,
                beat: whole(1),
                pitch: 6000,
            }
        ),
        other => panic!("expected a timeline error, got {other:?}"),
    }
}
