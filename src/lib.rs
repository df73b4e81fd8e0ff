//! antescore: MusicXML reader and Antescofo score writer.
//!
//! Supports both uncompressed MusicXML (.musicxml) and compressed MXL (.mxl)
//! files. A parsed score is walked note by note into an
//! [`AntescofoWriter`](writer::AntescofoWriter), which rebuilds chords,
//! ties and grace notes on an exact rational time axis and prints the
//! result as an Antescofo score.
//!
//! # Example
//! ```no_run
//! use antescore::{convert_file, ConvertOptions};
//!
//! let conversion = convert_file("path/to/score.musicxml", &ConvertOptions::default()).unwrap();
//! print!("{}", conversion.score_text());
//! ```

pub mod converter;
pub mod error;
pub mod model;
pub mod mxl;
pub mod parser;
pub mod rational;
pub mod tree;
pub mod writer;

use std::path::Path;

pub use converter::{convert_score, Conversion, ConvertOptions};
pub use error::{ConvertError, TimelineError};
pub use model::*;
pub use mxl::parse_mxl;
pub use parser::parse_musicxml;

/// Parse a MusicXML file from a file path.
/// Automatically detects format based on file extension:
/// - `.musicxml` or `.xml` → uncompressed MusicXML
/// - `.mxl` → compressed MXL (ZIP archive)
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Score, ConvertError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| ConvertError::Io {
        path: path.display().to_string(),
        source,
    })?;

    parse_bytes(&data, path.extension().and_then(|e| e.to_str()))
}

/// Parse MusicXML from raw bytes with an optional format hint.
/// If `extension` is None, tries to auto-detect the format.
pub fn parse_bytes(data: &[u8], extension: Option<&str>) -> Result<Score, ConvertError> {
    match extension {
        Some("mxl") => parse_mxl(data),
        Some("musicxml") | Some("xml") => {
            let xml = std::str::from_utf8(data)
                .map_err(|e| ConvertError::Xml(format!("invalid UTF-8: {e}")))?;
            parse_musicxml(xml)
        }
        _ => {
            // Auto-detect: try as XML first, then as MXL
            if let Ok(xml) = std::str::from_utf8(data) {
                if xml.trim_start().starts_with('<') {
                    return parse_musicxml(xml);
                }
            }
            parse_mxl(data)
        }
    }
}

/// Parse a file and convert it in one step.
pub fn convert_file<P: AsRef<Path>>(
    path: P,
    options: &ConvertOptions,
) -> Result<Conversion, ConvertError> {
    let score = parse_file(path)?;
    convert_score(&score, options)
}

/// Parse bytes and convert them in one step.
pub fn convert_bytes(
    data: &[u8],
    extension: Option<&str>,
    options: &ConvertOptions,
) -> Result<Conversion, ConvertError> {
    let score = parse_bytes(data, extension)?;
    convert_score(&score, options)
}

/// Convert a parsed score to a JSON string.
pub fn score_to_json(score: &Score) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(score)
}

/// Dump a conversion's timeline (one entry per event, in beat order) as JSON.
pub fn timeline_to_json(conversion: &Conversion) -> Result<String, serde_json::Error> {
    let events: Vec<_> = conversion.writer.timeline().values().collect();
    serde_json::to_string_pretty(&events)
}
