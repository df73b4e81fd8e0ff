//! Compressed MusicXML (.mxl) reader.
//!
//! An .mxl file is a ZIP archive containing:
//!   - META-INF/container.xml  declaring the root MusicXML file path
//!   - the root MusicXML file itself (e.g., score.xml)
//!   - optionally images, sounds and other resources

use std::io::{Cursor, Read};

use log::debug;
use zip::ZipArchive;

use crate::error::ConvertError;
use crate::model::Score;
use crate::parser;

type Archive<'a> = ZipArchive<Cursor<&'a [u8]>>;

/// Read and parse a .mxl file from raw bytes.
pub fn parse_mxl(data: &[u8]) -> Result<Score, ConvertError> {
    let xml = extract_musicxml_from_mxl(data)?;
    parser::parse_musicxml(&xml)
}

/// Extract the root MusicXML document from .mxl bytes.
pub fn extract_musicxml_from_mxl(data: &[u8]) -> Result<String, ConvertError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| ConvertError::Archive(format!("cannot open archive: {e}")))?;

    let root_path = match read_container(&mut archive)? {
        Some(path) => path,
        None => first_score_entry(&mut archive)?,
    };
    debug!("mxl root file: {root_path}");

    read_entry(&mut archive, &root_path)
}

fn read_entry(archive: &mut Archive, name: &str) -> Result<String, ConvertError> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| ConvertError::Archive(format!("'{name}' not found: {e}")))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|e| ConvertError::Archive(format!("cannot read '{name}': {e}")))?;
    Ok(xml)
}

/// Root file named by META-INF/container.xml, if the archive has one.
fn read_container(archive: &mut Archive) -> Result<Option<String>, ConvertError> {
    if archive.by_name("META-INF/container.xml").is_err() {
        return Ok(None);
    }
    let xml = read_entry(archive, "META-INF/container.xml")?;
    let doc = roxmltree::Document::parse(&xml)
        .map_err(|e| ConvertError::Archive(format!("bad container.xml: {e}")))?;

    doc.descendants()
        .filter(|n| n.tag_name().name() == "rootfile")
        .find_map(|n| n.attribute("full-path"))
        .map(|path| Some(path.to_string()))
        .ok_or_else(|| ConvertError::Archive("no rootfile in container.xml".to_string()))
}

/// Fallback: first .xml or .musicxml entry outside META-INF.
fn first_score_entry(archive: &mut Archive) -> Result<String, ConvertError> {
    let names: Vec<String> = archive.file_names().map(String::from).collect();
    names
        .iter()
        .find(|name| {
            !name.starts_with("META-INF/")
                && (name.ends_with(".xml") || name.ends_with(".musicxml"))
        })
        .cloned()
        .ok_or_else(|| ConvertError::Archive(format!("no MusicXML file in archive: {names:?}")))
}
