//! MXL file handler — reads compressed MusicXML (.mxl) archives.
//!
//! An .mxl file is a ZIP archive whose `META-INF/container.xml` names the
//! root MusicXML file. Archives without a container fall back to the first
//! `.xml` / `.musicxml` entry outside `META-INF/`.

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::error::ParseError;
use crate::model::Score;
use crate::parser;

const CONTAINER_PATH: &str = "META-INF/container.xml";

/// Read and parse a .mxl file from raw bytes.
pub fn parse_mxl(data: &[u8]) -> Result<Score, ParseError> {
    let xml = extract_musicxml_from_mxl(data)?;
    parser::parse_musicxml(&xml)
}

/// Extract the root MusicXML document from .mxl bytes.
pub fn extract_musicxml_from_mxl(data: &[u8]) -> Result<String, ParseError> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| ParseError::Archive(e.to_string()))?;

    let root_path = match read_entry(&mut archive, CONTAINER_PATH) {
        Ok(container) => rootfile_from_container(&container)?,
        Err(_) => first_musicxml_entry(&archive)?,
    };

    read_entry(&mut archive, &root_path)
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<String, ParseError> {
    let mut file = archive
        .by_name(name)
        .map_err(|e| ParseError::Archive(format!("'{name}' not found: {e}")))?;
    let mut text = String::new();
    file.read_to_string(&mut text)
        .map_err(|e| ParseError::Archive(format!("failed to read '{name}': {e}")))?;
    Ok(text)
}

fn rootfile_from_container(container: &str) -> Result<String, ParseError> {
    let doc = roxmltree::Document::parse(container)
        .map_err(|e| ParseError::Archive(format!("bad container.xml: {e}")))?;
    doc.descendants()
        .filter(|n| n.tag_name().name() == "rootfile")
        .find_map(|n| n.attribute("full-path"))
        .map(String::from)
        .ok_or_else(|| ParseError::Archive("no rootfile in container.xml".to_string()))
}

fn first_musicxml_entry(archive: &ZipArchive<Cursor<&[u8]>>) -> Result<String, ParseError> {
    let names: Vec<&str> = archive.file_names().collect();
    names
        .iter()
        .find(|name| {
            !name.starts_with("META-INF/")
                && (name.ends_with(".xml") || name.ends_with(".musicxml"))
        })
        .map(|name| name.to_string())
        .ok_or_else(|| ParseError::Archive(format!("no MusicXML file in archive: {names:?}")))
}
