//! practicelib — MusicXML score correlation and live practice mode for Sun Sheet Music.
//!
//! Supports both uncompressed MusicXML (.musicxml) and compressed MXL (.mxl) files.
//! The rendered score is supplied by the host as a [`GlyphSource`]; the
//! [`PracticeEngine`] pairs it with the parsed notes and validates live pitches.
//!
//! # Example
//! ```no_run
//! use practicelib::{parse_file, AppState, PracticeConfig, PracticeEngine};
//!
//! let score = parse_file("path/to/score.musicxml").unwrap();
//! println!("Title: {:?}", score.title);
//! println!("Measures: {}", score.measure_count());
//!
//! let mut engine = PracticeEngine::new(AppState::new(), PracticeConfig::default()).unwrap();
//! engine.load_parsed(score);
//! ```

pub mod config;
pub mod constants;
pub mod correlate;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod events;
pub mod hand;
pub mod input;
pub mod looping;
pub mod model;
pub mod mxl;
pub mod parser;
pub mod practice;
pub mod render;

use std::path::Path;

pub use config::PracticeConfig;
pub use correlate::{correlate, Fill, HitBox, HitBoxId, Overlay};
pub use cursor::{Cursor, CursorIndex};
pub use engine::{AppState, PlayMode, PracticeEngine};
pub use error::{CorrelationError, Error, InputError, ParseError};
pub use events::{events_to_json, EngineEvent};
pub use hand::HandMode;
pub use input::{InputEvent, RingingPitches};
pub use looping::{LoopState, RejectReason};
pub use model::*;
pub use mxl::parse_mxl;
pub use parser::parse_musicxml;
pub use practice::PracticeStatus;
pub use render::{GlyphClass, GlyphId, GlyphSource, GlyphTree, Rect};

/// Parse a MusicXML file from a file path.
/// Automatically detects format based on file extension:
/// - `.musicxml` or `.xml` → uncompressed MusicXML
/// - `.mxl` → compressed MXL (ZIP archive)
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Score, ParseError> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| ParseError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    parse_bytes(&data, path.extension().and_then(|e| e.to_str()))
}

/// Parse MusicXML from raw bytes with an optional format hint.
/// If `extension` is None, tries to auto-detect the format.
pub fn parse_bytes(data: &[u8], extension: Option<&str>) -> Result<Score, ParseError> {
    match extension {
        Some("mxl") => parse_mxl(data),
        Some("musicxml") | Some("xml") => {
            let xml = std::str::from_utf8(data)
                .map_err(|e| ParseError::Xml(format!("invalid UTF-8 in MusicXML file: {e}")))?;
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

/// Convert a parsed score to a JSON string for the host.
pub fn score_to_json(score: &Score) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(score)
}
