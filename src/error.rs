//! Error types for score loading, render correlation and device input.

use thiserror::Error;

use crate::model::Hand;

/// Fatal problems while reading a score. No partial score is kept.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },

    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("unsupported root element '{0}', only 'score-partwise' is supported")]
    UnsupportedRoot(String),

    #[error("invalid MXL archive: {0}")]
    Archive(String),

    #[error("unrecognized pitch step '{step}' in part {part}, measure {measure}")]
    UnknownStep {
        part: String,
        measure: i32,
        step: String,
    },

    #[error("malformed <{element}> value '{value}' in part {part}, measure {measure}")]
    MalformedNumber {
        part: String,
        measure: i32,
        element: &'static str,
        value: String,
    },

    #[error("pitch {midi} out of MIDI range in part {part}, measure {measure}")]
    PitchOutOfRange { part: String, measure: i32, midi: i32 },
}

/// Structural disagreement between the parsed score and the rendered glyph tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CorrelationError {
    #[error("rendered score has {staff_lines} staff lines, expected a non-zero even count")]
    StaffLines { staff_lines: usize },

    #[error("{hand:?} hand: parsed {parsed} measures but {rendered} were rendered")]
    MeasureCount {
        hand: Hand,
        parsed: usize,
        rendered: usize,
    },

    #[error(
        "{hand:?} hand, measure {number} (index {index}): parsed {parsed} notes but {rendered} were rendered"
    )]
    NoteCount {
        hand: Hand,
        /// Measure number from the score
        number: i32,
        /// Position in the hand's measure sequence
        index: usize,
        parsed: usize,
        rendered: usize,
    },
}

/// Input-device protocol errors. These indicate a desynchronized device and are not skipped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InputError {
    #[error("unknown input event code 0x{code:02X}")]
    UnknownEvent { code: u8 },

    #[error("input packet too short: {len} bytes")]
    ShortPacket { len: usize },
}

/// Any failure surfaced by the engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Correlation(#[from] CorrelationError),

    #[error(transparent)]
    Input(#[from] InputError),

    #[error("invalid practice config: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
