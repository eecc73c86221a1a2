//! Data model for a parsed two-hand practice score.
//!
//! Parts from the MusicXML document are folded into two hands; every
//! measure holds exactly one logical note per rendered glyph, with its
//! pitch set and tick span already computed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Integer time unit accumulated from MusicXML `<duration>` values.
pub type Tick = u32;

/// Middle C (C4).
pub const C4_MIDI_NUMBER: i32 = 60;

/// One of the two staves of a grand-staff score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Hand {
    /// Part 0, upper staff
    Right,
    /// Part 1, lower staff
    Left,
}

impl Hand {
    pub const ALL: [Hand; 2] = [Hand::Right, Hand::Left];

    /// Part index by convention: 0 = right/upper, 1 = left/lower.
    pub fn index(self) -> usize {
        match self {
            Hand::Right => 0,
            Hand::Left => 1,
        }
    }

    /// Even-indexed parts (and staff lines) belong to the right hand, odd ones to the left.
    pub fn from_index(index: usize) -> Self {
        if index % 2 == 0 {
            Hand::Right
        } else {
            Hand::Left
        }
    }

    pub fn other(self) -> Self {
        match self {
            Hand::Right => Hand::Left,
            Hand::Left => Hand::Right,
        }
    }
}

/// A score reduced to the data practice mode needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Score {
    /// Title of the piece
    pub title: Option<String>,
    /// Composer name
    pub composer: Option<String>,
    /// MusicXML version (e.g., "3.1", "4.0")
    pub version: Option<String>,
    /// Source `<part>` elements in document order
    pub parts: Vec<PartInfo>,
    /// Right-hand measures followed by left-hand measures, indexed by `Hand::index`
    pub hands: [Vec<Measure>; 2],
}

/// Identification of one `<part>` in the source document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartInfo {
    /// Part identifier (e.g., "P1")
    pub id: String,
    /// Part name from the part-list, empty when absent
    pub name: String,
    /// Number of staves declared in the part's attributes
    pub staves: usize,
}

/// A single measure of one hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measure {
    /// Measure number attribute (0 for pickups or when absent)
    pub number: i32,
    /// Position in the hand's measure sequence
    pub index: usize,
    /// Id of the `<part>` this measure was read from
    pub part_id: String,
    /// Deduplicated notes in document order
    pub notes: Vec<Note>,
}

/// One rendered glyph worth of notes: a single note, a merged chord, or a rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch numbers in first-seen order (empty for rests)
    pub pitches: Vec<u8>,
    /// Tick at which the note starts
    pub start_tick: Tick,
    /// `start_tick` plus the note's duration
    pub end_tick: Tick,
    /// Horizontal layout key used for chord merging
    pub default_x: Option<f64>,
    /// Voice number
    pub voice: Option<i32>,
    /// Staff number (1-based) inside the source part
    pub staff: Option<i32>,
    /// Grace notes carry no duration
    pub grace: bool,
}

/// Pitch of a note as written in MusicXML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pitch {
    /// Note name: A, B, C, D, E, F, G
    pub step: String,
    /// Octave number (middle C = C4)
    pub octave: i32,
    /// Chromatic alteration: -1.0 = flat, 1.0 = sharp
    pub alter: Option<f64>,
}

impl Score {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn measures(&self, hand: Hand) -> &[Measure] {
        &self.hands[hand.index()]
    }

    /// Number of measures in the longer hand.
    pub fn measure_count(&self) -> usize {
        self.hands.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Total logical notes (including rests) across both hands.
    pub fn note_count(&self) -> usize {
        self.hands
            .iter()
            .flatten()
            .map(|m| m.notes.len())
            .sum()
    }

    /// Distinct start ticks of every playable (non-rest) note, ascending.
    pub fn playable_ticks(&self) -> BTreeSet<Tick> {
        self.hands
            .iter()
            .flatten()
            .flat_map(|m| m.notes.iter())
            .filter(|n| n.is_playable())
            .map(|n| n.start_tick)
            .collect()
    }
}

impl Note {
    pub fn is_rest(&self) -> bool {
        self.pitches.is_empty()
    }

    /// Rests and grace notes are not playable events.
    ///
    /// A grace note shares its main note's start tick, so it is left out
    /// of cursors rather than folded into the main note's chord.
    pub fn is_playable(&self) -> bool {
        !self.pitches.is_empty() && !self.grace
    }
}

/// Semitone offset of a step letter above C.
pub fn step_semitone(step: &str) -> Option<i32> {
    match step {
        "C" => Some(0),
        "D" => Some(2),
        "E" => Some(4),
        "F" => Some(5),
        "G" => Some(7),
        "A" => Some(9),
        "B" => Some(11),
        _ => None,
    }
}

impl Pitch {
    /// Convert pitch to MIDI note number, `None` for an unknown step.
    /// Middle C (C4) = 60.
    pub fn to_midi(&self) -> Option<i32> {
        let offset = step_semitone(self.step.as_str())?;
        let alter = self.alter.unwrap_or(0.0).round() as i32;
        Some(C4_MIDI_NUMBER + (self.octave - 4) * 12 + offset + alter)
    }
}
