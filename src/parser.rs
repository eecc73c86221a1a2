//! MusicXML parser — converts `score-partwise` XML into the two-hand Score model.
//!
//! Ticks are accumulated from `<duration>` values in document order, and
//! chord notes that share a horizontal layout position are merged so that
//! every logical note corresponds to exactly one rendered glyph.

use std::collections::HashMap;

use roxmltree::{Document, Node};
use tracing::debug;

use crate::error::ParseError;
use crate::model::*;

/// Parse a MusicXML XML string into a Score.
pub fn parse_musicxml(xml: &str) -> Result<Score, ParseError> {
    // MusicXML files include a DOCTYPE declaration, so we must allow DTDs
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = Document::parse_with_options(xml, options)
        .map_err(|e| ParseError::Xml(e.to_string()))?;
    let root = doc.root_element();

    if root.tag_name().name() != "score-partwise" {
        return Err(ParseError::UnsupportedRoot(root.tag_name().name().to_string()));
    }

    let mut score = Score::new();
    score.version = root.attribute("version").map(String::from);

    let mut part_names: HashMap<String, String> = HashMap::new();
    let mut part_nodes = Vec::new();

    for child in root.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "work" => parse_work(&child, &mut score),
            "movement-title" => {
                if score.title.is_none() {
                    score.title = trimmed_text(&child).map(String::from);
                }
            }
            "identification" => parse_identification(&child, &mut score),
            "part-list" => parse_part_list(&child, &mut part_names),
            "part" => part_nodes.push(child),
            _ => {}
        }
    }

    // A lone grand-staff part is split by <staff>; otherwise parts alternate hands.
    let split_staves = part_nodes.len() == 1 && declared_staves(&part_nodes[0]) >= 2;
    let mut hand_end: [Tick; 2] = [0, 0];

    for (i, node) in part_nodes.iter().enumerate() {
        let id = node.attribute("id").unwrap_or("").to_string();
        let staves = declared_staves(node);
        score.parts.push(PartInfo {
            name: part_names.get(&id).cloned().unwrap_or_default(),
            id: id.clone(),
            staves,
        });

        if split_staves {
            let route = |staff: Option<i32>| {
                if staff.unwrap_or(1) >= 2 {
                    Hand::Left
                } else {
                    Hand::Right
                }
            };
            let end = parse_part(node, &id, 0, &route, Some(Hand::ALL.as_slice()), &mut score)?;
            hand_end = [end, end];
        } else {
            let hand = Hand::from_index(i);
            let base = hand_end[hand.index()];
            let end = parse_part(node, &id, base, &|_| hand, None, &mut score)?;
            hand_end[hand.index()] = end;
        }
    }

    debug!(
        parts = score.parts.len(),
        split_staves,
        right_measures = score.hands[0].len(),
        left_measures = score.hands[1].len(),
        notes = score.note_count(),
        "parsed MusicXML"
    );

    Ok(score)
}

// ─── Work / Identification ───────────────────────────────────────────

fn parse_work(node: &Node, score: &mut Score) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "work-title" {
            score.title = trimmed_text(&child).map(String::from);
        }
    }
}

fn parse_identification(node: &Node, score: &mut Score) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() == "creator" && child.attribute("type") == Some("composer") {
            score.composer = trimmed_text(&child).map(String::from);
        }
    }
}

// ─── Part List ───────────────────────────────────────────────────────

fn parse_part_list(node: &Node, names: &mut HashMap<String, String>) {
    for child in node.children().filter(|n| n.is_element()) {
        if child.tag_name().name() != "score-part" {
            continue;
        }
        let id = child.attribute("id").unwrap_or("").to_string();
        let name = child
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == "part-name")
            .and_then(|n| trimmed_text(&n))
            .unwrap_or("")
            .to_string();
        names.insert(id, name);
    }
}

/// Largest `<staves>` declared anywhere in the part (1 when absent).
fn declared_staves(part: &Node) -> usize {
    part.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "staves")
        .filter_map(|n| trimmed_text(&n).and_then(|t| t.parse::<usize>().ok()))
        .max()
        .unwrap_or(1)
}

// ─── Part (measures) ─────────────────────────────────────────────────

/// Note as read from XML, before chord merging.
#[derive(Debug, Clone)]
struct RawNote {
    pitches: Vec<u8>,
    start_tick: Tick,
    end_tick: Tick,
    default_x: Option<f64>,
    chord: bool,
    voice: Option<i32>,
    staff: Option<i32>,
    grace: bool,
}

/// Walk one `<part>`, appending its measures to the hands chosen by `route`.
///
/// `always_into` lists hands that receive a measure for every source measure
/// even when no note is routed to them (the staves of a split grand staff).
/// Returns the furthest tick reached.
fn parse_part(
    node: &Node,
    part_id: &str,
    base_tick: Tick,
    route: &dyn Fn(Option<i32>) -> Hand,
    always_into: Option<&[Hand]>,
    score: &mut Score,
) -> Result<Tick, ParseError> {
    let mut counter = base_tick;

    for measure_node in node
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() == "measure")
    {
        let number = measure_node
            .attribute("number")
            .and_then(|n| n.trim().parse::<i32>().ok())
            .unwrap_or(0);

        let measure_start = counter;
        let mut furthest = counter;
        let mut previous_start = counter;
        let mut buckets: [Vec<RawNote>; 2] = [Vec::new(), Vec::new()];
        let mut touched = [false, false];

        for child in measure_node.children().filter(|n| n.is_element()) {
            match child.tag_name().name() {
                "note" => {
                    let mut note = parse_note(&child, part_id, number)?;
                    let duration = note.end_tick;
                    let start = if note.chord { previous_start } else { counter };
                    note.start_tick = start;
                    note.end_tick = start.saturating_add(duration);
                    if !note.chord && !note.grace {
                        counter = counter.saturating_add(duration);
                    }
                    previous_start = start;
                    furthest = furthest.max(counter);

                    let hand = route(note.staff);
                    touched[hand.index()] = true;
                    buckets[hand.index()].push(note);
                }
                "backup" => {
                    let duration = parse_duration(&child, part_id, number)?;
                    counter = counter.saturating_sub(duration).max(measure_start);
                }
                "forward" => {
                    let duration = parse_duration(&child, part_id, number)?;
                    counter = counter.saturating_add(duration);
                    furthest = furthest.max(counter);
                }
                _ => {}
            }
        }

        for hand in Hand::ALL {
            let forced = always_into.is_some_and(|hands| hands.contains(&hand));
            let routed_here = always_into.is_none() && route(None) == hand;
            if !(forced || routed_here || touched[hand.index()]) {
                continue;
            }
            let measures = &mut score.hands[hand.index()];
            let index = measures.len();
            let notes = std::mem::take(&mut buckets[hand.index()]);
            measures.push(Measure {
                number,
                index,
                part_id: part_id.to_string(),
                notes: merge_chords(notes),
            });
        }

        counter = furthest;
    }

    Ok(counter)
}

// ─── Note ────────────────────────────────────────────────────────────

/// Parse a `<note>`; the returned `end_tick` temporarily holds the raw duration.
fn parse_note(node: &Node, part_id: &str, measure: i32) -> Result<RawNote, ParseError> {
    let mut note = RawNote {
        pitches: Vec::new(),
        start_tick: 0,
        end_tick: 0,
        default_x: node
            .attribute("default-x")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .filter(|x| x.is_finite()),
        chord: false,
        voice: None,
        staff: None,
        grace: false,
    };

    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "pitch" => {
                let pitch = parse_pitch(&child, part_id, measure)?;
                let midi = midi_number(&pitch, part_id, measure)?;
                if !note.pitches.contains(&midi) {
                    note.pitches.push(midi);
                }
            }
            "duration" => {
                note.end_tick = parse_duration(node, part_id, measure)?;
            }
            "chord" => note.chord = true,
            "grace" => note.grace = true,
            "voice" => note.voice = trimmed_text(&child).and_then(|t| t.parse().ok()),
            "staff" => note.staff = trimmed_text(&child).and_then(|t| t.parse().ok()),
            _ => {}
        }
    }

    if note.grace {
        note.end_tick = 0;
    }

    Ok(note)
}

fn parse_pitch(node: &Node, part_id: &str, measure: i32) -> Result<Pitch, ParseError> {
    let mut pitch = Pitch {
        step: String::new(),
        octave: 4,
        alter: None,
    };
    for child in node.children().filter(|n| n.is_element()) {
        match child.tag_name().name() {
            "step" => pitch.step = trimmed_text(&child).unwrap_or("").to_string(),
            "octave" => {
                let text = trimmed_text(&child).unwrap_or("");
                pitch.octave = text.parse().map_err(|_| ParseError::MalformedNumber {
                    part: part_id.to_string(),
                    measure,
                    element: "octave",
                    value: text.to_string(),
                })?;
            }
            "alter" => {
                let text = trimmed_text(&child).unwrap_or("");
                let alter = text.parse::<f64>().map_err(|_| ParseError::MalformedNumber {
                    part: part_id.to_string(),
                    measure,
                    element: "alter",
                    value: text.to_string(),
                })?;
                pitch.alter = Some(alter);
            }
            _ => {}
        }
    }
    Ok(pitch)
}

fn midi_number(pitch: &Pitch, part_id: &str, measure: i32) -> Result<u8, ParseError> {
    let midi = pitch.to_midi().ok_or_else(|| ParseError::UnknownStep {
        part: part_id.to_string(),
        measure,
        step: pitch.step.clone(),
    })?;
    u8::try_from(midi)
        .ok()
        .filter(|m| *m <= 127)
        .ok_or(ParseError::PitchOutOfRange {
            part: part_id.to_string(),
            measure,
            midi,
        })
}

/// Read the `<duration>` child of a note, backup or forward element.
fn parse_duration(node: &Node, part_id: &str, measure: i32) -> Result<Tick, ParseError> {
    let Some(duration) = node
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == "duration")
    else {
        return Ok(0);
    };
    let text = trimmed_text(&duration).unwrap_or("");
    text.parse::<Tick>().map_err(|_| ParseError::MalformedNumber {
        part: part_id.to_string(),
        measure,
        element: "duration",
        value: text.to_string(),
    })
}

// ─── Chord merging ───────────────────────────────────────────────────

/// Normalized hash key for a `default-x` value (`-0.0` and `0.0` collide).
fn layout_key(x: f64) -> u64 {
    (x + 0.0).to_bits()
}

/// Merge notes that render as one glyph.
///
/// First pass buckets notes by `default-x`, keeping first-seen order; a
/// `<chord/>` note without a position joins the bucket of the note it
/// stacks on. Second pass folds each bucket's pitches into its first note.
fn merge_chords(notes: Vec<RawNote>) -> Vec<Note> {
    let mut buckets: Vec<Vec<RawNote>> = Vec::new();
    let mut by_position: HashMap<u64, usize> = HashMap::new();
    let mut last_bucket: Option<usize> = None;

    for note in notes {
        let key = note.default_x.map(layout_key);
        let existing = match key {
            Some(k) => by_position.get(&k).copied(),
            None if note.chord => last_bucket,
            None => None,
        };
        let bucket = match existing {
            Some(b) => b,
            None => {
                buckets.push(Vec::new());
                let b = buckets.len() - 1;
                if let Some(k) = key {
                    by_position.insert(k, b);
                }
                b
            }
        };
        buckets[bucket].push(note);
        last_bucket = Some(bucket);
    }

    buckets
        .into_iter()
        .filter_map(|bucket| {
            let mut iter = bucket.into_iter();
            let first = iter.next()?;
            let mut pitches = first.pitches;
            for other in iter {
                for p in other.pitches {
                    if !pitches.contains(&p) {
                        pitches.push(p);
                    }
                }
            }
            Some(Note {
                pitches,
                start_tick: first.start_tick,
                end_tick: first.end_tick,
                default_x: first.default_x,
                voice: first.voice,
                staff: first.staff,
                grace: first.grace,
            })
        })
        .collect()
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn trimmed_text<'a>(node: &Node<'a, '_>) -> Option<&'a str> {
    node.text().map(str::trim).filter(|t| !t.is_empty())
}
