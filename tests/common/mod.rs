#![allow(dead_code)]

//! Synthetic renderer for integration tests.
//!
//! Lays the score out as a grand staff, `per_row` measures per row. Notes
//! sit 40 units apart inside a measure; playable notes get one head per
//! pitch and a stem child rising 20 units above the head.

use practicelib::{GlyphClass, GlyphTree, Hand, Rect, Score};
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test harness; `RUST_LOG=practicelib=debug` to see them.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const STAFF_HEIGHT: f64 = 40.0;

pub fn staff_y(row: usize, hand: Hand) -> f64 {
    row as f64 * 200.0 + hand.index() as f64 * 80.0
}

pub fn note_x(slot: usize, note: usize) -> f64 {
    20.0 + slot as f64 * 200.0 + 10.0 + note as f64 * 40.0
}

pub fn render(score: &Score, per_row: usize) -> GlyphTree {
    let rows = score.measure_count().div_ceil(per_row);
    let mut tree = GlyphTree::new();
    let mut lines = Vec::new();
    for row in 0..rows {
        for hand in Hand::ALL {
            let y = staff_y(row, hand);
            lines.push(tree.add_staff_line(Rect::new(20.0, y, 800.0, STAFF_HEIGHT)));
        }
    }

    for hand in Hand::ALL {
        for (i, measure) in score.measures(hand).iter().enumerate() {
            let (row, slot) = (i / per_row, i % per_row);
            let y = staff_y(row, hand);
            let m = tree.add_child(
                lines[row * 2 + hand.index()],
                GlyphClass::Measure,
                Rect::new(20.0 + slot as f64 * 200.0, y, 200.0, STAFF_HEIGHT),
            );
            for (j, note) in measure.notes.iter().enumerate() {
                let x = note_x(slot, j);
                let g = tree.add_child(m, GlyphClass::Note, Rect::new(x, y + 15.0, 10.0, 10.0));
                if note.is_playable() {
                    for _ in &note.pitches {
                        tree.add_child(g, GlyphClass::NoteHead, Rect::new(x, y + 15.0, 10.0, 10.0));
                    }
                    tree.add_child(g, GlyphClass::Stem, Rect::new(x + 9.0, y - 5.0, 1.0, 20.0));
                }
            }
        }
    }
    tree
}

/// Two hands, two measures.
///
/// Right: C4+E4 chord, D4, E4, F4 | G4 whole.
/// Left:  half rest, C3 half      | whole rest.
///
/// Cursors: tick 0 chord, 1 D4, 2 E4 with C3, 3 F4, 4 G4 (second row).
pub const TWO_HANDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE score-partwise PUBLIC "-//Recordare//DTD MusicXML 3.1 Partwise//EN" "http://www.musicxml.org/dtds/partwise.dtd">
<score-partwise version="3.1">
  <work><work-title>Two Hands</work-title></work>
  <identification><creator type="composer">Test</creator></identification>
  <part-list>
    <score-part id="P1"><part-name>Right</part-name></score-part>
    <score-part id="P2"><part-name>Left</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note default-x="30"><pitch><step>C</step><octave>4</octave></pitch><duration>1</duration></note>
      <note default-x="30"><chord/><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration></note>
      <note default-x="70"><pitch><step>D</step><octave>4</octave></pitch><duration>1</duration></note>
      <note default-x="110"><pitch><step>E</step><octave>4</octave></pitch><duration>1</duration></note>
      <note default-x="150"><pitch><step>F</step><octave>4</octave></pitch><duration>1</duration></note>
    </measure>
    <measure number="2">
      <note default-x="30"><pitch><step>G</step><octave>4</octave></pitch><duration>4</duration></note>
    </measure>
  </part>
  <part id="P2">
    <measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note default-x="30"><rest/><duration>2</duration></note>
      <note default-x="110"><pitch><step>C</step><octave>3</octave></pitch><duration>2</duration></note>
    </measure>
    <measure number="2">
      <note default-x="30"><rest/><duration>4</duration></note>
    </measure>
  </part>
</score-partwise>"#;
