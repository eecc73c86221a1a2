//! Render correlation — pairs parsed notes with rendered glyphs by position.
//!
//! The score and the rendered tree share no identifiers. Document order
//! equals visual order, so measures and notes are matched purely by index
//! and any count disagreement is fatal. Every playable note gets an
//! invisible hit box in its hand's overlay layer.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::CorrelationError;
use crate::model::{Hand, Score, Tick};
use crate::render::{GlyphClass, GlyphId, GlyphSource, Rect};

/// Index of a hit box inside its `Overlay`.
pub type HitBoxId = usize;

/// Visual state of a hit box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fill {
    Transparent,
    Focused,
    Correct,
    Wrong,
}

/// Location of a note in the parsed score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NoteRef {
    pub hand: Hand,
    /// Index into `Score::measures(hand)`
    pub measure: usize,
    /// Index into `Measure::notes`
    pub note: usize,
}

/// A parsed measure paired with its rendered container.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedMeasure {
    pub hand: Hand,
    /// Measure number from the score
    pub number: i32,
    pub glyph: GlyphId,
    /// Index into `Overlay::staff_lines`
    pub staff_line: usize,
    /// Staff-line row (system) index
    pub row: usize,
    /// Position of the measure within its staff line
    pub index_in_row: usize,
    /// Index into the other hand's rendered measures at the same slot
    pub companion: Option<usize>,
}

/// Timing and pitch data attached to a rendered note glyph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteAnnotation {
    pub note: NoteRef,
    pub pitches: Vec<u8>,
    pub start_tick: Tick,
    pub end_tick: Tick,
    /// `None` for rests
    pub hit_box: Option<HitBoxId>,
}

/// Invisible interactive rectangle over one playable note glyph.
#[derive(Debug, Clone, Serialize)]
pub struct HitBox {
    pub id: HitBoxId,
    pub note: NoteRef,
    pub rect: Rect,
    pub fill: Fill,
    pub pitches: Vec<u8>,
    pub start_tick: Tick,
    /// Staff-line row of the owning measure
    pub row: usize,
    /// Index into `Overlay::measures(hand)`
    pub measure: usize,
    pub glyph: GlyphId,
    pub heads: Vec<GlyphId>,
    pub stem: Option<GlyphId>,
}

impl HitBox {
    pub fn hand(&self) -> Hand {
        self.note.hand
    }

    /// True iff every pitch of this box is in `ringing`.
    pub fn is_satisfied_by(&self, ringing: &std::collections::BTreeSet<u8>) -> bool {
        self.pitches.iter().all(|p| ringing.contains(p))
    }
}

/// Output of correlation: per-hand overlay layers of hit boxes plus glyph annotations.
#[derive(Debug, Clone, Default)]
pub struct Overlay {
    pub staff_lines: Vec<GlyphId>,
    pub staff_line_boxes: Vec<Rect>,
    measures: [Vec<RenderedMeasure>; 2],
    hit_boxes: Vec<HitBox>,
    layers: [Vec<HitBoxId>; 2],
    annotations: HashMap<GlyphId, NoteAnnotation>,
    click_targets: HashMap<GlyphId, HitBoxId>,
}

impl Overlay {
    pub fn hit_boxes(&self) -> &[HitBox] {
        &self.hit_boxes
    }

    pub fn hit_box(&self, id: HitBoxId) -> Option<&HitBox> {
        self.hit_boxes.get(id)
    }

    /// Set a box's fill; returns true when it changed.
    pub fn set_fill(&mut self, id: HitBoxId, fill: Fill) -> bool {
        match self.hit_boxes.get_mut(id) {
            Some(b) if b.fill != fill => {
                b.fill = fill;
                true
            }
            _ => false,
        }
    }

    /// Hit boxes of one hand's overlay layer, in creation order.
    pub fn layer(&self, hand: Hand) -> &[HitBoxId] {
        &self.layers[hand.index()]
    }

    pub fn measures(&self, hand: Hand) -> &[RenderedMeasure] {
        &self.measures[hand.index()]
    }

    /// Pitch and tick data for a rendered note glyph.
    pub fn annotation(&self, glyph: GlyphId) -> Option<&NoteAnnotation> {
        self.annotations.get(&glyph)
    }

    /// Hit box clicked through its note container, head or stem glyph.
    pub fn hit_box_for_glyph(&self, glyph: GlyphId) -> Option<HitBoxId> {
        self.click_targets.get(&glyph).copied()
    }

    /// Topmost hit box under a point, skipping layers whose pointer events are off.
    pub fn hit_test(&self, x: f64, y: f64, interactive: impl Fn(Hand) -> bool) -> Option<HitBoxId> {
        self.hit_boxes
            .iter()
            .rev()
            .find(|b| interactive(b.hand()) && b.rect.contains(x, y))
            .map(|b| b.id)
    }

    /// Number of staff-line rows (systems).
    pub fn row_count(&self) -> usize {
        self.staff_lines.len() / 2
    }

    /// Bounding boxes of the upper and lower staff line of a row.
    pub fn row_staff_boxes(&self, row: usize) -> Option<(Rect, Rect)> {
        let upper = self.staff_line_boxes.get(row * 2)?;
        let lower = self.staff_line_boxes.get(row * 2 + 1)?;
        Some((*upper, *lower))
    }

    /// Staff-line box of the measure owning `id`, and of its companion on the other staff.
    pub fn staff_boxes_for(&self, id: HitBoxId) -> Option<(Rect, Option<Rect>)> {
        let b = self.hit_boxes.get(id)?;
        let measure = self.measures[b.hand().index()].get(b.measure)?;
        let own = *self.staff_line_boxes.get(measure.staff_line)?;
        let companion = measure
            .companion
            .and_then(|c| self.measures[b.hand().other().index()].get(c))
            .and_then(|m| self.staff_line_boxes.get(m.staff_line).copied());
        Some((own, companion))
    }
}

/// Correlate a parsed score with its rendered glyph tree.
pub fn correlate<S: GlyphSource + ?Sized>(score: &Score, source: &S) -> Result<Overlay, CorrelationError> {
    let staff_lines = source.staff_lines();
    if staff_lines.is_empty() || staff_lines.len() % 2 != 0 {
        return Err(CorrelationError::StaffLines {
            staff_lines: staff_lines.len(),
        });
    }

    let mut overlay = Overlay {
        staff_line_boxes: staff_lines.iter().map(|&g| source.bbox(g)).collect(),
        staff_lines,
        ..Default::default()
    };

    // ── Rendered measures, per hand, in row order ────────────────────
    for (line_idx, &line) in overlay.staff_lines.iter().enumerate() {
        let hand = Hand::from_index(line_idx);
        for (index_in_row, glyph) in source.children(line, GlyphClass::Measure).into_iter().enumerate() {
            overlay.measures[hand.index()].push(RenderedMeasure {
                hand,
                number: 0,
                glyph,
                staff_line: line_idx,
                row: line_idx / 2,
                index_in_row,
                companion: None,
            });
        }
    }

    for hand in Hand::ALL {
        let parsed = score.measures(hand).len();
        let rendered = overlay.measures[hand.index()].len();
        if parsed != rendered {
            return Err(CorrelationError::MeasureCount { hand, parsed, rendered });
        }
    }

    link_companions(&mut overlay.measures);

    // ── Notes ────────────────────────────────────────────────────────
    for hand in Hand::ALL {
        for (measure_idx, measure) in score.measures(hand).iter().enumerate() {
            let rendered = &mut overlay.measures[hand.index()][measure_idx];
            rendered.number = measure.number;
            let row = rendered.row;
            let note_glyphs = source.children(rendered.glyph, GlyphClass::Note);

            if note_glyphs.len() != measure.notes.len() {
                return Err(CorrelationError::NoteCount {
                    hand,
                    number: measure.number,
                    index: measure_idx,
                    parsed: measure.notes.len(),
                    rendered: note_glyphs.len(),
                });
            }

            for (note_idx, (note, glyph)) in measure.notes.iter().zip(note_glyphs).enumerate() {
                let note_ref = NoteRef {
                    hand,
                    measure: measure_idx,
                    note: note_idx,
                };
                let stem = source
                    .children(glyph, GlyphClass::Stem)
                    .first()
                    .copied()
                    .or_else(|| source.stem_of(glyph));
                let heads = source.children(glyph, GlyphClass::NoteHead);

                let hit_box = if note.is_playable() {
                    let rect = match stem {
                        Some(s) => source.bbox(glyph).union(&source.bbox(s)),
                        None => source.bbox(glyph),
                    };
                    let id = overlay.hit_boxes.len();
                    overlay.hit_boxes.push(HitBox {
                        id,
                        note: note_ref,
                        rect,
                        fill: Fill::Transparent,
                        pitches: note.pitches.clone(),
                        start_tick: note.start_tick,
                        row,
                        measure: measure_idx,
                        glyph,
                        heads: heads.clone(),
                        stem,
                    });
                    overlay.layers[hand.index()].push(id);
                    for target in std::iter::once(glyph).chain(stem).chain(heads) {
                        overlay.click_targets.insert(target, id);
                    }
                    Some(id)
                } else {
                    None
                };

                overlay.annotations.insert(
                    glyph,
                    NoteAnnotation {
                        note: note_ref,
                        pitches: note.pitches.clone(),
                        start_tick: note.start_tick,
                        end_tick: note.end_tick,
                        hit_box,
                    },
                );
            }
        }
        debug!(?hand, hit_boxes = overlay.layers[hand.index()].len(), "correlated hand");
    }

    info!(
        rows = overlay.row_count(),
        hit_boxes = overlay.hit_boxes.len(),
        "render correlation complete"
    );

    Ok(overlay)
}

/// Pair each measure with the measure in the same slot on the other staff of its row.
fn link_companions(measures: &mut [Vec<RenderedMeasure>; 2]) {
    let slots: [HashMap<(usize, usize), usize>; 2] = [0, 1].map(|h| {
        measures[h]
            .iter()
            .enumerate()
            .map(|(i, m)| ((m.row, m.index_in_row), i))
            .collect()
    });
    for hand in Hand::ALL {
        let other = &slots[hand.other().index()];
        for m in measures[hand.index()].iter_mut() {
            m.companion = other.get(&(m.row, m.index_in_row)).copied();
        }
    }
}
