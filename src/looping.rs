//! Loop region — restricting practice to a range of cursors.
//!
//! The learner marks a start cursor then an end cursor; each becomes a
//! vertical guide line across both staves. While the loop is active,
//! clicks outside the marked rows or past the guide lines are rejected and
//! matching the end cursor wraps back to the start.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PracticeConfig;
use crate::correlate::{HitBoxId, Overlay};
use crate::cursor::Cursor;
use crate::events::EngineEvent;
use crate::model::Hand;
use crate::render::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryKind {
    Start,
    End,
}

/// Vertical guide line, in render coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GuideLine {
    pub x: f64,
    pub y1: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopBoundary {
    pub kind: BoundaryKind,
    pub line: GuideLine,
    /// Staff-line row the line was drawn on
    pub row: usize,
    /// Sequential index of the boundary cursor
    pub position: usize,
}

/// Why a click was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Row lies outside the looped rows
    OutsideLoopRows,
    /// On the start row, left of the start line
    BeforeLoopStart,
    /// On the end row, right of the end line
    AfterLoopEnd,
    /// End boundary picked before the start boundary
    EndBeforeStart,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoopState {
    #[default]
    Idle,
    AwaitingStart,
    AwaitingEnd {
        start: LoopBoundary,
    },
    Active {
        start: LoopBoundary,
        end: LoopBoundary,
    },
}

/// What the engine should do with a click after loop routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopRouting {
    /// Not a boundary click; select the cursor for practice
    Select,
    /// The start boundary was placed
    StartPlaced,
    /// The end boundary was placed and the loop is active from `start`
    Activated { start: usize },
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Default)]
pub struct LoopRegion {
    state: LoopState,
}

impl LoopRegion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, LoopState::Active { .. })
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, LoopState::Idle)
    }

    /// Sequential (start, end) positions while active.
    pub fn bounds(&self) -> Option<(usize, usize)> {
        match &self.state {
            LoopState::Active { start, end } => Some((start.position, end.position)),
            _ => None,
        }
    }

    /// Idle → AwaitingStart. No-op in any other state.
    pub fn enter(&mut self, events: &mut Vec<EngineEvent>) {
        if !self.is_idle() {
            return;
        }
        info!("entering loop mode");
        self.state = LoopState::AwaitingStart;
        events.push(EngineEvent::LoopPrompt {
            awaiting: BoundaryKind::Start,
        });
    }

    /// Any state → Idle, removing guide lines and highlights.
    pub fn leave(&mut self, events: &mut Vec<EngineEvent>) {
        let previous = std::mem::take(&mut self.state);
        match previous {
            LoopState::Idle => return,
            LoopState::AwaitingStart => {}
            LoopState::AwaitingEnd { .. } => events.push(EngineEvent::LoopLinesRemoved),
            LoopState::Active { .. } => {
                events.push(EngineEvent::LoopLinesRemoved);
                events.push(EngineEvent::HighlightsCleared);
            }
        }
        info!("left loop mode");
    }

    /// Route a click on the cursor at `position`.
    pub fn route(
        &mut self,
        position: usize,
        cursor: &Cursor,
        overlay: &Overlay,
        config: &PracticeConfig,
        events: &mut Vec<EngineEvent>,
    ) -> LoopRouting {
        match &self.state {
            LoopState::Idle => LoopRouting::Select,
            LoopState::AwaitingStart => {
                let start = boundary(BoundaryKind::Start, position, cursor, overlay, config);
                debug!(position, row = start.row, "loop start placed");
                events.push(EngineEvent::LoopLineDrawn {
                    kind: BoundaryKind::Start,
                    line: start.line,
                });
                events.push(EngineEvent::LoopPrompt {
                    awaiting: BoundaryKind::End,
                });
                self.state = LoopState::AwaitingEnd { start };
                LoopRouting::StartPlaced
            }
            LoopState::AwaitingEnd { start } => {
                if position < start.position {
                    return reject(RejectReason::EndBeforeStart, events);
                }
                let start = start.clone();
                let end = boundary(BoundaryKind::End, position, cursor, overlay, config);
                info!(start = start.position, end = end.position, "loop active");
                events.push(EngineEvent::LoopLineDrawn {
                    kind: BoundaryKind::End,
                    line: end.line,
                });
                events.push(EngineEvent::RowsHighlighted {
                    rects: highlight_rects(overlay, &start, &end),
                });
                let routing = LoopRouting::Activated {
                    start: start.position,
                };
                self.state = LoopState::Active { start, end };
                routing
            }
            LoopState::Active { start, end } => match out_of_loop(cursor, overlay, start, end) {
                Some(reason) => reject(reason, events),
                None => LoopRouting::Select,
            },
        }
    }
}

fn reject(reason: RejectReason, events: &mut Vec<EngineEvent>) -> LoopRouting {
    warn!(?reason, "selection rejected");
    events.push(EngineEvent::SelectionRejected { reason });
    LoopRouting::Rejected(reason)
}

/// Leftmost box of a cursor.
fn leftmost(cursor: &Cursor, overlay: &Overlay) -> Option<Rect> {
    cursor
        .hit_boxes
        .iter()
        .filter_map(|&id| overlay.hit_box(id))
        .map(|b| b.rect)
        .min_by(|a, b| a.x.total_cmp(&b.x))
}

/// Whether a candidate lies outside an active loop, and why.
fn out_of_loop(
    cursor: &Cursor,
    overlay: &Overlay,
    start: &LoopBoundary,
    end: &LoopBoundary,
) -> Option<RejectReason> {
    let row = cursor.row;
    if row < start.row || row > end.row {
        return Some(RejectReason::OutsideLoopRows);
    }
    let x = leftmost(cursor, overlay).map(|r| r.x)?;
    if row == start.row && x < start.line.x {
        return Some(RejectReason::BeforeLoopStart);
    }
    if row == end.row && x > end.line.x {
        return Some(RejectReason::AfterLoopEnd);
    }
    None
}

fn first_box_of(cursor: &Cursor, overlay: &Overlay, hand: Hand) -> Option<HitBoxId> {
    cursor
        .hit_boxes
        .iter()
        .copied()
        .find(|&id| overlay.hit_box(id).is_some_and(|b| b.hand() == hand))
}

/// Build a boundary with its guide line spanning both staves of the cursor's row.
fn boundary(
    kind: BoundaryKind,
    position: usize,
    cursor: &Cursor,
    overlay: &Overlay,
    config: &PracticeConfig,
) -> LoopBoundary {
    let up = first_box_of(cursor, overlay, Hand::Right);
    let down = first_box_of(cursor, overlay, Hand::Left);

    // A hand with no box here borrows the companion staff of the other hand's measure.
    let staff_of = |own: Option<HitBoxId>, other: Option<HitBoxId>| -> Option<Rect> {
        match own {
            Some(id) => overlay.staff_boxes_for(id).map(|(staff, _)| staff),
            None => other
                .and_then(|id| overlay.staff_boxes_for(id))
                .and_then(|(_, companion)| companion),
        }
    };
    let row_boxes = overlay.row_staff_boxes(cursor.row);
    let upper = staff_of(up, down)
        .or(row_boxes.map(|(u, _)| u))
        .unwrap_or_default();
    let lower = staff_of(down, up)
        .or(row_boxes.map(|(_, l)| l))
        .unwrap_or_default();

    let rects: Vec<Rect> = [up, down]
        .into_iter()
        .flatten()
        .filter_map(|id| overlay.hit_box(id))
        .map(|b| b.rect)
        .collect();

    let x = match kind {
        BoundaryKind::Start => {
            rects.iter().map(|r| r.x).fold(f64::INFINITY, f64::min) * (1.0 - config.loop_line_x_offset_rate)
        }
        BoundaryKind::End => {
            rects.iter().map(|r| r.right()).fold(f64::NEG_INFINITY, f64::max)
                * (1.0 + config.loop_line_x_offset_rate)
        }
    };
    let x = if x.is_finite() { x } else { 0.0 };

    LoopBoundary {
        kind,
        line: GuideLine {
            x,
            y1: upper.y * (1.0 - config.loop_line_y_offset_rate),
            y2: lower.bottom() * (1.0 + config.loop_line_y_offset_rate),
        },
        row: cursor.row,
        position,
    }
}

/// One rectangle per looped row, clipped to the guide lines on the boundary rows.
pub fn highlight_rects(overlay: &Overlay, start: &LoopBoundary, end: &LoopBoundary) -> Vec<Rect> {
    (start.row..=end.row)
        .filter_map(|row| {
            let (upper, lower) = overlay.row_staff_boxes(row)?;
            let y = upper.y.min(lower.y);
            let mut left = upper.x;
            let mut right = upper.right();
            if row == start.row {
                left = start.line.x;
            }
            if row == end.row {
                right = end.line.x;
            }
            Some(Rect::new(left, y, (right - left).max(0.0), lower.bottom() - y))
        })
        .collect()
}
