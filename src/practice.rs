//! Practice state machine — matching live pitches against the focused cursor.
//!
//! A cursor is matched when every active hit box has all its pitches
//! ringing. A full match advances (wrapping inside an active loop); a
//! partial match flashes each active box correct or wrong and schedules a
//! revert to focused after the configured delay.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::PracticeConfig;
use crate::correlate::{Fill, HitBoxId, Overlay};
use crate::cursor::CursorIndex;
use crate::events::EngineEvent;
use crate::hand::HandMode;
use crate::input::RingingPitches;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PracticeStatus {
    /// Nothing selected yet
    #[default]
    NoCursor,
    /// A cursor is waiting for the learner
    Focused,
    /// Some active boxes are showing correct/wrong feedback
    MatchedPartial,
    /// The last cursor was played outside a loop; nothing left to advance to
    MatchedComplete,
}

/// Pending revert of one hit box back to the focused fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackTimer {
    pub hit_box: HitBoxId,
    pub due: Instant,
}

/// Cancel-and-replace set of feedback timers.
#[derive(Debug, Clone, Default)]
pub struct FeedbackTimers {
    pending: Vec<FeedbackTimer>,
}

impl FeedbackTimers {
    pub fn schedule(&mut self, hit_box: HitBoxId, due: Instant) {
        self.pending.push(FeedbackTimer { hit_box, due });
    }

    /// Drop every pending timer; returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    /// Remove and return the boxes whose timers are due at `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<HitBoxId> {
        let (due, waiting): (Vec<_>, Vec<_>) = self.pending.drain(..).partition(|t| t.due <= now);
        self.pending = waiting;
        due.into_iter().map(|t| t.hit_box).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|t| t.due).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Next sequential position: the loop end wraps to the loop start, the last
/// cursor outside a loop has no successor.
pub fn successor(current: usize, len: usize, loop_bounds: Option<(usize, usize)>) -> Option<usize> {
    match loop_bounds {
        Some((start, end)) if current == end => Some(start),
        _ if current + 1 < len => Some(current + 1),
        _ => None,
    }
}

/// Borrowed view of everything a transition reads or updates.
pub struct PracticeContext<'a> {
    pub overlay: &'a mut Overlay,
    pub index: &'a CursorIndex,
    pub mode: HandMode,
    pub loop_bounds: Option<(usize, usize)>,
    pub config: &'a PracticeConfig,
    pub events: &'a mut Vec<EngineEvent>,
}

impl PracticeContext<'_> {
    fn active_boxes(&self, position: usize) -> Vec<HitBoxId> {
        self.index
            .get(position)
            .map(|c| self.mode.active_boxes(&*self.overlay, c))
            .unwrap_or_default()
    }

    fn fill(&mut self, id: HitBoxId, fill: Fill) {
        if self.overlay.set_fill(id, fill) {
            self.events.push(EngineEvent::HitBoxFill { hit_box: id, fill });
        }
    }

    /// Clear every box of a cursor, active or not.
    fn clear_cursor(&mut self, position: usize) {
        let boxes = self
            .index
            .get(position)
            .map(|c| c.hit_boxes.clone())
            .unwrap_or_default();
        for id in boxes {
            self.fill(id, Fill::Transparent);
        }
    }

    fn focus_cursor(&mut self, position: usize) {
        for id in self.active_boxes(position) {
            self.fill(id, Fill::Focused);
        }
    }
}

/// Current cursor, status and pending feedback.
#[derive(Debug, Clone, Default)]
pub struct PracticeSession {
    status: PracticeStatus,
    current: Option<usize>,
    timers: FeedbackTimers,
}

impl PracticeSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> PracticeStatus {
        self.status
    }

    /// Sequential position of the focused cursor.
    pub fn current(&self) -> Option<usize> {
        match self.status {
            PracticeStatus::NoCursor | PracticeStatus::MatchedComplete => None,
            _ => self.current,
        }
    }

    pub fn timers(&self) -> &FeedbackTimers {
        &self.timers
    }

    /// Drop all state without touching visuals (the overlay is being discarded).
    pub fn reset(&mut self) {
        self.timers.cancel_all();
        self.current = None;
        self.status = PracticeStatus::NoCursor;
    }

    pub fn cancel_timers(&mut self) -> usize {
        let cancelled = self.timers.cancel_all();
        if cancelled > 0 {
            debug!(cancelled, "feedback timers cancelled");
        }
        if self.status == PracticeStatus::MatchedPartial {
            self.status = PracticeStatus::Focused;
        }
        cancelled
    }

    /// Make `position` the current cursor and focus its active boxes.
    pub fn select(&mut self, position: usize, ctx: &mut PracticeContext<'_>) {
        self.timers.cancel_all();
        if let Some(previous) = self.current() {
            ctx.clear_cursor(previous);
        }
        ctx.focus_cursor(position);
        self.current = Some(position);
        self.status = PracticeStatus::Focused;
        debug!(position, "cursor selected");
    }

    /// React to a change of the ringing set.
    pub fn on_ringing_changed(&mut self, ringing: &RingingPitches, now: Instant, ctx: &mut PracticeContext<'_>) {
        let Some(position) = self.current() else {
            return;
        };
        let active = ctx.active_boxes(position);
        if active.is_empty() {
            return;
        }

        self.timers.cancel_all();

        if ringing.is_empty() {
            for &id in &active {
                ctx.fill(id, Fill::Focused);
            }
            self.status = PracticeStatus::Focused;
            return;
        }

        let results: Vec<(HitBoxId, bool)> = active
            .iter()
            .filter_map(|&id| ctx.overlay.hit_box(id).map(|b| (id, b.is_satisfied_by(ringing.as_set()))))
            .collect();

        if results.iter().all(|&(_, ok)| ok) {
            self.advance(position, ctx);
            return;
        }

        let due = now + ctx.config.feedback_delay();
        for (id, ok) in results {
            ctx.fill(id, if ok { Fill::Correct } else { Fill::Wrong });
            self.timers.schedule(id, due);
        }
        self.status = PracticeStatus::MatchedPartial;
    }

    /// Fire due feedback timers, reverting their boxes to focused.
    pub fn advance_timers(&mut self, now: Instant, ctx: &mut PracticeContext<'_>) {
        let due = self.timers.take_due(now);
        if due.is_empty() {
            return;
        }
        let focused = self
            .current()
            .and_then(|p| ctx.index.get(p))
            .map(|c| c.hit_boxes.clone())
            .unwrap_or_default();
        for id in due {
            if focused.contains(&id) {
                ctx.fill(id, Fill::Focused);
            }
        }
        if self.timers.is_empty() && self.status == PracticeStatus::MatchedPartial {
            self.status = PracticeStatus::Focused;
        }
    }

    /// Keep focus on a cursor the hand mode can play.
    ///
    /// When the focused cursor has no active box, focus moves forward to
    /// the next one that has; with none left, focus is cleared.
    pub fn ensure_playable(&mut self, ctx: &mut PracticeContext<'_>) {
        let Some(position) = self.current() else {
            return;
        };
        if !ctx.active_boxes(position).is_empty() {
            return;
        }
        self.timers.cancel_all();
        ctx.clear_cursor(position);
        match next_playable(position, ctx) {
            Some(next) => {
                debug!(from = position, to = next, "focus moved to a playable cursor");
                self.focus(position, next, ctx);
            }
            None => {
                debug!(position, "no playable cursor left, focus cleared");
                self.current = None;
                self.status = PracticeStatus::NoCursor;
            }
        }
    }

    /// Move past `position`, skipping cursors with nothing to play under the hand mode.
    fn advance(&mut self, position: usize, ctx: &mut PracticeContext<'_>) {
        let next = next_playable(position, ctx);
        ctx.clear_cursor(position);

        let Some(next) = next else {
            info!(position, "practice completed");
            self.current = None;
            self.status = PracticeStatus::MatchedComplete;
            ctx.events.push(EngineEvent::PracticeCompleted);
            return;
        };

        self.focus(position, next, ctx);
        debug!(from = position, to = next, "cursor advanced");
    }

    /// Focus `next` after leaving `previous`, scrolling when the row changes.
    fn focus(&mut self, previous: usize, next: usize, ctx: &mut PracticeContext<'_>) {
        let old_row = ctx.index.get(previous).map(|c| c.row);
        let new_row = ctx.index.get(next).map(|c| c.row);
        if let Some(row) = new_row.filter(|r| Some(*r) != old_row) {
            ctx.events.push(EngineEvent::ScrollIntoView { row });
        }

        ctx.focus_cursor(next);
        self.current = Some(next);
        self.status = PracticeStatus::Focused;
    }
}

/// First successor of `position` with at least one active box.
fn next_playable(position: usize, ctx: &PracticeContext<'_>) -> Option<usize> {
    let len = ctx.index.len();
    let mut next = successor(position, len, ctx.loop_bounds);
    let mut skipped = 0;
    while let Some(candidate) = next {
        if !ctx.active_boxes(candidate).is_empty() {
            return Some(candidate);
        }
        skipped += 1;
        if skipped >= len {
            return None;
        }
        next = successor(candidate, len, ctx.loop_bounds);
    }
    None
}
