//! Cursor index — hit boxes grouped into simultaneous playable events.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::correlate::{HitBoxId, Overlay};
use crate::model::{Hand, Tick};

/// Every hit box starting at one tick, across both hands.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cursor {
    pub start_tick: Tick,
    /// Right-hand boxes first, then left-hand boxes, each in creation order
    pub hit_boxes: Vec<HitBoxId>,
    /// Staff-line row of the earliest box
    pub row: usize,
    /// Indices into `Overlay::staff_lines` of the row's upper and lower staff
    pub staff_lines: (usize, usize),
}

/// Ascending, tick-unique sequence of cursors.
#[derive(Debug, Clone, Default)]
pub struct CursorIndex {
    cursors: Vec<Cursor>,
    by_tick: BTreeMap<Tick, usize>,
}

impl CursorIndex {
    /// Group every hit box of `overlay` by start tick.
    pub fn build(overlay: &Overlay) -> Self {
        let mut grouped: BTreeMap<Tick, Vec<HitBoxId>> = BTreeMap::new();
        for hand in Hand::ALL {
            for &id in overlay.layer(hand) {
                if let Some(b) = overlay.hit_box(id) {
                    grouped.entry(b.start_tick).or_default().push(id);
                }
            }
        }

        let cursors: Vec<Cursor> = grouped
            .into_iter()
            .map(|(start_tick, hit_boxes)| {
                let row = hit_boxes
                    .iter()
                    .filter_map(|&id| overlay.hit_box(id))
                    .map(|b| b.row)
                    .min()
                    .unwrap_or(0);
                Cursor {
                    start_tick,
                    hit_boxes,
                    row,
                    staff_lines: (row * 2, row * 2 + 1),
                }
            })
            .collect();

        let by_tick = cursors
            .iter()
            .enumerate()
            .map(|(i, c)| (c.start_tick, i))
            .collect();

        Self { cursors, by_tick }
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Cursor at a sequential position.
    pub fn get(&self, position: usize) -> Option<&Cursor> {
        self.cursors.get(position)
    }

    /// Cursor starting exactly at `tick`.
    pub fn by_tick(&self, tick: Tick) -> Option<&Cursor> {
        self.position_of(tick).and_then(|p| self.cursors.get(p))
    }

    /// Sequential position of the cursor starting at `tick`.
    pub fn position_of(&self, tick: Tick) -> Option<usize> {
        self.by_tick.get(&tick).copied()
    }

    /// First cursor at or after `tick`.
    pub fn position_at_or_after(&self, tick: Tick) -> Option<usize> {
        self.by_tick.range(tick..).next().map(|(_, &p)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cursor> {
        self.cursors.iter()
    }

    pub fn last_position(&self) -> Option<usize> {
        self.cursors.len().checked_sub(1)
    }
}
