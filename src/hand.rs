//! Hand filter — which staff is being practiced.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::correlate::{Fill, HitBoxId, Overlay};
use crate::cursor::Cursor;
use crate::events::EngineEvent;
use crate::model::Hand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HandMode {
    /// Part 0 only
    Right,
    /// Part 1 only
    Left,
    #[default]
    Both,
}

impl HandMode {
    pub fn is_active(self, hand: Hand) -> bool {
        match self {
            HandMode::Right => hand == Hand::Right,
            HandMode::Left => hand == Hand::Left,
            HandMode::Both => true,
        }
    }

    /// Boxes of `cursor` that are interactive and matchable under this mode.
    pub fn active_boxes(self, overlay: &Overlay, cursor: &Cursor) -> Vec<HitBoxId> {
        cursor
            .hit_boxes
            .iter()
            .copied()
            .filter(|&id| overlay.hit_box(id).is_some_and(|b| self.is_active(b.hand())))
            .collect()
    }
}

/// Re-apply visibility for every staff line, both overlay layers and the focused cursor.
///
/// Inactive staff lines are dimmed and their layer stops receiving pointer
/// events; the focused cursor's inactive boxes are cleared and its active
/// ones refocused. The current position is not touched.
pub fn apply_hand_mode(
    mode: HandMode,
    overlay: &mut Overlay,
    focused: Option<&Cursor>,
    events: &mut Vec<EngineEvent>,
) {
    debug!(?mode, "applying hand mode");

    for staff_line in 0..overlay.staff_lines.len() {
        events.push(EngineEvent::StaffLine {
            staff_line,
            dimmed: !mode.is_active(Hand::from_index(staff_line)),
        });
    }

    for hand in Hand::ALL {
        events.push(EngineEvent::LayerPointerEvents {
            hand,
            enabled: mode.is_active(hand),
        });
    }

    let Some(cursor) = focused else {
        return;
    };
    for &id in &cursor.hit_boxes {
        let Some(hand) = overlay.hit_box(id).map(|b| b.hand()) else {
            continue;
        };
        let fill = if mode.is_active(hand) {
            Fill::Focused
        } else {
            Fill::Transparent
        };
        if overlay.set_fill(id, fill) {
            events.push(EngineEvent::HitBoxFill { hit_box: id, fill });
        }
    }
}
