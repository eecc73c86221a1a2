//! Events published to the UI, in the order they must be applied.

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::PracticeConfig;
use crate::correlate::{Fill, HitBoxId};
use crate::looping::{BoundaryKind, GuideLine, RejectReason};
use crate::model::Hand;
use crate::render::Rect;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A hit box changed visual state
    HitBoxFill { hit_box: HitBoxId, fill: Fill },
    /// A staff line was dimmed (and disabled) or restored by the hand filter
    StaffLine { staff_line: usize, dimmed: bool },
    /// Pointer events of one hand's overlay layer were switched
    LayerPointerEvents { hand: Hand, enabled: bool },
    /// The new cursor sits on another staff-line row
    ScrollIntoView { row: usize },
    /// A loop guide line should be drawn
    LoopLineDrawn { kind: BoundaryKind, line: GuideLine },
    /// All loop guide lines should be removed
    LoopLinesRemoved,
    /// Rectangles highlighting the looped rows
    RowsHighlighted { rects: Vec<Rect> },
    /// Looped-row highlighting should be removed
    HighlightsCleared,
    /// Ask the learner to pick a loop boundary
    LoopPrompt { awaiting: BoundaryKind },
    /// A click was ignored; show a transient warning
    SelectionRejected { reason: RejectReason },
    /// The last cursor was matched outside a loop
    PracticeCompleted,
}

impl EngineEvent {
    /// The event as JSON, with its paint resolved against `config`.
    ///
    /// Fill changes and loop drawings gain a `color`, staff-line changes an `opacity`.
    pub fn to_styled_json(&self, config: &PracticeConfig) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or(Value::Null);
        let style = match self {
            EngineEvent::HitBoxFill { fill, .. } => Some(("color", json!(config.color_for(*fill)))),
            EngineEvent::StaffLine { dimmed, .. } => {
                let opacity = if *dimmed { config.dimmed_staff_opacity } else { 1.0 };
                Some(("opacity", json!(opacity)))
            }
            EngineEvent::LoopLineDrawn { .. } => Some(("color", json!(config.loop_line_color))),
            EngineEvent::RowsHighlighted { .. } => Some(("color", json!(config.loop_highlight_color))),
            _ => None,
        };
        if let (Some((key, paint)), Some(map)) = (style, value.as_object_mut()) {
            map.insert(key.to_string(), paint);
        }
        value
    }
}

/// Serialize an event batch for a WebView bridge.
pub fn events_to_json(events: &[EngineEvent], config: &PracticeConfig) -> String {
    let batch: Vec<Value> = events.iter().map(|e| e.to_styled_json(config)).collect();
    serde_json::to_string(&batch).unwrap_or_else(|_| "[]".to_string())
}
