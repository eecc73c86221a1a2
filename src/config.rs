//! Practice-mode configuration.
//!
//! Every field has a default, so a host may pass a partial JSON object
//! (or nothing at all).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::correlate::Fill;
use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PracticeConfig {
    /// How long correct/wrong feedback stays before reverting to focused
    pub feedback_delay_ms: u64,
    /// Horizontal offset of loop guide lines, as a fraction of their x
    pub loop_line_x_offset_rate: f64,
    /// Vertical overshoot of loop guide lines, as a fraction of their y
    pub loop_line_y_offset_rate: f64,
    /// Opacity applied to staff lines of the inactive hand
    pub dimmed_staff_opacity: f64,
    pub focus_color: String,
    pub correct_color: String,
    pub wrong_color: String,
    pub loop_line_color: String,
    pub loop_highlight_color: String,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            feedback_delay_ms: DEFAULT_FEEDBACK_DELAY_MS,
            loop_line_x_offset_rate: LOOP_LINE_X_OFFSET_RATE,
            loop_line_y_offset_rate: LOOP_LINE_Y_OFFSET_RATE,
            dimmed_staff_opacity: DIMMED_STAFF_OPACITY,
            focus_color: FOCUS_COLOR.to_string(),
            correct_color: CORRECT_COLOR.to_string(),
            wrong_color: WRONG_COLOR.to_string(),
            loop_line_color: LOOP_LINE_COLOR.to_string(),
            loop_highlight_color: LOOP_HIGHLIGHT_COLOR.to_string(),
        }
    }
}

impl PracticeConfig {
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        if !(0.0..1.0).contains(&self.loop_line_x_offset_rate)
            || !(0.0..1.0).contains(&self.loop_line_y_offset_rate)
        {
            return Err(Error::Config("loop line offset rates must be in [0, 1)".to_string()));
        }
        if !(0.0..=1.0).contains(&self.dimmed_staff_opacity) {
            return Err(Error::Config("dimmed_staff_opacity must be in [0, 1]".to_string()));
        }
        Ok(())
    }

    pub fn feedback_delay(&self) -> Duration {
        Duration::from_millis(self.feedback_delay_ms)
    }

    /// CSS color for a fill state.
    pub fn color_for(&self, fill: Fill) -> &str {
        match fill {
            Fill::Transparent => "transparent",
            Fill::Focused => &self.focus_color,
            Fill::Correct => &self.correct_color,
            Fill::Wrong => &self.wrong_color,
        }
    }
}
