//! Default tuning values for practice mode (render units and milliseconds).

// ── Feedback ────────────────────────────────────────────────────────
pub const DEFAULT_FEEDBACK_DELAY_MS: u64 = 300; // correct/wrong flash before reverting to focused

// ── Loop guide lines ────────────────────────────────────────────────
pub const LOOP_LINE_X_OFFSET_RATE: f64 = 0.01; // horizontal push away from the boundary notes
pub const LOOP_LINE_Y_OFFSET_RATE: f64 = 0.02; // vertical overshoot past the staff lines

// ── Hand filter ─────────────────────────────────────────────────────
pub const DIMMED_STAFF_OPACITY: f64 = 0.5;

// ── Colors ──────────────────────────────────────────────────────────
pub const FOCUS_COLOR: &str = "rgba(0, 120, 255, 0.35)";
pub const CORRECT_COLOR: &str = "rgba(0, 180, 60, 0.45)";
pub const WRONG_COLOR: &str = "rgba(230, 30, 30, 0.45)";
pub const LOOP_LINE_COLOR: &str = "orange";
pub const LOOP_HIGHLIGHT_COLOR: &str = "rgba(255, 165, 0, 0.2)";

// ── Input device ────────────────────────────────────────────────────
pub const NOTE_ON_CODE: u8 = 0x90;
pub const NOTE_OFF_CODE: u8 = 0x80;
