//! Practice engine — one loaded score and everything derived from it.
//!
//! All inputs (pitch events, clicks, render-complete notifications, timer
//! ticks) arrive through `&mut self` methods, so handlers never overlap.
//! UI effects accumulate in an event queue the host drains after each call.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PracticeConfig;
use crate::correlate::{correlate, HitBoxId, Overlay};
use crate::cursor::{Cursor, CursorIndex};
use crate::error::{Error, InputError};
use crate::events::{events_to_json, EngineEvent};
use crate::hand::{apply_hand_mode, HandMode};
use crate::input::{InputEvent, RingingPitches};
use crate::looping::{LoopRegion, LoopRouting, LoopState};
use crate::model::{Score, Tick};
use crate::parser::parse_musicxml;
use crate::practice::{PracticeContext, PracticeSession, PracticeStatus};
use crate::render::{GlyphId, GlyphSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlayMode {
    #[default]
    Normal,
    Loop,
}

/// Application state that survives reloads. The host persists it however it likes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppState {
    /// MusicXML text of the current score
    pub score_source: Option<String>,
    pub play_mode: PlayMode,
    pub hand_mode: HandMode,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_score_source(&mut self, xml: impl Into<String>) {
        self.score_source = Some(xml.into());
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) {
        self.play_mode = mode;
    }

    pub fn set_hand_mode(&mut self, mode: HandMode) {
        self.hand_mode = mode;
    }
}

pub struct PracticeEngine {
    state: AppState,
    config: PracticeConfig,
    score: Option<Score>,
    overlay: Overlay,
    index: CursorIndex,
    looping: LoopRegion,
    session: PracticeSession,
    ringing: RingingPitches,
    events: Vec<EngineEvent>,
}

impl PracticeEngine {
    /// Build an engine, parsing `state.score_source` when present.
    pub fn new(state: AppState, config: PracticeConfig) -> Result<Self, Error> {
        let score = state
            .score_source
            .as_deref()
            .map(parse_musicxml)
            .transpose()?;
        Ok(Self {
            state,
            config,
            score,
            overlay: Overlay::default(),
            index: CursorIndex::default(),
            looping: LoopRegion::new(),
            session: PracticeSession::new(),
            ringing: RingingPitches::new(),
            events: Vec::new(),
        })
    }

    // ─── Accessors ───────────────────────────────────────────────────

    pub fn app_state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    pub fn score(&self) -> Option<&Score> {
        self.score.as_ref()
    }

    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn cursors(&self) -> &CursorIndex {
        &self.index
    }

    pub fn loop_state(&self) -> &LoopState {
        self.looping.state()
    }

    pub fn status(&self) -> PracticeStatus {
        self.session.status()
    }

    pub fn current_position(&self) -> Option<usize> {
        self.session.current()
    }

    pub fn current_cursor(&self) -> Option<&Cursor> {
        self.current_position().and_then(|p| self.index.get(p))
    }

    pub fn ringing(&self) -> &RingingPitches {
        &self.ringing
    }

    /// Earliest pending feedback deadline, for the host's timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.timers().next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.session.timers().len()
    }

    /// Take every event produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Take pending events as a styled JSON batch for the UI bridge.
    pub fn drain_events_json(&mut self) -> String {
        let events = self.drain_events();
        events_to_json(&events, &self.config)
    }

    // ─── Score lifecycle ─────────────────────────────────────────────

    /// Parse and install a new score. The previous layout is discarded until the next render.
    pub fn load_score(&mut self, xml: &str) -> Result<(), Error> {
        let score = parse_musicxml(xml)?;
        self.state.set_score_source(xml);
        self.install(score);
        Ok(())
    }

    /// Install an already parsed score (e.g. from an .mxl archive).
    ///
    /// No document text is kept, so a rebuild from the app state starts empty.
    pub fn load_parsed(&mut self, score: Score) {
        self.state.score_source = None;
        self.install(score);
    }

    fn install(&mut self, score: Score) {
        info!(
            title = score.title.as_deref().unwrap_or(""),
            notes = score.note_count(),
            "score loaded"
        );
        self.discard_layout();
        self.score = Some(score);
    }

    fn discard_layout(&mut self) {
        self.session.reset();
        self.overlay = Overlay::default();
        self.index = CursorIndex::default();
        self.looping.leave(&mut self.events);
    }

    /// The renderer finished (re)laying out the score: rebuild hit boxes and cursors.
    ///
    /// Timers and hit boxes of the previous layout are destroyed first. On
    /// a correlation error the engine is left with no layout. The focused
    /// tick is restored when it still exists. Loop boundaries are dropped;
    /// in loop play mode the learner is prompted for a new start.
    pub fn on_render_complete<S: GlyphSource + ?Sized>(&mut self, source: &S) -> Result<(), Error> {
        let focused_tick = self.current_cursor().map(|c| c.start_tick);
        self.discard_layout();

        let Some(score) = self.score.as_ref() else {
            warn!("render completed with no score loaded");
            return Ok(());
        };

        let overlay = correlate(score, source)?;
        self.index = CursorIndex::build(&overlay);
        self.overlay = overlay;
        debug!(cursors = self.index.len(), "cursor index rebuilt");

        apply_hand_mode(self.state.hand_mode, &mut self.overlay, None, &mut self.events);

        if let Some(position) = focused_tick.and_then(|t| self.index.position_of(t)) {
            self.select_position(position);
        }
        if self.state.play_mode == PlayMode::Loop {
            self.looping.enter(&mut self.events);
        }
        Ok(())
    }

    // ─── Selection ───────────────────────────────────────────────────

    /// Click on a hit box. Clicks on a layer with pointer events off are ignored.
    pub fn click_hit_box(&mut self, id: HitBoxId) {
        let Some(b) = self.overlay.hit_box(id) else {
            return;
        };
        if !self.state.hand_mode.is_active(b.hand()) {
            debug!(id, "click on inactive layer ignored");
            return;
        }
        let tick = b.start_tick;
        self.click_tick(tick);
    }

    /// Click on a note container, head or stem glyph.
    pub fn click_glyph(&mut self, glyph: GlyphId) {
        if let Some(id) = self.overlay.hit_box_for_glyph(glyph) {
            self.click_hit_box(id);
        }
    }

    /// Click at a point in render coordinates.
    pub fn click_at(&mut self, x: f64, y: f64) {
        let mode = self.state.hand_mode;
        if let Some(id) = self.overlay.hit_test(x, y, |hand| mode.is_active(hand)) {
            self.click_hit_box(id);
        }
    }

    /// Resolve the cursor sharing `tick` and route it through the loop region.
    fn click_tick(&mut self, tick: Tick) {
        let Some(position) = self.index.position_of(tick) else {
            return;
        };
        let Some(cursor) = self.index.get(position) else {
            return;
        };
        let routing = self
            .looping
            .route(position, cursor, &self.overlay, &self.config, &mut self.events);
        match routing {
            LoopRouting::Select => self.select_position(position),
            LoopRouting::Activated { start } => self.select_position(start),
            LoopRouting::StartPlaced | LoopRouting::Rejected(_) => {}
        }
    }

    fn select_position(&mut self, position: usize) {
        let mut ctx = PracticeContext {
            overlay: &mut self.overlay,
            index: &self.index,
            mode: self.state.hand_mode,
            loop_bounds: self.looping.bounds(),
            config: &self.config,
            events: &mut self.events,
        };
        self.session.select(position, &mut ctx);
    }

    // ─── Modes ───────────────────────────────────────────────────────

    /// Switch hands, keeping the position unless it has nothing left to play.
    pub fn set_hand_mode(&mut self, mode: HandMode) {
        self.state.set_hand_mode(mode);
        self.session.cancel_timers();
        let focused = self.session.current().and_then(|p| self.index.get(p));
        apply_hand_mode(mode, &mut self.overlay, focused, &mut self.events);

        let mut ctx = PracticeContext {
            overlay: &mut self.overlay,
            index: &self.index,
            mode,
            loop_bounds: self.looping.bounds(),
            config: &self.config,
            events: &mut self.events,
        };
        self.session.ensure_playable(&mut ctx);
    }

    pub fn set_play_mode(&mut self, mode: PlayMode) {
        match mode {
            PlayMode::Loop => self.enter_loop_mode(),
            PlayMode::Normal => self.leave_loop_mode(),
        }
    }

    pub fn enter_loop_mode(&mut self) {
        self.state.set_play_mode(PlayMode::Loop);
        self.looping.enter(&mut self.events);
    }

    pub fn leave_loop_mode(&mut self) {
        self.state.set_play_mode(PlayMode::Normal);
        let interrupted = self.session.status() == PracticeStatus::MatchedPartial;
        self.session.cancel_timers();
        if interrupted {
            self.refocus_current();
        }
        self.looping.leave(&mut self.events);
    }

    /// Put the current cursor's boxes back to plain focus after feedback was cut short.
    fn refocus_current(&mut self) {
        if let Some(position) = self.session.current() {
            self.select_position(position);
        }
    }

    // ─── Live input ──────────────────────────────────────────────────

    pub fn pitch_on(&mut self, pitch: u8, now: Instant) {
        self.handle_input(InputEvent::PitchOn(pitch), now);
    }

    pub fn pitch_off(&mut self, pitch: u8, now: Instant) {
        self.handle_input(InputEvent::PitchOff(pitch), now);
    }

    /// Apply a status code and pitch from the device.
    pub fn handle_code(&mut self, code: u8, pitch: u8, now: Instant) -> Result<(), InputError> {
        let event = InputEvent::from_code(code, pitch)?;
        self.handle_input(event, now);
        Ok(())
    }

    /// Apply a raw BLE-MIDI notification.
    pub fn handle_packet(&mut self, packet: &[u8], now: Instant) -> Result<(), InputError> {
        let event = InputEvent::from_ble_packet(packet)?;
        self.handle_input(event, now);
        Ok(())
    }

    /// Update the ringing set; matching runs only when the set actually changed.
    pub fn handle_input(&mut self, event: InputEvent, now: Instant) {
        if !self.ringing.apply(event) {
            return;
        }
        let mut ctx = PracticeContext {
            overlay: &mut self.overlay,
            index: &self.index,
            mode: self.state.hand_mode,
            loop_bounds: self.looping.bounds(),
            config: &self.config,
            events: &mut self.events,
        };
        self.session.on_ringing_changed(&self.ringing, now, &mut ctx);
    }

    /// Fire feedback timers due at `now`.
    pub fn advance_timers(&mut self, now: Instant) {
        let mut ctx = PracticeContext {
            overlay: &mut self.overlay,
            index: &self.index,
            mode: self.state.hand_mode,
            loop_bounds: self.looping.bounds(),
            config: &self.config,
            events: &mut self.events,
        };
        self.session.advance_timers(now, &mut ctx);
    }
}
