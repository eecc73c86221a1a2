//! Integration tests — drive the practice engine with clicks, pitches and timers.

mod common;

use std::time::{Duration, Instant};

use common::{render, TWO_HANDS};
use practicelib::engine::PlayMode;
use practicelib::events::EngineEvent;
use practicelib::looping::{BoundaryKind, GuideLine};
use practicelib::{
    parse_musicxml, AppState, Error, Fill, HandMode, HitBoxId, InputError, LoopState, PracticeConfig, PracticeEngine,
    PracticeStatus, Rect, RejectReason,
};
use pretty_assertions::assert_eq;

fn engine_with(hand_mode: HandMode) -> PracticeEngine {
    common::init_logging();
    let state = AppState {
        score_source: Some(TWO_HANDS.to_string()),
        play_mode: PlayMode::Normal,
        hand_mode,
    };
    let mut engine = PracticeEngine::new(state, PracticeConfig::default()).unwrap();
    let tree = render(engine.score().unwrap(), 1);
    engine.on_render_complete(&tree).unwrap();
    engine.drain_events();
    engine
}

fn boxes(engine: &PracticeEngine, position: usize) -> Vec<HitBoxId> {
    engine.cursors().get(position).unwrap().hit_boxes.clone()
}

fn fill(engine: &PracticeEngine, id: HitBoxId) -> Fill {
    engine.overlay().hit_box(id).unwrap().fill
}

/// Right and left box of a cursor holding one note per hand.
fn both_hands(engine: &PracticeEngine, position: usize) -> (HitBoxId, HitBoxId) {
    let ids = boxes(engine, position);
    assert_eq!(ids.len(), 2, "expected one box per hand");
    (ids[0], ids[1])
}

/// Click the first (right-hand) box of a cursor.
fn click(engine: &mut PracticeEngine, position: usize) {
    let id = boxes(engine, position)[0];
    engine.click_hit_box(id);
}

fn rejections(events: &[EngineEvent]) -> Vec<RejectReason> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::SelectionRejected { reason } => Some(*reason),
            _ => None,
        })
        .collect()
}

// ─── Selection ──────────────────────────────────────────────────────

#[test]
fn click_focuses_every_box_of_the_cursor() {
    let mut engine = engine_with(HandMode::Both);
    assert_eq!(engine.status(), PracticeStatus::NoCursor);

    click(&mut engine, 2);
    let (right, left) = both_hands(&engine, 2);
    assert_eq!(engine.status(), PracticeStatus::Focused);
    assert_eq!(engine.current_position(), Some(2));
    assert_eq!(
        engine.drain_events(),
        vec![
            EngineEvent::HitBoxFill { hit_box: right, fill: Fill::Focused },
            EngineEvent::HitBoxFill { hit_box: left, fill: Fill::Focused },
        ]
    );

    click(&mut engine, 0);
    assert_eq!(fill(&engine, right), Fill::Transparent);
    assert_eq!(fill(&engine, left), Fill::Transparent);
    assert_eq!(fill(&engine, boxes(&engine, 0)[0]), Fill::Focused);
}

#[test]
fn clicks_on_inactive_hand_are_ignored() {
    let mut engine = engine_with(HandMode::Right);
    let left = boxes(&engine, 2)[1];
    engine.click_hit_box(left);
    assert_eq!(engine.status(), PracticeStatus::NoCursor);

    let rect = engine.overlay().hit_box(left).unwrap().rect;
    engine.click_at(rect.x + 1.0, rect.y + 1.0);
    assert_eq!(engine.current_position(), None);
}

// ─── Matching ───────────────────────────────────────────────────────

#[test]
fn full_chord_advances_partial_chord_flashes() {
    let mut engine = engine_with(HandMode::Both);
    let now = Instant::now();
    click(&mut engine, 0);
    engine.drain_events();
    let chord = boxes(&engine, 0)[0];
    let next = boxes(&engine, 1)[0];

    engine.pitch_on(60, now);
    assert_eq!(engine.status(), PracticeStatus::MatchedPartial);
    assert_eq!(engine.current_position(), Some(0));
    assert_eq!(fill(&engine, chord), Fill::Wrong);
    assert_eq!(engine.pending_timers(), 1);
    engine.drain_events();

    engine.pitch_on(64, now);
    assert_eq!(engine.status(), PracticeStatus::Focused);
    assert_eq!(engine.current_position(), Some(1));
    assert_eq!(engine.pending_timers(), 0);
    assert_eq!(
        engine.drain_events(),
        vec![
            EngineEvent::HitBoxFill { hit_box: chord, fill: Fill::Transparent },
            EngineEvent::HitBoxFill { hit_box: next, fill: Fill::Focused },
        ]
    );
}

#[test]
fn repeated_pitch_on_changes_nothing() {
    let mut engine = engine_with(HandMode::Both);
    let now = Instant::now();
    click(&mut engine, 0);
    engine.pitch_on(60, now);
    engine.drain_events();

    engine.pitch_on(60, now + Duration::from_millis(10));
    assert!(engine.drain_events().is_empty());
    assert_eq!(engine.status(), PracticeStatus::MatchedPartial);
    assert_eq!(engine.pending_timers(), 1);
    assert_eq!(engine.next_deadline(), Some(now + Duration::from_millis(300)));
}

#[test]
fn matched_cursor_is_not_matched_twice() {
    let mut engine = engine_with(HandMode::Both);
    let now = Instant::now();
    click(&mut engine, 1);
    engine.pitch_on(62, now);
    assert_eq!(engine.current_position(), Some(2));
    engine.drain_events();

    // D4 is still held: the new cursor wants E4 and C3
    engine.pitch_on(62, now + Duration::from_millis(10));
    assert_eq!(engine.current_position(), Some(2));
    assert_eq!(engine.status(), PracticeStatus::Focused);
    assert!(engine.drain_events().is_empty());
}

#[test]
fn each_hand_gets_its_own_feedback() {
    let mut engine = engine_with(HandMode::Both);
    let now = Instant::now();
    click(&mut engine, 2);
    let (right, left) = both_hands(&engine, 2);

    engine.pitch_on(64, now);
    assert_eq!(fill(&engine, right), Fill::Correct);
    assert_eq!(fill(&engine, left), Fill::Wrong);
    assert_eq!(engine.pending_timers(), 2);

    engine.advance_timers(now + Duration::from_millis(299));
    assert_eq!(fill(&engine, right), Fill::Correct);

    engine.advance_timers(now + Duration::from_millis(300));
    assert_eq!(fill(&engine, right), Fill::Focused);
    assert_eq!(fill(&engine, left), Fill::Focused);
    assert_eq!(engine.status(), PracticeStatus::Focused);
    assert_eq!(engine.current_position(), Some(2));

    engine.pitch_on(48, now + Duration::from_millis(400));
    assert_eq!(engine.current_position(), Some(3));
}

#[test]
fn new_feedback_replaces_pending_timers() {
    let mut engine = engine_with(HandMode::Both);
    let now = Instant::now();
    click(&mut engine, 2);

    engine.pitch_on(64, now);
    engine.pitch_on(70, now + Duration::from_millis(200));
    assert_eq!(engine.pending_timers(), 2);
    assert_eq!(engine.next_deadline(), Some(now + Duration::from_millis(500)));

    engine.advance_timers(now + Duration::from_millis(300));
    assert_eq!(engine.status(), PracticeStatus::MatchedPartial);
}

#[test]
fn releasing_everything_restores_focus() {
    let mut engine = engine_with(HandMode::Both);
    let now = Instant::now();
    click(&mut engine, 0);
    let chord = boxes(&engine, 0)[0];

    engine.pitch_on(61, now);
    assert_eq!(fill(&engine, chord), Fill::Wrong);

    engine.pitch_off(61, now);
    assert_eq!(fill(&engine, chord), Fill::Focused);
    assert_eq!(engine.status(), PracticeStatus::Focused);
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn right_hand_mode_ignores_left_notes() {
    let mut engine = engine_with(HandMode::Right);
    let now = Instant::now();
    click(&mut engine, 2);
    let (right, left) = both_hands(&engine, 2);
    assert_eq!(fill(&engine, left), Fill::Transparent);

    engine.pitch_on(48, now);
    assert_eq!(fill(&engine, right), Fill::Wrong);
    assert_eq!(fill(&engine, left), Fill::Transparent);

    engine.pitch_on(64, now);
    assert_eq!(engine.current_position(), Some(3));
    assert_eq!(fill(&engine, left), Fill::Transparent);
}

#[test]
fn left_hand_mode_skips_to_completion() {
    let mut engine = engine_with(HandMode::Left);
    let left = boxes(&engine, 2)[1];
    engine.click_hit_box(left);
    assert_eq!(engine.current_position(), Some(2));

    engine.pitch_on(48, Instant::now());
    assert_eq!(engine.status(), PracticeStatus::MatchedComplete);
    assert!(engine.drain_events().contains(&EngineEvent::PracticeCompleted));
}

#[test]
fn last_note_completes_after_scrolling() {
    let mut engine = engine_with(HandMode::Right);
    let now = Instant::now();
    click(&mut engine, 3);
    engine.drain_events();

    engine.pitch_on(65, now);
    assert_eq!(engine.current_position(), Some(4));
    assert!(engine.drain_events().contains(&EngineEvent::ScrollIntoView { row: 1 }));

    engine.pitch_off(65, now);
    engine.pitch_on(67, now);
    assert_eq!(engine.status(), PracticeStatus::MatchedComplete);
    assert_eq!(engine.current_position(), None);
    assert_eq!(fill(&engine, boxes(&engine, 4)[0]), Fill::Transparent);
    assert_eq!(engine.drain_events().last(), Some(&EngineEvent::PracticeCompleted));

    // no current cursor: further input is ignored
    engine.pitch_on(60, now);
    assert!(engine.drain_events().is_empty());
}

// ─── Hand mode ──────────────────────────────────────────────────────

#[test]
fn switching_hands_keeps_position() {
    let mut engine = engine_with(HandMode::Both);
    click(&mut engine, 2);
    let (right, left) = both_hands(&engine, 2);
    engine.pitch_on(64, Instant::now());
    engine.drain_events();

    engine.set_hand_mode(HandMode::Right);
    assert_eq!(engine.current_position(), Some(2));
    assert_eq!(engine.pending_timers(), 0);
    assert_eq!(fill(&engine, right), Fill::Focused);
    assert_eq!(fill(&engine, left), Fill::Transparent);
    assert_eq!(engine.app_state().hand_mode, HandMode::Right);

    let dimmed: Vec<(usize, bool)> = engine
        .drain_events()
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StaffLine { staff_line, dimmed } => Some((*staff_line, *dimmed)),
            _ => None,
        })
        .collect();
    assert_eq!(dimmed, vec![(0, false), (1, true), (2, false), (3, true)]);
}

#[test]
fn hand_switch_leaves_a_cursor_it_cannot_play() {
    let mut engine = engine_with(HandMode::Both);
    click(&mut engine, 0);
    let chord = boxes(&engine, 0)[0];
    let (_, left) = both_hands(&engine, 2);

    // the opening chord is right hand only
    engine.set_hand_mode(HandMode::Left);
    assert_eq!(engine.current_position(), Some(2));
    assert_eq!(engine.status(), PracticeStatus::Focused);
    assert_eq!(fill(&engine, chord), Fill::Transparent);
    assert_eq!(fill(&engine, left), Fill::Focused);
    engine.drain_events();

    engine.pitch_on(99, Instant::now());
    assert_eq!(engine.current_position(), Some(2));
    assert_eq!(engine.status(), PracticeStatus::MatchedPartial);
    assert_eq!(fill(&engine, left), Fill::Wrong);
}

// ─── Loop region ────────────────────────────────────────────────────

#[test]
fn loop_boundaries_activate_and_wrap() {
    let mut engine = engine_with(HandMode::Right);
    let now = Instant::now();

    engine.enter_loop_mode();
    assert_eq!(
        engine.drain_events(),
        vec![EngineEvent::LoopPrompt { awaiting: BoundaryKind::Start }]
    );

    click(&mut engine, 1);
    assert!(matches!(engine.loop_state(), LoopState::AwaitingEnd { .. }));
    assert_eq!(engine.status(), PracticeStatus::NoCursor);
    let start_x = 70.0 * (1.0 - 0.01);
    assert_eq!(
        engine.drain_events(),
        vec![
            EngineEvent::LoopLineDrawn {
                kind: BoundaryKind::Start,
                line: GuideLine { x: start_x, y1: 0.0, y2: 120.0 * (1.0 + 0.02) },
            },
            EngineEvent::LoopPrompt { awaiting: BoundaryKind::End },
        ]
    );

    click(&mut engine, 2);
    assert!(matches!(engine.loop_state(), LoopState::Active { .. }));
    assert_eq!(engine.current_position(), Some(1));
    let end_x = 120.0 * (1.0 + 0.01);
    let events = engine.drain_events();
    assert!(events.contains(&EngineEvent::RowsHighlighted {
        rects: vec![Rect::new(start_x, 0.0, end_x - start_x, 120.0)],
    }));

    engine.pitch_on(62, now);
    assert_eq!(engine.current_position(), Some(2));
    engine.pitch_off(62, now);
    engine.pitch_on(64, now);
    assert_eq!(engine.current_position(), Some(1));
}

#[test]
fn clicks_outside_an_active_loop_are_rejected() {
    let mut engine = engine_with(HandMode::Right);
    engine.enter_loop_mode();
    click(&mut engine, 1);
    click(&mut engine, 2);
    engine.drain_events();

    click(&mut engine, 0);
    click(&mut engine, 3);
    click(&mut engine, 4);
    assert_eq!(
        rejections(&engine.drain_events()),
        vec![
            RejectReason::BeforeLoopStart,
            RejectReason::AfterLoopEnd,
            RejectReason::OutsideLoopRows,
        ]
    );
    assert_eq!(engine.current_position(), Some(1));

    click(&mut engine, 2);
    assert_eq!(engine.current_position(), Some(2));
}

#[test]
fn loop_end_before_start_is_rejected() {
    let mut engine = engine_with(HandMode::Both);
    engine.enter_loop_mode();
    click(&mut engine, 3);
    engine.drain_events();

    click(&mut engine, 1);
    assert_eq!(rejections(&engine.drain_events()), vec![RejectReason::EndBeforeStart]);
    assert!(matches!(engine.loop_state(), LoopState::AwaitingEnd { .. }));
}

#[test]
fn leaving_loop_mode_clears_guides() {
    let mut engine = engine_with(HandMode::Right);
    engine.set_play_mode(PlayMode::Loop);
    click(&mut engine, 1);
    click(&mut engine, 2);
    engine.drain_events();

    engine.leave_loop_mode();
    assert_eq!(engine.loop_state(), &LoopState::Idle);
    assert_eq!(engine.app_state().play_mode, PlayMode::Normal);
    assert_eq!(
        engine.drain_events(),
        vec![EngineEvent::LoopLinesRemoved, EngineEvent::HighlightsCleared]
    );
    assert_eq!(engine.current_position(), Some(1));
}

// ─── Render lifecycle and input ─────────────────────────────────────

#[test]
fn rerender_restores_focus_and_drops_loop() {
    let mut engine = engine_with(HandMode::Both);
    engine.enter_loop_mode();
    click(&mut engine, 1);
    click(&mut engine, 3);
    engine.pitch_on(50, Instant::now());
    assert_eq!(engine.pending_timers(), 1);

    let tree = render(engine.score().unwrap(), 2);
    engine.on_render_complete(&tree).unwrap();

    assert_eq!(engine.pending_timers(), 0);
    assert_eq!(engine.current_position(), Some(1));
    assert_eq!(engine.status(), PracticeStatus::Focused);
    assert_eq!(fill(&engine, boxes(&engine, 1)[0]), Fill::Focused);
    assert_eq!(engine.loop_state(), &LoopState::AwaitingStart);
    assert_eq!(engine.overlay().row_count(), 1);
}

#[test]
fn rerender_with_mismatched_tree_fails() {
    let mut engine = engine_with(HandMode::Both);
    click(&mut engine, 0);

    let mut tree = render(engine.score().unwrap(), 1);
    let line = tree.staff_lines[3];
    tree.nodes[line].children.clear();

    let err = engine.on_render_complete(&tree).unwrap_err();
    assert!(matches!(err, Error::Correlation(_)));
    assert!(engine.cursors().is_empty());
    assert_eq!(engine.current_position(), None);
}

#[test]
fn device_codes_drive_matching() {
    let mut engine = engine_with(HandMode::Both);
    let now = Instant::now();
    click(&mut engine, 1);

    engine.handle_packet(&[0x80, 0x80, 0x90, 62, 100], now).unwrap();
    assert_eq!(engine.current_position(), Some(2));
    assert!(engine.ringing().contains(62));

    engine.handle_code(0x80, 62, now).unwrap();
    assert!(engine.ringing().is_empty());

    assert_eq!(
        engine.handle_code(0xB0, 64, now),
        Err(InputError::UnknownEvent { code: 0xB0 })
    );
    assert_eq!(
        engine.handle_packet(&[0x80, 0x80], now),
        Err(InputError::ShortPacket { len: 2 })
    );
}

#[test]
fn invalid_source_is_reported() {
    let state = AppState {
        score_source: Some("<score-partwise>".to_string()),
        ..AppState::default()
    };
    assert!(matches!(
        PracticeEngine::new(state, PracticeConfig::default()),
        Err(Error::Parse(_))
    ));
}

#[test]
fn parsed_score_replaces_the_stored_source() {
    let mut engine = engine_with(HandMode::Both);
    let other = parse_musicxml(
        r#"<score-partwise>
  <work><work-title>Other</work-title></work>
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1"><measure number="1">
    <note><pitch><step>A</step><octave>4</octave></pitch><duration>4</duration></note>
  </measure></part>
</score-partwise>"#,
    )
    .unwrap();
    engine.load_parsed(other);
    assert_eq!(engine.score().unwrap().title.as_deref(), Some("Other"));
    assert_eq!(engine.app_state().score_source, None);

    let rebuilt = PracticeEngine::new(engine.app_state().clone(), PracticeConfig::default()).unwrap();
    assert!(rebuilt.score().is_none());
}

#[test]
fn drained_json_carries_paint() {
    let mut engine = engine_with(HandMode::Both);
    click(&mut engine, 1);
    let json: serde_json::Value = serde_json::from_str(&engine.drain_events_json()).unwrap();
    let config = PracticeConfig::default();
    assert_eq!(json[0]["type"], "hit_box_fill");
    assert_eq!(json[0]["fill"], "focused");
    assert_eq!(json[0]["color"], config.focus_color.as_str());
    assert!(engine.drain_events().is_empty());
}
