use meridian::board::{Board, Color};
use meridian::engine::{Engine, EngineEvent, EngineOptions, GoParams};
use meridian::moves::movegen::generate_moves;
use meridian::moves::types::{Move, MoveList};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Events = Arc<Mutex<Vec<EngineEvent>>>;

fn make_engine() -> (Engine, Events) {
    let events: Events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = events.clone();
    let options = EngineOptions {
        own_book: false,
        ..Default::default()
    };
    let engine = Engine::new(
        options,
        Arc::new(move |event| sink_events.lock().unwrap().push(event)),
    );
    (engine, events)
}

fn best_moves(events: &Events) -> Vec<(Move, Option<Move>)> {
    events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            EngineEvent::BestMove { best, ponder } => Some((*best, *ponder)),
            _ => None,
        })
        .collect()
}

fn wait_for_best_moves(events: &Events, count: usize, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if best_moves(events).len() >= count {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!(
        "timed out waiting for {count} bestmove event(s); saw {}",
        best_moves(events).len()
    );
}

/// `go movetime 100` from the start position answers promptly with one of
/// the twenty legal opening moves.
#[test]
fn movetime_go_produces_one_legal_bestmove() {
    let (mut engine, events) = make_engine();
    engine.set_position(None, &[]).unwrap();

    let started = Instant::now();
    engine.go(GoParams {
        budget: Some(Duration::from_millis(100)),
        ..Default::default()
    });
    wait_for_best_moves(&events, 1, Duration::from_secs(3));
    assert!(started.elapsed() < Duration::from_secs(3));

    let moves = best_moves(&events);
    assert_eq!(moves.len(), 1);

    let board = Board::new();
    let mut legal = MoveList::new();
    generate_moves(&board, &mut legal, false);
    assert_eq!(legal.len(), 20);
    assert!(legal.contains(&moves[0].0));

    engine.quit();
}

#[test]
fn stop_yields_exactly_one_bestmove() {
    let (mut engine, events) = make_engine();
    engine.set_position(None, &[]).unwrap();

    engine.go(GoParams::default()); // infinite
    std::thread::sleep(Duration::from_millis(60));
    engine.stop();
    wait_for_best_moves(&events, 1, Duration::from_secs(3));

    // nothing further arrives after the stop
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(best_moves(&events).len(), 1);

    engine.quit();
}

#[test]
fn sequential_gos_emit_in_order() {
    let (mut engine, events) = make_engine();
    engine.set_position(None, &[]).unwrap();
    engine.go(GoParams {
        budget: Some(Duration::from_millis(40)),
        ..Default::default()
    });
    wait_for_best_moves(&events, 1, Duration::from_secs(3));

    engine
        .set_position(None, &["e2e4".to_string(), "e7e5".to_string()])
        .unwrap();
    engine.go(GoParams {
        budget: Some(Duration::from_millis(40)),
        ..Default::default()
    });
    wait_for_best_moves(&events, 2, Duration::from_secs(3));
    assert_eq!(best_moves(&events).len(), 2);

    engine.quit();
}

/// A new `go` while a search is still running flushes the previous
/// `bestmove` first, keeping one answer per request.
#[test]
fn overlapping_go_flushes_previous_search() {
    let (mut engine, events) = make_engine();
    engine.set_position(None, &[]).unwrap();
    engine.go(GoParams::default()); // infinite
    std::thread::sleep(Duration::from_millis(40));
    engine.go(GoParams {
        budget: Some(Duration::from_millis(40)),
        ..Default::default()
    });
    wait_for_best_moves(&events, 2, Duration::from_secs(3));
    assert_eq!(best_moves(&events).len(), 2);

    engine.quit();
}

/// Scenario: ponder on the predicted reply, then `ponderhit` converts the
/// search into a timed one; exactly one `bestmove` comes out.
#[test]
fn ponderhit_emits_a_single_bestmove() {
    let (mut engine, events) = make_engine();
    engine
        .set_position(None, &["e2e4".to_string(), "e7e5".to_string()])
        .unwrap();

    engine.go(GoParams {
        budget: Some(Duration::from_millis(80)),
        ponder: true,
        ..Default::default()
    });
    std::thread::sleep(Duration::from_millis(60));
    assert!(best_moves(&events).is_empty(), "pondering must not answer");

    engine.ponder_hit();
    wait_for_best_moves(&events, 1, Duration::from_secs(3));
    std::thread::sleep(Duration::from_millis(150));
    let moves = best_moves(&events);
    assert_eq!(moves.len(), 1);

    // the answer is for the position with e7e5 played
    let mut board = Board::new();
    board
        .set_fen("rnbqkbnr/pppp1ppp/8/4p3/4P3/8/PPPP1PPP/RNBQKBNR w KQkq - 0 2")
        .unwrap();
    let mut legal = MoveList::new();
    generate_moves(&board, &mut legal, false);
    assert!(legal.contains(&moves[0].0));

    engine.quit();
}

/// Scenario: the host aborts the ponder with `stop`; still exactly one
/// `bestmove`, and silence afterwards.
#[test]
fn stop_during_ponder_emits_a_single_bestmove() {
    let (mut engine, events) = make_engine();
    engine
        .set_position(None, &["e2e4".to_string(), "e7e5".to_string()])
        .unwrap();

    engine.go(GoParams {
        budget: Some(Duration::from_millis(80)),
        ponder: true,
        ..Default::default()
    });
    std::thread::sleep(Duration::from_millis(60));
    engine.stop();
    wait_for_best_moves(&events, 1, Duration::from_secs(3));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(best_moves(&events).len(), 1);

    engine.quit();
}

#[test]
fn hash_option_resizes_and_bad_options_error() {
    let (mut engine, _events) = make_engine();
    engine.set_option("Hash", "8").unwrap();
    engine.set_option("Ponder", "true").unwrap();
    assert!(engine.set_option("Hash", "zero").is_err());
    assert!(engine.set_option("MultiPV", "2").is_err());
    engine.quit();
}

#[test]
fn ponder_option_attaches_expected_reply() {
    let (mut engine, events) = make_engine();
    engine.set_option("Ponder", "true").unwrap();
    engine.set_position(None, &[]).unwrap();
    engine.go(GoParams {
        budget: Some(Duration::from_millis(150)),
        ..Default::default()
    });
    wait_for_best_moves(&events, 1, Duration::from_secs(3));
    let (_, ponder) = best_moves(&events)[0];
    // a ponder move is optional in principle, but from the start position
    // the principal variation is always at least two plies deep
    assert!(ponder.is_some());
    engine.quit();
}

#[test]
fn bad_position_is_rejected_without_side_effects() {
    let (mut engine, _events) = make_engine();
    assert!(engine.set_position(Some("not a fen"), &[]).is_err());
    assert!(engine
        .set_position(None, &["e2e5".to_string()])
        .is_err());

    // a failure part-way through the list must not commit the earlier moves
    engine.set_position(None, &[]).unwrap();
    let before = engine.diagnostics();
    let moves: Vec<String> = ["e2e4", "e7e5", "g1g5"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert!(engine.set_position(None, &moves).is_err());
    assert_eq!(engine.side_to_move(), Color::White);
    assert_eq!(engine.diagnostics(), before, "board changed by rejected replay");

    engine.quit();
}
