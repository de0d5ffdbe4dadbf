//! Engine facade: owns the board, transposition table and search context
//! behind one mutex, runs a long-lived search worker, and reports results
//! through an event callback.
//!
//! The worker blocks on a job channel; on wake it locks the shared state
//! for the whole search, streams `Info` events, emits exactly one
//! `BestMove` per job, then blocks again. Protocol commands that mutate
//! the board first cancel and wait for that `BestMove`.

pub mod time;

use crate::board::{Board, Color, START_FEN};
use crate::book::OpeningBook;
use crate::moves::execute::{make_move, unmake_move};
use crate::moves::movegen::{generate_moves, move_from_uci};
use crate::moves::types::{Move, MoveList};
use crate::search::context::SearchContext;
use crate::search::search::{SearchInfo, Searcher};
use crate::search::tt::TranspositionTable;
use crate::search::MAX_DEPTH;
use crate::status::position_status;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bad FEN: {0}")]
    Fen(String),
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("bad value for option {name}: {value}")]
    InvalidValue { name: String, value: String },
    #[error("cannot decode move: {0}")]
    BadMove(String),
}

/// Out-edges of the engine. `BestMove` is emitted exactly once per `go`.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    BestMove { best: Move, ponder: Option<Move> },
    Info(SearchInfo),
    Diagnostic(String),
}

pub type EventSink = Arc<dyn Fn(EngineEvent) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub hash_mb: usize,
    pub ponder: bool,
    pub own_book: bool,
    pub book_path: String,
}

impl Default for EngineOptions {
    fn default() -> EngineOptions {
        EngineOptions {
            hash_mb: TranspositionTable::DEFAULT_SIZE_MB,
            ponder: false,
            own_book: true,
            book_path: "book.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GoParams {
    /// Wall-clock budget; `None` searches until stopped.
    pub budget: Option<Duration>,
    pub max_depth: i32,
    pub ponder: bool,
}

impl Default for GoParams {
    fn default() -> GoParams {
        GoParams {
            budget: None,
            max_depth: MAX_DEPTH,
            ponder: false,
        }
    }
}

struct Shared {
    board: Board,
    tt: TranspositionTable,
    ctx: SearchContext,
}

struct PonderRecord {
    /// FEN of the position before the opponent's predicted move.
    fen: String,
    /// The predicted move itself.
    mv: Move,
    /// Think time computed when the ponder was requested.
    think: Option<Duration>,
}

struct Job {
    max_depth: i32,
    emit_ponder: bool,
}

pub struct Engine {
    shared: Arc<Mutex<Shared>>,
    abort: Arc<AtomicBool>,
    /// Suppresses the next `BestMove`; set by `ponderhit` before cancelling.
    discard_next: Arc<AtomicBool>,
    generation: Arc<AtomicU64>,
    searching: Arc<(Mutex<bool>, Condvar)>,
    jobs: Option<mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
    sink: EventSink,
    options: EngineOptions,
    book: Option<OpeningBook>,
    ponder_record: Option<PonderRecord>,
    pondering: bool,
    /// Side to move of the protocol-visible position. Cached so commands
    /// can consult it without touching the board the worker may hold.
    side: Color,
}

fn lock_shared(shared: &Mutex<Shared>) -> std::sync::MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
fn emit(sink: &EventSink, event: EngineEvent) {
    (sink.as_ref())(event);
}

impl Engine {
    pub fn new(options: EngineOptions, sink: EventSink) -> Engine {
        let shared = Arc::new(Mutex::new(Shared {
            board: Board::new(),
            tt: TranspositionTable::new(options.hash_mb),
            ctx: SearchContext::new(),
        }));
        let abort = Arc::new(AtomicBool::new(false));
        let discard_next = Arc::new(AtomicBool::new(false));
        let generation = Arc::new(AtomicU64::new(0));
        let searching = Arc::new((Mutex::new(false), Condvar::new()));
        let (tx, rx) = mpsc::channel::<Job>();

        let book = match OpeningBook::load(&options.book_path) {
            Ok(book) => {
                emit(
                    &sink,
                    EngineEvent::Diagnostic(format!(
                        "opening book loaded: {} positions",
                        book.len()
                    )),
                );
                Some(book)
            }
            Err(_) => None,
        };

        let worker = {
            let shared = shared.clone();
            let abort = abort.clone();
            let discard_next = discard_next.clone();
            let searching = searching.clone();
            let sink = sink.clone();
            std::thread::Builder::new()
                .name("search-worker".to_string())
                .spawn(move || worker_loop(rx, shared, abort, discard_next, searching, sink))
                .expect("spawn search worker")
        };

        Engine {
            shared,
            abort,
            discard_next,
            generation,
            searching,
            jobs: Some(tx),
            worker: Some(worker),
            sink,
            options,
            book,
            ponder_record: None,
            pondering: false,
            side: Color::White,
        }
    }

    /// Cancel any running search and wait for its `bestmove` to go out.
    fn ensure_idle(&self) {
        self.abort.store(true, Ordering::SeqCst);
        let (lock, cvar) = &*self.searching;
        let mut searching = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while *searching {
            searching = cvar.wait(searching).unwrap_or_else(PoisonError::into_inner);
        }
        self.abort.store(false, Ordering::SeqCst);
    }

    pub fn new_game(&mut self) {
        self.ensure_idle();
        self.pondering = false;
        self.ponder_record = None;
        let mut shared = lock_shared(&self.shared);
        shared.board = Board::new();
        shared.tt.clear();
        shared.ctx.clear_all();
        self.side = Color::White;
    }

    /// Load a position and replay a move list. Clears the transposition and
    /// killer/history tables, as a fresh root invalidates both.
    ///
    /// The replay runs on a scratch board first; the live board is only
    /// replaced once the whole list has decoded, so a bad move anywhere in
    /// it leaves the engine exactly as it was.
    pub fn set_position(&mut self, fen: Option<&str>, moves: &[String]) -> Result<(), EngineError> {
        self.ensure_idle();
        self.pondering = false;

        let mut board = Board::new_empty();
        board
            .set_fen(fen.unwrap_or(START_FEN))
            .map_err(EngineError::Fen)?;
        for text in moves {
            let mv = move_from_uci(&board, text)
                .ok_or_else(|| EngineError::BadMove(text.clone()))?;
            make_move(&mut board, mv, false);
        }

        let mut shared = lock_shared(&self.shared);
        self.side = board.side_to_move;
        shared.board = board;
        shared.tt.clear();
        shared.ctx.clear_all();
        Ok(())
    }

    pub fn set_option(&mut self, name: &str, value: &str) -> Result<(), EngineError> {
        match name.to_ascii_lowercase().as_str() {
            "hash" => {
                let mb: usize = value.parse().map_err(|_| EngineError::InvalidValue {
                    name: name.to_string(),
                    value: value.to_string(),
                })?;
                let capped = mb.clamp(1, TranspositionTable::MAX_SIZE_MB);
                if capped != mb {
                    tracing::warn!(requested = mb, capped, "hash size capped");
                }
                self.ensure_idle();
                self.options.hash_mb = capped;
                lock_shared(&self.shared).tt.resize(capped);
                Ok(())
            }
            "ponder" => {
                self.options.ponder = value.eq_ignore_ascii_case("true");
                Ok(())
            }
            "ownbook" => {
                self.options.own_book = value.eq_ignore_ascii_case("true");
                Ok(())
            }
            _ => Err(EngineError::UnknownOption(name.to_string())),
        }
    }

    pub fn side_to_move(&self) -> Color {
        self.side
    }

    /// Start a search. Cancels and flushes any search still running, so the
    /// previous `bestmove` is always emitted first.
    pub fn go(&mut self, params: GoParams) {
        self.ensure_idle();

        if params.ponder {
            self.start_ponder(params);
            return;
        }
        self.pondering = false;

        if self.options.own_book && params.budget.is_some() {
            if let Some(mv) = self.probe_book() {
                emit(&self.sink, EngineEvent::Diagnostic("book move".to_string()));
                emit(
                    &self.sink,
                    EngineEvent::BestMove {
                        best: mv,
                        ponder: None,
                    },
                );
                return;
            }
        }

        self.dispatch(params.budget, params.max_depth);
    }

    fn probe_book(&self) -> Option<Move> {
        let shared = lock_shared(&self.shared);
        self.book.as_ref().and_then(|b| b.probe(&shared.board))
    }

    /// Think on the opponent's time: undo the predicted move, remember how
    /// to redo it, and search the pre-move position without a budget.
    fn start_ponder(&mut self, params: GoParams) {
        {
            let mut shared = lock_shared(&self.shared);
            let record = match shared.board.move_history.last().copied() {
                Some(last) => {
                    unmake_move(&mut shared.board, last, false);
                    PonderRecord {
                        fen: shared.board.to_fen(),
                        mv: last,
                        think: params.budget,
                    }
                }
                None => PonderRecord {
                    fen: shared.board.to_fen(),
                    mv: Move::NULL,
                    think: params.budget,
                },
            };
            self.ponder_record = Some(record);
        }
        self.pondering = true;
        self.dispatch(None, params.max_depth);
    }

    /// The expected move arrived: convert the ponder search into a normal
    /// timed search from the real position.
    pub fn ponder_hit(&mut self) {
        if !self.pondering {
            return;
        }
        self.discard_next.store(true, Ordering::SeqCst);
        self.ensure_idle();
        self.discard_next.store(false, Ordering::SeqCst);
        self.pondering = false;

        let record = match self.ponder_record.take() {
            Some(record) => record,
            None => return,
        };
        {
            let mut shared = lock_shared(&self.shared);
            if shared.board.set_fen(&record.fen).is_err() {
                tracing::error!(fen = %record.fen, "ponder FEN failed to reload");
                return;
            }
            if !record.mv.is_null() {
                make_move(&mut shared.board, record.mv, false);
            }
        }
        self.dispatch(record.think, MAX_DEPTH);
    }

    /// Cooperative cancel; the worker still emits its `bestmove`.
    pub fn stop(&mut self) {
        self.ensure_idle();
        self.pondering = false;
    }

    fn dispatch(&mut self, budget: Option<Duration>, max_depth: i32) {
        let Some(jobs) = &self.jobs else { return };

        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(budget) = budget {
            time::arm_timeout(self.abort.clone(), self.generation.clone(), id, budget);
        }

        let (lock, _) = &*self.searching;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = true;

        let _ = jobs.send(Job {
            max_depth,
            emit_ponder: self.options.ponder,
        });
    }

    /// Board diagram plus status line, for the `d` command.
    pub fn diagnostics(&self) -> String {
        let shared = lock_shared(&self.shared);
        let status = position_status(&shared.board);
        format!("{}\nstatus: {:?}", shared.board, status)
    }

    pub fn quit(&mut self) {
        self.ensure_idle();
        self.jobs.take(); // closes the channel; the worker loop exits
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.quit();
    }
}

fn worker_loop(
    rx: mpsc::Receiver<Job>,
    shared: Arc<Mutex<Shared>>,
    abort: Arc<AtomicBool>,
    discard_next: Arc<AtomicBool>,
    searching: Arc<(Mutex<bool>, Condvar)>,
    sink: EventSink,
) {
    while let Ok(job) = rx.recv() {
        let mut guard = lock_shared(&shared);

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let shared = &mut *guard;
            let mut searcher =
                Searcher::new(&mut shared.board, &mut shared.tt, &mut shared.ctx, &abort);
            let info_sink = sink.clone();
            let result = searcher.run(job.max_depth, move |info| {
                emit(&info_sink, EngineEvent::Info(info));
            });
            let ponder = if job.emit_ponder && !result.best_move.is_null() {
                let mv = searcher.ponder_move();
                (!mv.is_null()).then_some(mv)
            } else {
                None
            };
            (result.best_move, ponder)
        }));

        match outcome {
            Ok((best, ponder)) => {
                if !discard_next.swap(false, Ordering::SeqCst) {
                    emit(&sink, EngineEvent::BestMove { best, ponder });
                }
            }
            Err(_) => {
                // invariant violation inside the search: report everything
                // needed to reproduce it, then still answer the go
                report_fatal(&guard.board, &sink);
                let best = catch_unwind(AssertUnwindSafe(|| {
                    let mut moves = MoveList::new();
                    generate_moves(&guard.board, &mut moves, false);
                    moves.first().copied().unwrap_or(Move::NULL)
                }))
                .unwrap_or(Move::NULL);
                if !discard_next.swap(false, Ordering::SeqCst) {
                    emit(&sink, EngineEvent::BestMove { best, ponder: None });
                }
            }
        }
        drop(guard);

        let (lock, cvar) = &*searching;
        *lock.lock().unwrap_or_else(PoisonError::into_inner) = false;
        cvar.notify_all();
    }
}

fn report_fatal(board: &Board, sink: &EventSink) {
    tracing::error!("fatal error during search");
    let moves: Vec<String> = board.move_history.iter().map(|m| m.to_uci()).collect();
    emit(
        sink,
        EngineEvent::Diagnostic(format!(
            "fatal search error; game moves: {}",
            moves.join(" ")
        )),
    );
    for line in board.to_string().lines() {
        emit(sink, EngineEvent::Diagnostic(line.to_string()));
    }
    if let Err(problem) = board.validate() {
        emit(
            sink,
            EngineEvent::Diagnostic(format!("board validation: {problem}")),
        );
    }
}
