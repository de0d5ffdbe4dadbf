//! Iterative-deepening alpha-beta search with quiescence, transposition
//! table, killer/history ordering, late-move reduction, check and
//! near-promotion extensions, and mate-distance pruning.
//!
//! Cancellation is cooperative: one atomic flag, polled at every recursive
//! entry. A cancelled node returns 0 and the caller discards the result.

use crate::board::{Board, PieceKind};
use crate::moves::execute::{is_capture, make_move, unmake_move};
use crate::moves::movegen::generate_moves;
use crate::moves::types::{Move, MoveList};
use crate::search::context::{SearchContext, MAX_KILLER_PLY};
use crate::search::eval::evaluate;
use crate::search::ordering::order_moves;
use crate::search::repetition::RepetitionTable;
use crate::search::tt::{TranspositionTable, BOUND_EXACT, BOUND_LOWER, BOUND_UPPER};
use crate::search::{
    is_mate_score, mate_distance_plies, INFINITY, MATE_SCORE, MAX_DEPTH, MAX_EXTENSIONS,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const INFO_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreReport {
    Cp(i32),
    Mate(i32),
}

impl ScoreReport {
    pub fn from_eval(eval: i32) -> ScoreReport {
        if is_mate_score(eval) {
            let moves = (mate_distance_plies(eval) + 1) / 2;
            ScoreReport::Mate(if eval > 0 { moves } else { -moves })
        } else {
            ScoreReport::Cp(eval)
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchInfo {
    pub depth: i32,
    pub seldepth: i32,
    pub time_ms: u64,
    pub nodes: u64,
    pub nps: u64,
    pub score: ScoreReport,
    pub hashfull: u32,
    pub pv: Vec<Move>,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchResult {
    pub best_move: Move,
    pub eval: i32,
    pub depth: i32,
    pub nodes: u64,
}

pub struct Searcher<'a> {
    board: &'a mut Board,
    tt: &'a mut TranspositionTable,
    ctx: &'a mut SearchContext,
    abort: &'a AtomicBool,
    rep: RepetitionTable,
    nodes: u64,
    seldepth: i32,
    cancelled: bool,
    best_move: Move,
    best_eval: i32,
    iter_move: Move,
    iter_eval: i32,
    iter_root_completed: bool,
    started: Instant,
    last_info: Instant,
}

impl<'a> Searcher<'a> {
    pub fn new(
        board: &'a mut Board,
        tt: &'a mut TranspositionTable,
        ctx: &'a mut SearchContext,
        abort: &'a AtomicBool,
    ) -> Searcher<'a> {
        Searcher {
            board,
            tt,
            ctx,
            abort,
            rep: RepetitionTable::new(),
            nodes: 0,
            seldepth: 0,
            cancelled: false,
            best_move: Move::NULL,
            best_eval: 0,
            iter_move: Move::NULL,
            iter_eval: 0,
            iter_root_completed: false,
            started: Instant::now(),
            last_info: Instant::now(),
        }
    }

    /// Run iterative deepening to at most `max_depth`, invoking `on_info`
    /// with periodic progress reports.
    pub fn run(&mut self, max_depth: i32, mut on_info: impl FnMut(SearchInfo)) -> SearchResult {
        // history restarts each search; killers deliberately persist
        self.ctx.clear_history();
        self.rep.init(&self.board.rep_keys);
        self.started = Instant::now();
        self.last_info = Instant::now();

        let mut completed_depth = 0;
        for depth in 1..=max_depth.clamp(1, MAX_DEPTH) {
            self.iter_move = Move::NULL;
            self.iter_eval = 0;
            self.iter_root_completed = false;

            let root_eval = self.alpha_beta(depth, 0, -INFINITY, INFINITY, 0);

            if self.cancelled {
                // a partially searched iteration is usable once one root
                // move has been fully evaluated
                if self.iter_root_completed {
                    self.best_move = self.iter_move;
                    self.best_eval = self.iter_eval;
                }
                break;
            }

            self.best_move = self.iter_move;
            // a root with no legal moves reports its mate/stalemate score
            self.best_eval = if self.iter_move.is_null() {
                root_eval
            } else {
                self.iter_eval
            };
            completed_depth = depth;

            if self.last_info.elapsed() >= INFO_INTERVAL || is_mate_score(self.best_eval) {
                let info = self.build_info(depth);
                self.last_info = Instant::now();
                on_info(info);
            }

            // a mate proved within this depth cannot be improved upon
            if is_mate_score(self.best_eval) && mate_distance_plies(self.best_eval) <= depth {
                break;
            }
        }

        if self.best_move.is_null() {
            // cancelled before depth 1 finished: fall back to any legal move
            let mut moves = MoveList::new();
            generate_moves(self.board, &mut moves, false);
            if let Some(&mv) = moves.first() {
                self.best_move = mv;
            }
        }

        on_info(self.build_info(completed_depth.max(1)));

        SearchResult {
            best_move: self.best_move,
            eval: self.best_eval,
            depth: completed_depth,
            nodes: self.nodes,
        }
    }

    /// The ponder move: the reply the principal variation expects.
    pub fn ponder_move(&mut self) -> Move {
        let pv = self.extract_pv(2);
        pv.get(1).copied().unwrap_or(Move::NULL)
    }

    fn build_info(&mut self, depth: i32) -> SearchInfo {
        let elapsed = self.started.elapsed();
        let time_ms = elapsed.as_millis() as u64;
        let nps = if time_ms > 0 {
            self.nodes * 1000 / time_ms
        } else {
            self.nodes * 1000
        };
        let pv = self.extract_pv(depth.max(1) as usize);
        SearchInfo {
            depth,
            seldepth: self.seldepth,
            time_ms,
            nodes: self.nodes,
            nps,
            score: ScoreReport::from_eval(self.best_eval),
            hashfull: self.tt.hashfull(),
            pv,
        }
    }

    /// Follow the stored best moves through the table, validating each
    /// against the generator before making it.
    fn extract_pv(&mut self, cap: usize) -> Vec<Move> {
        let mut pv = Vec::new();
        while pv.len() < cap {
            let mv = if pv.is_empty() && !self.best_move.is_null() {
                self.best_move
            } else {
                self.tt.stored_move(self.board.zobrist())
            };
            if mv.is_null() {
                break;
            }
            let mut moves = MoveList::new();
            generate_moves(self.board, &mut moves, false);
            if !moves.contains(&mv) {
                break;
            }
            make_move(self.board, mv, true);
            pv.push(mv);
        }
        for &mv in pv.iter().rev() {
            unmake_move(self.board, mv, true);
        }
        pv
    }

    #[inline(always)]
    fn poll_abort(&mut self) -> bool {
        if !self.cancelled && self.abort.load(Ordering::Relaxed) {
            self.cancelled = true;
        }
        self.cancelled
    }

    fn alpha_beta(
        &mut self,
        ply_remaining: i32,
        ply: i32,
        mut alpha: i32,
        mut beta: i32,
        extensions: i32,
    ) -> i32 {
        if self.poll_abort() {
            return 0;
        }

        let key = self.board.zobrist();

        if ply > 0 {
            if self.board.state.fifty >= 100 || self.rep.contains(key) {
                return 0;
            }
            // mate-distance pruning: even the fastest mate from here cannot
            // beat a shorter one already found
            alpha = alpha.max(-MATE_SCORE + ply);
            beta = beta.min(MATE_SCORE - ply);
            if alpha >= beta {
                return alpha;
            }
        }

        let probe = self.tt.probe(key, ply_remaining, ply, alpha, beta);
        if let Some(score) = probe.score {
            if ply == 0 {
                self.iter_move = probe.mv;
                self.iter_eval = score;
                self.iter_root_completed = true;
            }
            return score;
        }

        if ply_remaining == 0 {
            return self.quiescence(alpha, beta, ply);
        }

        let mut moves = MoveList::new();
        let gen = generate_moves(self.board, &mut moves, false);
        if moves.is_empty() {
            return if gen.in_check {
                -(MATE_SCORE - ply)
            } else {
                0
            };
        }

        let hash_move = if ply == 0 && !self.best_move.is_null() {
            self.best_move
        } else {
            probe.mv
        };
        let killers = self.ctx.killers[(ply as usize).min(MAX_KILLER_PLY - 1)];
        order_moves(self.board, &mut moves, hash_move, killers, self.ctx, &gen);

        // previous move was a capture or pawn move iff the clock reset
        self.rep.push(key, self.board.state.fifty == 0);

        let mut bound = BOUND_UPPER;
        let mut best_in_position = Move::NULL;

        for (index, &mv) in moves.iter().enumerate() {
            let capture = is_capture(self.board, mv);
            make_move(self.board, mv, true);

            let mut extension = 0;
            if extensions < MAX_EXTENSIONS {
                let target = mv.target();
                if self.board.is_in_check() {
                    extension = 1;
                } else if self.board.piece_at(target).kind() == PieceKind::Pawn
                    && (target.rank() == 1 || target.rank() == 6)
                {
                    extension = 1;
                }
            }

            // late-move reduction: a quiet, unextended move far down the
            // ordering gets a reduced null-window look first
            let mut eval = 0;
            let mut needs_full_search = true;
            if extension == 0 && index >= 3 && !capture && ply_remaining >= 3 {
                eval = -self.alpha_beta(ply_remaining - 2, ply + 1, -alpha - 1, -alpha, extensions);
                needs_full_search = eval > alpha;
            }
            if needs_full_search {
                eval = -self.alpha_beta(
                    ply_remaining - 1 + extension,
                    ply + 1,
                    -beta,
                    -alpha,
                    extensions + extension,
                );
            }

            unmake_move(self.board, mv, true);
            self.nodes += 1;

            if self.cancelled {
                self.rep.try_pop();
                return 0;
            }

            if eval >= beta {
                self.tt
                    .store(key, ply_remaining, ply, beta, BOUND_LOWER, mv);
                if !capture {
                    if (ply as usize) < MAX_KILLER_PLY {
                        self.ctx.killers[ply as usize].add(mv);
                    }
                    self.ctx
                        .reward_quiet(self.board.side_to_move, mv, ply_remaining);
                }
                self.rep.try_pop();
                return beta;
            }

            if eval > alpha {
                alpha = eval;
                best_in_position = mv;
                bound = BOUND_EXACT;
                if ply == 0 {
                    self.iter_move = mv;
                    self.iter_eval = eval;
                }
            }
            if ply == 0 {
                self.iter_root_completed = true;
            }
        }

        self.rep.try_pop();
        self.tt
            .store(key, ply_remaining, ply, alpha, bound, best_in_position);
        alpha
    }

    fn quiescence(&mut self, mut alpha: i32, beta: i32, ply: i32) -> i32 {
        if self.poll_abort() {
            return 0;
        }
        self.seldepth = self.seldepth.max(ply);
        self.nodes += 1;

        // stand pat: the static evaluation bounds the node from below,
        // since quiet continuations are not examined here
        let stand_pat = evaluate(self.board);
        if stand_pat >= beta {
            return beta;
        }
        if stand_pat > alpha {
            alpha = stand_pat;
        }

        let mut moves = MoveList::new();
        let gen = generate_moves(self.board, &mut moves, true);
        order_moves(
            self.board,
            &mut moves,
            Move::NULL,
            Default::default(),
            self.ctx,
            &gen,
        );

        for &mv in moves.iter() {
            make_move(self.board, mv, true);
            let eval = -self.quiescence(-beta, -alpha, ply + 1);
            unmake_move(self.board, mv, true);

            if self.cancelled {
                return 0;
            }
            if eval >= beta {
                return beta;
            }
            if eval > alpha {
                alpha = eval;
            }
        }
        alpha
    }
}
