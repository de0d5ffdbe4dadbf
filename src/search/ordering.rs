//! Move ordering. Each move gets a band score and the list is sorted
//! descending: hash move, winning captures, promotions, killers,
//! history-scored quiets, losing captures.

use crate::board::{Board, PieceKind};
use crate::bitboard::BitboardExt;
use crate::moves::movegen::GenInfo;
use crate::moves::types::Move;
use crate::search::context::{KillerSlots, SearchContext};
use crate::search::psqt;

const HASH_MOVE_SCORE: i32 = 100_000_000;
const WINNING_CAPTURE_BIAS: i32 = 8_000_000;
const PROMOTION_BIAS: i32 = 6_000_000;
const KILLER_BIAS: i32 = 4_000_000;
const LOSING_CAPTURE_BIAS: i32 = -2_000_000;

const PAWN_ATTACKED_PENALTY: i32 = 50;
const PIECE_ATTACKED_PENALTY: i32 = 25;

pub fn order_moves(
    board: &Board,
    moves: &mut [Move],
    hash_move: Move,
    killers: KillerSlots,
    ctx: &SearchContext,
    gen: &GenInfo,
) {
    moves.sort_by_cached_key(|&mv| -score_move(board, mv, hash_move, killers, ctx, gen));
}

fn score_move(
    board: &Board,
    mv: Move,
    hash_move: Move,
    killers: KillerSlots,
    ctx: &SearchContext,
    gen: &GenInfo,
) -> i32 {
    if !hash_move.is_null() && mv == hash_move {
        return HASH_MOVE_SCORE;
    }

    let us = board.side_to_move;
    let start = mv.start();
    let target = mv.target();
    let moved = board.piece_at(start);
    let victim = board.piece_at(target);

    if victim.is_some() || mv.is_en_passant() {
        // MVV-LVA, demoted a band when the opponent can recapture
        let victim_value = if mv.is_en_passant() {
            PieceKind::Pawn.value()
        } else {
            victim.kind().value()
        };
        let delta = victim_value - moved.kind().value();
        let recapturable = (gen.enemy_attack_map | gen.enemy_pawn_attack_map).contains(target);
        return if recapturable && delta < 0 {
            LOSING_CAPTURE_BIAS + delta
        } else {
            WINNING_CAPTURE_BIAS + delta
        };
    }

    // quiet moves; the bonus applies to queen promotions only, other
    // promotion flags fall through to the quiet score
    let mut score = 0;
    if mv.flag() == Move::PROMOTE_QUEEN {
        score += PROMOTION_BIAS;
    } else if killers.matches(mv) {
        score += KILLER_BIAS;
    }
    score += ctx.history_score(us, start, target);

    let table = match moved.kind() {
        PieceKind::Pawn => &psqt::PAWN,
        PieceKind::Knight => &psqt::KNIGHT,
        PieceKind::Bishop => &psqt::BISHOP,
        PieceKind::Rook => &psqt::ROOK,
        PieceKind::Queen => &psqt::QUEEN,
        PieceKind::King => &psqt::KING_START,
    };
    score += psqt::read(table, target, us) - psqt::read(table, start, us);

    if gen.enemy_pawn_attack_map.contains(target) {
        score -= PAWN_ATTACKED_PENALTY;
    } else if gen.enemy_attack_map.contains(target) {
        score -= PIECE_ATTACKED_PENALTY;
    }
    score
}
