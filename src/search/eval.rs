//! Classical evaluation: material, piece-square tables, pawn structure,
//! king safety and an endgame mop-up term. Stateless and cheap enough to
//! call at every quiescence leaf. Returns the score relative to the side
//! to move.

use crate::bitboard::{file_mask, BitboardExt};
use crate::board::{Board, Color, PieceKind};
use crate::moves::tables;
use crate::search::psqt;
use crate::square::Square;

/// Two rooks, a bishop and a knight: below this the enemy is considered to
/// be sliding into the endgame.
const ENDGAME_MATERIAL_START: f32 = (PieceKind::Rook.value() * 2
    + PieceKind::Bishop.value()
    + PieceKind::Knight.value()) as f32;

/// Indexed by squares from promotion (1..6; a pawn is never 0 away).
const PASSED_PAWN_BONUSES: [i32; 7] = [0, 120, 80, 50, 30, 15, 15];

/// Indexed by how many friendly pawns are isolated.
const ISOLATED_PAWN_PENALTY_BY_COUNT: [i32; 9] = [0, -10, -25, -50, -75, -75, -75, -75, -75];

/// Weights for the three squares directly ahead of a flank king.
const KING_SHIELD_SCORES: [i32; 3] = [4, 7, 4];

const OPEN_FILE_AGAINST_KING_PENALTY: i32 = 25;
const SEMI_OPEN_FILE_AGAINST_KING_PENALTY: i32 = 15;

/// Evaluate the position for the side to move:
/// `(white − black) × (white to move ? 1 : −1)`.
pub fn evaluate(board: &Board) -> i32 {
    let white = color_eval(board, Color::White);
    let black = color_eval(board, Color::Black);
    let perspective = match board.side_to_move {
        Color::White => 1,
        Color::Black => -1,
    };
    (white - black) * perspective
}

fn color_eval(board: &Board, us: Color) -> i32 {
    let them = us.opposite();
    let material = material_score(board, us);
    let enemy_material = material_score(board, them);

    // our endgame transition is driven by how much enemy attacking
    // material is left
    let endgame_t = endgame_transition(board.non_pawn_material(them) as f32);

    let mut score = material;
    score += piece_square_score(board, us, endgame_t);
    score += pawn_structure_score(board, us);
    score += king_safety(board, us, endgame_t);
    score += mop_up(board, us, material, enemy_material, endgame_t);
    score
}

fn material_score(board: &Board, us: Color) -> i32 {
    let mut score = 0;
    for kind in [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
    ] {
        score += kind.value() * board.list(us, kind).count() as i32;
    }
    score
}

/// 0 at full material, 1 once `ENDGAME_MATERIAL_START` worth of enemy
/// pieces has come off the board.
#[inline]
fn endgame_transition(enemy_non_pawn_material: f32) -> f32 {
    1.0 - (enemy_non_pawn_material / ENDGAME_MATERIAL_START).min(1.0)
}

fn piece_square_score(board: &Board, us: Color, endgame_t: f32) -> i32 {
    let mut score = 0;

    for &sq in board.list(us, PieceKind::Knight).squares() {
        score += psqt::read(&psqt::KNIGHT, sq, us);
    }
    for &sq in board.list(us, PieceKind::Bishop).squares() {
        score += psqt::read(&psqt::BISHOP, sq, us);
    }
    for &sq in board.list(us, PieceKind::Rook).squares() {
        score += psqt::read(&psqt::ROOK, sq, us);
    }
    for &sq in board.list(us, PieceKind::Queen).squares() {
        score += psqt::read(&psqt::QUEEN, sq, us);
    }

    // pawns and the king interpolate between early and endgame tables
    let mut pawn_early = 0;
    let mut pawn_end = 0;
    for &sq in board.list(us, PieceKind::Pawn).squares() {
        pawn_early += psqt::read(&psqt::PAWN, sq, us);
        pawn_end += psqt::read(&psqt::PAWN_END, sq, us);
    }
    score += interpolate(pawn_early, pawn_end, endgame_t);

    let king = board.king_square(us);
    let king_early = psqt::read(&psqt::KING_START, king, us);
    let king_end = psqt::read(&psqt::KING_END, king, us);
    score += interpolate(king_early, king_end, endgame_t);

    score
}

#[inline]
fn interpolate(early: i32, end: i32, t: f32) -> i32 {
    (early as f32 * (1.0 - t) + end as f32 * t) as i32
}

fn pawn_structure_score(board: &Board, us: Color) -> i32 {
    let them = us.opposite();
    let friendly_pawns = board.bb(us, PieceKind::Pawn);
    let enemy_pawns = board.bb(them, PieceKind::Pawn);
    let mut score = 0;
    let mut isolated = 0usize;

    for &sq in board.list(us, PieceKind::Pawn).squares() {
        if passed_mask(us, sq) & enemy_pawns == 0 {
            let squares_from_promotion = match us {
                Color::White => 7 - sq.rank(),
                Color::Black => sq.rank(),
            };
            score += PASSED_PAWN_BONUSES[squares_from_promotion as usize];
        }
        if adjacent_files_mask(sq.file()) & friendly_pawns == 0 {
            isolated += 1;
        }
    }

    score + ISOLATED_PAWN_PENALTY_BY_COUNT[isolated]
}

/// Same and adjacent files, ranks strictly ahead of the pawn.
fn passed_mask(us: Color, sq: Square) -> u64 {
    let files = file_mask(sq.file()) | adjacent_files_mask(sq.file());
    let ahead = match us {
        Color::White => !0u64 << (8 * (sq.rank() as u32 + 1)),
        Color::Black => !0u64 >> (8 * (8 - sq.rank() as u32)),
    };
    files & ahead
}

#[inline]
fn adjacent_files_mask(file: u8) -> u64 {
    let mut mask = 0;
    if file > 0 {
        mask |= file_mask(file - 1);
    }
    if file < 7 {
        mask |= file_mask(file + 1);
    }
    mask
}

/// Squared pawn-shield penalty for a flank king, plus open-file penalties
/// while the enemy keeps heavy pieces. Fades out with the endgame.
fn king_safety(board: &Board, us: Color, endgame_t: f32) -> i32 {
    if endgame_t >= 1.0 {
        return 0;
    }
    let them = us.opposite();
    let king = board.king_square(us);
    let king_file = king.file();

    // a centre king is judged by its table entry, not its shield
    if !(king_file <= 2 || king_file >= 5) {
        return 0;
    }

    let friendly_pawns = board.bb(us, PieceKind::Pawn);
    let mut penalty = 0;

    let shield_rank = match us {
        Color::White => king.rank() + 1,
        Color::Black => king.rank().wrapping_sub(1),
    };
    if shield_rank < 8 {
        let files = [
            king_file.checked_sub(1),
            Some(king_file),
            if king_file < 7 { Some(king_file + 1) } else { None },
        ];
        for (i, file) in files.into_iter().enumerate() {
            if let Some(file) = file {
                let shield_sq = Square::from_coords(shield_rank, file);
                if !friendly_pawns.contains(shield_sq) {
                    penalty += KING_SHIELD_SCORES[i];
                }
            }
        }
    }
    let mut score = -(penalty * penalty);

    // open and half-open files toward the king only matter while the enemy
    // still has rooks or queens to use them
    let enemy_heavy =
        board.bb(them, PieceKind::Rook) != 0 || board.bb(them, PieceKind::Queen) != 0;
    if enemy_heavy {
        let enemy_pawns = board.bb(them, PieceKind::Pawn);
        for file in king_file.saturating_sub(1)..=(king_file + 1).min(7) {
            let mask = file_mask(file);
            if mask & friendly_pawns == 0 {
                score -= if mask & enemy_pawns == 0 {
                    OPEN_FILE_AGAINST_KING_PENALTY
                } else {
                    SEMI_OPEN_FILE_AGAINST_KING_PENALTY
                };
            }
        }
    }

    (score as f32 * (1.0 - endgame_t)) as i32
}

/// When clearly ahead in the endgame, reward driving the enemy king to the
/// edge and walking our own king toward it.
fn mop_up(board: &Board, us: Color, material: i32, enemy_material: i32, endgame_t: f32) -> i32 {
    if material < enemy_material + 2 * PieceKind::Pawn.value() || endgame_t <= 0.0 {
        return 0;
    }
    let our_king = board.king_square(us);
    let enemy_king = board.king_square(us.opposite());
    let mut score = tables::centre_manhattan_distance(enemy_king) as i32 * 10;
    score += (14 - tables::orthogonal_distance(our_king, enemy_king) as i32) * 4;
    (score as f32 * endgame_t) as i32
}
