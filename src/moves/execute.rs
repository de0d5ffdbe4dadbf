//! Reversible move execution.
//!
//! `make_move` applies every update incrementally, Zobrist key included,
//! and pushes the prior `GameState`. `unmake_move` reverses the steps in
//! strict inverse order and restores the key from the popped state; nothing
//! is recomputed, so a balanced make/unmake pair returns the board
//! bitwise-identical.

use crate::board::{castle_bits::CASTLING_RIGHT_MASKS, Board, Color, GameState, Piece, PieceKind};
use crate::hash::zobrist;
use crate::moves::types::Move;
use crate::square::Square;

/// Rook relocation for a castle, keyed by king destination.
#[inline(always)]
fn castle_rook_squares(king_target: Square) -> (Square, Square) {
    match king_target {
        Square::G1 => (Square::H1, Square::F1),
        Square::C1 => (Square::A1, Square::D1),
        Square::G8 => (Square::H8, Square::F8),
        Square::C8 => (Square::A8, Square::D8),
        _ => unreachable!("castle move with bad king target"),
    }
}

/// Whether `mv` captures in the current position (the move encoding itself
/// carries no capture bit).
#[inline(always)]
pub fn is_capture(board: &Board, mv: Move) -> bool {
    mv.is_en_passant() || board.piece_at(mv.target()).is_some()
}

pub fn make_move(board: &mut Board, mv: Move, in_search: bool) {
    let us = board.side_to_move;
    let them = us.opposite();
    let start = mv.start();
    let target = mv.target();
    let moved = board.piece_at(start);
    let kind = moved.kind();

    let old_state = board.state;
    let mut key = old_state.key;
    let keys = zobrist::keys();

    // the en passant victim sits one rank behind the target square
    let (captured, capture_sq) = if mv.is_en_passant() {
        let sq = if us == Color::White {
            target.offset(-8)
        } else {
            target.offset(8)
        };
        (Piece::new(PieceKind::Pawn, them), sq)
    } else {
        (board.piece_at(target), target)
    };

    if captured.is_some() {
        board.remove_piece(captured, capture_sq);
        key ^= zobrist::piece_key(them, captured.kind(), capture_sq);
        if captured.kind() != PieceKind::Pawn {
            board.non_pawn_pieces[them.index()] -= 1;
        }
    }

    if let Some(promo) = mv.promotion_kind() {
        board.remove_piece(moved, start);
        board.place_piece(Piece::new(promo, us), target);
        board.non_pawn_pieces[us.index()] += 1;
        key ^= zobrist::piece_key(us, PieceKind::Pawn, start);
        key ^= zobrist::piece_key(us, promo, target);
    } else {
        board.move_piece(moved, start, target);
        key ^= zobrist::piece_key(us, kind, start);
        key ^= zobrist::piece_key(us, kind, target);
    }

    if kind == PieceKind::King {
        board.king_sq[us.index()] = target;
        if mv.is_castle() {
            let (rook_from, rook_to) = castle_rook_squares(target);
            let rook = Piece::new(PieceKind::Rook, us);
            board.move_piece(rook, rook_from, rook_to);
            key ^= zobrist::piece_key(us, PieceKind::Rook, rook_from);
            key ^= zobrist::piece_key(us, PieceKind::Rook, rook_to);
        }
    }

    // a move from or onto a king/rook home square clears the matching rights
    let mut new_castling = old_state.castling;
    if new_castling != 0 {
        new_castling &= CASTLING_RIGHT_MASKS[start.usize()];
        new_castling &= CASTLING_RIGHT_MASKS[target.usize()];
    }

    let new_ep_file = if mv.is_pawn_two_up() {
        start.file() + 1
    } else {
        0
    };

    key ^= keys.ep_file[old_state.ep_file as usize];
    key ^= keys.ep_file[new_ep_file as usize];
    if new_castling != old_state.castling {
        key ^= keys.castling[old_state.castling as usize];
        key ^= keys.castling[new_castling as usize];
    }
    key ^= keys.side_to_move;

    board.side_to_move = them;
    board.ply_count += 1;
    if us == Color::Black {
        board.fullmove_number += 1;
    }

    let irreversible = kind == PieceKind::Pawn || captured.is_some();
    let fifty = if irreversible { 0 } else { old_state.fifty + 1 };

    board.state_stack.push(old_state);
    board.state = GameState {
        captured,
        ep_file: new_ep_file,
        castling: new_castling,
        fifty,
        key,
    };
    board.rebuild_aggregates();
    board.invalidate_check_cache();

    if !in_search {
        board.move_history.push(mv);
        if irreversible {
            let saved = std::mem::take(&mut board.rep_keys);
            board.rep_snapshots.push(Some(saved));
        } else {
            board.rep_snapshots.push(None);
        }
        board.rep_keys.push(key);
    }

    #[cfg(debug_assertions)]
    board.assert_hash();
}

pub fn unmake_move(board: &mut Board, mv: Move, in_search: bool) {
    let undone = board.state;
    let prev = board
        .state_stack
        .pop()
        .expect("unmake_move without matching make_move");

    let us = board.side_to_move.opposite(); // side that made the move
    let them = board.side_to_move;
    board.side_to_move = us;
    board.ply_count -= 1;
    if us == Color::Black {
        board.fullmove_number -= 1;
    }

    let start = mv.start();
    let target = mv.target();

    if let Some(promo) = mv.promotion_kind() {
        board.remove_piece(Piece::new(promo, us), target);
        board.place_piece(Piece::new(PieceKind::Pawn, us), start);
        board.non_pawn_pieces[us.index()] -= 1;
    } else {
        let piece = board.piece_at(target);
        board.move_piece(piece, target, start);
        if piece.kind() == PieceKind::King {
            board.king_sq[us.index()] = start;
        }
    }

    if mv.is_castle() {
        let (rook_from, rook_to) = castle_rook_squares(target);
        board.move_piece(Piece::new(PieceKind::Rook, us), rook_to, rook_from);
    }

    if undone.captured.is_some() {
        let capture_sq = if mv.is_en_passant() {
            if us == Color::White {
                target.offset(-8)
            } else {
                target.offset(8)
            }
        } else {
            target
        };
        board.place_piece(undone.captured, capture_sq);
        if undone.captured.kind() != PieceKind::Pawn {
            board.non_pawn_pieces[them.index()] += 1;
        }
    }

    board.state = prev;
    board.rebuild_aggregates();
    board.invalidate_check_cache();

    if !in_search {
        board.move_history.pop();
        board.rep_keys.pop();
        if let Some(Some(saved)) = board.rep_snapshots.pop() {
            board.rep_keys = saved;
        }
    }

    #[cfg(debug_assertions)]
    board.assert_hash();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moves::movegen::move_from_uci;
    use std::str::FromStr;

    fn play(board: &mut Board, uci: &str) -> Move {
        let mv = move_from_uci(board, uci).unwrap_or_else(|| panic!("no such move: {uci}"));
        make_move(board, mv, false);
        mv
    }

    #[test]
    fn make_unmake_restores_bitwise() {
        let mut board = Board::new();
        let reference = board.clone();
        let mv = play(&mut board, "e2e4");
        assert_ne!(board, reference);
        unmake_move(&mut board, mv, false);
        assert_eq!(board, reference);
    }

    #[test]
    fn castling_moves_the_rook() {
        let mut board =
            Board::from_str("r3k2r/pppppppp/8/8/8/8/PPPPPPPP/R3K2R w KQkq - 0 1").unwrap();
        let reference = board.clone();
        let mv = play(&mut board, "e1g1");
        assert!(board
            .piece_at(Square::F1)
            .is(PieceKind::Rook, Color::White));
        assert!(board.piece_at(Square::H1).is_none());
        assert_eq!(board.king_square(Color::White), Square::G1);
        assert_eq!(board.state.castling & 0b0011, 0);
        unmake_move(&mut board, mv, false);
        assert_eq!(board, reference);
    }

    #[test]
    fn en_passant_removes_the_bypassed_pawn() {
        let mut board = Board::from_str("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        let reference = board.clone();
        let mv = play(&mut board, "e5d6");
        assert!(mv.is_en_passant());
        assert!(board.piece_at("d5".parse().unwrap()).is_none());
        assert!(board
            .piece_at("d6".parse().unwrap())
            .is(PieceKind::Pawn, Color::White));
        unmake_move(&mut board, mv, false);
        assert_eq!(board, reference);
    }

    #[test]
    fn promotion_swaps_pawn_for_piece() {
        let mut board = Board::from_str("4k3/P7/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        let reference = board.clone();
        let mv = play(&mut board, "a7a8q");
        assert!(board
            .piece_at(Square::A8)
            .is(PieceKind::Queen, Color::White));
        assert_eq!(board.non_pawn_pieces[Color::White.index()], 1);
        unmake_move(&mut board, mv, false);
        assert_eq!(board, reference);
    }

    #[test]
    fn fifty_move_counter_resets_on_pawn_and_capture() {
        let mut board = Board::new();
        play(&mut board, "g1f3");
        assert_eq!(board.state.fifty, 1);
        play(&mut board, "e7e5");
        assert_eq!(board.state.fifty, 0);
        play(&mut board, "f3e5"); // capture
        assert_eq!(board.state.fifty, 0);
    }

    #[test]
    fn rook_capture_clears_opponent_castling_right() {
        let mut board =
            Board::from_str("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        play(&mut board, "a1a8");
        assert_eq!(board.state.castling & crate::board::CASTLE_BQ, 0);
    }

    #[test]
    fn repetition_window_clears_on_irreversible_move() {
        let mut board = Board::new();
        play(&mut board, "g1f3");
        play(&mut board, "g8f6");
        assert_eq!(board.rep_keys.len(), 3);
        let mv = play(&mut board, "e2e4"); // pawn move truncates the window
        assert_eq!(board.rep_keys.len(), 1);
        unmake_move(&mut board, mv, false);
        assert_eq!(board.rep_keys.len(), 3);
    }
}
