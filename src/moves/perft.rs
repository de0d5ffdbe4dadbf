use crate::board::Board;
use crate::moves::execute::{make_move, unmake_move};
use crate::moves::movegen::generate_moves;
use crate::moves::types::{Move, MoveList};

/// Exhaustive make/unmake node count to `depth`.
pub fn perft(board: &mut Board, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let mut moves = MoveList::new();
    generate_moves(board, &mut moves, false);
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0;
    for mv in moves {
        make_move(board, mv, true);
        nodes += perft(board, depth - 1);
        unmake_move(board, mv, true);
    }
    nodes
}

/// Per-root-move node counts, for diffing against a reference engine.
pub fn perft_divide(board: &mut Board, depth: u32) -> Vec<(Move, u64)> {
    let mut moves = MoveList::new();
    generate_moves(board, &mut moves, false);
    let mut rows = Vec::with_capacity(moves.len());
    for mv in moves {
        make_move(board, mv, true);
        let nodes = if depth <= 1 {
            1
        } else {
            perft(board, depth - 1)
        };
        unmake_move(board, mv, true);
        rows.push((mv, nodes));
    }
    rows
}
