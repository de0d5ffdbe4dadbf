use crate::bitboard::BitboardExt;
use crate::board::{Board, Color, PieceKind, ALL_KINDS};
use once_cell::sync::OnceCell;
use rand::{rngs::StdRng, RngCore, SeedableRng};

#[cfg(feature = "deterministic_zobrist")]
const ZOBRIST_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

fn make_rng() -> StdRng {
    #[cfg(feature = "deterministic_zobrist")]
    {
        StdRng::seed_from_u64(ZOBRIST_SEED)
    }
    #[cfg(not(feature = "deterministic_zobrist"))]
    {
        StdRng::from_entropy()
    }
}

/// The per-feature random constants a position key is XORed together from.
pub struct ZobristKeys {
    /// `[color][kind.table_index()][square]`
    pub piece: [[[u64; 64]; 6]; 2],
    /// XORed in when Black is to move.
    pub side_to_move: u64,
    /// Indexed by the full 4-bit castling-rights value.
    pub castling: [u64; 16],
    /// Indexed by the en passant file encoding (0 = none). Entry 0 is zero
    /// so the current file can be XORed unconditionally.
    pub ep_file: [u64; 9],
}

/// Global key tables, generated on first use.
pub fn keys() -> &'static ZobristKeys {
    static KEYS: OnceCell<ZobristKeys> = OnceCell::new();
    KEYS.get_or_init(|| generate(make_rng()))
}

fn generate(mut rng: StdRng) -> ZobristKeys {
    #[inline]
    fn non_zero(rng: &mut StdRng) -> u64 {
        // zero keys would make features invisible to the hash
        let mut v = rng.next_u64();
        while v == 0 {
            v = rng.next_u64();
        }
        v
    }

    let mut keys = ZobristKeys {
        piece: [[[0; 64]; 6]; 2],
        side_to_move: 0,
        castling: [0; 16],
        ep_file: [0; 9],
    };

    for color in 0..2 {
        for kind in 0..6 {
            for sq in 0..64 {
                keys.piece[color][kind][sq] = non_zero(&mut rng);
            }
        }
    }
    for rights in 0..16 {
        keys.castling[rights] = non_zero(&mut rng);
    }
    for file in 1..9 {
        keys.ep_file[file] = non_zero(&mut rng);
    }
    keys.side_to_move = non_zero(&mut rng);
    keys
}

/// Full recompute from board state: piece-square entries for every occupied
/// square, the castling-rights entry, the en-passant-file entry, and the
/// side-to-move entry iff Black moves. The incremental key must match this
/// after every make/unmake.
pub fn compute_full(board: &Board) -> u64 {
    let keys = keys();
    let mut hash = 0u64;

    for color in [Color::White, Color::Black] {
        for kind in ALL_KINDS {
            for sq in board.bb(color, kind).iter_squares() {
                hash ^= keys.piece[color.index()][kind.table_index()][sq.usize()];
            }
        }
    }
    if board.side_to_move == Color::Black {
        hash ^= keys.side_to_move;
    }
    hash ^= keys.castling[board.state.castling as usize];
    hash ^= keys.ep_file[board.state.ep_file as usize];
    hash
}

/// Piece-square key for incremental updates.
#[inline(always)]
pub fn piece_key(color: Color, kind: PieceKind, sq: crate::square::Square) -> u64 {
    keys().piece[color.index()][kind.table_index()][sq.usize()]
}
