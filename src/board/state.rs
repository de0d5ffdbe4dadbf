use crate::board::Piece;

/// Immutable snapshot of the irreversible parts of a position.
///
/// One is pushed for every make and popped on unmake; restoring it (rather
/// than recomputing) is what makes unmake exact, Zobrist key included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameState {
    /// Piece removed by the move that produced this state (`Piece::NONE` if quiet).
    pub captured: Piece,
    /// En passant file, 1..8, or 0 when no en passant square exists.
    pub ep_file: u8,
    /// Castling rights bitfield (see `castle_bits`).
    pub castling: u8,
    /// Halfmove clock for the fifty-move rule.
    pub fifty: u16,
    /// Zobrist key of the position this state belongs to.
    pub key: u64,
}

impl GameState {
    pub fn empty() -> GameState {
        GameState {
            captured: Piece::NONE,
            ep_file: 0,
            castling: 0,
            fifty: 0,
            key: 0,
        }
    }
}
