/// Castling rights bitfield: bit 0 = White kingside, 1 = White queenside,
/// 2 = Black kingside, 3 = Black queenside.
pub const CASTLE_WK: u8 = 0b0001;
pub const CASTLE_WQ: u8 = 0b0010;
pub const CASTLE_BK: u8 = 0b0100;
pub const CASTLE_BQ: u8 = 0b1000;

pub const CASTLE_ALL: u8 = CASTLE_WK | CASTLE_WQ | CASTLE_BK | CASTLE_BQ;

/// Per-square masks ANDed into the rights after a move touches the square.
/// Only the king and rook home squares clear anything; every other square
/// leaves the rights untouched.
pub const CASTLING_RIGHT_MASKS: [u8; 64] = {
    let mut masks = [CASTLE_ALL; 64];
    masks[0] = CASTLE_ALL & !CASTLE_WQ; // a1
    masks[4] = CASTLE_ALL & !(CASTLE_WK | CASTLE_WQ); // e1
    masks[7] = CASTLE_ALL & !CASTLE_WK; // h1
    masks[56] = CASTLE_ALL & !CASTLE_BQ; // a8
    masks[60] = CASTLE_ALL & !(CASTLE_BK | CASTLE_BQ); // e8
    masks[63] = CASTLE_ALL & !CASTLE_BK; // h8
    masks
};
