use crate::bitboard::BitboardExt;
use crate::board::{castle_bits::*, Board, Color, Piece, PieceKind};
use crate::hash::zobrist;
use crate::moves::magic::rook_attacks;
use crate::moves::tables;
use crate::square::Square;

impl Board {
    /// Load a position from a FEN string, replacing all current state.
    ///
    /// The halfmove clock and fullmove number fields are optional and
    /// default to 0 and 1.
    pub fn set_fen(&mut self, fen: &str) -> Result<(), String> {
        let fields: Vec<&str> = fen.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(format!("FEN needs at least piece and side fields: {fen}"));
        }

        let mut fresh = Board::new_empty();

        // Field 1: piece placement, rank 8 first.
        let mut rank = 7i32;
        let mut file = 0i32;
        for c in fields[0].chars() {
            match c {
                '/' => {
                    rank -= 1;
                    file = 0;
                }
                '1'..='8' => file += c as i32 - '0' as i32,
                _ => {
                    let piece =
                        Piece::from_char(c).ok_or_else(|| format!("bad FEN piece char: {c}"))?;
                    if !(0..8).contains(&rank) || !(0..8).contains(&file) {
                        return Err(format!("FEN placement overflows the board: {fen}"));
                    }
                    let sq = Square::from_coords(rank as u8, file as u8);
                    if fresh.list(piece.color(), piece.kind()).count() >= 16 {
                        return Err(format!("implausible piece count in FEN: {fen}"));
                    }
                    fresh.place_piece(piece, sq);
                    if piece.kind() == PieceKind::King {
                        fresh.king_sq[piece.color().index()] = sq;
                    } else if piece.kind() != PieceKind::Pawn {
                        fresh.non_pawn_pieces[piece.color().index()] += 1;
                    }
                    file += 1;
                }
            }
        }

        // Field 2: side to move.
        fresh.side_to_move = match fields[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => return Err(format!("bad side-to-move field: {other}")),
        };

        // Field 3: castling rights.
        let mut rights = 0u8;
        if let Some(&field) = fields.get(2) {
            if field != "-" {
                for c in field.chars() {
                    rights |= match c {
                        'K' => CASTLE_WK,
                        'Q' => CASTLE_WQ,
                        'k' => CASTLE_BK,
                        'q' => CASTLE_BQ,
                        _ => return Err(format!("bad castling field char: {c}")),
                    };
                }
            }
        }

        // Field 4: en passant target square.
        let mut ep_file = 0u8;
        if let Some(&field) = fields.get(3) {
            if field != "-" {
                let sq: Square = field.parse()?;
                ep_file = sq.file() + 1;
            }
        }

        // Fields 5 and 6 are optional.
        let fifty: u16 = match fields.get(4) {
            Some(s) => s.parse().map_err(|_| format!("bad halfmove clock: {s}"))?,
            None => 0,
        };
        let fullmove: u32 = match fields.get(5) {
            Some(s) => s.parse().map_err(|_| format!("bad fullmove number: {s}"))?,
            None => 1,
        };

        fresh.state.castling = rights;
        fresh.state.ep_file = ep_file;
        fresh.state.fifty = fifty;
        fresh.fullmove_number = fullmove;
        fresh.rebuild_aggregates();
        fresh.state.key = zobrist::compute_full(&fresh);
        fresh.rep_keys.push(fresh.state.key);
        fresh.validate()?;

        *self = fresh;
        Ok(())
    }

    /// Emit the position as FEN. The en passant field uses the strict form:
    /// the target square is written only when the capture is actually legal
    /// for the side to move.
    pub fn to_fen(&self) -> String {
        let mut fen = String::new();
        for rank in (0..8u8).rev() {
            let mut empties = 0;
            for file in 0..8u8 {
                let piece = self.piece_at(Square::from_coords(rank, file));
                if piece.is_none() {
                    empties += 1;
                } else {
                    if empties > 0 {
                        fen.push((b'0' + empties) as char);
                        empties = 0;
                    }
                    fen.push(piece.to_char());
                }
            }
            if empties > 0 {
                fen.push((b'0' + empties) as char);
            }
            if rank > 0 {
                fen.push('/');
            }
        }

        fen.push(' ');
        fen.push(match self.side_to_move {
            Color::White => 'w',
            Color::Black => 'b',
        });

        fen.push(' ');
        let rights = self.state.castling;
        if rights == 0 {
            fen.push('-');
        } else {
            if rights & CASTLE_WK != 0 {
                fen.push('K');
            }
            if rights & CASTLE_WQ != 0 {
                fen.push('Q');
            }
            if rights & CASTLE_BK != 0 {
                fen.push('k');
            }
            if rights & CASTLE_BQ != 0 {
                fen.push('q');
            }
        }

        fen.push(' ');
        match self.legal_ep_square() {
            Some(sq) => fen.push_str(&sq.to_string()),
            None => fen.push('-'),
        }

        fen.push_str(&format!(" {} {}", self.state.fifty, self.fullmove_number));
        fen
    }

    /// The en passant target square, if the capture is legal for the side to
    /// move. Each candidate capture is simulated on the occupancy bitboards
    /// and the king's slider rays re-scanned, the same validation the move
    /// generator performs.
    pub fn legal_ep_square(&self) -> Option<Square> {
        if self.state.ep_file == 0 {
            return None;
        }
        let us = self.side_to_move;
        let them = us.opposite();
        let ep_rank = if us == Color::White { 5 } else { 2 };
        let target = Square::from_coords(ep_rank, self.state.ep_file - 1);
        let captured_sq = if us == Color::White {
            target.offset(-8)
        } else {
            target.offset(8)
        };
        if !self.bb(them, PieceKind::Pawn).contains(captured_sq) {
            return None;
        }

        let king = self.king_square(us);
        let candidates = tables::pawn_attacks(them, target) & self.bb(us, PieceKind::Pawn);
        for start in candidates.iter_squares() {
            let occ_after =
                (self.occ_all & !start.bb() & !captured_sq.bb()) | target.bb();
            let orth_exposed =
                rook_attacks(king, occ_after) & self.orthogonal_sliders[them.index()] != 0;
            let diag_exposed = crate::moves::magic::bishop_attacks(king, occ_after)
                & self.diagonal_sliders[them.index()]
                != 0;
            let other_checker = {
                // knight/pawn checks are unaffected by the two vacated squares
                // except for the captured pawn itself
                let pawn_checks = tables::pawn_attacks(us, king)
                    & self.bb(them, PieceKind::Pawn)
                    & !captured_sq.bb();
                let knight_checks = tables::knight_attacks(king) & self.bb(them, PieceKind::Knight);
                pawn_checks | knight_checks != 0
            };
            if !orth_exposed && !diag_exposed && !other_checker {
                return Some(target);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::board::{Board, Color, PieceKind, START_FEN};
    use std::str::FromStr;

    #[test]
    fn start_position_loads() {
        let board = Board::from_str(START_FEN).unwrap();
        assert_eq!(board.side_to_move, Color::White);
        assert_eq!(board.bb(Color::White, PieceKind::Pawn).count_ones(), 8);
        assert_eq!(board.state.castling, 0b1111);
        assert_eq!(board.non_pawn_pieces, [7, 7]);
        board.validate().unwrap();
    }

    #[test]
    fn optional_clock_fields_default() {
        let board = Board::from_str("4k3/8/8/8/8/8/8/4K3 w -").unwrap();
        assert_eq!(board.state.fifty, 0);
        assert_eq!(board.fullmove_number, 1);
    }

    #[test]
    fn round_trip_is_idempotent() {
        let fens = [
            START_FEN,
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1",
            "4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1",
            "7k/8/8/8/8/8/8/R3K2R w KQ - 12 34",
        ];
        for fen in fens {
            let board = Board::from_str(fen).unwrap();
            assert_eq!(board.to_fen(), fen, "round trip failed");
        }
    }

    #[test]
    fn ep_square_dropped_when_capture_is_illegal() {
        // Both pawns sit between the king and a rook on the same rank, so the
        // en passant capture would expose the king.
        let board = Board::from_str("7k/8/8/K2pP2r/8/8/8/8 w - d6 0 1").unwrap();
        assert_eq!(board.legal_ep_square(), None);
        assert!(board.to_fen().contains(" - "));
    }

    #[test]
    fn ep_square_kept_when_capture_is_legal() {
        let board = Board::from_str("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 1").unwrap();
        assert_eq!(board.legal_ep_square().map(|s| s.to_string()), Some("d6".into()));
    }

    #[test]
    fn rejects_garbage() {
        assert!(Board::from_str("not a fen").is_err());
        assert!(Board::from_str("8/8/8/8/8/8/8/8 w - - 0 1").is_err()); // no kings
    }
}
