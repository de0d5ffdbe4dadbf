//! Opening book: a static map from position fingerprint (Zobrist key) to a
//! weighted move list, loaded from a plain-text file.
//!
//! Format, one position block at a time:
//!
//! ```text
//! pos <zobrist key, hex>
//! <uci move> <weight>
//! <uci move> <weight>
//! ```
//!
//! Probing picks among the listed moves with probability proportional to
//! weight, after filtering against the legal moves of the position.

use crate::board::Board;
use crate::moves::movegen::move_from_uci;
use crate::moves::types::Move;
use rand::Rng;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Clone)]
struct WeightedMove {
    uci: String,
    weight: u32,
}

#[derive(Debug, Default)]
pub struct OpeningBook {
    entries: HashMap<u64, Vec<WeightedMove>>,
}

impl OpeningBook {
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<OpeningBook> {
        let text = fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    pub fn parse(text: &str) -> OpeningBook {
        let mut entries: HashMap<u64, Vec<WeightedMove>> = HashMap::new();
        let mut current: Option<u64> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(key_text) = line.strip_prefix("pos ") {
                current = u64::from_str_radix(key_text.trim().trim_start_matches("0x"), 16).ok();
                continue;
            }
            let Some(key) = current else { continue };
            let mut parts = line.split_whitespace();
            let (Some(uci), Some(weight)) = (parts.next(), parts.next()) else {
                continue;
            };
            let Ok(weight) = weight.parse::<u32>() else {
                continue;
            };
            if weight == 0 {
                continue;
            }
            entries.entry(key).or_default().push(WeightedMove {
                uci: uci.to_string(),
                weight,
            });
        }

        OpeningBook { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Weighted-random book move for the current position, if any entry
    /// resolves to a legal move.
    pub fn probe(&self, board: &Board) -> Option<Move> {
        self.probe_with(board, &mut rand::thread_rng())
    }

    pub fn probe_with<R: Rng>(&self, board: &Board, rng: &mut R) -> Option<Move> {
        let candidates = self.entries.get(&board.zobrist())?;
        let resolved: Vec<(Move, u32)> = candidates
            .iter()
            .filter_map(|wm| move_from_uci(board, &wm.uci).map(|mv| (mv, wm.weight)))
            .collect();
        let total: u64 = resolved.iter().map(|(_, w)| *w as u64).sum();
        if total == 0 {
            return None;
        }
        let mut pick = rng.gen_range(0..total);
        for (mv, weight) in &resolved {
            if pick < *weight as u64 {
                return Some(*mv);
            }
            pick -= *weight as u64;
        }
        None
    }
}
