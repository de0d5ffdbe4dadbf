/// Rolling window of Zobrist keys walked by the search, with reset points
/// at irreversible moves.
///
/// A reset entry points at its own index, cutting off everything before it;
/// other entries inherit the previous reset index. A position counts as a
/// draw on its first repeat inside the window.
pub struct RepetitionTable {
    keys: Vec<u64>,
    reset_index: Vec<usize>,
}

impl RepetitionTable {
    pub fn new() -> RepetitionTable {
        RepetitionTable {
            keys: Vec::with_capacity(256),
            reset_index: Vec::with_capacity(256),
        }
    }

    /// Seed from the game history: the keys reached since the last
    /// irreversible move, oldest first.
    pub fn init(&mut self, history: &[u64]) {
        self.keys.clear();
        self.reset_index.clear();
        for &key in history {
            self.push(key, false);
        }
    }

    pub fn push(&mut self, key: u64, reset: bool) {
        let index = if reset {
            self.keys.len()
        } else {
            self.reset_index.last().copied().unwrap_or(0)
        };
        self.keys.push(key);
        self.reset_index.push(index);
    }

    /// Pop the top entry; a no-op on an empty table.
    pub fn try_pop(&mut self) {
        self.keys.pop();
        self.reset_index.pop();
    }

    /// Scan from the current reset index up to, but not including, the top.
    pub fn contains(&self, key: u64) -> bool {
        let Some(top) = self.keys.len().checked_sub(1) else {
            return false;
        };
        let from = self.reset_index[top];
        self.keys[from..top].contains(&key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Default for RepetitionTable {
    fn default() -> Self {
        RepetitionTable::new()
    }
}
