use std::mem;

/// Splits `content` into consecutive slices of at most `size` characters.
///
/// Empty content yields a single empty chunk so every chapter produces at
/// least one chunk on the wire.
pub fn split(content: &str, size: usize) -> Vec<String> {
    assert!(size > 0, "chunk size must be positive");

    if content.is_empty() {
        return vec![String::new()];
    }

    let mut chunks = Vec::with_capacity(content.len().div_ceil(size));
    let mut start = 0;
    let mut chars = 0;

    for (offset, _) in content.char_indices() {
        if chars == size {
            chunks.push(content[start..offset].to_owned());
            start = offset;
            chars = 0;
        }
        chars += 1;
    }
    chunks.push(content[start..].to_owned());

    chunks
}

/// Cursor over the chunks of the chapter being sent.
///
/// Holds two slots: the chunk at the cursor and the one after it, which is
/// pulled forward as soon as the current chunk goes out so the next
/// `advance` is a plain swap.
#[derive(Debug, Default)]
pub struct ChunkCursor {
    pending: Vec<String>,
    total: usize,
    index: usize,
    current: Option<String>,
    prefetched: Option<String>,
}

impl ChunkCursor {
    pub fn new(mut chunks: Vec<String>) -> Self {
        let total = chunks.len();
        let current = chunks.first_mut().map(mem::take);

        Self {
            pending: chunks,
            total,
            index: 0,
            current,
            prefetched: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_exhausted(&self) -> bool {
        self.index >= self.total
    }

    /// Takes the chunk at the cursor for sending.
    pub fn take_current(&mut self) -> Option<String> {
        self.current.take()
    }

    /// Loads the chunk after the cursor into the prefetch slot.
    pub fn prefetch(&mut self) {
        if self.prefetched.is_none() {
            self.prefetched = self.pending.get_mut(self.index + 1).map(mem::take);
        }
    }

    /// Moves the cursor forward by one chunk. Returns `false` once the cursor
    /// has stepped past the last chunk, or `None` if it already had.
    pub fn advance(&mut self) -> Option<bool> {
        if self.is_exhausted() {
            return None;
        }

        self.index += 1;
        if self.is_exhausted() {
            self.current = None;
            self.prefetched = None;
            return Some(false);
        }

        let index = self.index;
        self.current = self
            .prefetched
            .take()
            .or_else(|| self.pending.get_mut(index).map(mem::take));
        Some(true)
    }
}
