use crate::chunk::Chunk;

pub const DEFAULT_MAX_CHUNK_CHARS: usize = 3000;

/// Splits text into fixed-size character windows.
///
/// Splitting happens strictly at the size boundary, never at a sentence or
/// word boundary. An entity mention that straddles two windows is cut in
/// half and may be lost or garbled by extraction; this is a known limitation
/// of raw-length chunking.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSplitter {
    max_chunk_chars: usize,
}

impl Default for ChunkSplitter {
    fn default() -> Self {
        Self {
            max_chunk_chars: DEFAULT_MAX_CHUNK_CHARS,
        }
    }
}

impl ChunkSplitter {
    /// Returns `None` for a zero window size.
    pub fn new(max_chunk_chars: usize) -> Option<Self> {
        (max_chunk_chars > 0).then_some(Self { max_chunk_chars })
    }

    /// Lazily split `text`. Calling this again restarts from the beginning.
    pub fn split<'a>(&self, text: &'a str) -> CharWindows<'a> {
        CharWindows {
            rest: text,
            window: self.max_chunk_chars,
            position: 0,
        }
    }

    /// Number of windows `split` will yield for `text`.
    pub fn chunk_count(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.max_chunk_chars)
    }

    /// Split an article body into indexed chunks.
    pub fn chunk_text<'a>(
        &self,
        article_id: &'a str,
        text: &'a str,
    ) -> impl Iterator<Item = Chunk> + 'a {
        self.split(text).enumerate().map(move |(index, window)| {
            Chunk::new(
                article_id.to_string(),
                index,
                window.text.to_string(),
                (window.start, window.end),
            )
        })
    }
}

/// One window of text with its character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window<'a> {
    pub text: &'a str,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
pub struct CharWindows<'a> {
    rest: &'a str,
    window: usize,
    position: usize,
}

impl<'a> Iterator for CharWindows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }

        // Byte index of the first char past the window, or the end of the text
        let (split_at, taken) = match self.rest.char_indices().nth(self.window) {
            Some((byte_idx, _)) => (byte_idx, self.window),
            None => (self.rest.len(), self.rest.chars().count()),
        };

        let (head, tail) = self.rest.split_at(split_at);
        self.rest = tail;

        let start = self.position;
        self.position += taken;

        Some(Window {
            text: head,
            start,
            end: self.position,
        })
    }
}
