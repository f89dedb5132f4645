//! Document chunking.
//!
//! [`RecursiveChunker`] splits on the coarsest separator present in the
//! text (paragraphs, then lines, then words, then characters), merges the
//! pieces back into chunks of at most `chunk_size` characters and carries
//! up to `chunk_overlap` characters of trailing context into the next
//! chunk. Lengths are counted in `char`s, so multi-byte text is never cut
//! inside a code point.

use crate::document::{Chunk, Document};

/// Separators tried in order, coarsest first. The empty separator splits
/// into single characters.
pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// A strategy for splitting text into chunk-sized pieces.
pub trait Chunker: Send + Sync {
    /// Split `text` into non-empty pieces.
    fn split(&self, text: &str) -> Vec<String>;
}

/// Recursive character splitter with overlap.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::RecursiveChunker;
///
/// let chunker = RecursiveChunker::new(4096, 200);
/// let pieces = chunker.split(&text);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveChunker {
    /// Create a chunker using [`DEFAULT_SEPARATORS`].
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - characters of context repeated between consecutive chunks
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the separator hierarchy.
    pub fn with_separators(mut self, separators: &[&str]) -> Self {
        self.separators = separators.iter().map(|s| s.to_string()).collect();
        self
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        // Pick the first separator that occurs in the text; the rest are
        // used for pieces that are still too large.
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();
        for piece in split_on(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small, separator));
                small.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small, separator));
        }
        chunks
    }

    /// Greedily join pieces into chunks, keeping a tail of up to
    /// `chunk_overlap` characters as the start of the next chunk.
    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: Vec<(&str, usize)> = Vec::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { separator_len };
            if total + len + joiner > self.chunk_size && !current.is_empty() {
                if let Some(chunk) = join_trimmed(&current, separator) {
                    chunks.push(chunk);
                }
                loop {
                    let joiner = if current.is_empty() { 0 } else { separator_len };
                    let too_long = total > 0 && total + len + joiner > self.chunk_size;
                    if total <= self.chunk_overlap && !too_long {
                        break;
                    }
                    let (_, first_len) = current.remove(0);
                    let dropped_joiner = if current.is_empty() { 0 } else { separator_len };
                    total -= first_len + dropped_joiner;
                }
            }
            let joiner = if current.is_empty() { 0 } else { separator_len };
            current.push((piece, len));
            total += len + joiner;
        }

        if let Some(chunk) = join_trimmed(&current, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &self.separators)
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split on `separator`, dropping empty pieces. The empty separator yields
/// one piece per character.
fn split_on<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, c)| &text[start..start + c.len_utf8()])
            .collect();
    }
    text.split(separator).filter(|piece| !piece.is_empty()).collect()
}

fn join_trimmed(pieces: &[(&str, usize)], separator: &str) -> Option<String> {
    let joined = pieces.iter().map(|(piece, _)| *piece).collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

/// Chunk every document in order, numbering chunks `"0"`, `"1"`, ...
/// across the whole run.
pub fn chunk_documents(chunker: &dyn Chunker, documents: &[Document]) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for document in documents {
        for text in chunker.split(&document.text) {
            chunks.push(Chunk {
                id: chunks.len().to_string(),
                text,
                document_id: document.id.clone(),
                embedding: Vec::new(),
            });
        }
    }
    chunks
}
