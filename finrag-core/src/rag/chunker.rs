//! Recursive boundary-aware text chunking.
//!
//! Text is split at the coarsest separator present (paragraphs, then lines,
//! then words, then single characters), and the resulting pieces are merged
//! back together into chunks of at most `chunk_size` characters. Consecutive
//! chunks share up to `chunk_overlap` characters of trailing context.
//!
//! Lengths are counted in `char`s, not bytes, so multi-byte text is never cut
//! inside a character.

use thiserror::Error;

/// Separators tried in order; the empty separator means a hard character cut.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("chunk_size must be positive")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) exceeds chunk_size ({size})")]
    OverlapTooLarge { size: usize, overlap: usize },
}

/// Splits documents into overlapping chunks suitable for embedding.
///
/// # Example
///
/// ```no_run
/// # use finrag_core::rag::Chunker;
/// let chunker = Chunker::new(500, 100).unwrap();
/// let chunks = chunker.split("Revenue\n\nCost of goods sold");
/// assert_eq!(chunks, vec!["Revenue\n\nCost of goods sold"]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 100,
        }
    }
}

impl Chunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkerError> {
        if chunk_size == 0 {
            return Err(ChunkerError::ZeroChunkSize);
        }
        if chunk_overlap > chunk_size {
            return Err(ChunkerError::OverlapTooLarge {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Splits `text` into chunks. Empty or whitespace-only text yields no chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // Pick the first separator that occurs in the text; "" always matches.
        let (index, separator) = separators
            .iter()
            .enumerate()
            .find(|(_, sep)| sep.is_empty() || text.contains(*sep))
            .map(|(i, sep)| (i, *sep))
            .unwrap_or((separators.len().saturating_sub(1), ""));
        let remaining = separators.get(index + 1..).unwrap_or(&[]);

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }

        chunks
    }

    /// Greedily joins pieces into chunks, carrying up to `chunk_overlap`
    /// characters of trailing pieces into the next chunk.
    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: Vec<(&str, usize)> = Vec::new();
        let mut window_len = 0;

        for &piece in pieces {
            let len = char_len(piece);

            if window_len + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window);

                while window_len > self.chunk_overlap
                    || (window_len + len > self.chunk_size && window_len > 0)
                {
                    let (_, dropped) = window.remove(0);
                    window_len -= dropped;
                }
            }

            window.push((piece, len));
            window_len += len;
        }

        push_trimmed(&mut chunks, &window);
        chunks
    }
}

fn push_trimmed(chunks: &mut Vec<String>, window: &[(&str, usize)]) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Splits at every occurrence of `separator`, keeping the separator at the
/// start of the piece that follows it. Empty pieces are dropped. An empty
/// separator splits into single characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn longest_common_affix(prev: &str, next: &str) -> usize {
        // Longest suffix of `prev` that is a prefix of `next`, in chars.
        let prev_chars: Vec<char> = prev.chars().collect();
        let next_chars: Vec<char> = next.chars().collect();
        let max = prev_chars.len().min(next_chars.len());
        (1..=max)
            .rev()
            .find(|&n| prev_chars[prev_chars.len() - n..] == next_chars[..n])
            .unwrap_or(0)
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        assert!(Chunker::default().split("").is_empty());
    }

    #[test]
    fn test_whitespace_only_yields_no_chunks() {
        assert!(Chunker::default().split(" \n\n \n ").is_empty());
    }

    #[test]
    fn test_small_text_is_single_trimmed_chunk() {
        let chunks = Chunker::default().split("  Total revenue for Q1 2024 was $2.4M\n");
        assert_eq!(chunks, vec!["Total revenue for Q1 2024 was $2.4M"]);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        assert_eq!(Chunker::new(0, 0).unwrap_err(), ChunkerError::ZeroChunkSize);
        assert_eq!(
            Chunker::new(10, 11).unwrap_err(),
            ChunkerError::OverlapTooLarge { size: 10, overlap: 11 }
        );
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let para_a = "a".repeat(300);
        let para_b = "b".repeat(300);
        let text = format!("{para_a}\n\n{para_b}");

        let chunks = Chunker::default().split(&text);
        assert_eq!(chunks, vec![para_a, para_b]);
    }

    #[test]
    fn test_word_split_with_overlap() {
        let chunker = Chunker::new(10, 4).unwrap();
        let chunks = chunker.split("aaa bbb ccc ddd");
        assert_eq!(chunks, vec!["aaa bbb", "bbb ccc", "ccc ddd"]);
    }

    #[test]
    fn test_hard_cut_when_no_separator() {
        let text = "x".repeat(1200);
        let chunks = Chunker::default().split(&text);

        assert!(chunks.len() >= 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500);
        }
        for pair in chunks.windows(2) {
            assert_eq!(longest_common_affix(&pair[0], &pair[1]).min(100), 100);
        }
    }

    #[test]
    fn test_multibyte_characters_counted_as_chars() {
        let text = "€".repeat(600);
        let chunks = Chunker::default().split(&text);
        assert_eq!(chunks[0].chars().count(), 500);
        assert!(chunks.iter().all(|c| c.chars().count() <= 500));
    }

    #[test]
    fn test_deterministic() {
        let text = "Revenue 1,200\nCOGS 700\n\nGross profit 500\nOpex 300\n".repeat(40);
        let chunker = Chunker::default();
        assert_eq!(chunker.split(&text), chunker.split(&text));
    }

    #[test]
    fn test_split_keeping_separator_attaches_to_following_piece() {
        assert_eq!(split_keeping_separator("a b c", " "), vec!["a", " b", " c"]);
        assert_eq!(split_keeping_separator("\n\n\n\n", "\n\n"), vec!["\n\n", "\n\n"]);
        assert_eq!(split_keeping_separator("héllo", ""), vec!["h", "é", "l", "l", "o"]);
    }

    fn statement_text() -> impl Strategy<Value = String> {
        proptest::collection::vec(
            prop_oneof![
                "[A-Za-z]{1,12}".prop_map(|s| s),
                "[0-9,.$]{1,9}".prop_map(|s| s),
                Just(" ".to_string()),
                Just("\n".to_string()),
                Just("\n\n".to_string()),
            ],
            0..400,
        )
        .prop_map(|parts| parts.concat())
    }

    /// Distinct tokens joined by random separators, so any text shared by two
    /// chunks can only come from overlap.
    fn unique_token_text() -> impl Strategy<Value = String> {
        proptest::collection::vec(
            prop_oneof![Just(" "), Just(" "), Just(" "), Just("\n"), Just("\n\n")],
            50..800,
        )
        .prop_map(|separators| {
            separators
                .iter()
                .enumerate()
                .map(|(i, sep)| format!("w{i}{sep}"))
                .collect::<String>()
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn consecutive_chunks_overlap_at_most_chunk_overlap(text in unique_token_text()) {
            let chunker = Chunker::default();
            let chunks = chunker.split(&text);
            for pair in chunks.windows(2) {
                prop_assert!(longest_common_affix(&pair[0], &pair[1]) <= 100);
            }
        }

        #[test]
        fn small_chunker_overlap_is_bounded(text in unique_token_text(), size in 20usize..80) {
            let overlap = size / 4;
            let chunks = Chunker::new(size, overlap).unwrap().split(&text);
            for pair in chunks.windows(2) {
                prop_assert!(longest_common_affix(&pair[0], &pair[1]) <= overlap);
            }
        }

        #[test]
        fn chunks_never_exceed_chunk_size(text in statement_text()) {
            let chunks = Chunker::default().split(&text);
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= 500);
                prop_assert!(!chunk.is_empty());
            }
        }

        #[test]
        fn small_chunker_respects_bounds(text in statement_text(), size in 5usize..60) {
            let overlap = size / 5;
            let chunker = Chunker::new(size, overlap).unwrap();
            for chunk in chunker.split(&text) {
                prop_assert!(chunk.chars().count() <= size);
            }
        }

        #[test]
        fn every_word_is_kept(text in statement_text()) {
            let chunks = Chunker::default().split(&text);
            let joined = chunks.join(" ");
            // Only words longer than a chunk can be hard-cut.
            for word in text.split_whitespace().filter(|w| w.chars().count() < 100) {
                prop_assert!(joined.contains(word));
            }
        }
    }
}
