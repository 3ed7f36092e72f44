//! Recursive character splitter.
//!
//! Splitting strategy:
//! 1. Pick the first separator that occurs in the text (paragraph, line, word, char)
//! 2. Split on it, keeping the separator at the start of the following piece
//! 3. Pieces still at or over the budget are split again with the remaining separators
//! 4. Small pieces are merged greedily up to the budget, carrying an overlap tail
//!
//! All lengths are in chars, not bytes.

use std::collections::VecDeque;

use crate::config::ChunkConfig;

pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self::with_separators(
            chunk_size,
            chunk_overlap,
            DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    pub fn with_separators(chunk_size: usize, chunk_overlap: usize, separators: Vec<String>) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
            separators,
        }
    }

    pub fn from_config(config: &ChunkConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split `text` into trimmed, non-empty chunks of at most `chunk_size` chars.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = "";
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep;
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                small.push(piece);
                continue;
            }

            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }

            if remaining.is_empty() {
                push_trimmed(&mut chunks, piece);
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }

        chunks
    }

    /// Greedily join pieces up to the budget; after each flush keep at most
    /// `chunk_overlap` chars of trailing pieces as the start of the next chunk.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());

                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            window.push_back(piece);
            total += len;
        }

        push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
        chunks
    }
}

/// Split on `separator`, attaching each separator to the piece after it.
/// An empty separator splits into single chars. Empty pieces are dropped.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut starts = vec![0usize];
    starts.extend(text.match_indices(separator).map(|(i, _)| i).filter(|&i| i > 0));
    starts.dedup();

    let mut pieces = Vec::with_capacity(starts.len());
    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(text.len());
        if end > start {
            pieces.push(&text[start..end]);
        }
    }
    pieces
}

fn push_trimmed(chunks: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace() {
        let splitter = RecursiveSplitter::new(100, 20);
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text("   \n  \n\n ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = RecursiveSplitter::new(100, 20);
        let chunks = splitter.split_text("  Stage 9 is the Compliance Checklist.\n");
        assert_eq!(chunks, vec!["Stage 9 is the Compliance Checklist."]);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = RecursiveSplitter::new(10, 0);
        let chunks = splitter.split_text("aaaa\n\nbbbb\n\ncccc");
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccc"]);
    }

    #[test]
    fn test_overlap_repeats_trailing_words() {
        let splitter = RecursiveSplitter::new(10, 5);
        let chunks = splitter.split_text("one two three four five");
        assert_eq!(chunks, vec!["one two", "two three", "four five"]);
    }

    #[test]
    fn test_long_word_split_at_chars() {
        let splitter = RecursiveSplitter::new(4, 0);
        assert_eq!(splitter.split_text("abcdefghij"), vec!["abcd", "efgh", "ij"]);
        assert_eq!(
            splitter.split_text("hi abcdefghij"),
            vec!["hi", "abc", "defg", "hij"]
        );
    }

    #[test]
    fn test_chunks_never_exceed_budget() {
        let paragraph = "The Validate phase covers system integration testing, \
                         user acceptance testing and data migration rehearsals.";
        let text = (0..40)
            .map(|i| format!("{i}. {paragraph}"))
            .collect::<Vec<_>>()
            .join("\n\n");

        for (size, overlap) in [(50, 10), (120, 30), (1000, 200)] {
            let splitter = RecursiveSplitter::new(size, overlap);
            let chunks = splitter.split_text(&text);
            assert!(!chunks.is_empty());
            for chunk in &chunks {
                assert!(!chunk.is_empty());
                assert!(
                    chunk.chars().count() <= size,
                    "chunk of {} chars exceeds {size}",
                    chunk.chars().count()
                );
            }
        }
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let splitter = RecursiveSplitter::new(6, 0);
        assert_eq!(splitter.split_text("日本語テキスト"), vec!["日本語テキス", "ト"]);
    }

    #[test]
    fn test_overlap_clamped_below_size() {
        let splitter = RecursiveSplitter::new(5, 50);
        let chunks = splitter.split_text("abcdefghijkl");
        assert!(chunks.iter().all(|c| c.chars().count() <= 5));
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn test_split_keep_separator_attaches_to_next_piece() {
        assert_eq!(
            split_keep_separator("a\nb\nc", "\n"),
            vec!["a", "\nb", "\nc"]
        );
        assert_eq!(split_keep_separator("\nb", "\n"), vec!["\nb"]);
        assert_eq!(split_keep_separator("ab", ""), vec!["a", "b"]);
    }
}
