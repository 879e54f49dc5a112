use crate::error::IngestError;
use crate::models::{PipelineOptions, TextChunk, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl ChunkingConfig {
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        if max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {overlap_chars} must be smaller than chunk size {max_chars}"
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_CHUNK_SIZE,
            overlap_chars: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TryFrom<&PipelineOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: &PipelineOptions) -> Result<Self, Self::Error> {
        Self::new(value.chunk_size, value.chunk_overlap)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Boundary {
    Word,
    Sentence,
    Paragraph,
}

/// Boundary class of the split point *before* `chars[position]`.
fn boundary_at(chars: &[char], position: usize) -> Option<Boundary> {
    if position == 0 || position >= chars.len() {
        return None;
    }
    let previous = chars[position - 1];
    if !previous.is_whitespace() || chars[position].is_whitespace() {
        return None;
    }

    let mut cursor = position - 1;
    let mut newlines = 0;
    loop {
        if chars[cursor] == '\n' {
            newlines += 1;
        }
        if cursor == 0 || !chars[cursor - 1].is_whitespace() {
            break;
        }
        cursor -= 1;
    }

    if newlines >= 2 {
        return Some(Boundary::Paragraph);
    }
    if newlines == 1 {
        return Some(Boundary::Sentence);
    }
    match cursor.checked_sub(1).map(|index| chars[index]) {
        Some('.' | '!' | '?') => Some(Boundary::Sentence),
        _ => Some(Boundary::Word),
    }
}

/// Best split point in `(low, high]`, preferring the strongest boundary and,
/// among equals, the one closest to `high`.
fn best_split(chars: &[char], low: usize, high: usize) -> Option<usize> {
    let mut best: Option<(Boundary, usize)> = None;
    for position in (low + 1..=high).rev() {
        if let Some(kind) = boundary_at(chars, position) {
            match best {
                Some((current, _)) if current >= kind => {}
                _ => best = Some((kind, position)),
            }
            if kind == Boundary::Paragraph {
                break;
            }
        }
    }
    best.map(|(_, position)| position)
}

/// Latest word start in `(low, high]`, used to begin the next chunk on a word.
fn word_start(chars: &[char], low: usize, high: usize) -> Option<usize> {
    (low + 1..=high)
        .rev()
        .find(|position| boundary_at(chars, *position).is_some())
}

/// Split `text` into overlapping chunks of at most `max_chars` characters.
///
/// Each chunk is an exact slice of the input; consecutive chunks share at
/// least `overlap_chars` characters, so the input is recovered by dropping
/// the overlapping prefix of every chunk after the first.
pub fn split_text(text: &str, config: ChunkingConfig) -> Vec<TextChunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let size = config.max_chars;
    let overlap = config.overlap_chars;

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let window_end = (start + size).min(total);
        let end = if window_end == total {
            total
        } else {
            let low = start + (overlap + 1).max(size / 2) - 1;
            best_split(&chars, low.min(window_end - 1), window_end).unwrap_or(window_end)
        };

        chunks.push(TextChunk {
            index: chunks.len(),
            text: chars[start..end].iter().collect(),
            start,
            end,
        });

        if end == total {
            break;
        }

        let latest_start = end - overlap;
        let earliest_start = start.max(latest_start.saturating_sub(overlap));
        start = word_start(&chars, earliest_start, latest_start).unwrap_or(latest_start);
    }

    chunks
}

pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    split_text(text, config)
        .into_iter()
        .map(|chunk| chunk.text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig::new(max_chars, overlap_chars).expect("valid config")
    }

    fn reconstruct(text: &str, chunks: &[TextChunk]) -> String {
        let chars: Vec<char> = text.chars().collect();
        let mut rebuilt = String::new();
        let mut covered = 0;
        for chunk in chunks {
            assert!(chunk.start <= covered, "gap before chunk {}", chunk.index);
            rebuilt.extend(&chars[covered.max(chunk.start)..chunk.end]);
            covered = chunk.end;
        }
        rebuilt
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for paragraph in 0..12 {
            for sentence in 0..6 {
                text.push_str(&format!(
                    "Paragraph {paragraph} sentence {sentence} talks about hydraulic pumps. "
                ));
            }
            text.push_str("\n\n");
        }
        text
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(ChunkingConfig::new(100, 100).is_err());
        assert!(ChunkingConfig::new(0, 0).is_err());
        assert!(ChunkingConfig::new(100, 99).is_ok());
    }

    #[test]
    fn default_config_matches_documented_values() {
        let config = ChunkingConfig::default();
        assert_eq!(config.max_chars, 10_000);
        assert_eq!(config.overlap_chars, 1_000);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split_text("", config(100, 10)).is_empty());
        assert!(split_text("  \n\t ", config(100, 10)).is_empty());
    }

    #[test]
    fn short_text_is_single_identical_chunk() {
        let text = "The sky is blue.";
        let chunks = chunk_text(text, ChunkingConfig::default());
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn chunks_respect_size_overlap_and_reconstruct() {
        let text = sample_text();
        for (size, overlap) in [(200, 40), (500, 100), (120, 0), (64, 63)] {
            let chunks = split_text(&text, config(size, overlap));
            assert!(chunks.len() > 1);

            for chunk in &chunks {
                assert!(chunk.text.chars().count() <= size);
                assert_eq!(chunk.text.chars().count(), chunk.end - chunk.start);
            }
            for pair in chunks.windows(2) {
                assert!(pair[0].end >= pair[1].start + overlap);
                assert!(pair[1].start > pair[0].start);
            }
            assert_eq!(reconstruct(&text, &chunks), text);
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let first = "a".repeat(70);
        let second = "b ".repeat(40);
        let text = format!("{first}\n\n{second}");
        let chunks = split_text(&text, config(100, 10));
        assert_eq!(chunks[0].text, format!("{first}\n\n"));
    }

    #[test]
    fn prefers_sentence_over_word_boundary() {
        let text = "One two three four five. Six seven eight nine ten eleven twelve thirteen";
        let chunks = split_text(text, config(40, 5));
        assert_eq!(chunks[0].text, "One two three four five. ");
    }

    #[test]
    fn hard_cut_without_boundaries() {
        let text = "x".repeat(250);
        let chunks = split_text(&text, config(100, 20));
        assert_eq!(chunks[0].text.len(), 100);
        assert_eq!(chunks[1].start, 80);
        assert_eq!(reconstruct(&text, &chunks), text);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(30);
        let chunks = split_text(&text, config(10, 2));
        assert!(chunks.iter().all(|chunk| chunk.text.chars().count() <= 10));
        assert_eq!(reconstruct(&text, &chunks), text);
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = sample_text();
        assert_eq!(
            split_text(&text, config(300, 50)),
            split_text(&text, config(300, 50))
        );
    }
}
