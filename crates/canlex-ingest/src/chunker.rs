//! Token-budgeted chunking of long section content.
//!
//! Every chunk is prepended with a contextual header (document title, part
//! label, schedule label, section id) so it stays self-contained for
//! embedding. Splitting prefers legal structure boundaries before falling
//! back to sentences and then words, and token counts are computed once
//! per unit rather than per candidate split.

use tiktoken_rs::CoreBPE;

use canlex_core::normalize::collapse_blank_lines;

use crate::error::IngestError;

/// One chunk of section content, ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Contextual header, blank line, then the content slice.
    pub content: String,
    pub index: u32,
    /// Canonical section id of the source section, when chunking a section.
    pub section: Option<String>,
}

pub struct Chunker {
    bpe: CoreBPE,
    budget: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(budget: usize, overlap: usize) -> Result<Self, IngestError> {
        let bpe = tiktoken_rs::cl100k_base().map_err(|e| IngestError::Tokenizer(e.to_string()))?;
        Ok(Self {
            bpe,
            budget: budget.max(16),
            overlap: overlap.min(budget / 2),
        })
    }

    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Chunk one piece of content under a contextual header.
    ///
    /// `header_parts` are joined with ` | ` (empty parts dropped). The
    /// returned sequence is lazy and finite; consume it once.
    pub fn chunk<'a>(
        &'a self,
        header_parts: &[&str],
        content: &str,
        section: Option<&str>,
    ) -> ChunkStream<'a> {
        let header = header_parts
            .iter()
            .filter(|p| !p.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" | ");
        let content = collapse_blank_lines(content);
        let header_tokens = if header.is_empty() {
            0
        } else {
            self.count_tokens(&header) + 2
        };
        let content_budget = self.budget.saturating_sub(header_tokens).max(8);

        // Single-chunk fast path needs no unit split.
        let units = if self.count_tokens(&content) <= content_budget {
            vec![(content.clone(), 0)]
        } else {
            self.split_units(&content, content_budget)
        };

        ChunkStream {
            chunker: self,
            header,
            units,
            content_budget,
            pos: 0,
            index: 0,
            done: false,
            section: section.map(str::to_string),
        }
    }

    /// Split into units none of which exceeds the content budget, counting
    /// tokens once per unit.
    fn split_units(&self, content: &str, budget: usize) -> Vec<(String, usize)> {
        let mut out = Vec::new();
        for piece in split_legal(content) {
            self.push_unit(piece, budget, &mut out);
        }
        out
    }

    fn push_unit(&self, piece: &str, budget: usize, out: &mut Vec<(String, usize)>) {
        if piece.trim().is_empty() {
            return;
        }
        let tokens = self.count_tokens(piece);
        if tokens <= budget {
            out.push((piece.to_string(), tokens));
            return;
        }
        // Too big for one unit: sentences, then words.
        let sentences = split_sentences(piece);
        if sentences.len() > 1 {
            for s in sentences {
                self.push_unit(s, budget, out);
            }
            return;
        }
        for word in split_words(piece) {
            let t = self.count_tokens(word);
            out.push((word.to_string(), t));
        }
    }
}

/// Lazy chunk sequence. Finite; not restartable.
pub struct ChunkStream<'a> {
    chunker: &'a Chunker,
    header: String,
    units: Vec<(String, usize)>,
    content_budget: usize,
    pos: usize,
    index: u32,
    done: bool,
    section: Option<String>,
}

impl Iterator for ChunkStream<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done || self.pos >= self.units.len() {
            return None;
        }

        let start = self.pos;
        let mut used = 0usize;
        let mut end = start;
        while end < self.units.len() {
            let unit_tokens = self.units[end].1;
            if end > start && used + unit_tokens > self.content_budget {
                break;
            }
            used += unit_tokens;
            end += 1;
        }

        let body: String = self.units[start..end]
            .iter()
            .map(|(text, _)| text.as_str())
            .collect::<String>();
        let body = body.trim().to_string();

        let content = if self.header.is_empty() {
            body
        } else {
            format!("{}\n\n{}", self.header, body)
        };

        let chunk = Chunk {
            content,
            index: self.index,
            section: self.section.clone(),
        };
        self.index += 1;

        if end >= self.units.len() {
            self.done = true;
        } else {
            // Back up into the emitted window until the overlap budget is
            // spent, always advancing by at least one unit.
            let mut overlap_start = end;
            let mut overlap_used = 0usize;
            while overlap_start > start + 1 {
                let t = self.units[overlap_start - 1].1;
                if overlap_used + t > self.chunker.overlap {
                    break;
                }
                overlap_used += t;
                overlap_start -= 1;
            }
            self.pos = overlap_start;
        }

        Some(chunk)
    }
}

// ── Splitting ──

#[derive(Clone, Copy)]
enum Boundary {
    Subsection,
    Paragraph,
    Subparagraph,
    Clause,
}

const BOUNDARY_ORDER: &[Boundary] = &[
    Boundary::Subsection,
    Boundary::Paragraph,
    Boundary::Subparagraph,
    Boundary::Clause,
];

/// Split at the highest-priority legal boundary that actually divides the
/// text; fall back to sentences when none does. Slices cover the input, so
/// concatenating them reconstructs it.
fn split_legal(content: &str) -> Vec<&str> {
    for level in BOUNDARY_ORDER {
        let pieces = split_at_markers(content, *level);
        if pieces.len() > 1 {
            return pieces;
        }
    }
    split_sentences(content)
}

fn split_at_markers(content: &str, level: Boundary) -> Vec<&str> {
    let mut starts = vec![0usize];
    let mut offset = 0usize;
    for line in content.split_inclusive('\n') {
        if offset > 0 && line_has_marker(line, level) {
            starts.push(offset);
        }
        offset += line.len();
    }
    slice_at(content, starts)
}

fn line_has_marker(line: &str, level: Boundary) -> bool {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix('(') else {
        return false;
    };
    let Some(close) = rest.find(')') else {
        return false;
    };
    let token = &rest[..close];
    if token.is_empty() || token.len() > 4 {
        return false;
    }
    match level {
        Boundary::Subsection => token.chars().all(|c| c.is_ascii_digit() || c == '.'),
        Boundary::Paragraph => {
            token.len() <= 2 && token.chars().all(|c| c.is_ascii_lowercase())
        }
        Boundary::Subparagraph => token.chars().all(|c| matches!(c, 'i' | 'v' | 'x' | 'l')),
        Boundary::Clause => token.chars().all(|c| c.is_ascii_uppercase()),
    }
}

/// Sentence boundaries: terminator followed by whitespace, or a newline.
fn split_sentences(content: &str) -> Vec<&str> {
    let bytes = content.as_bytes();
    let mut starts = vec![0usize];
    let mut i = 0;
    while i + 1 < bytes.len() {
        let c = bytes[i];
        if (c == b'.' || c == b'?' || c == b'!') && bytes[i + 1].is_ascii_whitespace() {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j < bytes.len() {
                starts.push(j);
            }
            i = j;
        } else if c == b'\n' && i + 1 < bytes.len() {
            starts.push(i + 1);
            i += 1;
        } else {
            i += 1;
        }
    }
    slice_at(content, starts)
}

fn split_words(content: &str) -> Vec<&str> {
    let mut starts = vec![0usize];
    let bytes = content.as_bytes();
    let mut in_space = false;
    for (i, &b) in bytes.iter().enumerate() {
        if b.is_ascii_whitespace() {
            in_space = true;
        } else if in_space {
            starts.push(i);
            in_space = false;
        }
    }
    slice_at(content, starts)
}

fn slice_at<'a>(content: &'a str, starts: Vec<usize>) -> Vec<&'a str> {
    let mut pieces = Vec::with_capacity(starts.len());
    for (i, &s) in starts.iter().enumerate() {
        let e = starts.get(i + 1).copied().unwrap_or(content.len());
        if s < e {
            pieces.push(&content[s..e]);
        }
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(budget: usize, overlap: usize) -> Chunker {
        Chunker::new(budget, overlap).unwrap()
    }

    #[test]
    fn short_content_is_one_chunk_with_header() {
        let c = chunker(1536, 256);
        let chunks: Vec<Chunk> = c
            .chunk(
                &["Firearms Act", "Part I", "s 5"],
                "No person shall possess a firearm without a licence.",
                Some("F-11.6/en/section/4/s5"),
            )
            .collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert!(chunks[0]
            .content
            .starts_with("Firearms Act | Part I | s 5\n\n"));
        assert!(chunks[0].content.ends_with("without a licence."));
        assert_eq!(
            chunks[0].section.as_deref(),
            Some("F-11.6/en/section/4/s5")
        );
    }

    #[test]
    fn empty_header_parts_are_dropped() {
        let c = chunker(1536, 256);
        let chunks: Vec<Chunk> = c.chunk(&["Title", "", "s 1"], "Content.", None).collect();
        assert!(chunks[0].content.starts_with("Title | s 1\n\n"));
    }

    #[test]
    fn long_content_splits_at_subsections() {
        let c = chunker(64, 8);
        let mut content = String::new();
        for i in 1..=12 {
            content.push_str(&format!(
                "({i}) Subsection number {i} says that every licensed person must comply with the conditions attached to the licence and any renewal.\n"
            ));
        }
        let chunks: Vec<Chunk> = c.chunk(&["Act"], &content, None).collect();
        assert!(chunks.len() > 1, "expected multiple chunks");
        // Every chunk after the header break starts at a subsection marker.
        for chunk in &chunks {
            let body = chunk.content.split_once("\n\n").unwrap().1;
            assert!(
                body.trim_start().starts_with('('),
                "chunk does not start at a legal boundary: {body:?}"
            );
        }
        // Indexes are sequential.
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as u32);
        }
    }

    #[test]
    fn chunks_respect_token_budget() {
        let c = chunker(64, 8);
        let mut content = String::new();
        for i in 1..=20 {
            content.push_str(&format!("({i}) A subsection with some words in it.\n"));
        }
        for chunk in c.chunk(&[], &content, None) {
            assert!(
                c.count_tokens(&chunk.content) <= 64 + 8,
                "chunk exceeds budget"
            );
        }
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let c = chunker(48, 16);
        let mut content = String::new();
        for i in 1..=10 {
            content.push_str(&format!("({i}) Rule number {i} about firearms licensing.\n"));
        }
        let chunks: Vec<Chunk> = c.chunk(&[], &content, None).collect();
        assert!(chunks.len() >= 2);
        // Some trailing line of chunk N reappears in chunk N+1.
        let first_body: Vec<&str> = chunks[0].content.lines().collect();
        let last_line = first_body.last().unwrap();
        assert!(
            chunks[1].content.contains(last_line),
            "no overlap between consecutive chunks"
        );
    }

    #[test]
    fn oversized_sentence_falls_back_to_words() {
        let c = chunker(24, 4);
        // One long "sentence" with no terminators.
        let content = "licence ".repeat(200);
        let chunks: Vec<Chunk> = c.chunk(&[], &content, None).collect();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(c.count_tokens(&chunk.content) <= 24);
        }
    }

    #[test]
    fn paragraph_markers_split_when_no_subsections() {
        let pieces = split_legal(
            "(a) first paragraph text\n(b) second paragraph text\n(c) third paragraph text\n",
        );
        assert_eq!(pieces.len(), 3);
        assert!(pieces[1].starts_with("(b)"));
    }

    #[test]
    fn subsection_markers_win_over_paragraphs() {
        let pieces = split_legal(
            "(1) first subsection\n(a) inner paragraph\n(2) second subsection\n",
        );
        assert_eq!(pieces.len(), 2);
        assert!(pieces[1].starts_with("(2)"));
    }

    #[test]
    fn sentence_split_keeps_text_reconstructible() {
        let text = "First sentence. Second one? Third!";
        let pieces = split_sentences(text);
        assert_eq!(pieces.concat(), text);
        assert_eq!(pieces.len(), 3);
    }

    #[test]
    fn stream_is_consume_once() {
        let c = chunker(1536, 256);
        let mut stream = c.chunk(&[], "Some short content.", None);
        assert!(stream.next().is_some());
        assert!(stream.next().is_none());
        assert!(stream.next().is_none());
    }
}
