//! Recursive character text splitter.
//!
//! Text is split on the coarsest separator present (paragraph, line, word,
//! character), pieces that are still too large are split again with the finer
//! separators, and the pieces are then merged back into chunks of at most
//! `chunk_size` characters that overlap by up to `chunk_overlap` characters.

use std::collections::VecDeque;

use babysquad_common::{Result, SquadError};

use crate::types::{Chunk, Document};

const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

impl TextSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(SquadError::Config("chunk_size must be positive".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(SquadError::Config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Split every document; chunks inherit their document's metadata.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.text).into_iter().map(|text| Chunk {
                    text,
                    metadata: doc.metadata.clone(),
                })
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, &self.separators)
    }

    fn split_with(&self, text: &str, separators: &[String]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).map(String::as_str).unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }
        chunks
    }

    /// Greedily join `pieces` into chunks, carrying a tail of the previous
    /// chunk forward as overlap.
    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        let joined_len = |window: &VecDeque<&str>, total: usize| {
            if window.is_empty() { 0 } else { total + sep_len }
        };

        for piece in pieces {
            let len = char_len(piece);
            if joined_len(&window, total) + len > self.chunk_size && !window.is_empty() {
                push_chunk(&mut chunks, &window, separator);
                while total > self.chunk_overlap
                    || (total > 0 && joined_len(&window, total) + len > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else { break };
                    total -= char_len(front) + if window.is_empty() { 0 } else { sep_len };
                }
            }
            total += len + if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
        }
        push_chunk(&mut chunks, &window, separator);
        chunks
    }
}

fn push_chunk(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
