//! Token-budgeted chunker for oversized textual artifacts
//!
//! Page snapshots handed to a model are a static header (url, title, viewport
//! summary) followed by a dynamic, line-oriented element listing that can run
//! to tens of thousands of tokens. The chunker splits the element lines into
//! budget-respecting pieces, each reproducing the header, so every piece is
//! independently model-safe. Concatenating the dynamic slices of all chunks
//! reproduces the original element lines exactly.

use tracing::debug;

/// Markers that open the dynamic element section of a snapshot
pub const SECTION_MARKERS: &[&str] = &[
    "[Interactive Elements]",
    "[Scrollable Elements]",
    "[Page Content]",
];

/// Tokens held back from each chunk's budget for stamping and slack
pub const DEFAULT_SAFETY_MARGIN: usize = 50;

const NO_ELEMENTS_MARKER: &str = "(no elements)";

/// Rough token count: ~4 characters per token, rounded up
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Splits one large text into ordered, budget-bounded chunks
#[derive(Clone, Copy, Debug)]
pub struct TokenChunker {
    max_tokens: usize,
    safety_margin: usize,
}

impl TokenChunker {
    /// Create a chunker with the given per-chunk token budget
    pub fn new(max_tokens: usize) -> Self {
        Self {
            max_tokens,
            safety_margin: DEFAULT_SAFETY_MARGIN,
        }
    }

    /// Override the stamping/slack margin
    pub fn with_safety_margin(mut self, safety_margin: usize) -> Self {
        self.safety_margin = safety_margin;
        self
    }

    /// Split `text` into a [`ChunkSet`]
    ///
    /// A text already within budget is returned unmodified as the single
    /// chunk. Otherwise element lines are packed greedily under
    /// `budget - header - margin`; a single line bigger than that becomes its
    /// own chunk rather than being split mid-line.
    pub fn chunk(&self, text: &str) -> ChunkSet {
        if estimate_tokens(text) <= self.max_tokens {
            debug!(tokens = estimate_tokens(text), "TokenChunker::chunk: fits in one chunk");
            return ChunkSet {
                chunks: vec![text.to_string()],
            };
        }

        let (header, elements) = split_sections(text);
        let lines: Vec<&str> = elements.lines().filter(|line| !line.trim().is_empty()).collect();
        debug!(
            header_len = header.len(),
            line_count = lines.len(),
            "TokenChunker::chunk: splitting"
        );

        if lines.is_empty() {
            return ChunkSet {
                chunks: vec![assemble(header, 1, 1, &[NO_ELEMENTS_MARKER])],
            };
        }

        let header_tokens = estimate_tokens(header);
        let available = self
            .max_tokens
            .saturating_sub(header_tokens + self.safety_margin)
            .max(1);

        let mut groups: Vec<Vec<&str>> = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_tokens = 0usize;
        for line in lines {
            let line_tokens = estimate_tokens(line);
            if !current.is_empty() && current_tokens + line_tokens > available {
                groups.push(std::mem::take(&mut current));
                current_tokens = 0;
            }
            current.push(line);
            current_tokens += line_tokens;
        }
        if !current.is_empty() {
            groups.push(current);
        }

        // The [index/total] stamp needs the final count, so assembly is a
        // second pass over the completed groups.
        let total = groups.len();
        let chunks = groups
            .iter()
            .enumerate()
            .map(|(i, group)| assemble(header, i + 1, total, group))
            .collect();

        ChunkSet { chunks }
    }
}

/// Split into (header, elements) at the earliest section marker
///
/// No marker means the whole text is elements with an empty header.
fn split_sections(text: &str) -> (&str, &str) {
    let boundary = SECTION_MARKERS
        .iter()
        .filter_map(|marker| text.find(marker))
        .min();
    match boundary {
        Some(idx) => (text[..idx].trim_end(), &text[idx..]),
        None => ("", text),
    }
}

fn assemble(header: &str, index: usize, total: usize, lines: &[&str]) -> String {
    let stamp = format!("[chunk {index}/{total}]");
    if header.is_empty() {
        format!("{}\n{}", stamp, lines.join("\n"))
    } else {
        format!("{}\n{}\n{}", header, stamp, lines.join("\n"))
    }
}

/// Ordered chunks derived from one source text
#[derive(Clone, Debug)]
pub struct ChunkSet {
    chunks: Vec<String>,
}

impl ChunkSet {
    /// The chunk at `index`, if any
    pub fn get(&self, index: usize) -> Option<&str> {
        self.chunks.get(index).map(String::as_str)
    }

    /// Number of chunks
    pub fn total(&self) -> usize {
        self.chunks.len()
    }

    /// Whether the source text fit in a single chunk
    pub fn is_single(&self) -> bool {
        self.chunks.len() == 1
    }

    /// Iterate the chunks in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.chunks.iter().map(String::as_str)
    }
}
