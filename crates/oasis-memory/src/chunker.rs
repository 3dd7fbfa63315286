//! Recursive text chunker: paragraph-first, sentence-second, word-third
//! greedy splitting under a byte budget, with whitespace-snapped overlap.
//!
//! Sentence boundaries recognise `.!?` followed by whitespace and an
//! uppercase letter, `.` before a newline, and the CJK terminators
//! `。！？` (always a boundary). Dots inside decimal numbers and after a
//! closed abbreviation list are not boundaries. Over-long words split on
//! code-point boundaries.

/// Abbreviations whose trailing dot never ends a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "vs", "etc", "inc", "ltd", "e.g", "i.e", "viz",
    "al", "approx", "dept", "est", "fig", "no", "vol",
];

/// Chunker settings. The byte budget is `max_tokens * 4`.
#[derive(Clone, Copy, Debug)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
    pub overlap_bytes: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            overlap_bytes: 128,
        }
    }
}

impl ChunkerConfig {
    pub fn max_bytes(&self) -> usize {
        self.max_tokens.saturating_mul(4).max(1)
    }
}

/// Split `text` into chunks of at most `max_tokens * 4` bytes.
///
/// Input that already fits comes back as a single chunk equal to the
/// trimmed input.
pub fn chunk_text(text: &str, config: &ChunkerConfig) -> Vec<String> {
    let max = config.max_bytes();
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.len() <= max {
        return vec![trimmed.to_string()];
    }

    let atoms = atomize(trimmed, max);
    pack(&atoms, max, config.overlap_bytes)
}

/// An indivisible unit plus the separator joining it to its predecessor.
struct Atom {
    text: String,
    sep: &'static str,
}

/// Break text into atoms no larger than `max` bytes: paragraphs, then
/// sentences of oversize paragraphs, then words, then code-point pieces.
fn atomize(text: &str, max: usize) -> Vec<Atom> {
    let mut atoms = Vec::new();

    for paragraph in split_paragraphs(text) {
        let mut sep = "\n\n";
        if paragraph.len() <= max {
            atoms.push(Atom {
                text: paragraph.to_string(),
                sep,
            });
            continue;
        }
        for sentence in split_sentences(paragraph) {
            if sentence.len() <= max {
                atoms.push(Atom {
                    text: sentence.to_string(),
                    sep,
                });
                sep = " ";
                continue;
            }
            for word in sentence.split_whitespace() {
                if word.len() <= max {
                    atoms.push(Atom {
                        text: word.to_string(),
                        sep,
                    });
                } else {
                    for piece in hard_split(word, max) {
                        atoms.push(Atom { text: piece, sep });
                    }
                }
                sep = " ";
            }
        }
    }

    atoms
}

/// Greedy packing of atoms under the budget, prepending a
/// whitespace-snapped overlap tail to each follow-on chunk when it fits.
fn pack(atoms: &[Atom], max: usize, overlap_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for atom in atoms {
        if current.is_empty() {
            current.push_str(&atom.text);
            continue;
        }
        if current.len() + atom.sep.len() + atom.text.len() <= max {
            current.push_str(atom.sep);
            current.push_str(&atom.text);
        } else {
            let tail = overlap_tail(&current, overlap_bytes);
            chunks.push(std::mem::take(&mut current));
            if !tail.is_empty() && tail.len() + 1 + atom.text.len() <= max {
                current.push_str(&tail);
                current.push(' ');
            }
            current.push_str(&atom.text);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// The final `overlap_bytes` of a chunk, snapped forward to a code-point
/// boundary and then past the next whitespace. Empty when nothing
/// whitespace-aligned remains.
fn overlap_tail(chunk: &str, overlap_bytes: usize) -> String {
    if overlap_bytes == 0 || chunk.len() <= overlap_bytes {
        return String::new();
    }
    let mut start = chunk.len() - overlap_bytes;
    while start < chunk.len() && !chunk.is_char_boundary(start) {
        start += 1;
    }
    match chunk[start..].find(char::is_whitespace) {
        Some(offset) => {
            let tail = chunk[start + offset..].trim_start();
            tail.to_string()
        }
        None => String::new(),
    }
}

/// Split on blank lines (one or more empty lines between paragraphs).
fn split_paragraphs(text: &str) -> Vec<&str> {
    let mut paragraphs = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\n' {
            // Look ahead for a blank line (only whitespace until the next newline).
            let mut j = i + 1;
            while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t' || bytes[j] == b'\r') {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'\n' {
                let para = text[start..i].trim();
                if !para.is_empty() {
                    paragraphs.push(para);
                }
                // Skip the whole blank run.
                while j < bytes.len() && text.as_bytes()[j].is_ascii_whitespace() {
                    j += 1;
                }
                start = j;
                i = j;
                continue;
            }
        }
        i += 1;
    }
    let para = text[start..].trim();
    if !para.is_empty() {
        paragraphs.push(para);
    }
    paragraphs
}

/// Split a paragraph into sentences per the boundary rules.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    let chars: Vec<(usize, char)> = text.char_indices().collect();
    for (pos, &(idx, c)) in chars.iter().enumerate() {
        let is_boundary = match c {
            '。' | '！' | '？' => true,
            '.' | '!' | '?' => {
                let next = chars.get(pos + 1).map(|&(_, n)| n);
                match next {
                    Some('\n') if c == '.' => !is_abbreviation(text, idx),
                    Some(n) if n.is_whitespace() => {
                        let mut k = pos + 1;
                        while chars.get(k).map(|&(_, n)| n.is_whitespace()) == Some(true) {
                            k += 1;
                        }
                        let upper_follows =
                            chars.get(k).map(|&(_, n)| n.is_uppercase()) == Some(true);
                        upper_follows && !(c == '.' && is_abbreviation(text, idx))
                    }
                    _ => false,
                }
            }
            _ => false,
        };

        if is_boundary {
            let end = idx + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Whether the dot at `dot_idx` terminates a known abbreviation
/// (or sits inside a decimal number).
fn is_abbreviation(text: &str, dot_idx: usize) -> bool {
    let before = &text[..dot_idx];
    let word_start = before
        .rfind(char::is_whitespace)
        .map(|i| i + 1)
        .unwrap_or(0);
    let word = before[word_start..].trim_matches(|c: char| !c.is_alphanumeric() && c != '.');
    if word.is_empty() {
        return false;
    }
    // Decimal guard: "3.14" — digit on both sides of the dot.
    if word.chars().last().is_some_and(|c| c.is_ascii_digit()) {
        if let Some(after) = text[dot_idx..].chars().nth(1) {
            if after.is_ascii_digit() {
                return true;
            }
        }
    }
    let lowered = word.to_lowercase();
    let lowered = lowered.trim_end_matches('.');
    ABBREVIATIONS.contains(&lowered)
}

/// Split an over-long word on code-point boundaries into ≤ max pieces.
fn hard_split(word: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in word.chars() {
        if current.len() + c.len_utf8() > max && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
