//! Markdown extractor — strips markup down to readable plain text.
//!
//! Code fences drop their delimiters but keep the interior; headings
//! lose their `#` prefix; list and quote markers go; emphasis
//! delimiters are removed only when paired; links keep their text.

use std::sync::OnceLock;

use regex::Regex;

use super::{collapse_blank_lines, Extracted, Extractor};

pub struct MarkdownExtractor;

fn regexes() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            // Images keep their alt text, links keep their label.
            (Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap(), "$1"),
            (Regex::new(r"\[([^\]]+)\]\([^)]*\)").unwrap(), "$1"),
            // Paired emphasis delimiters, strongest first.
            (Regex::new(r"\*\*\*([^*]+)\*\*\*").unwrap(), "$1"),
            (Regex::new(r"\*\*([^*]+)\*\*").unwrap(), "$1"),
            (Regex::new(r"\*([^*\n]+)\*").unwrap(), "$1"),
            (Regex::new(r"__([^_]+)__").unwrap(), "$1"),
            (Regex::new(r"\b_([^_\n]+)_\b").unwrap(), "$1"),
            (Regex::new(r"`([^`\n]+)`").unwrap(), "$1"),
        ]
    })
}

impl Extractor for MarkdownExtractor {
    fn name(&self) -> &str {
        "markdown"
    }

    fn extract(&self, data: &[u8]) -> anyhow::Result<Extracted> {
        let text = String::from_utf8_lossy(data);
        let mut out = String::with_capacity(text.len());
        let mut in_fence = false;

        for line in text.lines() {
            let trimmed = line.trim_start();

            // Fence delimiters vanish; fenced content passes through verbatim.
            if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                out.push_str(line);
                out.push('\n');
                continue;
            }

            let line = strip_line_markers(trimmed);
            let mut line = line.to_string();
            for (regex, replacement) in regexes() {
                line = regex.replace_all(&line, *replacement).into_owned();
            }
            out.push_str(&line);
            out.push('\n');
        }

        Ok(Extracted::text_only(collapse_blank_lines(&out)))
    }
}

/// Strip heading, list, and quote markers from the start of a line.
fn strip_line_markers(line: &str) -> &str {
    let line = line.trim_start();

    // Headings: `#`+ followed by a space.
    let after_hashes = line.trim_start_matches('#');
    if after_hashes.len() < line.len() {
        if let Some(rest) = after_hashes.strip_prefix(' ') {
            return rest;
        }
    }

    // Quote marker.
    if let Some(rest) = line.strip_prefix("> ") {
        return rest.trim_start();
    }

    // Unordered list markers.
    for marker in ["- ", "* ", "+ "] {
        if let Some(rest) = line.strip_prefix(marker) {
            return rest;
        }
    }

    // Ordered list markers: digits followed by `. ` or `) `.
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") ")) {
            return rest;
        }
    }

    line
}
