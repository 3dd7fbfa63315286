//! In-process BM25 keyword scoring with markdown-heading boosting.
//!
//! Tokenisation keeps hyphenated compounds and also emits their parts,
//! so `"multi-agent"` matches both the compound and either half. Tokens
//! on markdown heading lines count double.

use std::collections::HashMap;

const K1: f64 = 1.2;
const B: f64 = 0.75;
/// Extra weight given to a token occurrence on a heading line.
const HEADING_WEIGHT: f64 = 2.0;

/// Tokenise text: lowercase words of alphanumerics and hyphens; a
/// hyphenated compound is emitted whole, then split into its parts.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    let mut flush = |word: &mut String, tokens: &mut Vec<String>| {
        let trimmed = word.trim_matches('-');
        if !trimmed.is_empty() {
            tokens.push(trimmed.to_string());
            if trimmed.contains('-') {
                for part in trimmed.split('-').filter(|p| !p.is_empty()) {
                    tokens.push(part.to_string());
                }
            }
        }
        word.clear();
    };

    for c in text.chars() {
        if c.is_alphanumeric() || c == '-' {
            word.extend(c.to_lowercase());
        } else {
            flush(&mut word, &mut tokens);
        }
    }
    flush(&mut word, &mut tokens);

    tokens
}

/// Per-document weighted term frequencies plus total weight (length).
struct DocTerms {
    tf: HashMap<String, f64>,
    length: f64,
}

fn index_document(content: &str) -> DocTerms {
    let mut tf: HashMap<String, f64> = HashMap::new();
    let mut length = 0.0;

    for line in content.lines() {
        let weight = if line.trim_start().starts_with('#') {
            HEADING_WEIGHT
        } else {
            1.0
        };
        for token in tokenize(line) {
            *tf.entry(token).or_insert(0.0) += weight;
            length += weight;
        }
    }

    DocTerms { tf, length }
}

/// Score `(id, content)` candidates against a query with BM25.
///
/// Returns `(id, score)` for every candidate with a positive score,
/// ordered score-descending with ties broken by id. Deterministic for
/// identical inputs.
pub fn score_keyword(query: &str, candidates: &[(String, String)]) -> Vec<(String, f64)> {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() || candidates.is_empty() {
        return Vec::new();
    }

    let indexed: Vec<(&String, DocTerms)> = candidates
        .iter()
        .map(|(id, content)| (id, index_document(content)))
        .collect();

    let n = indexed.len() as f64;
    let avg_len = indexed.iter().map(|(_, d)| d.length).sum::<f64>() / n;
    let avg_len = if avg_len > 0.0 { avg_len } else { 1.0 };

    // Document frequency per query token.
    let mut df: HashMap<&str, f64> = HashMap::new();
    for token in &query_tokens {
        let count = indexed
            .iter()
            .filter(|(_, d)| d.tf.contains_key(token.as_str()))
            .count() as f64;
        df.insert(token.as_str(), count);
    }

    let mut scored: Vec<(String, f64)> = indexed
        .iter()
        .filter_map(|(id, doc)| {
            let mut score = 0.0;
            for token in &query_tokens {
                let tf = match doc.tf.get(token.as_str()) {
                    Some(tf) => *tf,
                    None => continue,
                };
                let df = df[token.as_str()];
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                let norm = tf + K1 * (1.0 - B + B * doc.length / avg_len);
                score += idf * (tf * (K1 + 1.0)) / norm;
            }
            (score > 0.0).then(|| ((*id).clone(), score))
        })
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    scored
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
