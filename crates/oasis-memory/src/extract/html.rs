//! HTML extractor — tag removal with entity decoding.
//!
//! `<script>` and `<style>` drop their content entirely; block-level
//! tags turn into newlines; named and numeric entities are decoded.

use super::{collapse_blank_lines, Extracted, Extractor};

pub struct HtmlExtractor;

const BLOCK_TAGS: &[&str] = &[
    "p", "div", "br", "hr", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "tr", "table",
    "thead", "tbody", "section", "article", "header", "footer", "blockquote", "pre", "form",
];

impl Extractor for HtmlExtractor {
    fn name(&self) -> &str {
        "html"
    }

    fn extract(&self, data: &[u8]) -> anyhow::Result<Extracted> {
        let html = String::from_utf8_lossy(data);
        let mut out = String::with_capacity(html.len() / 2);
        let mut rest = html.as_ref();

        while let Some(open) = rest.find('<') {
            decode_entities_into(&rest[..open], &mut out);
            rest = &rest[open..];

            let close = match rest.find('>') {
                Some(i) => i,
                None => break, // dangling `<`, drop the remainder
            };
            let tag_body = &rest[1..close];
            let tag_name = tag_name_of(tag_body);
            rest = &rest[close + 1..];

            // Script/style content is discarded up to the closing tag.
            if tag_name == "script" || tag_name == "style" {
                let closer = format!("</{tag_name}");
                if let Some(end) = rest.to_ascii_lowercase().find(&closer) {
                    rest = &rest[end..];
                    if let Some(gt) = rest.find('>') {
                        rest = &rest[gt + 1..];
                    } else {
                        rest = "";
                    }
                } else {
                    rest = "";
                }
                continue;
            }

            if BLOCK_TAGS.contains(&tag_name.as_str()) {
                out.push('\n');
            }
        }
        decode_entities_into(rest, &mut out);

        Ok(Extracted::text_only(collapse_blank_lines(&out)))
    }
}

/// Lowercased tag name of a tag body like `"/div"` or `"a href=..."`.
fn tag_name_of(tag_body: &str) -> String {
    tag_body
        .trim_start_matches('/')
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Decode `&amp;`-style named and `&#65;`/`&#x41;` numeric entities.
fn decode_entities_into(text: &str, out: &mut String) {
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let semi = match rest[..rest.len().min(12)].find(';') {
            Some(i) => i,
            None => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
                .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                .and_then(char::from_u32),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
}
