//! Text extraction: raw bytes in, plain text plus optional page/section
//! metadata out. Extractors are pure functions of their input bytes and
//! are picked by MIME type.

pub mod csv;
pub mod docx;
pub mod html;
pub mod json;
pub mod markdown;
pub mod plain;

/// A page/section descriptor over a byte range of the extracted text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PageMeta {
    pub page: Option<i64>,
    pub heading: Option<String>,
    /// Base64-encoded images attached to this section.
    pub images: Vec<String>,
    /// Byte range `[start, end)` within the extracted text.
    pub start: usize,
    pub end: usize,
}

/// Extraction output.
#[derive(Clone, Debug, Default)]
pub struct Extracted {
    pub text: String,
    pub pages: Vec<PageMeta>,
}

impl Extracted {
    pub fn text_only(text: impl Into<String>) -> Self {
        Extracted {
            text: text.into(),
            pages: Vec::new(),
        }
    }
}

/// An extractor turns raw bytes into plain text (and optionally pages).
pub trait Extractor: Send + Sync {
    fn name(&self) -> &str;
    fn extract(&self, data: &[u8]) -> anyhow::Result<Extracted>;
}

/// Pick an extractor for a MIME type. Unknown types fall back to plain
/// text. The decision is cheap; callers may cache the reference.
pub fn extractor_for(mime: &str) -> &'static dyn Extractor {
    let mime = mime
        .split(';')
        .next()
        .unwrap_or(mime)
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "text/markdown" | "text/x-markdown" => &markdown::MarkdownExtractor,
        "text/html" | "application/xhtml+xml" => &html::HtmlExtractor,
        "text/csv" => &csv::CsvExtractor,
        "application/json" => &json::JsonExtractor,
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            &docx::DocxExtractor
        }
        _ => &plain::PlainExtractor,
    }
}

/// Guess a MIME type from a file name, for frontends that only give us
/// a name.
pub fn mime_from_filename(name: &str) -> &'static str {
    let ext = name.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "md" | "markdown" => "text/markdown",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "json" => "application/json",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "text/plain",
    }
}

/// Collapse runs of blank lines down to a single blank line.
pub(crate) fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0;
    for line in text.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
            out.push('\n');
        } else {
            blank_run = 0;
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out.trim().to_string()
}
