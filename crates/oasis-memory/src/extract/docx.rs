//! DOCX extractor — streams `word/document.xml` out of the zip
//! container.
//!
//! Paragraphs are separated by blank lines; tables use the labelled
//! row format with row 0 as headers; heading-styled paragraphs open a
//! `PageMeta` section whose byte range closes at the next heading or
//! at the end; images under `word/media/` are base64-encoded and
//! attached to the first section.

use std::io::{Cursor, Read};

use base64::Engine;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{Extracted, Extractor, PageMeta};

pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn name(&self) -> &str {
        "docx"
    }

    fn extract(&self, data: &[u8]) -> anyhow::Result<Extracted> {
        let mut archive = zip::ZipArchive::new(Cursor::new(data))?;

        let mut xml = String::new();
        archive
            .by_name("word/document.xml")?
            .read_to_string(&mut xml)?;

        let mut extracted = parse_document_xml(&xml)?;
        attach_media_images(&mut archive, &mut extracted)?;
        Ok(extracted)
    }
}

fn parse_document_xml(xml: &str) -> anyhow::Result<Extracted> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut pages: Vec<PageMeta> = Vec::new();

    let mut para_buf = String::new();
    let mut para_style: Option<String> = None;

    let mut table_depth = 0usize;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell_buf = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"w:tbl" => table_depth += 1,
                b"w:tr" if table_depth == 1 => row = Vec::new(),
                b"w:tc" if table_depth == 1 => cell_buf.clear(),
                _ => {}
            },
            Event::Empty(e) => {
                if e.name().as_ref() == b"w:pStyle" && table_depth == 0 {
                    if let Some(attr) = e.try_get_attribute("w:val")? {
                        para_style = Some(attr.unescape_value()?.into_owned());
                    }
                }
            }
            Event::Text(t) => {
                let text = t.decode()?;
                if table_depth > 0 {
                    cell_buf.push_str(&text);
                } else {
                    para_buf.push_str(&text);
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"w:p" if table_depth == 0 => {
                    flush_paragraph(&mut out, &mut pages, &mut para_buf, &mut para_style);
                }
                b"w:tc" if table_depth == 1 => {
                    row.push(cell_buf.trim().to_string());
                    cell_buf.clear();
                }
                b"w:tr" if table_depth == 1 => {
                    rows.push(std::mem::take(&mut row));
                }
                b"w:tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 {
                        render_table(&mut out, &std::mem::take(&mut rows));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let text = out.trim_end().to_string();
    if let Some(last) = pages.last_mut() {
        last.end = text.len();
    }
    for page in &mut pages {
        page.end = page.end.min(text.len());
    }

    Ok(Extracted { text, pages })
}

fn flush_paragraph(
    out: &mut String,
    pages: &mut Vec<PageMeta>,
    para_buf: &mut String,
    para_style: &mut Option<String>,
) {
    let para = para_buf.trim().to_string();
    let style = para_style.take();
    para_buf.clear();
    if para.is_empty() {
        return;
    }

    let is_heading = style
        .as_deref()
        .is_some_and(|s| s.starts_with("Heading") || s == "Title");
    if is_heading {
        // The previous section ends where this heading begins.
        if let Some(open) = pages.last_mut() {
            open.end = out.len();
        }
        pages.push(PageMeta {
            heading: Some(para.clone()),
            start: out.len(),
            ..Default::default()
        });
    }

    out.push_str(&para);
    out.push_str("\n\n");
}

/// Row 0 holds headers; later rows become `Header: Value` paragraphs.
fn render_table(out: &mut String, rows: &[Vec<String>]) {
    let Some((headers, body)) = rows.split_first() else {
        return;
    };
    for row in body {
        let fields: Vec<String> = row
            .iter()
            .enumerate()
            .filter(|(_, value)| !value.is_empty())
            .map(|(i, value)| {
                match headers.get(i).filter(|h| !h.is_empty()) {
                    Some(header) => format!("{header}: {value}"),
                    None => value.clone(),
                }
            })
            .collect();
        if !fields.is_empty() {
            out.push_str(&fields.join(", "));
            out.push_str("\n\n");
        }
    }
}

/// Base64-encode `word/media/*` entries onto the first section,
/// synthesising one if the document had no headings.
fn attach_media_images(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    extracted: &mut Extracted,
) -> anyhow::Result<()> {
    let media_names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("word/media/"))
        .map(String::from)
        .collect();
    if media_names.is_empty() {
        return Ok(());
    }

    let mut images = Vec::new();
    for name in media_names {
        let mut bytes = Vec::new();
        archive.by_name(&name)?.read_to_end(&mut bytes)?;
        images.push(base64::engine::general_purpose::STANDARD.encode(bytes));
    }

    if extracted.pages.is_empty() {
        extracted.pages.push(PageMeta {
            start: 0,
            end: extracted.text.len(),
            ..Default::default()
        });
    }
    extracted.pages[0].images = images;
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    /// Build a minimal docx (zip with `word/document.xml`).
    fn make_docx(document_xml: &str, media: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut cursor);
            let options = SimpleFileOptions::default();
            writer.start_file("word/document.xml", options).unwrap();
            writer.write_all(document_xml.as_bytes()).unwrap();
            for (name, bytes) in media {
                writer.start_file(*name, options).unwrap();
                writer.write_all(bytes).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    fn para(text: &str) -> String {
        format!("<w:p><w:r><w:t>{text}</w:t></w:r></w:p>")
    }

    fn heading_para(style: &str, text: &str) -> String {
        format!(
            "<w:p><w:pPr><w:pStyle w:val=\"{style}\"/></w:pPr><w:r><w:t>{text}</w:t></w:r></w:p>"
        )
    }

    fn document(body: &str) -> String {
        format!(
            "<?xml version=\"1.0\"?>\
             <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
             <w:body>{body}</w:body></w:document>"
        )
    }

    #[test]
    fn test_paragraphs_blank_line_separated() {
        let xml = document(&format!("{}{}", para("First paragraph."), para("Second one.")));
        let docx = make_docx(&xml, &[]);
        let out = DocxExtractor.extract(&docx).unwrap();
        assert_eq!(out.text, "First paragraph.\n\nSecond one.");
    }

    #[test]
    fn test_table_rows_labelled() {
        let table = "<w:tbl>\
            <w:tr><w:tc><w:p><w:r><w:t>Name</w:t></w:r></w:p></w:tc>\
                  <w:tc><w:p><w:r><w:t>Age</w:t></w:r></w:p></w:tc></w:tr>\
            <w:tr><w:tc><w:p><w:r><w:t>John</w:t></w:r></w:p></w:tc>\
                  <w:tc><w:p><w:r><w:t>30</w:t></w:r></w:p></w:tc></w:tr>\
            <w:tr><w:tc><w:p><w:r><w:t>Jane</w:t></w:r></w:p></w:tc>\
                  <w:tc><w:p><w:r><w:t>25</w:t></w:r></w:p></w:tc></w:tr>\
            </w:tbl>";
        let docx = make_docx(&document(table), &[]);
        let out = DocxExtractor.extract(&docx).unwrap();

        let paragraphs: Vec<&str> = out.text.split("\n\n").collect();
        assert_eq!(paragraphs, vec!["Name: John, Age: 30", "Name: Jane, Age: 25"]);
    }

    #[test]
    fn test_heading_opens_section() {
        let body = format!(
            "{}{}{}{}",
            heading_para("Heading1", "Intro"),
            para("Opening text."),
            heading_para("Heading2", "Details"),
            para("More text.")
        );
        let docx = make_docx(&document(&body), &[]);
        let out = DocxExtractor.extract(&docx).unwrap();

        assert_eq!(out.pages.len(), 2);
        assert_eq!(out.pages[0].heading.as_deref(), Some("Intro"));
        assert_eq!(out.pages[1].heading.as_deref(), Some("Details"));

        // The first section's range covers everything up to the next heading.
        let first = &out.text[out.pages[0].start..out.pages[0].end];
        assert!(first.contains("Intro"));
        assert!(first.contains("Opening text."));
        assert!(!first.contains("Details"));
        // The last section closes at the end of the text.
        assert_eq!(out.pages[1].end, out.text.len());
    }

    #[test]
    fn test_images_attached_to_first_section() {
        let body = format!("{}{}", heading_para("Heading1", "Pics"), para("Content."));
        let docx = make_docx(&document(&body), &[("word/media/image1.png", b"PNGBYTES")]);
        let out = DocxExtractor.extract(&docx).unwrap();

        assert_eq!(out.pages[0].images.len(), 1);
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(&out.pages[0].images[0])
            .unwrap();
        assert_eq!(decoded, b"PNGBYTES");
    }

    #[test]
    fn test_images_synthesise_section_when_no_headings() {
        let docx = make_docx(
            &document(&para("No headings here.")),
            &[("word/media/img.jpg", b"JPG")],
        );
        let out = DocxExtractor.extract(&docx).unwrap();
        assert_eq!(out.pages.len(), 1);
        assert!(out.pages[0].heading.is_none());
        assert_eq!(out.pages[0].end, out.text.len());
        assert_eq!(out.pages[0].images.len(), 1);
    }

    #[test]
    fn test_not_a_zip_errors() {
        assert!(DocxExtractor.extract(b"definitely not a zip").is_err());
    }
}
