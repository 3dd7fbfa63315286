//! CSV extractor — rows become labelled paragraphs.
//!
//! The first row supplies headers; every later row is emitted as the
//! comma-joined list of its non-empty `Header: Value` fields, with a
//! blank line between rows.

use super::{Extracted, Extractor};

pub struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn name(&self) -> &str {
        "csv"
    }

    fn extract(&self, data: &[u8]) -> anyhow::Result<Extracted> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut paragraphs = Vec::new();
        for record in reader.records() {
            let record = record?;
            let fields: Vec<String> = record
                .iter()
                .enumerate()
                .filter_map(|(i, value)| {
                    let value = value.trim();
                    if value.is_empty() {
                        return None;
                    }
                    let header = headers.get(i).map(String::as_str).unwrap_or("");
                    if header.is_empty() {
                        Some(value.to_string())
                    } else {
                        Some(format!("{header}: {value}"))
                    }
                })
                .collect();
            if !fields.is_empty() {
                paragraphs.push(fields.join(", "));
            }
        }

        Ok(Extracted::text_only(paragraphs.join("\n\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(input: &str) -> String {
        CsvExtractor.extract(input.as_bytes()).unwrap().text
    }

    #[test]
    fn test_rows_become_labelled_paragraphs() {
        let out = extract("Name,Age\nJohn,30\nJane,25\n");
        assert_eq!(out, "Name: John, Age: 30\n\nName: Jane, Age: 25");
    }

    #[test]
    fn test_empty_fields_skipped() {
        let out = extract("Name,Age,City\nJohn,,Lisbon\n");
        assert_eq!(out, "Name: John, City: Lisbon");
    }

    #[test]
    fn test_quoted_values() {
        let out = extract("Name,Note\nJohn,\"likes csv, a lot\"\n");
        assert_eq!(out, "Name: John, Note: likes csv, a lot");
    }

    #[test]
    fn test_header_only_is_empty() {
        assert_eq!(extract("Name,Age\n"), "");
    }

    #[test]
    fn test_extra_columns_kept_without_label() {
        let out = extract("Name\nJohn,stray\n");
        assert_eq!(out, "Name: John, stray");
    }
}
