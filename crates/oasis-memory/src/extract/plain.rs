//! Plain-text extractor — identity, modulo lossy UTF-8 decoding.

use super::{Extracted, Extractor};

pub struct PlainExtractor;

impl Extractor for PlainExtractor {
    fn name(&self) -> &str {
        "plain"
    }

    fn extract(&self, data: &[u8]) -> anyhow::Result<Extracted> {
        Ok(Extracted::text_only(String::from_utf8_lossy(data)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let out = PlainExtractor.extract(b"hello\nworld").unwrap();
        assert_eq!(out.text, "hello\nworld");
        assert!(out.pages.is_empty());
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let out = PlainExtractor.extract(&[0x68, 0x69, 0xff]).unwrap();
        assert!(out.text.starts_with("hi"));
    }

    #[test]
    fn test_pure_function() {
        let a = PlainExtractor.extract(b"same").unwrap();
        let b = PlainExtractor.extract(b"same").unwrap();
        assert_eq!(a.text, b.text);
    }
}
