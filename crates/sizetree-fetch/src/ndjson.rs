//! Newline-delimited JSON decoding

use serde_json::Value;

use crate::error::{FetchError, Result};

/// Incremental decoder that turns byte chunks into complete JSON lines.
///
/// A trailing partial line is kept until the next chunk completes it or
/// [`LineDecoder::finish`] flushes it. Lines are split on raw bytes, so a
/// multi-byte character cut across two chunks decodes correctly.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    line: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of lines consumed so far, blank ones included.
    pub fn lines_read(&self) -> usize {
        self.line
    }

    /// Feed a chunk and return the values of every line it completed.
    ///
    /// Parsing stops at the first malformed line. Its error is the last
    /// item, after the values of the lines before it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Value>> {
        self.buffer.extend_from_slice(chunk);
        let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        let mut values = Vec::new();
        for raw in complete[..last_newline].split(|b| *b == b'\n') {
            self.line += 1;
            match parse_line(raw, self.line) {
                Ok(Some(value)) => values.push(Ok(value)),
                Ok(None) => {}
                Err(e) => {
                    values.push(Err(e));
                    break;
                }
            }
        }
        values
    }

    /// Flush the final line when the body does not end with a newline.
    pub fn finish(mut self) -> Result<Option<Value>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        self.line += 1;
        parse_line(&self.buffer, self.line)
    }
}

fn parse_line(raw: &[u8], line: usize) -> Result<Option<Value>> {
    let text = std::str::from_utf8(raw).map_err(|_| FetchError::Utf8 { line })?;
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|source| FetchError::Json { line, source })
}

/// Split and parse a complete body, stopping at the first malformed line.
pub fn parse_document(text: &str) -> Vec<Result<Value>> {
    let mut decoder = LineDecoder::new();
    let mut values = decoder.push(text.as_bytes());
    if !matches!(values.last(), Some(Err(_))) {
        values.extend(decoder.finish().transpose());
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn values(items: Vec<Result<Value>>) -> Vec<Value> {
        items.into_iter().map(|item| item.unwrap()).collect()
    }

    #[test]
    fn test_partial_lines_are_buffered() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(b"{\"a\":").is_empty());
        assert_eq!(values(decoder.push(b"1}\n{\"b\"")), vec![json!({"a": 1})]);
        assert_eq!(values(decoder.push(b":2}\n")), vec![json!({"b": 2})]);
        assert_eq!(decoder.finish().unwrap(), None);
    }

    #[test]
    fn test_unterminated_last_line_is_flushed() {
        let mut decoder = LineDecoder::new();
        assert_eq!(values(decoder.push(b"1\n2")), vec![json!(1)]);
        assert_eq!(decoder.finish().unwrap(), Some(json!(2)));
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "{\"n\":\"é\"}\n".as_bytes();
        let split = text.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&text[..split]).is_empty());
        assert_eq!(values(decoder.push(&text[split..])), vec![json!({"n": "é"})]);
    }

    #[test]
    fn test_blank_and_crlf_lines() {
        let mut decoder = LineDecoder::new();
        assert_eq!(values(decoder.push(b"1\r\n\n2\n")), vec![json!(1), json!(2)]);
        assert_eq!(decoder.lines_read(), 3);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let mut decoder = LineDecoder::new();
        let items = decoder.push(b"{}\n{oops\n[3]\n");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &json!({}));
        assert!(matches!(items[1], Err(FetchError::Json { line: 2, .. })));
    }

    #[test]
    fn test_parse_document() {
        assert_eq!(values(parse_document("{\"x\":1}\n{\"x\":2}")), vec![json!({"x": 1}), json!({"x": 2})]);

        let items = parse_document("{\"x\":1}\n[1,\n{\"x\":3}\n");
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(FetchError::Json { line: 2, .. })));
    }
}
