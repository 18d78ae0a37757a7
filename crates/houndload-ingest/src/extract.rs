//! Streaming record extraction
//!
//! [`RecordStream`] walks a collector document byte by byte, finds the
//! top-level `data` array and yields its elements one at a time. Only the
//! element currently being read is held in memory, so files larger than RAM
//! import fine. Other top-level keys (`meta` in particular, wherever it sits)
//! are skipped without being buffered.
//!
//! The scanner only tracks what it needs to find element boundaries: nesting
//! depth and string/escape state. Each completed element is then handed to
//! `serde_json`, which does the real validation.

use houndload_common::{HoundError, Result};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::warn;

/// One element of the `data` array, opaque to the pipeline
pub type Record = Value;

const READ_BUFFER_SIZE: usize = 64 * 1024;
const DATA_KEY: &str = "data";
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before the opening brace of the document
    Start,
    /// Between top-level keys, looking for `data`
    Keys { first: bool },
    /// Inside the `data` array
    Elements { first: bool },
    Done,
}

/// Lazy, order-preserving sequence of the records in a document's `data` array
///
/// The sequence cannot be restarted; open the file again for a fresh one.
/// After the first error the stream is fused.
pub struct RecordStream<R> {
    reader: R,
    phase: Phase,
    offset: u64,
    yielded: u64,
}

impl RecordStream<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::with_capacity(READ_BUFFER_SIZE, file)))
    }
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            phase: Phase::Start,
            offset: 0,
            yielded: 0,
        }
    }

    /// Records produced so far
    pub fn records_read(&self) -> u64 {
        self.yielded
    }

    fn advance(&mut self) -> Result<Option<Record>> {
        loop {
            match self.phase {
                Phase::Done => return Ok(None),
                Phase::Start => {
                    self.skip_bom()?;
                    self.expect(b'{')?;
                    self.phase = Phase::Keys { first: true };
                },
                Phase::Keys { first } => {
                    match self.peek_token()? {
                        b'}' => {
                            warn!("Document has no top-level `data` array");
                            self.phase = Phase::Done;
                            return Ok(None);
                        },
                        b',' if !first => {
                            self.bump()?;
                            self.peek_token()?;
                        },
                        _ if first => {},
                        other => return Err(self.unexpected(other, "',' or '}'")),
                    }

                    let key = self.read_key()?;
                    self.expect(b':')?;
                    if key == DATA_KEY {
                        if self.peek_token()? != b'[' {
                            return Err(HoundError::malformed(
                                self.offset,
                                "top-level `data` is not an array",
                            ));
                        }
                        self.bump()?;
                        self.phase = Phase::Elements { first: true };
                    } else {
                        self.peek_token()?;
                        self.scan_value(false)?;
                        self.phase = Phase::Keys { first: false };
                    }
                },
                Phase::Elements { first } => {
                    match self.peek_token()? {
                        b']' => {
                            self.bump()?;
                            self.phase = Phase::Done;
                            return Ok(None);
                        },
                        b',' if !first => {
                            self.bump()?;
                            self.peek_token()?;
                        },
                        _ if first => {},
                        other => return Err(self.unexpected(other, "',' or ']'")),
                    }

                    let start = self.offset;
                    let bytes = self.scan_value(true)?;
                    let record = serde_json::from_slice(&bytes)
                        .map_err(|e| HoundError::malformed(start, e.to_string()))?;
                    self.phase = Phase::Elements { first: false };
                    self.yielded += 1;
                    return Ok(Some(record));
                },
            }
        }
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        Ok(self.reader.fill_buf()?.first().copied())
    }

    fn bump(&mut self) -> Result<u8> {
        match self.peek()? {
            Some(byte) => {
                self.reader.consume(1);
                self.offset += 1;
                Ok(byte)
            },
            None => Err(HoundError::malformed(self.offset, "unexpected end of document")),
        }
    }

    /// Skip whitespace and return the next byte without consuming it
    fn peek_token(&mut self) -> Result<u8> {
        loop {
            match self.peek()? {
                Some(byte) if byte.is_ascii_whitespace() => {
                    self.bump()?;
                },
                Some(byte) => return Ok(byte),
                None => return Err(HoundError::malformed(self.offset, "unexpected end of document")),
            }
        }
    }

    fn expect(&mut self, wanted: u8) -> Result<()> {
        let byte = self.peek_token()?;
        if byte != wanted {
            return Err(self.unexpected(byte, &format!("'{}'", wanted as char)));
        }
        self.bump()?;
        Ok(())
    }

    fn unexpected(&self, found: u8, wanted: &str) -> HoundError {
        HoundError::malformed(
            self.offset,
            format!("expected {}, found '{}'", wanted, found.escape_ascii()),
        )
    }

    // Windows collectors write a byte order mark
    fn skip_bom(&mut self) -> Result<()> {
        if self.peek()? == Some(UTF8_BOM[0]) {
            for expected in UTF8_BOM {
                let byte = self.bump()?;
                if byte != expected {
                    return Err(self.unexpected(byte, "a UTF-8 byte order mark"));
                }
            }
        }
        Ok(())
    }

    fn read_key(&mut self) -> Result<String> {
        let start = self.offset;
        if self.peek_token()? != b'"' {
            let found = self.peek_token()?;
            return Err(self.unexpected(found, "a quoted key"));
        }
        let raw = self.scan_value(true)?;
        serde_json::from_slice(&raw).map_err(|e| HoundError::malformed(start, e.to_string()))
    }

    /// Consume one complete JSON value starting at the next byte
    ///
    /// With `keep` the value's bytes are returned, otherwise they are dropped
    /// as they are read.
    fn scan_value(&mut self, keep: bool) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let first = self.take(keep, &mut out)?;

        match first {
            b'{' | b'[' => {
                let mut depth = 1usize;
                while depth > 0 {
                    match self.take(keep, &mut out)? {
                        b'"' => self.scan_string_body(keep, &mut out)?,
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => depth -= 1,
                        _ => {},
                    }
                }
            },
            b'"' => self.scan_string_body(keep, &mut out)?,
            b'-' | b'0'..=b'9' | b't' | b'f' | b'n' => {
                while let Some(byte) = self.peek()? {
                    if matches!(byte, b',' | b']' | b'}') || byte.is_ascii_whitespace() {
                        break;
                    }
                    self.take(keep, &mut out)?;
                }
            },
            other => {
                return Err(HoundError::malformed(
                    self.offset - 1,
                    format!("expected a value, found '{}'", other.escape_ascii()),
                ))
            },
        }

        Ok(out)
    }

    /// Read up to and including the closing quote of a string
    fn scan_string_body(&mut self, keep: bool, out: &mut Vec<u8>) -> Result<()> {
        loop {
            match self.take(keep, out)? {
                b'\\' => {
                    self.take(keep, out)?;
                },
                b'"' => return Ok(()),
                _ => {},
            }
        }
    }

    fn take(&mut self, keep: bool, out: &mut Vec<u8>) -> Result<u8> {
        let byte = self.bump()?;
        if keep {
            out.push(byte);
        }
        Ok(byte)
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(e) => {
                self.phase = Phase::Done;
                Some(Err(e))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collect(doc: &str) -> Vec<Record> {
        RecordStream::new(doc.as_bytes())
            .collect::<Result<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_meta_after_data() {
        let records = collect(r#"{"data":[{"a":1},{"a":2},{"a":3}],"meta":{"type":"users","count":3}}"#);
        assert_eq!(records, vec![json!({"a":1}), json!({"a":2}), json!({"a":3})]);
    }

    #[test]
    fn test_meta_before_data_with_whitespace() {
        let doc = "{\n  \"meta\": {\"type\": \"groups\", \"count\": 2, \"nested\": [1, {\"x\": []}]},\n  \"data\" : [ {\"a\": 1} ,\n {\"b\": [1, 2]} ]\n}\n";
        let records = collect(doc);
        assert_eq!(records, vec![json!({"a":1}), json!({"b":[1,2]})]);
    }

    #[test]
    fn test_strings_with_brackets_and_escapes() {
        let doc = r#"{"data":[{"name":"a]}\"[{b","path":"C:\\temp\\"},"plain ] string",42,-1.5e3,true,null]}"#;
        let records = collect(doc);
        assert_eq!(
            records,
            vec![
                json!({"name":"a]}\"[{b","path":"C:\\temp\\"}),
                json!("plain ] string"),
                json!(42),
                json!(-1.5e3),
                json!(true),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_empty_data_array() {
        assert!(collect(r#"{"meta":{"type":"users","count":0},"data":[]}"#).is_empty());
    }

    #[test]
    fn test_missing_data_key_is_empty() {
        assert!(collect(r#"{"meta":{"type":"users","count":0}}"#).is_empty());
        assert!(collect("{}").is_empty());
    }

    #[test]
    fn test_byte_order_mark_is_skipped() {
        let doc = "\u{feff}{\"data\":[1,2]}";
        assert_eq!(collect(doc), vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_escaped_data_key() {
        let doc = r#"{"d\u0061ta":[{"ok":true}]}"#;
        assert_eq!(collect(doc), vec![json!({"ok": true})]);
    }

    #[test]
    fn test_records_read_counter() {
        let mut stream = RecordStream::new(r#"{"data":[1,2,3]}"#.as_bytes());
        stream.next();
        stream.next();
        assert_eq!(stream.records_read(), 2);
    }

    #[test]
    fn test_data_not_an_array() {
        let mut stream = RecordStream::new(r#"{"data":{"a":1}}"#.as_bytes());
        let err = stream.next().unwrap().unwrap_err();
        assert!(matches!(err, HoundError::MalformedDocument { .. }));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_truncated_document_yields_records_then_error() {
        let mut stream = RecordStream::new(r#"{"data":[{"a":1},{"a":2},{"a":"#.as_bytes());
        assert_eq!(stream.next().unwrap().unwrap(), json!({"a":1}));
        assert_eq!(stream.next().unwrap().unwrap(), json!({"a":2}));
        let err = stream.next().unwrap().unwrap_err();
        assert!(err.to_string().contains("unexpected end of document"));
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_trailing_comma_is_rejected() {
        let results: Vec<_> = RecordStream::new(r#"{"data":[1,]}"#.as_bytes()).collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_invalid_element_reports_offset() {
        let mut stream = RecordStream::new(r#"{"data":[{"a":tru}]}"#.as_bytes());
        match stream.next().unwrap() {
            Err(HoundError::MalformedDocument { offset, .. }) => assert_eq!(offset, 9),
            other => panic!("expected malformed document, got {:?}", other),
        }
    }

    #[test]
    fn test_not_an_object() {
        let mut stream = RecordStream::new(b"[1,2,3]".as_slice());
        assert!(stream.next().unwrap().is_err());
    }

    #[test]
    fn test_small_read_buffer_keeps_order() {
        let items: Vec<String> = (0..500).map(|i| format!(r#"{{"id":{},"s":"x,]{}"}}"#, i, i)).collect();
        let doc = format!(r#"{{"data":[{}],"meta":{{"count":500}}}}"#, items.join(","));
        let reader = std::io::BufReader::with_capacity(7, doc.as_bytes());

        let ids: Vec<i64> = RecordStream::new(reader)
            .map(|r| r.unwrap()["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, (0..500).collect::<Vec<_>>());
    }
}
