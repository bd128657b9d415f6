//! Incremental scanner splitting a `GeoJSON` document into feature objects.
//!
//! The scanner walks the top-level object byte by byte until it reaches the
//! `features` array, then hands out the raw bytes of one array element at a
//! time. Nothing but the current feature is held in memory. A document without
//! a `features` member is buffered whole and accepted only if it is a single
//! `Feature`.

use std::io::{BufRead, ErrorKind as IoKind};
use std::path::{Path, PathBuf};

use geoetl_core_common::error::{GeoEtlError, IoError, Result};
use geoetl_format_shared::SourcePosition;

/// Default upper bound on the size of one feature (64 MiB).
pub const DEFAULT_MAX_FEATURE_BYTES: usize = 64 * 1024 * 1024;

const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[derive(Debug)]
enum State {
    Start,
    Features { first: bool },
    Single(Vec<u8>),
    Done,
}

/// Raw bytes of one feature and the offset it started at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFeature {
    pub bytes: Vec<u8>,
    pub offset: u64,
}

/// Pull scanner over a buffered `GeoJSON` source.
pub struct FeatureScanner<R> {
    reader: R,
    path: PathBuf,
    offset: u64,
    state: State,
    doc_type: Option<String>,
    max_feature_bytes: usize,
    scratch: Vec<u8>,
}

impl<R: BufRead> FeatureScanner<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            path: PathBuf::new(),
            offset: 0,
            state: State::Start,
            doc_type: None,
            max_feature_bytes: DEFAULT_MAX_FEATURE_BYTES,
            scratch: Vec::new(),
        }
    }

    /// Names the source in I/O errors.
    #[must_use]
    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = path.to_path_buf();
        self
    }

    #[must_use]
    pub fn with_max_feature_bytes(mut self, max: usize) -> Self {
        self.max_feature_bytes = max.max(1);
        self
    }

    /// Byte offset of the next unread byte.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn error(&self, message: impl Into<String>) -> GeoEtlError {
        SourcePosition::byte(self.offset).parse_error("GeoJSON", message)
    }

    fn io_error(&self, err: std::io::Error) -> GeoEtlError {
        IoError::Read {
            format: "GeoJSON".to_string(),
            path: self.path.clone(),
            source: Box::new(err),
        }
        .into()
    }

    fn peek(&mut self) -> Result<Option<u8>> {
        loop {
            match self.reader.fill_buf() {
                Ok(buf) => return Ok(buf.first().copied()),
                Err(e) if e.kind() == IoKind::Interrupted => {},
                Err(e) => return Err(self.io_error(e)),
            }
        }
    }

    fn bump(&mut self) {
        self.reader.consume(1);
        self.offset += 1;
    }

    fn next_byte(&mut self) -> Result<Option<u8>> {
        let byte = self.peek()?;
        if byte.is_some() {
            self.bump();
        }
        Ok(byte)
    }

    fn skip_whitespace(&mut self) -> Result<Option<u8>> {
        while let Some(byte) = self.peek()? {
            if !byte.is_ascii_whitespace() {
                return Ok(Some(byte));
            }
            self.bump();
        }
        Ok(None)
    }

    fn expect(&mut self, expected: u8, out: Option<&mut Vec<u8>>) -> Result<()> {
        match self.skip_whitespace()? {
            Some(byte) if byte == expected => {
                self.bump();
                if let Some(out) = out {
                    out.push(byte);
                }
                Ok(())
            },
            Some(byte) => Err(self.error(format!(
                "expected '{}', found '{}'",
                expected as char,
                byte as char
            ))),
            None => Err(self.error(format!(
                "unexpected end of input, expected '{}'",
                expected as char
            ))),
        }
    }

    fn push_limited(&self, out: &mut Vec<u8>, byte: u8) -> Result<()> {
        if out.len() >= self.max_feature_bytes {
            return Err(self.error(format!(
                "value exceeds the maximum size of {} bytes",
                self.max_feature_bytes
            )));
        }
        out.push(byte);
        Ok(())
    }

    /// Copies a JSON string, quotes included. The opening quote is next.
    fn capture_string(&mut self, out: &mut Vec<u8>) -> Result<()> {
        self.expect(b'"', Some(&mut *out))?;
        let mut escaped = false;
        loop {
            let Some(byte) = self.next_byte()? else {
                return Err(self.error("unterminated string"));
            };
            self.push_limited(out, byte)?;
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                return Ok(());
            }
        }
    }

    /// Copies one complete JSON value.
    fn capture_value(&mut self, out: &mut Vec<u8>) -> Result<()> {
        match self.skip_whitespace()? {
            None => Err(self.error("unexpected end of input, expected a value")),
            Some(b'"') => self.capture_string(out),
            Some(b'{' | b'[') => {
                let mut depth = 0usize;
                let mut in_string = false;
                let mut escaped = false;
                loop {
                    let Some(byte) = self.next_byte()? else {
                        return Err(self.error("unexpected end of input inside a value"));
                    };
                    self.push_limited(out, byte)?;
                    if in_string {
                        if escaped {
                            escaped = false;
                        } else if byte == b'\\' {
                            escaped = true;
                        } else if byte == b'"' {
                            in_string = false;
                        }
                        continue;
                    }
                    match byte {
                        b'"' => in_string = true,
                        b'{' | b'[' => depth += 1,
                        b'}' | b']' => {
                            depth -= 1;
                            if depth == 0 {
                                return Ok(());
                            }
                        },
                        _ => {},
                    }
                }
            },
            Some(_) => {
                while let Some(byte) = self.peek()? {
                    if matches!(byte, b',' | b'}' | b']') || byte.is_ascii_whitespace() {
                        break;
                    }
                    self.push_limited(out, byte)?;
                    self.bump();
                }
                Ok(())
            },
        }
    }

    fn read_key(&mut self, out: &mut Vec<u8>) -> Result<String> {
        let start = out.len();
        self.capture_string(out)?;
        serde_json::from_slice(&out[start..]).map_err(|e| self.error(format!("invalid member name: {e}")))
    }

    fn check_type(&self) -> Result<()> {
        match self.doc_type.as_deref() {
            None | Some("FeatureCollection") => Ok(()),
            Some(other) => Err(self.error(format!(
                "top-level type '{other}' with a 'features' member is not supported; expected FeatureCollection"
            ))),
        }
    }

    /// Scans top-level members until `features` is found or the object ends.
    fn enter_document(&mut self) -> Result<()> {
        let mut doc = Vec::new();
        if self.skip_whitespace()? == Some(BOM[0]) {
            for expected in BOM {
                if self.next_byte()? != Some(expected) {
                    return Err(self.error("invalid byte order mark"));
                }
            }
        }
        if self.skip_whitespace()?.is_none() {
            return Err(self.error("empty document"));
        }
        self.expect(b'{', Some(&mut doc))?;

        let mut first = true;
        loop {
            if self.skip_whitespace()? == Some(b'}') {
                self.bump();
                doc.push(b'}');
                break;
            }
            if !first {
                self.expect(b',', Some(&mut doc))?;
            }
            first = false;
            self.skip_whitespace()?;
            let key = self.read_key(&mut doc)?;
            self.expect(b':', Some(&mut doc))?;
            if key == "features" {
                self.check_type()?;
                self.expect(b'[', None)?;
                self.state = State::Features { first: true };
                return Ok(());
            }
            let start = doc.len();
            self.capture_value(&mut doc)?;
            if key == "type" {
                self.doc_type = serde_json::from_slice(&doc[start..]).ok();
            }
        }

        self.expect_end()?;
        match self.doc_type.as_deref() {
            Some("Feature") => {
                self.state = State::Single(doc);
                Ok(())
            },
            Some("FeatureCollection") => Err(self.error("FeatureCollection has no 'features' member")),
            Some(other) => Err(self.error(format!(
                "top-level type '{other}' is not supported; expected FeatureCollection or Feature"
            ))),
            None => Err(self.error("top-level object has no 'type' member")),
        }
    }

    /// Consumes the members following the `features` array.
    fn leave_document(&mut self) -> Result<()> {
        let mut scratch = std::mem::take(&mut self.scratch);
        loop {
            scratch.clear();
            match self.skip_whitespace()? {
                Some(b'}') => {
                    self.bump();
                    break;
                },
                Some(_) => {
                    self.expect(b',', None)?;
                    self.skip_whitespace()?;
                    let key = self.read_key(&mut scratch)?;
                    self.expect(b':', None)?;
                    scratch.clear();
                    self.capture_value(&mut scratch)?;
                    if key == "type" {
                        self.doc_type = serde_json::from_slice(&scratch).ok();
                        self.check_type()?;
                    }
                },
                None => return Err(self.error("unexpected end of input, expected '}'")),
            }
        }
        self.scratch = scratch;
        self.expect_end()
    }

    fn expect_end(&mut self) -> Result<()> {
        match self.skip_whitespace()? {
            None => Ok(()),
            Some(_) => Err(self.error("unexpected content after the top-level object")),
        }
    }

    /// Returns the next feature, or `None` once the document is exhausted.
    ///
    /// # Errors
    ///
    /// Fails on malformed structure, oversized features and read errors.
    pub fn next_feature(&mut self) -> Result<Option<RawFeature>> {
        if matches!(self.state, State::Start) {
            self.enter_document()?;
        }
        match std::mem::replace(&mut self.state, State::Done) {
            State::Single(bytes) => Ok(Some(RawFeature { bytes, offset: 0 })),
            State::Features { first } => {
                if self.skip_whitespace()? == Some(b']') {
                    self.bump();
                    self.leave_document()?;
                    return Ok(None);
                }
                if !first {
                    self.expect(b',', None)?;
                }
                self.skip_whitespace()?;
                let offset = self.offset;
                let mut bytes = Vec::new();
                self.capture_value(&mut bytes)?;
                self.state = State::Features { first: false };
                Ok(Some(RawFeature { bytes, offset }))
            },
            State::Start | State::Done => Ok(None),
        }
    }

    /// Returns `true` if no feature remains, without consuming one.
    ///
    /// # Errors
    ///
    /// Fails on read errors.
    pub fn is_exhausted(&mut self) -> Result<bool> {
        match self.state {
            State::Start => Ok(false),
            State::Single(_) => Ok(false),
            State::Features { .. } => Ok(self.skip_whitespace()? == Some(b']')),
            State::Done => Ok(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn scan(input: &str) -> Result<Vec<String>> {
        let mut scanner = FeatureScanner::new(Cursor::new(input.as_bytes().to_vec()));
        let mut features = Vec::new();
        while let Some(feature) = scanner.next_feature()? {
            features.push(String::from_utf8(feature.bytes).unwrap());
        }
        Ok(features)
    }

    #[test]
    fn test_feature_collection() {
        let features = scan(
            r#"{"type": "FeatureCollection", "name": "x", "features": [
                {"type":"Feature","properties":{"s":"a ] } \" ["},"geometry":null},
                {"type":"Feature","properties":{},"geometry":{"type":"Point","coordinates":[1,2]}}
            ], "crs": {"type": "name"}}"#,
        )
        .unwrap();
        assert_eq!(features.len(), 2);
        assert!(features[0].contains(r#""a ] } \" [""#));
        assert!(features[1].ends_with("}}"));
    }

    #[test]
    fn test_features_before_type() {
        let features = scan(r#"{"features": [], "type": "FeatureCollection"}"#).unwrap();
        assert!(features.is_empty());

        let err = scan(r#"{"features": [], "type": "Topology"}"#).unwrap_err();
        assert!(err.to_string().contains("Topology"));
    }

    #[test]
    fn test_single_feature() {
        let features = scan(
            "\u{feff}{\"type\":\"Feature\",\"properties\":{\"a\":1},\"geometry\":null}\n",
        )
        .unwrap();
        assert_eq!(features.len(), 1);
        let value: serde_json::Value = serde_json::from_str(&features[0]).unwrap();
        assert_eq!(value["properties"]["a"], 1);
    }

    #[test]
    fn test_rejected_documents() {
        for input in [
            "",
            "[]",
            r#"{"type":"Point","coordinates":[0,0]}"#,
            r#"{"type":"FeatureCollection"}"#,
            r#"{"type":"FeatureCollection","features":[{"type":"Feature"}"#,
            r#"{"type":"FeatureCollection","features":[{"a":1} {"b":2}]}"#,
            r#"{"type":"FeatureCollection","features":[]} trailing"#,
        ] {
            assert!(scan(input).is_err(), "{input}");
        }
    }

    #[test]
    fn test_feature_size_limit() {
        let input = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"long":"0123456789"}}]}"#;
        let mut scanner =
            FeatureScanner::new(Cursor::new(input.as_bytes().to_vec())).with_max_feature_bytes(16);
        let err = scanner.next_feature().unwrap_err();
        assert!(err.to_string().contains("maximum size"));
    }

    #[test]
    fn test_exhaustion() {
        let input = r#"{"type":"FeatureCollection","features":[{"type":"Feature"}]}"#;
        let mut scanner = FeatureScanner::new(Cursor::new(input.as_bytes().to_vec()));
        assert!(!scanner.is_exhausted().unwrap());
        assert!(scanner.next_feature().unwrap().is_some());
        assert!(scanner.is_exhausted().unwrap());
        assert!(scanner.next_feature().unwrap().is_none());
        assert!(scanner.is_exhausted().unwrap());
    }
}
