//! Pure protocol parsing and serialization functions.
//!
//! This module never performs I/O. JSON values are self-delimiting, so the
//! stream needs no framing beyond the JSON grammar itself.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::Request;

/// Serialize a request to bytes, terminated by a newline.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use spdk_jsonrpc::{protocol::encode_request, Request};
///
/// let request = Request::new(1, "bdev_get_bdevs", json!({}));
/// let bytes = encode_request(&request).unwrap();
/// assert!(bytes.ends_with(b"\n"));
/// ```
pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(request)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Streaming decoder for a continuous byte stream of JSON values.
///
/// Feed bytes with [`Decoder::feed`] and pull complete values with
/// [`Decoder::decode`] until it returns `Ok(None)`. Objects and arrays are
/// delimited by a scan that resumes where the previous call stopped, so a
/// value arriving in many reads is parsed once, when it is complete.
///
/// # Example
///
/// ```
/// use spdk_jsonrpc::protocol::Decoder;
///
/// let mut decoder = Decoder::new();
/// decoder.feed(b"{\"id\": 1, \"result\": true}{\"id\"");
/// assert!(decoder.decode().unwrap().is_some());
/// assert!(decoder.decode().unwrap().is_none());
/// decoder.feed(b": 2, \"result\": false}");
/// assert!(decoder.decode().unwrap().is_some());
/// ```
#[derive(Debug, Default)]
pub struct Decoder {
    buf: Vec<u8>,
    scan: Scan,
}

/// Progress through the value at the front of the buffer.
#[derive(Debug, Default)]
struct Scan {
    /// Bytes of `buf` already looked at.
    pos: usize,
    /// Open objects and arrays; zero until the value has started.
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Decoder::default()
    }

    /// Append incoming bytes to the receive buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Decode the next complete value.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(value))` - a complete value, its bytes are consumed
    /// * `Ok(None)` - more data is needed
    /// * `Err(Error::Decode)` - the buffer holds malformed JSON; the stream
    ///   position is lost and the decoder must not be used any further
    pub fn decode(&mut self) -> Result<Option<Value>> {
        if self.scan.depth == 0 {
            let blank = self.buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            self.buf.drain(..blank);

            match self.buf.first() {
                None => return Ok(None),
                Some(b'{') | Some(b'[') => {}
                Some(_) => return self.decode_scalar(),
            }
        }

        let Some(end) = self.scan_container() else {
            return Ok(None);
        };

        let value = serde_json::from_slice(&self.buf[..end]).map_err(|e| Error::Decode(e.to_string()));
        self.buf.drain(..end);
        self.scan = Scan::default();
        value.map(Some)
    }

    /// Advance the scan over new bytes; the end offset of the object or
    /// array at the front of the buffer once it is closed.
    fn scan_container(&mut self) -> Option<usize> {
        let scan = &mut self.scan;

        for (i, &b) in self.buf.iter().enumerate().skip(scan.pos) {
            if scan.in_string {
                if scan.escaped {
                    scan.escaped = false;
                } else if b == b'\\' {
                    scan.escaped = true;
                } else if b == b'"' {
                    scan.in_string = false;
                }
                continue;
            }

            match b {
                b'"' => scan.in_string = true,
                b'{' | b'[' => scan.depth += 1,
                b'}' | b']' => {
                    // mismatched brackets are left to the parser
                    scan.depth = scan.depth.saturating_sub(1);
                    if scan.depth == 0 {
                        return Some(i + 1);
                    }
                }
                _ => {}
            }
        }

        scan.pos = self.buf.len();
        None
    }

    /// Top-level scalars are short; they are parsed straight off the buffer.
    fn decode_scalar(&mut self) -> Result<Option<Value>> {
        let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();

        match stream.next() {
            Some(Ok(value)) => {
                let consumed = stream.byte_offset();
                self.buf.drain(..consumed);
                Ok(Some(value))
            }
            Some(Err(e)) if e.is_eof() => Ok(None),
            Some(Err(e)) => Err(Error::Decode(e.to_string())),
            None => Ok(None),
        }
    }

    /// Whether a started but unfinished value sits in the buffer.
    pub fn has_partial(&self) -> bool {
        self.buf.iter().any(|b| !b.is_ascii_whitespace())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_request() {
        let request = Request::new(42, "bdev_aio_delete", json!({"name": "aio0"}));
        let bytes = encode_request(&request).unwrap();
        assert_eq!(bytes.last(), Some(&b'\n'));

        let parsed: Request = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_decode_concatenated() {
        let mut decoder = Decoder::new();
        decoder.feed(b"{\"id\":1,\"result\":true}\n{\"id\":2,\"result\":false}{\"id\":3,\"result\":null}");

        assert_eq!(decoder.decode().unwrap(), Some(json!({"id": 1, "result": true})));
        assert_eq!(decoder.decode().unwrap(), Some(json!({"id": 2, "result": false})));
        assert_eq!(decoder.decode().unwrap(), Some(json!({"id": 3, "result": null})));
        assert_eq!(decoder.decode().unwrap(), None);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_decode_split_across_reads() {
        let mut decoder = Decoder::new();
        let msg = b"{\n\t\"id\": 9,\n\t\"jsonrpc\": \"2.0\",\n\t\"result\": [\"a\", \"b\"]\n}\n";

        for chunk in msg.chunks(5) {
            decoder.feed(chunk);
            if decoder.buf.len() < msg.len() - 2 {
                assert_eq!(decoder.decode().unwrap(), None);
            }
        }

        assert_eq!(
            decoder.decode().unwrap(),
            Some(json!({"id": 9, "jsonrpc": "2.0", "result": ["a", "b"]}))
        );
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn test_partial_is_reported() {
        let mut decoder = Decoder::new();
        decoder.feed(b"  {\"id\": 1, \"res");
        assert_eq!(decoder.decode().unwrap(), None);
        assert!(decoder.has_partial());
    }

    #[test]
    fn test_whitespace_only() {
        let mut decoder = Decoder::new();
        decoder.feed(b" \n\t ");
        assert_eq!(decoder.decode().unwrap(), None);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_delimiters_inside_strings() {
        let mut decoder = Decoder::new();
        let msg = br#"{"id": 2, "result": {"name": "a}b]\"{", "tags": ["[", "\\"]}}"#;

        for chunk in msg.chunks(3) {
            decoder.feed(chunk);
            if decoder.buf.len() < msg.len() {
                assert_eq!(decoder.decode().unwrap(), None);
            }
        }

        assert_eq!(
            decoder.decode().unwrap(),
            Some(json!({"id": 2, "result": {"name": "a}b]\"{", "tags": ["[", "\\"]}}))
        );
    }

    #[test]
    fn test_large_value_is_scanned_once() {
        let bdevs: Vec<Value> = (0..20_000)
            .map(|i| json!({"name": format!("lvs0/lv{}", i), "aliases": [], "num_blocks": 1024}))
            .collect();
        let msg = serde_json::to_vec(&json!({"id": 7, "result": bdevs})).unwrap();

        let mut decoder = Decoder::new();
        let mut chunks = msg.chunks(8192).peekable();
        while let Some(chunk) = chunks.next() {
            decoder.feed(chunk);
            if chunks.peek().is_some() {
                assert_eq!(decoder.decode().unwrap(), None);
                // nothing already looked at is looked at again
                assert_eq!(decoder.scan.pos, decoder.buf.len());
            }
        }

        let value = decoder.decode().unwrap().unwrap();
        assert_eq!(value["result"].as_array().map(Vec::len), Some(20_000));
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_scalars() {
        let mut decoder = Decoder::new();
        decoder.feed(b" true \"aio0\" ");
        assert_eq!(decoder.decode().unwrap(), Some(json!(true)));
        assert_eq!(decoder.decode().unwrap(), Some(json!("aio0")));
        assert_eq!(decoder.decode().unwrap(), None);
    }

    #[test]
    fn test_mismatched_brackets_are_fatal() {
        let mut decoder = Decoder::new();
        decoder.feed(b"{\"id\": 1]");
        assert!(matches!(decoder.decode(), Err(Error::Decode(_))));
    }

    #[test]
    fn test_garbage_is_fatal() {
        let mut decoder = Decoder::new();
        decoder.feed(b"{\"id\": 1, \"result\": true}not json");
        assert!(decoder.decode().unwrap().is_some());
        assert!(matches!(decoder.decode(), Err(Error::Decode(_))));
    }
}
