//! Buffered Server-Sent Events decoder
//!
//! The chat endpoint streams OpenAI-style SSE: events are `data: <json>`
//! lines separated by blank lines, terminated by a `data: [DONE]` marker.
//! Network chunks split events, and may even split multi-byte UTF-8
//! sequences, so the decoder buffers across `feed` calls.

/// End-of-stream marker payload
pub const DONE_MARKER: &str = "[DONE]";

/// Incremental SSE decoder yielding complete `data:` payloads
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Text of events not yet terminated by a blank line
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence from the last chunk
    incomplete_utf8: Vec<u8>,
}

impl SseDecoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes, returning the complete event payloads they unlock
    ///
    /// Incomplete trailing data is buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let bytes = if self.incomplete_utf8.is_empty() {
            chunk.to_vec()
        } else {
            let mut combined = std::mem::take(&mut self.incomplete_utf8);
            combined.extend_from_slice(chunk);
            combined
        };

        let (text, remainder) = decode_utf8_with_remainder(&bytes);
        self.incomplete_utf8 = remainder;
        self.buffer.push_str(&text);

        let mut payloads = Vec::new();
        while let Some((event_end, delimiter_len)) = self.find_event_boundary() {
            let event_text: String = self.buffer.drain(..event_end).collect();
            self.buffer.drain(..delimiter_len);

            if let Some(payload) = parse_event(&event_text) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Byte offset of the next event boundary and the delimiter length
    fn find_event_boundary(&self) -> Option<(usize, usize)> {
        let lf = self.buffer.find("\n\n").map(|i| (i, 2));
        let crlf = self.buffer.find("\r\n\r\n").map(|i| (i, 4));

        match (lf, crlf) {
            (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }
}

/// Extract the joined `data:` payload from one event's text
///
/// Multiple `data:` lines concatenate with newlines per the SSE spec; events
/// without a data field (comments, bare `event:` lines) yield nothing.
fn parse_event(event_text: &str) -> Option<String> {
    let mut data_lines = Vec::new();

    for line in event_text.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

/// Decode bytes as UTF-8, carrying an incomplete trailing sequence forward
///
/// Truly invalid sequences are replaced with U+FFFD rather than aborting the
/// stream.
fn decode_utf8_with_remainder(bytes: &[u8]) -> (String, Vec<u8>) {
    match std::str::from_utf8(bytes) {
        Ok(s) => (s.to_string(), Vec::new()),
        Err(_) => {
            let mut out = String::new();
            let mut rest = bytes;
            loop {
                match std::str::from_utf8(rest) {
                    Ok(s) => {
                        out.push_str(s);
                        return (out, Vec::new());
                    }
                    Err(err) => {
                        let valid = err.valid_up_to();
                        out.push_str(std::str::from_utf8(&rest[..valid]).unwrap_or(""));
                        match err.error_len() {
                            // Incomplete sequence at the end of the chunk
                            None => return (out, rest[valid..].to_vec()),
                            // Invalid bytes mid-stream
                            Some(len) => {
                                out.push('\u{FFFD}');
                                rest = &rest[valid + len..];
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: {\"x\":1}\n\n");
        assert_eq!(payloads, vec!["{\"x\":1}"]);
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"data: {\"content\":").is_empty());
        let payloads = decoder.feed(b" \"hi\"}\n\n");
        assert_eq!(payloads, vec!["{\"content\": \"hi\"}"]);
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: a\n\ndata: b\n\ndata: [DONE]\n\n");
        assert_eq!(payloads, vec!["a", "b", DONE_MARKER]);
    }

    #[test]
    fn test_crlf_delimiters() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: a\r\n\r\ndata: b\r\n\r\n");
        assert_eq!(payloads, vec!["a", "b"]);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: first\ndata: second\n\n");
        assert_eq!(payloads, vec!["first\nsecond"]);
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"event: message\n: comment\ndata: x\n\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let text = "data: 日本\n\n".as_bytes();
        // Split in the middle of the first multi-byte character
        let split = 8;
        assert!(decoder.feed(&text[..split]).is_empty());
        let payloads = decoder.feed(&text[split..]);
        assert_eq!(payloads, vec!["日本"]);
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut decoder = SseDecoder::new();
        let payloads = decoder.feed(b"data: a\xFFb\n\n");
        assert_eq!(payloads, vec!["a\u{FFFD}b"]);
    }
}
