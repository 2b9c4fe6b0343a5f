// src/services/sse.rs
//! Incremental Server-Sent Events decoder.
//!
//! Bytes arrive in arbitrary slices from the upstream body; the decoder keeps
//! whatever follows the last newline and yields the `data` payload of every
//! completed event. Comment lines (`: keep-alive`) and fields other than
//! `data` are dropped.

use crate::error::UpstreamError;

/// Longest line the decoder buffers while waiting for its newline.
pub const DEFAULT_MAX_LINE: usize = 1024 * 1024;

#[derive(Debug)]
pub struct SseDecoder {
    buf: Vec<u8>,
    data: Vec<String>,
    max_line: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            data: Vec::new(),
            max_line,
        }
    }

    /// Feed one body chunk, returning the events it completed.
    ///
    /// Fails once an unterminated line grows past the configured maximum.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, UpstreamError> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            self.feed_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }

        if self.buf.len() > self.max_line {
            let len = self.buf.len();
            self.buf.clear();
            return Err(UpstreamError::Decode(format!(
                "event line exceeds {} bytes ({len} buffered)",
                self.max_line
            )));
        }
        Ok(events)
    }

    /// Flush a trailing line and any event the body ended without
    /// terminating.
    pub fn finish(&mut self) -> Vec<String> {
        let mut events = Vec::new();
        if !self.buf.is_empty() {
            let raw = std::mem::take(&mut self.buf);
            let line = String::from_utf8_lossy(&raw);
            self.feed_line(line.trim_end_matches('\r'), &mut events);
        }
        self.dispatch(&mut events);
        events
    }

    fn feed_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field == "data" {
            self.data.push(value.to_string());
        }
    }

    fn dispatch(&mut self, events: &mut Vec<String>) {
        if !self.data.is_empty() {
            events.push(self.data.join("\n"));
            self.data.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"a\"").unwrap().is_empty());
        assert!(decoder.push(b":1}\n").unwrap().is_empty());
        assert_eq!(
            decoder.push(b"\ndata: [DONE]\n\n").unwrap(),
            vec!["{\"a\":1}", "[DONE]"]
        );
    }

    #[test]
    fn skips_comments_and_other_fields() {
        let mut decoder = SseDecoder::new();
        let events = decoder
            .push(b": OPENROUTER PROCESSING\n\nevent: message\nid: 7\ndata: hi\n\n")
            .unwrap();
        assert_eq!(events, vec!["hi"]);
    }

    #[test]
    fn handles_crlf_line_endings() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"data: one\r\n\r\ndata: two\r\n\r\n").unwrap();
        assert_eq!(events, vec!["one", "two"]);
    }

    #[test]
    fn joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        assert_eq!(decoder.push(b"data: a\ndata: b\n\n").unwrap(), vec!["a\nb"]);
    }

    #[test]
    fn keeps_multibyte_text_split_mid_character() {
        let text = "data: héllo\n\n".as_bytes();
        // Split inside the two-byte 'é'.
        let (head, tail) = text.split_at(8);
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(head).unwrap().is_empty());
        assert_eq!(decoder.push(tail).unwrap(), vec!["héllo"]);
    }

    #[test]
    fn finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").unwrap().is_empty());
        assert_eq!(decoder.finish(), vec!["tail"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn unterminated_line_past_limit_fails() {
        let mut decoder = SseDecoder::with_max_line(16);
        assert!(decoder.push(b"data: 0123456789").unwrap().is_empty());
        let err = decoder.push(b"abcdef").unwrap_err();
        assert!(matches!(err, UpstreamError::Decode(_)));
    }

    #[test]
    fn long_terminated_lines_do_not_count_against_limit() {
        let mut decoder = SseDecoder::with_max_line(16);
        let events = decoder
            .push(b"data: a line much longer than sixteen bytes\n\n")
            .unwrap();
        assert_eq!(events, vec!["a line much longer than sixteen bytes"]);
    }
}
