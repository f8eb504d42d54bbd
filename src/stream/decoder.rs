//! Incremental decoder for the reply wire format.
//!
//! The backend frames replies as blank-line separated blocks. A block is
//! either an SSE line `data: {"content": "..."}` or, when the backend did not
//! stream, a whole `{"success": true, "response": "..."}` document. Blocks that
//! do not parse are skipped; a malformed frame never ends the stream.

use serde::Deserialize;

const SEPARATOR: &str = "\n\n";
const DATA_PREFIX: &str = "data: ";

#[derive(Deserialize)]
struct ContentFrame {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ResponseFrame {
    #[serde(default)]
    success: bool,
    response: Option<String>,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: String,
    /// Trailing bytes of a UTF-8 sequence split across chunks.
    partial: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes; returns the fragments completed by this chunk.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.partial.extend_from_slice(chunk);
        let mut rest = std::mem::take(&mut self.partial);
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&rest[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = rest.len();
                    break;
                }
                Err(e) => {
                    let valid = consumed + e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&rest[consumed..valid]));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid + len;
                        }
                        None => {
                            consumed = valid;
                            break;
                        }
                    }
                }
            }
        }
        rest.drain(..consumed);
        self.partial = rest;
        self.drain_segments()
    }

    /// Feed already-decoded text.
    pub fn push_str(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);
        self.drain_segments()
    }

    /// End of body: decode whatever is left, if it forms a frame.
    pub fn finish(&mut self) -> Option<String> {
        if !self.partial.is_empty() {
            let tail = std::mem::take(&mut self.partial);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let leftover = std::mem::take(&mut self.buffer);
        let fragment = decode_segment(&leftover);
        if fragment.is_none() && !leftover.trim().is_empty() {
            tracing::debug!(bytes = leftover.len(), "discarding undecodable stream tail");
        }
        fragment
    }

    fn drain_segments(&mut self) -> Vec<String> {
        let mut fragments = Vec::new();
        while let Some(pos) = self.buffer.find(SEPARATOR) {
            let segment: String = self.buffer.drain(..pos + SEPARATOR.len()).collect();
            if let Some(fragment) = decode_segment(&segment[..pos]) {
                fragments.push(fragment);
            }
        }
        fragments
    }
}

/// Decode one complete block into a fragment.
pub fn decode_segment(segment: &str) -> Option<String> {
    if segment.trim().is_empty() {
        return None;
    }

    if let Some(data) = segment.strip_prefix(DATA_PREFIX) {
        let data = data.trim();
        if data.is_empty() {
            return None;
        }
        return serde_json::from_str::<ContentFrame>(data)
            .ok()
            .and_then(|frame| frame.content)
            .filter(|content| !content.is_empty());
    }

    serde_json::from_str::<ResponseFrame>(segment.trim())
        .ok()
        .filter(|frame| frame.success)
        .and_then(|frame| frame.response)
        .filter(|response| !response.is_empty())
}
