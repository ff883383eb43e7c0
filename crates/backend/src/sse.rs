//! Server-Sent Events decoding for streamed completions.
//!
//! Only `data:` fields matter here. Comment lines, other fields and blank
//! event separators are skipped. Bytes may arrive split anywhere, including
//! inside a UTF-8 sequence, so decoding works on whole lines only.

/// Payload of one `data:` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseData {
    /// A JSON payload.
    Json(String),
    /// The `[DONE]` end marker.
    Done,
}

const DONE_MARKER: &str = "[DONE]";

/// Incremental line decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw bytes and return every complete `data:` payload they finish.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<SseData> {
        self.buffer.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(data) = parse_line(&line) {
                out.push(data);
            }
        }
        out
    }

    /// Flush a final unterminated line, if any.
    pub fn finish(&mut self) -> Option<SseData> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(raw: &[u8]) -> Option<SseData> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\n', '\r']);
    let payload = line.strip_prefix("data:")?.trim_start();

    if payload.is_empty() {
        None
    } else if payload == DONE_MARKER {
        Some(SseData::Done)
    } else {
        Some(SseData::Json(payload.to_string()))
    }
}
