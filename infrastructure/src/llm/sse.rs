//! Incremental decoder for `text/event-stream` bodies.
//!
//! Only `data:` fields matter for chat completion streams; comments,
//! `event:` lines and blank separators are skipped. Lines are split on raw
//! bytes so multi-byte characters cut across chunks survive.

/// One decoded `data:` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SsePayload {
    Data(String),
    /// The `[DONE]` sentinel that ends OpenAI-style streams.
    Done,
}

#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the payloads of every line it completes.
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<SsePayload> {
        self.buffer.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(payload) = parse_line(&line) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing line that had no newline.
    pub(crate) fn finish(&mut self) -> Option<SsePayload> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(raw: &[u8]) -> Option<SsePayload> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    match data.trim() {
        "" => None,
        "[DONE]" => Some(SsePayload::Done),
        _ => Some(SsePayload::Data(data.to_string())),
    }
}
