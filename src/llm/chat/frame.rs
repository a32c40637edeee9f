use serde::Deserialize;

const DATA_PREFIX: &str = "data:";
const TERMINATOR: &str = "[DONE]";

/// Outcome of parsing one line of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A non-empty text fragment from `choices[0].delta.content`.
    Content(String),
    /// A well-formed data frame carrying no text (role-only delta, empty content, no choices).
    Heartbeat,
    /// The `[DONE]` sentinel.
    Terminator,
    /// A data frame whose payload is not a valid chunk object. Carries the parse error.
    Malformed(String),
    /// Blank lines, comments, and any non-data field such as `event:` or `id:`.
    Ignored,
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

pub fn parse_frame(line: &str) -> Frame {
    let line = line.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Frame::Ignored;
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Frame::Ignored;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload.trim() == TERMINATOR {
        return Frame::Terminator;
    }

    match serde_json::from_str::<StreamChunk>(payload) {
        Ok(chunk) => {
            let content = chunk.choices
                .into_iter()
                .next()
                .and_then(|choice| choice.delta)
                .and_then(|delta| delta.content);
            match content {
                Some(text) if !text.is_empty() => Frame::Content(text),
                _ => Frame::Heartbeat,
            }
        }
        Err(e) => Frame::Malformed(e.to_string()),
    }
}

/// Reassembles newline-terminated lines from arbitrarily split body chunks.
///
/// Bytes are buffered until a `\n` arrives, so a line (or a multi-byte UTF-8 character)
/// split across two network reads is decoded whole.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]);
            lines.push(line.trim_end_matches('\r').to_string());
        }
        lines
    }

    /// Returns the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }
}
