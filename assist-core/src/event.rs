use serde::{Deserialize, Serialize};

const FRAME_PREFIX: &str = "data: ";
const FRAME_TERMINATOR: &str = "\n\n";

/// One event of a streamed chat answer.
///
/// A stream is `Session`, then any number of `Chunk`s, then either `Done`
/// or a single `Error`. Nothing follows `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Session { session_id: String },
    Chunk { content: String },
    Error { content: String },
    Done,
}

impl StreamEvent {
    /// Encode as a `data: {json}\n\n` frame
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(format!("{}{}{}", FRAME_PREFIX, json, FRAME_TERMINATOR))
    }

    /// Decode a single frame, with or without its trailing blank line
    pub fn from_frame(frame: &str) -> Option<Self> {
        let data = frame.trim_end().strip_prefix(FRAME_PREFIX)?;
        serde_json::from_str(data).ok()
    }

    /// Split a full response body into events, skipping anything unparseable
    pub fn parse_body(body: &str) -> Vec<Self> {
        body.split(FRAME_TERMINATOR)
            .filter(|frame| !frame.trim().is_empty())
            .filter_map(Self::from_frame)
            .collect()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_compact_json_with_type_tag() {
        let frame = StreamEvent::Session { session_id: "abc".into() }.to_frame().unwrap();
        assert_eq!(frame, "data: {\"type\":\"session\",\"session_id\":\"abc\"}\n\n");

        let frame = StreamEvent::Done.to_frame().unwrap();
        assert_eq!(frame, "data: {\"type\":\"done\"}\n\n");
    }

    #[test]
    fn parse_body_reads_every_frame() {
        let body = [
            StreamEvent::Session { session_id: "s".into() },
            StreamEvent::Chunk { content: "line one\n\nline two".into() },
            StreamEvent::Done,
        ]
        .iter()
        .map(|e| e.to_frame().unwrap())
        .collect::<String>();

        let events = StreamEvent::parse_body(&body);
        assert_eq!(events.len(), 3);
        assert_eq!(events[1], StreamEvent::Chunk { content: "line one\n\nline two".into() });
        assert!(events[2].is_terminal());
    }
}
