/// Incremental decoder for `text/event-stream` bodies.
///
/// Feed raw bytes with [`SseDecoder::push`], then drain complete event
/// payloads with [`SseDecoder::next_event`]. Multiple `data:` lines in one
/// event are joined with `\n`; `event:`, `id:`, `retry:` and comment lines
/// are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    // Undecoded bytes; a line is decoded only once it is complete
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pop the next complete event payload, if one is buffered
    pub fn next_event(&mut self) -> Option<String> {
        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches('\n').trim_end_matches('\r');

            if line.is_empty() {
                if self.data.is_empty() {
                    continue;
                }
                return Some(std::mem::take(&mut self.data).join("\n"));
            }

            if let Some(value) = line.strip_prefix("data:") {
                // A single leading space is part of the framing, not the payload
                let value = value.strip_prefix(' ').unwrap_or(value);
                self.data.push(value.to_string());
            }
        }
        None
    }

    /// Flush a trailing event left without its terminating blank line
    pub fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            self.buffer.push(b'\n');
        }
        if let Some(event) = self.next_event() {
            return Some(event);
        }
        if self.data.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.data).join("\n"))
        }
    }
}
