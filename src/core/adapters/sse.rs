//! SSE line framing shared by the streaming decoders

/// Extract the payload of an SSE `data:` line
///
/// Returns `None` for blank lines, comments, and `event:`/`id:` fields, which
/// carry no payload of their own in the wire formats we decode.
pub fn data_payload(line: &str) -> Option<&str> {
    let line = line.trim_end_matches('\r');
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    line.strip_prefix("data:").map(|rest| rest.trim_start_matches(' '))
}

/// Incremental splitter turning byte chunks into complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes and drain every complete line
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_payload() {
        assert_eq!(data_payload("data: {\"a\":1}"), Some("{\"a\":1}"));
        assert_eq!(data_payload("data: [DONE]"), Some("[DONE]"));
        assert_eq!(data_payload("data:[DONE]"), Some("[DONE]"));
        assert_eq!(data_payload(""), None);
        assert_eq!(data_payload(": comment"), None);
        assert_eq!(data_payload("event: message_start"), None);
    }

    #[test]
    fn test_line_buffer_splits_partial_chunks() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push(b"data: {\"a\"").is_empty());
        let lines = buffer.push(b":1}\n\ndata: done\n");
        assert_eq!(lines, vec!["data: {\"a\":1}".to_string(), String::new(), "data: done".to_string()]);
    }

    #[test]
    fn test_line_buffer_strips_crlf() {
        let mut buffer = LineBuffer::new();
        let lines = buffer.push(b"data: x\r\n");
        assert_eq!(lines, vec!["data: x".to_string()]);
    }
}
