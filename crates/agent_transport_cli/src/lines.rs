use agent_protocol::AgentMessage;

/// Incremental splitter for newline-delimited JSON output.
///
/// Bytes are buffered until a full line is available so multi-byte characters
/// split across reads decode intact. Lines that are not JSON are skipped.
#[derive(Debug, Default)]
pub struct JsonLineParser {
    buffer: Vec<u8>,
}

impl JsonLineParser {
    /// Feeds arbitrary bytes and drains every complete line.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<AgentMessage> {
        self.buffer.extend_from_slice(bytes);
        let mut messages = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(message) = decode_line(&line) {
                messages.push(message);
            }
        }

        messages
    }

    /// Decodes a trailing line that was not newline-terminated.
    pub fn finish(&mut self) -> Option<AgentMessage> {
        let line = std::mem::take(&mut self.buffer);
        decode_line(&line)
    }

    #[must_use]
    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn decode_line(line: &[u8]) -> Option<AgentMessage> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    match AgentMessage::from_json_str(text) {
        Ok(message) => Some(message),
        Err(error) => {
            tracing::debug!(%error, line = text, "skipping non-JSON agent output line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use agent_protocol::AgentMessageKind;

    use super::JsonLineParser;

    #[test]
    fn lines_are_emitted_once_complete() {
        let mut parser = JsonLineParser::default();

        let first = parser.feed(b"{\"type\":\"stream_event\",\"event\":{\"type\":\"content_block_delta\",");
        assert!(first.is_empty());

        let second =
            parser.feed(b"\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}}\n{\"type\":\"res");
        assert_eq!(second.len(), 1);
        assert!(matches!(
            &second[0].kind,
            AgentMessageKind::TextDelta { text } if text == "Hi"
        ));
        assert!(!parser.is_empty_buffer());

        let third = parser.feed(b"ult\",\"result\":\"done\"}\n");
        assert_eq!(third.len(), 1);
        assert!(parser.is_empty_buffer());
    }

    #[test]
    fn multibyte_text_split_across_reads_is_preserved() {
        let line = "{\"type\":\"stream_event\",\"event\":{\"type\":\"content_block_delta\",\"delta\":{\"type\":\"text_delta\",\"text\":\"héllo\"}}}\n";
        let bytes = line.as_bytes();
        let split = line.find('é').map(|index| index + 1).unwrap_or(0);

        let mut parser = JsonLineParser::default();
        assert!(parser.feed(&bytes[..split]).is_empty());
        let messages = parser.feed(&bytes[split..]);

        assert!(matches!(
            &messages[0].kind,
            AgentMessageKind::TextDelta { text } if text == "héllo"
        ));
    }

    #[test]
    fn non_json_and_blank_lines_are_skipped() {
        let mut parser = JsonLineParser::default();
        let messages = parser.feed(b"warming up...\n\n{\"type\":\"result\"}\r\n");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn finish_decodes_unterminated_tail() {
        let mut parser = JsonLineParser::default();
        assert!(parser.feed(b"{\"type\":\"result\",\"result\":\"x\"}").is_empty());
        assert!(parser.finish().is_some());
        assert!(parser.finish().is_none());
    }
}
