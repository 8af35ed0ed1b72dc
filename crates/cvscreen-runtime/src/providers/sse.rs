//! Incremental decoder for OpenAI-style server-sent event streams.
//!
//! Each event line looks like `data: {"choices":[{"delta":{"content":"..."}}]}`
//! and the stream ends with `data: [DONE]`. Network chunks can split lines at
//! any byte, including inside a multi-byte character, so input is buffered as
//! raw bytes until a full line is available.

use serde_json::Value as JsonValue;

use super::ProviderError;

/// Turns raw response bytes into content fragments.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk and return every fragment completed by it.
    ///
    /// Empty deltas (role announcements, finish markers) produce nothing.
    /// Anything after `[DONE]` is ignored.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Result<String, ProviderError>> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(item) = self.decode_line(&line) {
                out.push(item);
            }
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        out
    }

    /// Flush a final line that arrived without a trailing newline.
    pub fn finish(&mut self) -> Option<Result<String, ProviderError>> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<Result<String, ProviderError>> {
        let line = match std::str::from_utf8(raw) {
            Ok(line) => line.trim_end_matches(['\r', '\n']),
            Err(e) => return Some(Err(ProviderError::StreamError(e.to_string()))),
        };

        // Comments, `event:`/`id:` fields and blank separators carry no content
        let payload = line.strip_prefix("data:")?.trim_start();

        if payload == "[DONE]" {
            self.done = true;
            return None;
        }

        let event: JsonValue = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => return Some(Err(ProviderError::ParseError(e.to_string()))),
        };

        if let Some(error) = event.get("error") {
            let message = error
                .get("message")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Some(Err(ProviderError::StreamError(message)));
        }

        event
            .pointer("/choices/0/delta/content")
            .and_then(JsonValue::as_str)
            .filter(|content| !content.is_empty())
            .map(|content| Ok(content.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"index": 0, "delta": {"content": content}}]})
        )
    }

    fn texts(items: Vec<Result<String, ProviderError>>) -> Vec<String> {
        items.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_decodes_fragments_in_order() {
        let mut decoder = SseDecoder::new();
        let body = format!("{}{}{}data: [DONE]\n\n", delta("{\"sc"), delta("ore\": "), delta("80}"));

        let fragments = texts(decoder.feed(body.as_bytes()));
        assert_eq!(fragments, vec!["{\"sc", "ore\": ", "80}"]);
        assert!(decoder.is_done());
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        let body = delta("héllo");
        let bytes = body.as_bytes();
        // split inside the two-byte 'é'
        let split = body.find('é').unwrap() + 1;

        assert!(decoder.feed(&bytes[..split]).is_empty());
        assert_eq!(texts(decoder.feed(&bytes[split..])), vec!["héllo"]);
    }

    #[test]
    fn test_ignores_role_and_empty_deltas() {
        let mut decoder = SseDecoder::new();
        let body = concat!(
            ": keep-alive\n",
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        );
        assert!(decoder.feed(body.as_bytes()).is_empty());
        assert!(!decoder.is_done());
    }

    #[test]
    fn test_nothing_after_done() {
        let mut decoder = SseDecoder::new();
        let body = format!("data: [DONE]\n\n{}", delta("late"));
        assert!(decoder.feed(body.as_bytes()).is_empty());
        assert!(decoder.feed(delta("later").as_bytes()).is_empty());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_error_event() {
        let mut decoder = SseDecoder::new();
        let body = "data: {\"error\":{\"message\":\"model overloaded\"}}\n\n";
        let items = decoder.feed(body.as_bytes());
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(ProviderError::StreamError(msg)) => assert_eq!(msg, "model overloaded"),
            other => panic!("unexpected item: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_event_is_parse_error() {
        let mut decoder = SseDecoder::new();
        let items = decoder.feed(b"data: {not json\n");
        assert!(matches!(items.as_slice(), [Err(ProviderError::ParseError(_))]));
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = SseDecoder::new();
        let body = delta("tail");
        let unterminated = body.trim_end();
        assert!(decoder.feed(unterminated.as_bytes()).is_empty());
        assert_eq!(decoder.finish().unwrap().unwrap(), "tail");
    }

    #[test]
    fn test_crlf_lines() {
        let mut decoder = SseDecoder::new();
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\r\n\r\n";
        assert_eq!(texts(decoder.feed(body.as_bytes())), vec!["ok"]);
    }
}
