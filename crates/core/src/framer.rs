//! Newline framing for the child's stdout stream

/// Splits an arbitrarily chunked byte stream into newline-terminated records.
///
/// Records are split on `\n`; a trailing `\r` is stripped so `\r\n` input
/// yields the same records as `\n` input. Bytes after the last newline are
/// held back until a later chunk completes them. Blank records are returned
/// as-is; dropping them is up to the caller.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every record it completes, in stream order
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut records = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.buffer.extend_from_slice(&rest[..pos]);
            records.push(self.take_record());
            rest = &rest[pos + 1..];
        }

        self.buffer.extend_from_slice(rest);
        records
    }

    /// Bytes received since the last newline
    pub fn pending(&self) -> &[u8] {
        &self.buffer
    }

    /// Discard and return the unterminated tail, if any
    pub fn take_pending(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.take_record())
    }

    fn take_record(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.buffer);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_complete_lines() {
        let mut framer = LineFramer::new();
        let records = framer.feed(b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(records, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert!(framer.pending().is_empty());
    }

    #[test]
    fn retains_partial_tail_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.feed(b"{\"jsonrpc\":").is_empty());
        assert_eq!(framer.pending(), b"{\"jsonrpc\":");

        let records = framer.feed(b"\"2.0\"}\n{\"x\"");
        assert_eq!(records, vec!["{\"jsonrpc\":\"2.0\"}"]);
        assert_eq!(framer.pending(), b"{\"x\"");
    }

    #[test]
    fn strips_carriage_returns() {
        let mut framer = LineFramer::new();
        let records = framer.feed(b"one\r\ntwo\r");
        assert_eq!(records, vec!["one"]);

        let records = framer.feed(b"\n");
        assert_eq!(records, vec!["two"]);
    }

    #[test]
    fn keeps_blank_records_for_the_caller() {
        let mut framer = LineFramer::new();
        let records = framer.feed(b"\n  \nx\n");
        assert_eq!(records, vec!["", "  ", "x"]);
    }

    #[test]
    fn multibyte_characters_survive_chunk_splits() {
        let text = "{\"msg\":\"héllo ✓\"}\n".as_bytes();
        let mut framer = LineFramer::new();
        let mut records = Vec::new();
        for byte in text {
            records.extend(framer.feed(std::slice::from_ref(byte)));
        }
        assert_eq!(records, vec!["{\"msg\":\"héllo ✓\"}"]);
    }

    #[test]
    fn take_pending_drains_tail() {
        let mut framer = LineFramer::new();
        framer.feed(b"done\npartial");
        assert_eq!(framer.take_pending().as_deref(), Some("partial"));
        assert_eq!(framer.take_pending(), None);
    }
}
