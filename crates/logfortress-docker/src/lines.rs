//! Reassembly of text lines from arbitrary byte chunks.

/// Splits a byte stream into lines.
///
/// Bytes are buffered until a `\n` arrives, so neither a line nor a
/// multi-byte character is ever split at a chunk boundary. A partial
/// line longer than the cap is flushed early, cut on a character
/// boundary. A single trailing `\r` is stripped; invalid UTF-8 is
/// replaced rather than rejected.
#[derive(Debug)]
pub struct LineDecoder {
    pending: Vec<u8>,
    max_line_bytes: usize,
}

impl LineDecoder {
    /// Create a decoder that force-flushes partial lines longer than `max_line_bytes`.
    pub fn new(max_line_bytes: usize) -> Self {
        Self {
            pending: Vec::new(),
            max_line_bytes: max_line_bytes.max(1),
        }
    }

    /// Feed a chunk and collect every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        let mut rest = chunk;

        while let Some(pos) = rest.iter().position(|&b| b == b'\n') {
            self.pending.extend_from_slice(&rest[..pos]);
            lines.push(self.take_pending());
            rest = &rest[pos + 1..];
        }
        self.pending.extend_from_slice(rest);

        while self.pending.len() > self.max_line_bytes {
            let tail = self.pending.split_off(self.flush_point());
            lines.push(self.take_pending());
            self.pending = tail;
        }

        lines
    }

    /// Byte index at or below the cap that does not cut a UTF-8 sequence.
    ///
    /// Only called while `pending` is longer than the cap.
    fn flush_point(&self) -> usize {
        let is_continuation = |b: u8| b & 0b1100_0000 == 0b1000_0000;

        let mut cut = self.max_line_bytes;
        while cut > 0 && is_continuation(self.pending[cut]) {
            cut -= 1;
        }
        if cut == 0 {
            // A single character wider than the cap; keep it whole.
            cut = self.max_line_bytes;
            while cut < self.pending.len() && is_continuation(self.pending[cut]) {
                cut += 1;
            }
        }
        cut
    }

    /// Flush whatever partial line remains once the origin has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.take_pending())
        }
    }

    /// Bytes currently held back waiting for a line break.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn take_pending(&mut self) -> String {
        let mut bytes = std::mem::take(&mut self.pending);
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_across_chunks() {
        let mut decoder = LineDecoder::new(1024);

        assert!(decoder.push(b"GET /index.h").is_empty());
        assert_eq!(decoder.push(b"tml 200\nGET /fav"), vec!["GET /index.html 200"]);
        assert_eq!(decoder.push(b"icon.ico 404\n"), vec!["GET /favicon.ico 404"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_many_lines_in_one_chunk() {
        let mut decoder = LineDecoder::new(1024);
        assert_eq!(decoder.push(b"a\nb\n\nc"), vec!["a", "b", ""]);
        assert_eq!(decoder.finish().as_deref(), Some("c"));
    }

    #[test]
    fn test_crlf_is_stripped() {
        let mut decoder = LineDecoder::new(1024);
        assert_eq!(decoder.push(b"ready\r\n"), vec!["ready"]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let mut decoder = LineDecoder::new(1024);
        let text = "température élevée\n".as_bytes();
        let (head, tail) = text.split_at(2);

        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["température élevée"]);
    }

    #[test]
    fn test_long_partial_line_is_flushed() {
        let mut decoder = LineDecoder::new(4);
        assert_eq!(decoder.push(b"abcdefghij"), vec!["abcd", "efgh"]);
        assert_eq!(decoder.pending_len(), 2);
        assert_eq!(decoder.finish().as_deref(), Some("ij"));
    }

    #[test]
    fn test_line_exactly_at_cap_waits_for_terminator() {
        let mut decoder = LineDecoder::new(4);
        assert!(decoder.push(b"abcd").is_empty());
        assert_eq!(decoder.push(b"\nnext\n"), vec!["abcd", "next"]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_forced_flush_keeps_multibyte_char_whole() {
        let mut decoder = LineDecoder::new(4);
        assert_eq!(decoder.push("abcé".as_bytes()), vec!["abc"]);
        assert_eq!(decoder.finish().as_deref(), Some("é"));
    }

    #[test]
    fn test_char_wider_than_cap_is_not_split() {
        let mut decoder = LineDecoder::new(1);
        assert_eq!(decoder.push("日x".as_bytes()), vec!["日"]);
        assert_eq!(decoder.finish().as_deref(), Some("x"));
    }
}
