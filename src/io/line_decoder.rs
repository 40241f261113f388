// src/io/line_decoder.rs

//! Incremental UTF-8 line decoding.
//!
//! Bytes arrive in arbitrary chunks, possibly splitting a multi-byte character
//! across chunk boundaries. [`LineDecoder`] carries incomplete sequences over
//! to the next chunk, silently drops malformed ones, and emits each
//! `'\n'`-terminated line (without the delimiter) as soon as it is complete.
//!
//! Memory is bounded: an undelimited run longer than [`OUTPUT_WINDOW`] bytes is
//! flushed as a line of its own. Such a "line" is an artefact of the window
//! size, not of the content.

use std::io;

use tracing::Level;

use super::sink::ByteSink;

/// Bytes copied into the decode window per pass.
pub const INPUT_WINDOW: usize = 8 * 1024;
/// Maximum bytes of undelimited text held before a forced flush.
pub const OUTPUT_WINDOW: usize = 8 * 1024;

/// Feeds decoded lines to `on_line`.
pub struct LineDecoder<F>
where
    F: FnMut(&str) + Send,
{
    on_line: F,
    /// Undecoded bytes; between calls only an incomplete trailing sequence.
    window: Vec<u8>,
    /// Decoded text since the last emitted line.
    text: String,
    finished: bool,
}

impl<F> std::fmt::Debug for LineDecoder<F>
where
    F: FnMut(&str) + Send,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineDecoder")
            .field("carried_bytes", &self.window.len())
            .field("pending_text", &self.text.len())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<F> LineDecoder<F>
where
    F: FnMut(&str) + Send,
{
    pub fn new(on_line: F) -> Self {
        Self {
            on_line,
            window: Vec::with_capacity(INPUT_WINDOW + 4),
            text: String::with_capacity(OUTPUT_WINDOW),
            finished: false,
        }
    }

    /// Decode `data` and emit every line it completes. Ignored after [`Self::finish`].
    pub fn feed(&mut self, data: &[u8]) {
        if self.finished {
            return;
        }
        for chunk in data.chunks(INPUT_WINDOW) {
            let mut window = std::mem::take(&mut self.window);
            window.extend_from_slice(chunk);
            let incomplete = decode_lossy(&window, |s| self.accept(s));
            window.drain(..window.len() - incomplete);
            self.window = window;
        }
    }

    /// End of stream: drop any incomplete sequence and emit the residue.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.window.clear();
        if !self.text.is_empty() {
            self.emit();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn accept(&mut self, decoded: &str) {
        let mut rest = decoded;
        while let Some(idx) = rest.find('\n') {
            self.append(&rest[..idx]);
            self.emit();
            rest = &rest[idx + 1..];
        }
        self.append(rest);
    }

    fn append(&mut self, mut s: &str) {
        while !s.is_empty() {
            let mut cut = (OUTPUT_WINDOW - self.text.len()).min(s.len());
            while !s.is_char_boundary(cut) {
                cut -= 1;
            }
            if cut == 0 {
                // Window full without a delimiter.
                self.emit();
                continue;
            }
            self.text.push_str(&s[..cut]);
            s = &s[cut..];
        }
    }

    fn emit(&mut self) {
        (self.on_line)(&self.text);
        self.text.clear();
    }
}

impl<F> ByteSink for LineDecoder<F>
where
    F: FnMut(&str) + Send,
{
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.feed(data);
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.finish();
        Ok(())
    }
}

/// Decode `input`, handing each valid run to `out` and skipping malformed
/// sequences. Returns the length of an incomplete sequence at the very end.
fn decode_lossy<'a>(mut input: &'a [u8], mut out: impl FnMut(&'a str)) -> usize {
    loop {
        match std::str::from_utf8(input) {
            Ok(s) => {
                if !s.is_empty() {
                    out(s);
                }
                return 0;
            }
            Err(e) => {
                let (good, bad) = input.split_at(e.valid_up_to());
                if let Ok(s) = std::str::from_utf8(good) {
                    if !s.is_empty() {
                        out(s);
                    }
                }
                match e.error_len() {
                    Some(skip) => input = &bad[skip..],
                    None => return bad.len(),
                }
            }
        }
    }
}

/// Whole-buffer decode with the same policy as [`LineDecoder`]: malformed
/// sequences and a truncated final character are dropped.
pub fn decode_ignoring_errors(input: &[u8]) -> String {
    let mut text = String::with_capacity(input.len());
    decode_lossy(input, |s| text.push_str(s));
    text
}

/// Line callback that logs each line as a tracing event tagged with the
/// program and stream it came from.
pub fn tracing_lines(
    program: impl Into<String>,
    stream: &'static str,
    level: Level,
) -> impl FnMut(&str) + Send + 'static {
    let program = program.into();
    move |line: &str| {
        if level == Level::ERROR {
            tracing::error!(program = %program, stream, "{line}");
        } else if level == Level::WARN {
            tracing::warn!(program = %program, stream, "{line}");
        } else if level == Level::INFO {
            tracing::info!(program = %program, stream, "{line}");
        } else if level == Level::DEBUG {
            tracing::debug!(program = %program, stream, "{line}");
        } else {
            tracing::trace!(program = %program, stream, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_chunked(chunks: &[&[u8]]) -> Vec<String> {
        let mut lines = Vec::new();
        {
            let mut decoder = LineDecoder::new(|l: &str| lines.push(l.to_string()));
            for chunk in chunks {
                decoder.feed(chunk);
            }
            decoder.finish();
        }
        lines
    }

    #[test]
    fn emits_lines_without_delimiter_and_flushes_residue() {
        let lines = decode_chunked(&[b"one\ntw", b"o\n\nthree"]);
        assert_eq!(lines, vec!["one", "two", "", "three"]);
    }

    #[test]
    fn trailing_newline_leaves_no_empty_line() {
        assert_eq!(decode_chunked(&[b"a\nb\n"]), vec!["a", "b"]);
        assert!(decode_chunked(&[b""]).is_empty());
    }

    #[test]
    fn carriage_returns_are_kept() {
        assert_eq!(decode_chunked(&[b"dos\r\nline"]), vec!["dos\r", "line"]);
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let text = "héllo → wörld\n";
        let bytes = text.as_bytes();
        let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_chunked(&chunks), vec!["héllo → wörld"]);
    }

    #[test]
    fn malformed_bytes_are_dropped() {
        let lines = decode_chunked(&[b"ok\xff\xfe then\n", b"\xc3", b"("]);
        assert_eq!(lines, vec!["ok then", "("]);
        assert_eq!(decode_ignoring_errors(b"ok\xff\xfe then\n\xc3("), "ok then\n(");
    }

    #[test]
    fn incomplete_tail_is_dropped_on_finish() {
        let lines = decode_chunked(&[b"end\xe2\x82"]);
        assert_eq!(lines, vec!["end"]);
    }

    #[test]
    fn long_undelimited_run_is_flushed_in_windows() {
        let run = "x".repeat(OUTPUT_WINDOW * 2 + 100);
        let lines = decode_chunked(&[run.as_bytes()]);
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.len() <= OUTPUT_WINDOW));
        assert_eq!(lines.concat(), run);
    }

    #[test]
    fn exact_window_line_is_not_split() {
        let line = "y".repeat(OUTPUT_WINDOW);
        let input = format!("{line}\nz");
        assert_eq!(decode_chunked(&[input.as_bytes()]), vec![line.as_str(), "z"]);
    }

    #[test]
    fn feed_after_finish_is_ignored() {
        let mut lines = Vec::new();
        {
            let mut decoder = LineDecoder::new(|l: &str| lines.push(l.to_string()));
            decoder.feed(b"a");
            decoder.finish();
            decoder.finish();
            decoder.feed(b"b\n");
            assert!(decoder.is_finished());
        }
        assert_eq!(lines, vec!["a"]);
    }

    fn split_at_points(bytes: &[u8], mut points: Vec<usize>) -> Vec<&[u8]> {
        points.retain(|p| *p < bytes.len());
        points.sort_unstable();
        points.dedup();
        let mut chunks = Vec::new();
        let mut start = 0;
        for p in points {
            chunks.push(&bytes[start..p]);
            start = p;
        }
        chunks.push(&bytes[start..]);
        chunks
    }

    fn rejoin(lines: &[String], ends_with_newline: bool, is_empty: bool) -> String {
        if is_empty {
            return String::new();
        }
        let mut joined = lines.join("\n");
        if ends_with_newline {
            joined.push('\n');
        }
        joined
    }

    proptest! {
        #[test]
        fn lines_survive_random_chunking(
            text in "([a-zé€😀\r ]{0,40}\n?){0,30}",
            points in proptest::collection::vec(0usize..4096, 0..40),
        ) {
            let bytes = text.as_bytes();
            let lines = decode_chunked(&split_at_points(bytes, points));
            prop_assert_eq!(rejoin(&lines, text.ends_with('\n'), text.is_empty()), text);
        }

        #[test]
        fn malformed_input_matches_whole_buffer_decode(
            bytes in proptest::collection::vec(any::<u8>(), 0..2048),
            points in proptest::collection::vec(0usize..2048, 0..20),
        ) {
            let expected = decode_ignoring_errors(&bytes);
            let lines = decode_chunked(&split_at_points(&bytes, points));
            prop_assert_eq!(
                rejoin(&lines, expected.ends_with('\n'), expected.is_empty()),
                expected
            );
        }
    }
}
