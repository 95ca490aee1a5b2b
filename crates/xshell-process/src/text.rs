//! Text adapter for callers that want decoded strings instead of raw chunks

use std::char::REPLACEMENT_CHARACTER;

use parking_lot::Mutex;

use crate::callback::StatusCallback;
use crate::outcome::ExitOutcome;

/// Incremental UTF-8 decoder
///
/// Multi-byte sequences split across chunk boundaries are carried over to the
/// next call. Invalid bytes become U+FFFD, the same way
/// `String::from_utf8_lossy` treats them.
#[derive(Debug, Default, Clone)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `pending + chunk` as is complete
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(bad) => {
                            out.push(REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        // Incomplete sequence at the end; wait for more bytes.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let tail = rest.to_vec();
        self.pending = tail;
        out
    }

    /// Flush a dangling partial sequence at end of stream
    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }

    /// Bytes held back waiting for the rest of a sequence
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// String-oriented counterpart of [`StatusCallback`]
pub trait TextSink: Send + Sync {
    /// Decoded stdout text
    fn on_stdout_text(&self, _text: &str) {}

    /// Decoded stderr text
    fn on_stderr_text(&self, _text: &str) {}

    /// Terminal outcome
    fn on_exit(&self, _outcome: &ExitOutcome) {}
}

/// Adapts a [`TextSink`] to [`StatusCallback`], one decoder per stream
#[derive(Debug)]
pub struct TextCallback<S> {
    sink: S,
    stdout: Mutex<Utf8Decoder>,
    stderr: Mutex<Utf8Decoder>,
}

impl<S: TextSink> TextCallback<S> {
    /// Wrap a text sink
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            stdout: Mutex::new(Utf8Decoder::new()),
            stderr: Mutex::new(Utf8Decoder::new()),
        }
    }

    /// Access the wrapped sink
    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: TextSink> StatusCallback for TextCallback<S> {
    fn on_stdout(&self, chunk: &[u8]) {
        let text = self.stdout.lock().decode(chunk);
        if !text.is_empty() {
            self.sink.on_stdout_text(&text);
        }
    }

    fn on_stderr(&self, chunk: &[u8]) {
        let text = self.stderr.lock().decode(chunk);
        if !text.is_empty() {
            self.sink.on_stderr_text(&text);
        }
    }

    fn on_exit(&self, outcome: &ExitOutcome) {
        let out = self.stdout.lock().finish();
        if !out.is_empty() {
            self.sink.on_stdout_text(&out);
        }
        let err = self.stderr.lock().finish();
        if !err.is_empty() {
            self.sink.on_stderr_text(&err);
        }
        self.sink.on_exit(outcome);
    }
}
