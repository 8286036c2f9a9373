//! Incremental parsing of a JSON array body.
//!
//! The reader splits the array into raw element slices as bytes arrive, so
//! a consumer can stop after any element without draining the body.

use std::collections::VecDeque;

use futures_util::{stream, Stream, StreamExt};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure while streaming an array.
#[derive(Debug, Error)]
pub enum StreamError<E> {
    #[error("failed to read response body: {0}")]
    Body(E),

    #[error("malformed JSON array: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Before the opening bracket.
    Start,
    /// Expecting an element (or `]` when `first`).
    Ready { first: bool },
    /// Inside an element.
    Element {
        depth: u32,
        in_string: bool,
        escape: bool,
    },
    /// After an element, expecting `,` or `]`.
    AfterElement,
    /// After the closing bracket.
    End,
}

/// Byte-level splitter of a top-level JSON array.
#[derive(Debug)]
pub struct JsonArrayReader {
    state: State,
    element: Vec<u8>,
}

impl Default for JsonArrayReader {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonArrayReader {
    pub fn new() -> Self {
        Self {
            state: State::Start,
            element: Vec::new(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == State::End
    }

    /// Feed a chunk, returning every element it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<Vec<u8>>, String> {
        let mut completed = Vec::new();
        for &byte in chunk {
            self.step(byte, &mut completed)?;
        }
        Ok(completed)
    }

    /// Signal the end of input.
    pub fn finish(&mut self) -> Result<(), String> {
        match self.state {
            State::End => Ok(()),
            State::Start => Err("empty body".to_string()),
            _ => Err("unexpected end of body".to_string()),
        }
    }

    fn step(&mut self, byte: u8, completed: &mut Vec<Vec<u8>>) -> Result<(), String> {
        match self.state {
            State::Start => match byte {
                b'[' => self.state = State::Ready { first: true },
                // UTF-8 byte order mark
                0xEF | 0xBB | 0xBF => {}
                b if b.is_ascii_whitespace() => {}
                b => return Err(format!("expected '[', found '{}'", b as char)),
            },
            State::Ready { first } => match byte {
                b if b.is_ascii_whitespace() => {}
                b']' if first => self.state = State::End,
                b']' | b',' => return Err(format!("unexpected '{}'", byte as char)),
                _ => self.start_element(byte),
            },
            State::Element {
                depth,
                in_string,
                escape,
            } => self.continue_element(byte, depth, in_string, escape, completed)?,
            State::AfterElement => match byte {
                b if b.is_ascii_whitespace() => {}
                b',' => self.state = State::Ready { first: false },
                b']' => self.state = State::End,
                b => return Err(format!("expected ',' or ']', found '{}'", b as char)),
            },
            State::End => {
                if !byte.is_ascii_whitespace() {
                    return Err("trailing data after array".to_string());
                }
            }
        }
        Ok(())
    }

    fn start_element(&mut self, byte: u8) {
        self.element.clear();
        self.element.push(byte);
        self.state = match byte {
            b'"' => State::Element {
                depth: 0,
                in_string: true,
                escape: false,
            },
            b'{' | b'[' => State::Element {
                depth: 1,
                in_string: false,
                escape: false,
            },
            _ => State::Element {
                depth: 0,
                in_string: false,
                escape: false,
            },
        };
    }

    fn continue_element(
        &mut self,
        byte: u8,
        depth: u32,
        in_string: bool,
        escape: bool,
        completed: &mut Vec<Vec<u8>>,
    ) -> Result<(), String> {
        if in_string {
            self.element.push(byte);
            let (in_string, escape) = match (escape, byte) {
                (true, _) => (true, false),
                (false, b'\\') => (true, true),
                (false, b'"') => (false, false),
                (false, _) => (true, false),
            };
            if !in_string && depth == 0 {
                self.complete(completed);
            } else {
                self.state = State::Element {
                    depth,
                    in_string,
                    escape,
                };
            }
            return Ok(());
        }

        if depth == 0 {
            // Scalar element: ends at the first delimiter, which belongs to the array.
            if byte == b',' || byte == b']' || byte.is_ascii_whitespace() {
                self.complete(completed);
                return self.step(byte, completed);
            }
            self.element.push(byte);
            return Ok(());
        }

        self.element.push(byte);
        let depth = match byte {
            b'"' => {
                self.state = State::Element {
                    depth,
                    in_string: true,
                    escape: false,
                };
                return Ok(());
            }
            b'{' | b'[' => depth + 1,
            b'}' | b']' => depth - 1,
            _ => depth,
        };
        if depth == 0 {
            self.complete(completed);
        } else {
            self.state = State::Element {
                depth,
                in_string: false,
                escape: false,
            };
        }
        Ok(())
    }

    fn complete(&mut self, completed: &mut Vec<Vec<u8>>) {
        completed.push(std::mem::take(&mut self.element));
        self.state = State::AfterElement;
    }
}

/// Decode a raw element, skipping `null` and anything that does not parse.
fn decode<T: DeserializeOwned>(raw: &[u8]) -> Option<T> {
    match serde_json::from_slice::<Option<T>>(raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable array element");
            None
        }
    }
}

struct Unfold<S, T> {
    body: S,
    reader: JsonArrayReader,
    pending: VecDeque<T>,
    done: bool,
}

/// Lazily decode the elements of a JSON array body.
///
/// The body is only polled when no decoded element is waiting, so dropping
/// the stream after `n` items leaves the rest of the body unread.
pub fn json_array_stream<T, S, B, E>(body: S) -> impl Stream<Item = Result<T, StreamError<E>>>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let state = Unfold {
        body: Box::pin(body),
        reader: JsonArrayReader::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Ok(Some((item, state)));
            }
            if state.done {
                return Ok(None);
            }
            match state.body.next().await {
                Some(Ok(chunk)) => {
                    let elements = match state.reader.feed(chunk.as_ref()) {
                        Ok(elements) => elements,
                        Err(message) => return Err(StreamError::Malformed(message)),
                    };
                    state
                        .pending
                        .extend(elements.iter().filter_map(|raw| decode::<T>(raw)));
                }
                Some(Err(e)) => return Err(StreamError::Body(e)),
                None => {
                    if let Err(message) = state.reader.finish() {
                        return Err(StreamError::Malformed(message));
                    }
                    state.done = true;
                }
            }
        }
    })
}
