//! Splits a chunked HTTP body into lines.
//!
//! Chunk boundaries from the network never line up with record boundaries,
//! so both the Ollama NDJSON stream and the OpenAI `data:` stream go through
//! this buffer before parsing.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::fmt::Display;

use crate::error::{Error, Result};

struct LineState<S> {
    inner: std::pin::Pin<Box<S>>,
    buffer: Vec<u8>,
    done: bool,
}

/// Yield each `\n`-terminated line without its terminator (`\r` stripped).
/// A trailing unterminated line is yielded when the body ends. A transport
/// error is yielded once and ends the stream.
pub(crate) fn split_lines<S, B, E>(body: S) -> BoxStream<'static, Result<String>>
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = LineState {
        inner: Box::pin(body),
        buffer: Vec::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(pos) = state.buffer.iter().position(|b| *b == b'\n') {
                let raw: Vec<u8> = state.buffer.drain(..=pos).collect();
                return Some((Ok(decode_line(&raw)), state));
            }

            if state.done {
                if state.buffer.is_empty() {
                    return None;
                }
                let raw = std::mem::take(&mut state.buffer);
                return Some((Ok(decode_line(&raw)), state));
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => state.buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(e)) => {
                    state.done = true;
                    state.buffer.clear();
                    return Some((Err(Error::llm(format!("Stream error: {}", e))), state));
                }
                None => state.done = true,
            }
        }
    })
    .boxed()
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}
