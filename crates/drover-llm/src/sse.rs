//! Server-Sent Events line parser.
//!
//! Chat-completion endpoints stream responses as SSE. This parser handles
//! line buffering across chunk boundaries, `data:` payload extraction,
//! comment/field filtering, the `[DONE]` sentinel, and CRLF line endings.
//! Transport errors are passed through so callers can surface them as
//! provider failures.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio_stream::StreamExt;

/// Parse SSE lines from a byte stream and yield JSON data strings.
///
/// Each item is either a `data:` payload (with `[DONE]` filtered out) or a
/// transport error from the underlying stream. A trailing payload without a
/// final newline is still delivered when the stream ends.
pub fn parse_sse_lines<S>(
    byte_stream: S,
) -> impl Stream<Item = Result<String, reqwest::Error>> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192), false),
        |(mut stream, mut buffer, done)| async move {
            if done {
                return None;
            }

            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let Ok(line) = std::str::from_utf8(&line_bytes) else {
                        continue; // skip invalid UTF-8 lines
                    };
                    if let Some(data) = extract_sse_data(line) {
                        return Some((Ok(data), (stream, buffer, false)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => return Some((Err(e), (stream, buffer, true))),
                    None => {
                        // Stream ended — deliver any trailing payload.
                        if !buffer.is_empty() {
                            if let Ok(line) = std::str::from_utf8(&buffer) {
                                if let Some(data) = extract_sse_data(line.trim()) {
                                    buffer.clear();
                                    return Some((Ok(data), (stream, buffer, true)));
                                }
                            }
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Extract the data payload from one SSE line.
///
/// Returns `None` for empty lines, comments, non-data fields, and the
/// `[DONE]` sentinel.
fn extract_sse_data(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?;
    let data = data.trim();

    if data == "[DONE]" || data.is_empty() {
        return None;
    }
    Some(data.to_owned())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
