//! SSE line parser for upstream streams.
//!
//! Both upstreams speak HTTP SSE. This module turns a raw byte stream into a
//! stream of `data:` payload strings:
//! - line buffering across chunk boundaries
//! - `data: ` prefix extraction
//! - `[DONE]` terminator and comment/empty-line filtering
//!
//! Frames that are not valid JSON are the caller's problem (`decode_frame`
//! logs and skips them); a malformed frame never fails the stream.

use bytes::{Bytes, BytesMut};
use futures::Stream;
use tokio_stream::StreamExt;
use tracing::warn;

/// Parse SSE lines from an upstream byte stream and yield `data:` payloads.
///
/// Terminates when the byte stream ends or errors. The `[DONE]` marker is
/// filtered out, so stream end is the only completion signal the consumer
/// needs. A trailing partial line with no newline is discarded, matching the
/// framing contract of the chat-completions upstream.
pub fn data_frames<S>(byte_stream: S) -> impl Stream<Item = String> + Send
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + Unpin + 'static,
{
    futures::stream::unfold(
        (byte_stream, BytesMut::with_capacity(8192)),
        move |(mut stream, mut buffer)| async move {
            loop {
                if let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                    let mut line_bytes = buffer.split_to(newline_pos + 1);
                    line_bytes.truncate(line_bytes.len() - 1);
                    if line_bytes.last() == Some(&b'\r') {
                        line_bytes.truncate(line_bytes.len() - 1);
                    }

                    let line = match std::str::from_utf8(&line_bytes) {
                        Ok(s) => s,
                        Err(_) => continue, // skip invalid UTF-8 lines
                    };

                    if let Some(data) = extract_data(line) {
                        return Some((data, (stream, buffer)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        warn!("SSE stream read error: {e}");
                        return None;
                    }
                    None => return None,
                }
            }
        },
    )
}

/// Extract the payload from one SSE line.
///
/// Returns `None` for comments, empty lines, non-`data` fields, and the
/// `[DONE]` marker.
fn extract_data(line: &str) -> Option<String> {
    let trimmed = line.trim();

    if trimmed.is_empty() || trimmed.starts_with(':') {
        return None;
    }

    let data = trimmed
        .strip_prefix("data: ")
        .or_else(|| trimmed.strip_prefix("data:"))?;
    let data = data.trim();

    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    Some(data.to_string())
}

/// Decode one SSE data payload into a typed frame.
///
/// Returns `None` on parse failure with a warning log; malformed frames are
/// skipped, never fatal.
pub fn decode_frame<T: serde::de::DeserializeOwned>(data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(frame) => Some(frame),
        Err(e) => {
            let preview: String = data.chars().take(100).collect();
            warn!(error = %e, %preview, "skipping malformed SSE frame");
            None
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── extract_data ─────────────────────────────────────────────────────

    #[test]
    fn extracts_data_line() {
        assert_eq!(
            extract_data("data: {\"choices\":[]}"),
            Some("{\"choices\":[]}".into())
        );
    }

    #[test]
    fn extracts_data_line_no_space() {
        assert_eq!(extract_data("data:{\"a\":1}"), Some("{\"a\":1}".into()));
    }

    #[test]
    fn skips_done_marker() {
        assert_eq!(extract_data("data: [DONE]"), None);
    }

    #[test]
    fn skips_empty_and_comment_lines() {
        assert_eq!(extract_data(""), None);
        assert_eq!(extract_data("   "), None);
        assert_eq!(extract_data(": keepalive"), None);
        assert_eq!(extract_data("data: "), None);
    }

    #[test]
    fn skips_non_data_fields() {
        assert_eq!(extract_data("event: message_start"), None);
        assert_eq!(extract_data("id: 7"), None);
    }

    // ── decode_frame ─────────────────────────────────────────────────────

    #[test]
    fn decodes_valid_json() {
        let v: Option<serde_json::Value> = decode_frame("{\"ok\":true}");
        assert_eq!(v.unwrap()["ok"], true);
    }

    #[test]
    fn malformed_frame_is_skipped() {
        let v: Option<serde_json::Value> = decode_frame("not json");
        assert!(v.is_none());
    }

    // ── data_frames ──────────────────────────────────────────────────────

    fn chunks(parts: &[&str]) -> impl Stream<Item = Result<Bytes, reqwest::Error>> + Unpin {
        let items: Vec<Result<Bytes, reqwest::Error>> = parts
            .iter()
            .map(|p| Ok(Bytes::from((*p).to_string())))
            .collect();
        futures::stream::iter(items)
    }

    #[tokio::test]
    async fn single_chunk_single_frame() {
        let frames: Vec<String> = data_frames(chunks(&["data: {\"a\":1}\n\n"])).collect().await;
        assert_eq!(frames, vec!["{\"a\":1}"]);
    }

    #[tokio::test]
    async fn multiple_frames_in_one_chunk() {
        let frames: Vec<String> = data_frames(chunks(&["data: {\"a\":1}\n\ndata: {\"b\":2}\n\n"]))
            .collect()
            .await;
        assert_eq!(frames, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[tokio::test]
    async fn frame_split_across_chunks() {
        let frames: Vec<String> = data_frames(chunks(&["data: {\"par", "tial\":true}\n\n"]))
            .collect()
            .await;
        assert_eq!(frames, vec!["{\"partial\":true}"]);
    }

    #[tokio::test]
    async fn done_marker_terminates_nothing_extra() {
        let frames: Vec<String> =
            data_frames(chunks(&["data: {\"ok\":1}\n\ndata: [DONE]\n\n"]))
                .collect()
                .await;
        assert_eq!(frames, vec!["{\"ok\":1}"]);
    }

    #[tokio::test]
    async fn comments_and_events_are_filtered() {
        let frames: Vec<String> =
            data_frames(chunks(&[": ping\n\nevent: delta\ndata: {\"v\":1}\n\n"]))
                .collect()
                .await;
        assert_eq!(frames, vec!["{\"v\":1}"]);
    }

    #[tokio::test]
    async fn crlf_lines_are_handled() {
        let frames: Vec<String> = data_frames(chunks(&["data: {\"cr\":true}\r\n\r\n"]))
            .collect()
            .await;
        assert_eq!(frames, vec!["{\"cr\":true}"]);
    }

    #[tokio::test]
    async fn trailing_partial_line_is_discarded() {
        let frames: Vec<String> = data_frames(chunks(&["data: {\"trailing\":true}"]))
            .collect()
            .await;
        assert!(frames.is_empty());
    }

    #[tokio::test]
    async fn empty_stream_yields_nothing() {
        let frames: Vec<String> = data_frames(chunks(&[])).collect().await;
        assert!(frames.is_empty());
    }
}
