//! SSE decoding for streamed chat completions.
//!
//! OpenAI-compatible servers send one `data: {chunk}` event per increment and
//! finish with `data: [DONE]`. Each chunk is flattened into ordered
//! [`StreamDelta`]s with [`ChatCompletionChunk::into_deltas`].

use eventsource_stream::Eventsource;
use futures::stream::{self, Stream, StreamExt};
use tracing::debug;

use mcpilot_core::types::{ChatCompletionChunk, StreamDelta};
use mcpilot_core::ProviderError;

use crate::traits::DeltaStream;

/// Sentinel payload closing an OpenAI-style stream.
const DONE: &str = "[DONE]";

/// Decode a raw SSE byte stream into a [`DeltaStream`].
///
/// The stream ends at `[DONE]` or when the body closes. A malformed chunk or
/// an `{"error": ...}` payload yields one `Err` item.
pub fn decode_events<S, B, E>(bytes: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let deltas = bytes
        .eventsource()
        .take_while(|event| {
            let done = matches!(event, Ok(ev) if ev.data.trim() == DONE);
            futures::future::ready(!done)
        })
        .flat_map(|event| {
            let items = match event {
                Ok(ev) => decode_data(&ev.data),
                Err(e) => vec![Err(ProviderError::Stream(e.to_string()))],
            };
            stream::iter(items)
        });

    Box::pin(deltas)
}

/// Decode one event's `data` field.
fn decode_data(data: &str) -> Vec<Result<StreamDelta, ProviderError>> {
    let data = data.trim();
    if data.is_empty() {
        return Vec::new();
    }

    let value: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            return vec![Err(ProviderError::Decode(format!(
                "invalid stream chunk: {e}"
            )))]
        }
    };

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| err.to_string());
        return vec![Err(ProviderError::Stream(message))];
    }

    match serde_json::from_value::<ChatCompletionChunk>(value) {
        Ok(chunk) => chunk.into_deltas().into_iter().map(Ok).collect(),
        Err(e) => {
            debug!(error = %e, "Unrecognised stream chunk");
            vec![Err(ProviderError::Decode(format!(
                "unexpected chunk shape: {e}"
            )))]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(body: &'static str) -> Vec<Result<StreamDelta, ProviderError>> {
        let parts: Vec<Result<&'static [u8], std::io::Error>> = vec![Ok(body.as_bytes())];
        decode_events(stream::iter(parts)).collect().await
    }

    #[tokio::test]
    async fn test_decodes_until_done() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"reasoning_content\":\"Hmm\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );
        let items = collect(body).await;
        let deltas: Vec<StreamDelta> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            deltas,
            vec![
                StreamDelta::Reasoning("Hmm".into()),
                StreamDelta::Content("Hi".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_events_split_across_reads() {
        let parts: Vec<Result<&'static [u8], std::io::Error>> = vec![
            Ok(b"data: {\"choices\":[{\"delta\":{\"con"),
            Ok(b"tent\":\"split\"}}]}\n\ndata: [DONE]\n\n"),
        ];
        let items: Vec<_> = decode_events(stream::iter(parts)).collect().await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].as_ref().unwrap(), &StreamDelta::Content("split".into()));
    }

    #[tokio::test]
    async fn test_tool_fragments_pass_through() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"skill_notes\",\"arguments\":\"\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"{}\"}}]}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let deltas: Vec<StreamDelta> = collect(body).await.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(
            deltas,
            vec![
                StreamDelta::ToolFragment {
                    id: Some("call_1".into()),
                    name: Some("skill_notes".into()),
                    arguments: None,
                },
                StreamDelta::ToolFragment {
                    id: None,
                    name: None,
                    arguments: Some("{}".into()),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_error_payload_becomes_stream_error() {
        let body = "data: {\"error\":{\"message\":\"overloaded\"}}\n\n";
        let items = collect(body).await;
        assert_eq!(items.len(), 1);
        match &items[0] {
            Err(ProviderError::Stream(msg)) => assert_eq!(msg, "overloaded"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_decode_error() {
        let items = collect("data: {not json\n\n").await;
        assert!(matches!(items[0], Err(ProviderError::Decode(_))));
    }

    #[tokio::test]
    async fn test_keepalive_chunks_are_skipped() {
        let body = concat!(
            ": keep-alive\n\n",
            "data: {\"choices\":[]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"},\"finish_reason\":\"stop\"}]}\n\n",
        );
        assert!(collect(body).await.is_empty());
    }
}
