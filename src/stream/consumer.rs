use super::decoder::SseDecoder;
use crate::api::{check_status, is_json, ApiError, ChatResponse, ServiceError};
use crate::config::StreamingSettings;
use futures::stream::{BoxStream, Stream, StreamExt};
use reqwest::RequestBuilder;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Reply text delivered piece by piece.
///
/// The request is only sent on first poll. After an `Err` item the stream is
/// finished; polling past the end keeps returning `None`.
pub struct FragmentStream {
    inner: Pin<Box<dyn Stream<Item = Result<String, ServiceError>> + Send>>,
}

impl Stream for FragmentStream {
    type Item = Result<String, ServiceError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl FragmentStream {
    /// Open `request` lazily and decode its body.
    ///
    /// `context` becomes the [`ServiceError`] message if anything fails.
    pub fn open(request: RequestBuilder, context: &'static str, pacing: StreamingSettings) -> Self {
        let state = State::Pending { request, pacing };
        let inner = futures::stream::unfold(state, move |state| next(state, context)).fuse();
        Self {
            inner: Box::pin(inner),
        }
    }

    /// Replay an already-complete reply with the given pacing.
    pub fn simulated(text: &str, pacing: &StreamingSettings) -> Self {
        let state = State::Simulated {
            chunks: split_chars(text, pacing.chunk_chars),
            delay: pacing.delay,
            started: false,
        };
        let inner = futures::stream::unfold(state, |state| next(state, "")).fuse();
        Self {
            inner: Box::pin(inner),
        }
    }

    /// Drain the stream into the full reply text.
    pub async fn collect_text(mut self) -> Result<String, ServiceError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

enum State {
    Pending {
        request: RequestBuilder,
        pacing: StreamingSettings,
    },
    Sse {
        body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
        decoder: SseDecoder,
        ready: VecDeque<String>,
    },
    Simulated {
        chunks: VecDeque<String>,
        delay: Duration,
        started: bool,
    },
    Done,
}

type Step = Option<(Result<String, ServiceError>, State)>;

async fn next(state: State, context: &'static str) -> Step {
    let mut state = state;
    loop {
        state = match state {
            State::Done => return None,
            State::Pending { request, pacing } => match connect(request, &pacing).await {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!("{}: {}", context, e);
                    return Some((Err(ServiceError::new(context, e)), State::Done));
                }
            },
            State::Sse {
                mut body,
                mut decoder,
                mut ready,
            } => {
                if let Some(fragment) = ready.pop_front() {
                    return Some((
                        Ok(fragment),
                        State::Sse {
                            body,
                            decoder,
                            ready,
                        },
                    ));
                }
                match body.next().await {
                    Some(Ok(chunk)) => {
                        ready.extend(decoder.push(&chunk));
                        State::Sse {
                            body,
                            decoder,
                            ready,
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("{}: body read failed: {}", context, e);
                        return Some((Err(ServiceError::new(context, e)), State::Done));
                    }
                    None => {
                        return decoder.finish().map(|fragment| (Ok(fragment), State::Done));
                    }
                }
            }
            State::Simulated {
                mut chunks,
                delay,
                started,
            } => {
                let chunk = chunks.pop_front()?;
                if started && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                return Some((
                    Ok(chunk),
                    State::Simulated {
                        chunks,
                        delay,
                        started: true,
                    },
                ));
            }
        };
    }
}

/// Send the request and pick the decoding mode from the response content type.
async fn connect(request: RequestBuilder, pacing: &StreamingSettings) -> Result<State, ApiError> {
    let resp = check_status(request.send().await?).await?;

    if is_json(&resp) {
        let text = resp.text().await?;
        let reply: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ApiError::Parse(e.to_string()))?;
        let reply = reply.into_reply()?;
        tracing::debug!(chars = reply.chars().count(), "replaying JSON reply as stream");
        return Ok(State::Simulated {
            chunks: split_chars(&reply, pacing.chunk_chars),
            delay: pacing.delay,
            started: false,
        });
    }

    Ok(State::Sse {
        body: resp.bytes_stream().boxed(),
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
    })
}

fn split_chars(text: &str, size: usize) -> VecDeque<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Canned, MockServer};
    use std::time::Duration;

    fn fast() -> StreamingSettings {
        StreamingSettings {
            chunk_chars: 4,
            delay: Duration::ZERO,
        }
    }

    async fn collect_items(stream: FragmentStream) -> Vec<Result<String, ServiceError>> {
        stream.collect().await
    }

    #[test]
    fn test_split_chars_respects_char_boundaries() {
        let chunks: Vec<String> = split_chars("héllo wörld", 3).into_iter().collect();
        assert_eq!(chunks, vec!["hél", "lo ", "wör", "ld"]);
        assert!(split_chars("", 10).is_empty());
    }

    #[tokio::test]
    async fn test_sse_body_yields_fragments_in_order() {
        let server = MockServer::start().await;
        let url = format!("{}/chat/stream", server.base_url);
        let handle = tokio::spawn(server.respond_once(
            200,
            "text/event-stream",
            "data: {\"content\":\"Hello\"}\n\ndata: {\"content\":\" world\"}\n\ndata: oops\n\n",
        ));

        let request = reqwest::Client::new().post(url).body("{}");
        let stream = FragmentStream::open(request, "Failed to generate streaming response", fast());
        let text = stream.collect_text().await.unwrap();
        assert_eq!(text, "Hello world");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_json_reply_is_replayed_in_chunks() {
        let server = MockServer::start().await;
        let url = format!("{}/documents/qa", server.base_url);
        let handle = tokio::spawn(server.respond_once(
            200,
            "application/json",
            r#"{"success":true,"response":"abcdefghij"}"#,
        ));

        let request = reqwest::Client::new().post(url);
        let items = collect_items(FragmentStream::open(request, "qa failed", fast())).await;
        let fragments: Vec<String> = items.into_iter().map(|i| i.unwrap()).collect();
        assert_eq!(fragments, vec!["abcd", "efgh", "ij"]);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_single_terminal_error() {
        let server = MockServer::start().await;
        let url = format!("{}/chat/stream", server.base_url);
        let handle = tokio::spawn(server.respond_once(500, "text/plain", "boom"));

        let request = reqwest::Client::new().post(url);
        let items =
            collect_items(FragmentStream::open(request, "Failed to generate streaming response", fast()))
                .await;
        assert_eq!(items.len(), 1);
        let err = items.into_iter().next().unwrap().unwrap_err();
        assert_eq!(err.message, "Failed to generate streaming response");
        assert!(matches!(err.source, ApiError::Api { status: 500, ref message } if message == "boom"));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_body_cut_off_mid_read_ends_with_one_error() {
        let server = MockServer::start().await;
        let url = format!("{}/chat/stream", server.base_url);
        let handle = tokio::spawn(server.respond_sequence(vec![Canned::truncated(
            200,
            "text/event-stream",
            "data: {\"content\":\"Hel\"}\n\n",
        )]));

        let request = reqwest::Client::new().post(url);
        let mut stream = FragmentStream::open(request, "Failed to generate streaming response", fast());
        assert_eq!(stream.next().await.unwrap().unwrap(), "Hel");
        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.message, "Failed to generate streaming response");
        assert!(matches!(err.source, ApiError::Http(_)));
        assert!(stream.next().await.is_none());
        // Finished streams stay finished.
        assert!(stream.next().await.is_none());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_polling_after_end_keeps_returning_none() {
        let mut stream = FragmentStream::simulated("abc", &fast());
        assert_eq!(stream.next().await.unwrap().unwrap(), "abc");
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_json_failure_reply_is_an_error() {
        let server = MockServer::start().await;
        let url = format!("{}/chat/stream", server.base_url);
        let handle = tokio::spawn(server.respond_once(
            200,
            "application/json",
            r#"{"success":false,"response":"","error":"model overloaded"}"#,
        ));

        let request = reqwest::Client::new().post(url);
        let items = collect_items(FragmentStream::open(request, "ctx", fast())).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(
            items[0].as_ref().unwrap_err().source,
            ApiError::Backend(ref m) if m == "model overloaded"
        ));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_connection_refused_is_an_error() {
        // Bind then drop to get a port nobody listens on.
        let server = MockServer::start().await;
        let url = format!("{}/chat/stream", server.base_url);
        drop(server);

        let request = reqwest::Client::new().post(url);
        let items = collect_items(FragmentStream::open(request, "ctx", fast())).await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0].as_ref().unwrap_err().source, ApiError::Http(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_stream_paces_fragments() {
        let pacing = StreamingSettings {
            chunk_chars: 10,
            delay: Duration::from_millis(10),
        };
        let start = tokio::time::Instant::now();
        let fragments: Vec<String> = FragmentStream::simulated(&"x".repeat(25), &pacing)
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments.len(), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(20));
    }
}
