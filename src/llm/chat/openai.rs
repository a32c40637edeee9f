use async_trait::async_trait;
use futures::{ Stream, StreamExt };
use log::{ debug, info, warn };
use reqwest::{ Client as HttpClient, Response, header::{ HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION } };
use serde::{ Deserialize, Serialize };
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::mpsc;

use super::frame::{ parse_frame, Frame, LineBuffer };
use super::{ create_streaming_response, ChatClient, FragmentStream };
use crate::error::{ RelayError, Result };
use crate::llm::LlmConfig;
use crate::models::chat::Turn;

pub struct OpenAIChatClient {
    http: HttpClient,
    model: String,
    api_url: String,
    temperature: f32,
    max_tokens: Option<u32>,
    request_timeout: Duration,
    stream_idle_timeout: Duration,
    stream_pace: Duration,
}

#[derive(Serialize)]
struct OpenAIChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

#[derive(Deserialize)]
struct OpenAIMessage {
    content: Option<String>,
}

impl OpenAIChatClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key)).map_err(|e|
            RelayError::Configuration(format!("Invalid API key format: {}", e))
        )?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let http = HttpClient::builder()
            .default_headers(headers)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| RelayError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            model: config.model.clone(),
            api_url: config.api_url.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            request_timeout: config.request_timeout,
            stream_idle_timeout: config.stream_idle_timeout,
            stream_pace: config.stream_pace,
        })
    }

    fn request<'a>(&'a self, messages: &'a [Turn], stream: bool) -> OpenAIChatRequest<'a> {
        OpenAIChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: stream.then_some(true),
        }
    }

    async fn send(&self, messages: &[Turn], stream: bool) -> Result<Response> {
        let req = self.request(messages, stream);
        let resp = tokio::time
            ::timeout(self.request_timeout, self.http.post(&self.api_url).json(&req).send()).await
            .map_err(|_| RelayError::Timeout(self.request_timeout.as_secs()))??;
        check_status(resp).await
    }
}

/// Converts a non-success response into `RelayError::Upstream`, keeping its body as detail.
async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = match resp.text().await {
        Ok(body) => body,
        Err(e) => {
            debug!("Failed to read upstream error body: {}", e);
            String::new()
        }
    };
    warn!("Upstream responded with HTTP {}: {}", status.as_u16(), body);
    Err(RelayError::Upstream { status: status.as_u16(), body })
}

#[async_trait]
impl ChatClient for OpenAIChatClient {
    async fn complete(&self, messages: &[Turn]) -> Result<String> {
        let body = tokio::time
            ::timeout(self.request_timeout, async {
                let resp = self.send(messages, false).await?;
                Ok::<_, RelayError>(resp.text().await?)
            }).await
            .map_err(|_| RelayError::Timeout(self.request_timeout.as_secs()))??;

        let parsed: OpenAIResponse = serde_json
            ::from_str(&body)
            .map_err(|e| RelayError::Decode(format!("{} in body: {}", e, body)))?;

        let content = parsed.choices
            .into_iter()
            .next()
            .ok_or_else(|| RelayError::Decode("response contained no choices".to_string()))?
            .message.content.unwrap_or_default();

        Ok(content.trim().to_string())
    }

    async fn stream_completion(&self, messages: &[Turn]) -> Result<FragmentStream> {
        let resp = self.send(messages, true).await?;
        info!("Upstream stream opened ({} messages)", messages.len());

        let idle = self.stream_idle_timeout;
        let pace = self.stream_pace;
        Ok(
            create_streaming_response(move |tx| async move {
                pump_frames(resp.bytes_stream(), tx, idle, pace).await;
            })
        )
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Reads the upstream body line by line and forwards each content fragment to `tx` in order.
///
/// Stops at the terminator, when the consumer goes away, or on the first transport error.
/// A body that ends without the terminator is reported as `StreamInterrupted`.
pub(crate) async fn pump_frames<S, B, E>(
    body: S,
    tx: mpsc::Sender<Result<String>>,
    idle: Duration,
    pace: Duration
)
    where S: Stream<Item = std::result::Result<B, E>>, B: AsRef<[u8]>, E: Into<RelayError>
{
    let mut body = std::pin::pin!(body);
    let mut lines = LineBuffer::new();

    loop {
        let next = tokio::select! {
            _ = tx.closed() => {
                debug!("Stream consumer went away; closing upstream connection");
                return;
            }
            next = tokio::time::timeout(idle, body.next()) => next,
        };

        match next {
            Ok(Some(Ok(chunk))) => {
                for line in lines.push(chunk.as_ref()) {
                    if forward_line(&line, &tx, pace).await.is_break() {
                        return;
                    }
                }
            }
            Ok(Some(Err(e))) => {
                let err: RelayError = e.into();
                warn!("Upstream stream failed: {}", err);
                let _ = tx.send(Err(err)).await;
                return;
            }
            Ok(None) => {
                if let Some(tail) = lines.finish() {
                    if forward_line(&tail, &tx, pace).await.is_break() {
                        return;
                    }
                }
                warn!("Upstream stream closed without a terminator");
                let _ = tx.send(Err(RelayError::StreamInterrupted)).await;
                return;
            }
            Err(_) => {
                warn!("Upstream stream idle for more than {:?}", idle);
                let _ = tx.send(Err(RelayError::Timeout(idle.as_secs()))).await;
                return;
            }
        }
    }
}

async fn forward_line(
    line: &str,
    tx: &mpsc::Sender<Result<String>>,
    pace: Duration
) -> ControlFlow<()> {
    match parse_frame(line) {
        Frame::Content(text) => {
            if tx.send(Ok(text)).await.is_err() {
                debug!("Stream consumer went away; closing upstream connection");
                return ControlFlow::Break(());
            }
            if !pace.is_zero() {
                tokio::time::sleep(pace).await;
            }
            ControlFlow::Continue(())
        }
        Frame::Terminator => ControlFlow::Break(()),
        Frame::Malformed(err) => {
            debug!("Skipping malformed frame ({}): {}", err, line);
            ControlFlow::Continue(())
        }
        Frame::Heartbeat | Frame::Ignored => ControlFlow::Continue(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunk(s: &str) -> std::result::Result<Vec<u8>, RelayError> {
        Ok(s.as_bytes().to_vec())
    }

    fn delta(text: &str) -> String {
        format!("data: {}\n\n", serde_json::json!({ "choices": [{ "delta": { "content": text } }] }))
    }

    async fn collect(body: Vec<std::result::Result<Vec<u8>, RelayError>>) -> Vec<Result<String>> {
        let (tx, mut rx) = mpsc::channel(32);
        pump_frames(stream::iter(body), tx, Duration::from_secs(5), Duration::ZERO).await;
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    fn texts(items: &[Result<String>]) -> Vec<String> {
        items
            .iter()
            .filter_map(|r| r.as_ref().ok().cloned())
            .collect()
    }

    #[tokio::test]
    async fn test_fragments_in_order_until_terminator() {
        let items = collect(
            vec![
                chunk("data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n"),
                chunk(&delta("Hel")),
                chunk(&delta("lo")),
                chunk("data: [DONE]\n\n")
            ]
        ).await;

        assert_eq!(texts(&items), vec!["Hel", "lo"]);
        assert!(items.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_malformed_frame_is_skipped() {
        let items = collect(
            vec![
                chunk(&delta("one")),
                chunk("data: {broken\n\n"),
                chunk(&delta("two")),
                chunk("data: [DONE]\n")
            ]
        ).await;

        assert_eq!(texts(&items), vec!["one", "two"]);
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_nothing_after_terminator_is_read() {
        let items = collect(
            vec![
                chunk(&format!("{}data: [DONE]\n\n{}data: {{garbage\n", delta("a"), delta("b"))),
                Err(RelayError::StreamInterrupted)
            ]
        ).await;

        assert_eq!(items.len(), 1);
        assert_eq!(texts(&items), vec!["a"]);
    }

    #[tokio::test]
    async fn test_frames_split_across_chunks() {
        let whole = format!("{}{}data: [DONE]\n", delta("split"), delta(" up"));
        let (head, tail) = whole.split_at(17);
        let items = collect(vec![chunk(head), chunk(tail)]).await;
        assert_eq!(texts(&items), vec!["split", " up"]);
    }

    #[tokio::test]
    async fn test_missing_terminator_is_interruption() {
        let items = collect(vec![chunk(&delta("partial"))]).await;
        assert_eq!(texts(&items), vec!["partial"]);
        assert!(matches!(items.last(), Some(Err(RelayError::StreamInterrupted))));
    }

    #[tokio::test]
    async fn test_unterminated_final_line_is_still_parsed() {
        let items = collect(vec![chunk(&delta("x")), chunk("data: [DONE]")]).await;
        assert_eq!(items.len(), 1);
        assert_eq!(texts(&items), vec!["x"]);
    }

    #[tokio::test]
    async fn test_transport_error_ends_stream() {
        let items = collect(
            vec![chunk(&delta("before")), Err(RelayError::Decode("reset".into())), chunk(&delta("after"))]
        ).await;

        assert_eq!(texts(&items), vec!["before"]);
        assert!(matches!(items.last(), Some(Err(RelayError::Decode(_)))));
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let (tx, mut rx) = mpsc::channel(4);
        let body = stream::pending::<std::result::Result<Vec<u8>, RelayError>>();
        pump_frames(body, tx, Duration::from_millis(20), Duration::ZERO).await;
        assert!(matches!(rx.recv().await, Some(Err(RelayError::Timeout(_)))));
    }

    #[tokio::test]
    async fn test_stops_when_consumer_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let body = stream::pending::<std::result::Result<Vec<u8>, RelayError>>();
        // Returns promptly instead of waiting on the idle timeout.
        tokio::time
            ::timeout(
                Duration::from_secs(1),
                pump_frames(body, tx, Duration::from_secs(60), Duration::ZERO)
            ).await
            .unwrap();
    }

    fn upstream_response(status: u16, body: reqwest::Body) -> Response {
        let resp = axum::http::Response::builder().status(status).body(body).unwrap();
        Response::from(resp)
    }

    #[tokio::test]
    async fn test_error_status_keeps_upstream_body_as_detail() {
        let err = check_status(upstream_response(500, "overloaded".into())).await.unwrap_err();
        match err {
            RelayError::Upstream { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "overloaded");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_error_body_still_reports_status() {
        let broken = reqwest::Body::wrap_stream(
            stream::iter(vec![
                Ok::<_, std::io::Error>(b"partial".to_vec()),
                Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            ])
        );
        let err = check_status(upstream_response(503, broken)).await.unwrap_err();
        match err {
            RelayError::Upstream { status, body } => {
                assert_eq!(status, 503);
                assert!(body.is_empty());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_request_body_shape() {
        let client = OpenAIChatClient::from_config(&LlmConfig::new("sk", "http://localhost/v1")).unwrap();
        let messages = vec![Turn::system("sys"), Turn::user("hi")];

        let body = serde_json::to_value(client.request(&messages, true)).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["messages"][1], serde_json::json!({ "role": "user", "content": "hi" }));

        let body = serde_json::to_value(client.request(&messages, false)).unwrap();
        assert!(body.get("stream").is_none());
    }
}
