//! Chat assistant proxy.
//!
//! The public site embeds a small chat widget; this service normalizes the
//! untrusted conversation it submits, prepends a fixed system directive,
//! forwards the result to an external completion API under a hard timeout,
//! and translates every upstream outcome into one error taxonomy.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::AssistantConfig;

/// Conversations are truncated to this many most-recent turns after
/// filtering out invalid entries.
const MAX_TURNS: usize = 12;

/// Low sampling temperature for deterministic answers.
const TEMPERATURE: f32 = 0.2;

/// Fixed directive scoping the assistant's persona and refusal policy.
const SYSTEM_DIRECTIVE: &str = "You are the Crestway Academy assistant. Answer questions about \
     the academy's programs, admissions, events, and facilities, concisely \
     and accurately. If a question is unrelated to the academy, politely \
     decline and steer the conversation back to academy topics. Never \
     invent fees, dates, or admission requirements.";

/// Errors that can occur when proxying a chat completion.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// No usable turns remained after normalization.
    #[error("conversation is empty")]
    EmptyConversation,

    /// No upstream API key is configured.
    #[error("assistant is not configured")]
    Misconfigured,

    /// The upstream call exceeded the hard timeout.
    #[error("assistant timed out")]
    Timeout,

    /// The upstream endpoint could not be reached.
    #[error("assistant is unavailable")]
    Unavailable,

    /// Other HTTP-level failure talking to the upstream.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The upstream returned a non-2xx status.
    #[error("{message}")]
    Upstream {
        /// HTTP status from the upstream.
        status: u16,
        /// Upstream-provided error message, or a generic fallback.
        message: String,
    },

    /// A 2xx response carried no usable reply text.
    #[error("assistant returned an empty response")]
    EmptyReply,
}

/// One normalized conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    /// "user" or "assistant"; nothing else survives normalization.
    pub role: String,
    /// Trimmed, non-empty content.
    pub content: String,
}

/// Wire request for an OpenAI-style chat completion endpoint.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatTurn>,
    temperature: f32,
}

/// Wire response, reduced to the fields this proxy consumes.
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

/// Upstream error body, when it parses.
#[derive(Debug, Deserialize)]
struct UpstreamErrorResponse {
    error: UpstreamErrorDetail,
}

#[derive(Debug, Deserialize)]
struct UpstreamErrorDetail {
    message: Option<String>,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

/// Chat completion proxy client.
#[derive(Clone)]
pub struct Assistant {
    inner: Arc<AssistantInner>,
}

struct AssistantInner {
    client: reqwest::Client,
    config: AssistantConfig,
}

impl Assistant {
    /// Create a new assistant client.
    ///
    /// The hard upstream timeout is applied at the HTTP client level, so a
    /// hung upstream aborts the in-flight request rather than the request
    /// handler.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be constructed (TLS backend
    /// initialization failure). This runs once at startup; serving without
    /// the timeout-carrying client is not an option.
    #[must_use]
    pub fn new(config: AssistantConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            inner: Arc::new(AssistantInner { client, config }),
        }
    }

    /// Normalize a raw conversation and fetch one completion for it.
    ///
    /// # Errors
    ///
    /// Returns `EmptyConversation` when nothing usable remains after
    /// normalization, `Misconfigured` when no API key is set, and a
    /// translated upstream error otherwise.
    pub async fn complete(&self, raw_messages: &Value) -> Result<String, AssistantError> {
        let turns = normalize_turns(raw_messages);
        if turns.is_empty() {
            return Err(AssistantError::EmptyConversation);
        }

        let api_key = self
            .inner
            .config
            .api_key
            .as_ref()
            .ok_or(AssistantError::Misconfigured)?;

        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatTurn {
            role: "system".to_string(),
            content: SYSTEM_DIRECTIVE.to_string(),
        });
        messages.extend(turns);

        let request = CompletionRequest {
            model: &self.inner.config.model,
            messages,
            temperature: TEMPERATURE,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.config.base_url)
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(translate_upstream_error(status.as_u16(), response).await);
        }

        let completion: CompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AssistantError::EmptyReply)
    }
}

/// Classify a reqwest transport failure.
fn classify_transport_error(e: reqwest::Error) -> AssistantError {
    if e.is_timeout() {
        AssistantError::Timeout
    } else if e.is_connect() {
        AssistantError::Unavailable
    } else {
        AssistantError::Http(e)
    }
}

/// Translate a non-2xx upstream response, surfacing the upstream-provided
/// message when the body parses as an error object.
async fn translate_upstream_error(status: u16, response: reqwest::Response) -> AssistantError {
    let message = match response.text().await {
        Ok(body) => serde_json::from_str::<UpstreamErrorResponse>(&body)
            .ok()
            .and_then(|e| e.error.message.or(e.error.error_type))
            .unwrap_or_else(|| format!("assistant request failed with status {status}")),
        Err(_) => format!("assistant request failed with status {status}"),
    };

    AssistantError::Upstream { status, message }
}

/// Normalize an untrusted conversation payload.
///
/// Accepts only a JSON array; drops non-object entries; coerces any role
/// other than exactly "assistant" to "user"; coerces non-string content to
/// empty and trims it, dropping turns left empty; keeps at most the last
/// 12 surviving turns in their original order.
fn normalize_turns(raw: &Value) -> Vec<ChatTurn> {
    let Some(entries) = raw.as_array() else {
        return Vec::new();
    };

    let turns: Vec<ChatTurn> = entries
        .iter()
        .filter_map(|entry| {
            let obj = entry.as_object()?;

            let role = match obj.get("role").and_then(Value::as_str) {
                Some("assistant") => "assistant",
                _ => "user",
            };

            let content = obj
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .trim()
                .to_string();
            if content.is_empty() {
                return None;
            }

            Some(ChatTurn {
                role: role.to_string(),
                content,
            })
        })
        .collect();

    let skip = turns.len().saturating_sub(MAX_TURNS);
    turns.into_iter().skip(skip).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use secrecy::SecretString;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn turn(role: &str, content: &str) -> ChatTurn {
        ChatTurn {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_normalize_coerces_and_filters() {
        let raw = json!([
            {"role": "system", "content": "x"},
            {"role": "user", "content": "  hi  "},
            {"content": 123},
            {"role": "assistant", "content": ""},
        ]);

        let turns = normalize_turns(&raw);
        assert_eq!(turns, vec![turn("user", "x"), turn("user", "hi")]);
    }

    #[test]
    fn test_normalize_drops_non_objects_and_non_arrays() {
        let raw = json!(["hello", 42, null, {"role": "user", "content": "kept"}]);
        assert_eq!(normalize_turns(&raw), vec![turn("user", "kept")]);

        assert!(normalize_turns(&json!({"role": "user", "content": "x"})).is_empty());
        assert!(normalize_turns(&json!("just a string")).is_empty());
        assert!(normalize_turns(&json!(null)).is_empty());
    }

    #[test]
    fn test_normalize_preserves_assistant_role() {
        let raw = json!([
            {"role": "assistant", "content": "answer"},
            {"role": "User", "content": "casing is not assistant"},
        ]);

        let turns = normalize_turns(&raw);
        assert_eq!(
            turns,
            vec![turn("assistant", "answer"), turn("user", "casing is not assistant")]
        );
    }

    #[test]
    fn test_normalize_truncates_to_last_twelve() {
        let entries: Vec<Value> = (0..13)
            .map(|i| json!({"role": "user", "content": format!("turn {i}")}))
            .collect();
        let turns = normalize_turns(&Value::Array(entries));

        assert_eq!(turns.len(), 12);
        assert_eq!(turns.first().unwrap().content, "turn 1");
        assert_eq!(turns.last().unwrap().content, "turn 12");
    }

    fn assistant_for(base_url: String, timeout: Duration) -> Assistant {
        Assistant::new(AssistantConfig {
            api_key: Some(SecretString::from("test-key")),
            base_url,
            model: "test-model".to_string(),
            timeout,
        })
    }

    /// Serve exactly one HTTP response on a local listener.
    async fn one_shot_upstream(status_line: &str, body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0_u8; 8192];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_conversation() {
        let assistant = assistant_for("http://127.0.0.1:9".to_string(), Duration::from_secs(1));
        let err = assistant.complete(&json!([])).await.unwrap_err();
        assert!(matches!(err, AssistantError::EmptyConversation));
    }

    #[tokio::test]
    async fn test_complete_without_api_key_is_misconfigured() {
        let assistant = Assistant::new(AssistantConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9".to_string(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(1),
        });

        let err = assistant
            .complete(&json!([{"role": "user", "content": "hello"}]))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Misconfigured));
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice_content() {
        let body = json!({
            "choices": [
                {"message": {"role": "assistant", "content": "Our programs start in September."}},
                {"message": {"role": "assistant", "content": "ignored second choice"}},
            ]
        })
        .to_string();
        let base_url = one_shot_upstream("200 OK", &body).await;

        let assistant = assistant_for(base_url, Duration::from_secs(5));
        let reply = assistant
            .complete(&json!([{"role": "user", "content": "when do programs start?"}]))
            .await
            .unwrap();
        assert_eq!(reply, "Our programs start in September.");
    }

    #[tokio::test]
    async fn test_complete_surfaces_upstream_error_message() {
        let body = r#"{"error":{"message":"rate limited"}}"#;
        let base_url = one_shot_upstream("429 Too Many Requests", body).await;

        let assistant = assistant_for(base_url, Duration::from_secs(5));
        let err = assistant
            .complete(&json!([{"role": "user", "content": "hi"}]))
            .await
            .unwrap_err();

        match err {
            AssistantError::Upstream { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "rate limited");
            }
            other => panic!("expected Upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_generic_message_for_unparseable_error_body() {
        let base_url = one_shot_upstream("500 Internal Server Error", "oops").await;

        let assistant = assistant_for(base_url, Duration::from_secs(5));
        let err = assistant
            .complete(&json!([{"role": "user", "content": "hi"}]))
            .await
            .unwrap_err();

        match err {
            AssistantError::Upstream { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("500"));
            }
            other => panic!("expected Upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_complete_empty_reply_is_an_error() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "  "}}]})
            .to_string();
        let base_url = one_shot_upstream("200 OK", &body).await;

        let assistant = assistant_for(base_url, Duration::from_secs(5));
        let err = assistant
            .complete(&json!([{"role": "user", "content": "hi"}]))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::EmptyReply));
    }

    #[tokio::test]
    async fn test_complete_times_out() {
        // Accept the connection but never respond.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(stream);
            }
        });

        let assistant = assistant_for(format!("http://{addr}"), Duration::from_millis(200));
        let err = assistant
            .complete(&json!([{"role": "user", "content": "hi"}]))
            .await
            .unwrap_err();
        assert!(matches!(err, AssistantError::Timeout));
    }
}
