// SPDX-FileCopyrightText: 2026 Messenger Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Non-streaming HTTP client for the Anthropic Messages API.

use std::time::Duration;

use messenger_core::MessengerError;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::types::{ApiErrorResponse, MessageRequest, MessageResponse};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);
const RETRY_DELAY: Duration = Duration::from_millis(500);

/// One completion attempt, classified for the retry loop.
enum Attempt {
    Done(MessageResponse),
    Retry(MessengerError),
    Fail(MessengerError),
}

/// Authenticated client. A transient status (429, 500, 503, 529) is retried
/// once before the error is returned.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    url: String,
    retries: u32,
}

fn header(name: &str, value: &str) -> Result<HeaderValue, MessengerError> {
    HeaderValue::from_str(value)
        .map_err(|e| MessengerError::Config(format!("invalid {name} header value: {e}")))
}

fn provider_error(
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
) -> MessengerError {
    MessengerError::Provider { message, source }
}

impl AnthropicClient {
    pub fn new(api_key: &str, api_version: &str) -> Result<Self, MessengerError> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", header("x-api-key", api_key)?);
        headers.insert("anthropic-version", header("anthropic-version", api_version)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| {
                provider_error(
                    format!("cannot build Anthropic HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            http,
            url: API_URL.to_string(),
            retries: 1,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_url(mut self, url: String) -> Self {
        self.url = url;
        self
    }

    /// Posts `request` and returns the decoded reply.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, MessengerError> {
        let mut attempt = 0;
        loop {
            match self.attempt(request, attempt).await {
                Attempt::Done(response) => return Ok(response),
                Attempt::Retry(err) if attempt < self.retries => {
                    warn!(attempt, error = %err, "Anthropic returned a transient error, retrying");
                    attempt += 1;
                    tokio::time::sleep(RETRY_DELAY).await;
                }
                Attempt::Retry(err) | Attempt::Fail(err) => return Err(err),
            }
        }
    }

    async fn attempt(&self, request: &MessageRequest, attempt: u32) -> Attempt {
        let response = match self.http.post(&self.url).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                return Attempt::Fail(provider_error(
                    format!("Anthropic request failed: {e}"),
                    Some(Box::new(e)),
                ));
            }
        };

        let status = response.status();
        debug!(%status, attempt, model = %request.model, "Anthropic responded");

        if status.is_success() {
            return match response.json::<MessageResponse>().await {
                Ok(body) => Attempt::Done(body),
                Err(e) => Attempt::Fail(provider_error(
                    format!("cannot decode Anthropic reply: {e}"),
                    Some(Box::new(e)),
                )),
            };
        }

        let body = response.text().await.unwrap_or_default();
        let err = provider_error(describe_error(status, &body), None);
        if is_transient(status) {
            Attempt::Retry(err)
        } else {
            Attempt::Fail(err)
        }
    }
}

/// Prefers the API's typed error body over the raw text.
fn describe_error(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => format!(
            "Anthropic returned {status} ({}): {}",
            parsed.error.type_, parsed.error.message
        ),
        Err(_) => format!("Anthropic returned {status}: {body}"),
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ROUTE: &str = "/v1/messages";

    fn client(server: &MockServer) -> AnthropicClient {
        AnthropicClient::new("sk-clinic", "2023-06-01")
            .unwrap()
            .with_url(format!("{}{ROUTE}", server.uri()))
    }

    fn question() -> MessageRequest {
        MessageRequest {
            model: "claude-haiku".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "Do you take walk-ins?".into(),
            }],
            system: Some("You answer for the clinic front desk.".into()),
            max_tokens: 300,
            temperature: None,
            stream: false,
        }
    }

    fn reply(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "claude-haiku",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 42, "output_tokens": 7}
        }))
    }

    fn api_error(status: u16, kind: &str) -> ResponseTemplate {
        ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": kind, "message": "upstream said no"}
        }))
    }

    #[tokio::test]
    async fn sends_headers_and_decodes_the_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .and(header("x-api-key", "sk-clinic"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(serde_json::json!({
                "system": "You answer for the clinic front desk.",
                "stream": false
            })))
            .respond_with(reply("Yes, until noon."))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server).complete_message(&question()).await.unwrap();
        assert_eq!(response.text(), "Yes, until noon.");
        assert_eq!(response.usage.input_tokens, 42);
    }

    #[tokio::test]
    async fn rate_limit_is_retried_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(api_error(429, "rate_limit_error"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(reply("Second time lucky."))
            .mount(&server)
            .await;

        let response = client(&server).complete_message(&question()).await.unwrap();
        assert_eq!(response.text(), "Second time lucky.");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(api_error(400, "invalid_request_error"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server).complete_message(&question()).await.unwrap_err();
        assert!(matches!(err, MessengerError::Provider { .. }));
        assert!(err.to_string().contains("invalid_request_error"), "got: {err}");
    }

    #[tokio::test]
    async fn persistent_overload_gives_up_after_one_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ROUTE))
            .respond_with(api_error(529, "overloaded_error"))
            .expect(2)
            .mount(&server)
            .await;

        let err = client(&server).complete_message(&question()).await.unwrap_err();
        assert!(err.to_string().contains("overloaded_error"), "got: {err}");
    }

    #[test]
    fn unparseable_error_body_is_quoted() {
        let text = describe_error(StatusCode::BAD_GATEWAY, "<html>gateway</html>");
        assert!(text.contains("502"));
        assert!(text.contains("<html>gateway</html>"));
    }
}
