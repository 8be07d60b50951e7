use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::models::*;
use crate::config::ProviderConfig;
use crate::providers::limits::max_tokens_for_model;
use crate::providers::persona::{build_prompt_messages, HISTORY_WINDOW};
use crate::providers::traits::CompletionProvider;
use crate::providers::types::{CompletionRequest, ProviderError};

pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub const API_KEY_MISSING_REPLY: &str =
    "죄송합니다. API 키가 설정되지 않아 응답을 생성할 수 없습니다.";
pub const MALFORMED_RESPONSE_REPLY: &str =
    "응답 형식 오류: 서버에서 올바른 응답을 받지 못했습니다.";
pub const UNRECOGNIZED_RESPONSE_REPLY: &str =
    "응답을 처리할 수 없습니다. 다른 모델을 시도해보세요.";

/// OpenAI-compatible chat completions through the Requesty router.
pub struct RequestyProvider {
    client: Client,
    config: ProviderConfig,
    history_window: usize,
}

impl RequestyProvider {
    pub fn new(config: ProviderConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    pub fn with_client(config: ProviderConfig, client: Client) -> Self {
        Self {
            client,
            config,
            history_window: HISTORY_WINDOW,
        }
    }

    pub fn with_history_window(mut self, history_window: usize) -> Self {
        self.history_window = history_window;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    pub(crate) fn build_request(&self, request: &CompletionRequest) -> RequestyRequest {
        let model = request
            .model
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.config.default_model.clone());

        let messages = build_prompt_messages(
            request.contact.as_ref(),
            &request.history,
            self.history_window,
        )
        .into_iter()
        .map(|m| RequestyMessage {
            role: m.role.as_str().to_string(),
            content: m.content,
        })
        .collect();

        let settings = request
            .contact
            .as_ref()
            .and_then(|c| c.persona.advanced_settings);

        RequestyRequest {
            max_tokens: max_tokens_for_model(&model),
            model,
            messages,
            temperature: settings.map(|s| s.temperature).unwrap_or(DEFAULT_TEMPERATURE),
            top_p: settings.and_then(|s| s.top_p),
            top_k: settings.and_then(|s| s.top_k),
        }
    }

    fn error_for_status(status: StatusCode, body: &str) -> ProviderError {
        if let Ok(parsed) = serde_json::from_str::<RequestyErrorResponse>(body) {
            tracing::error!("Provider error detail: {}", parsed.error.message);
        } else if let Ok(parsed) = serde_json::from_str::<Value>(body) {
            tracing::error!("Provider error body: {}", parsed);
        }

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return ProviderError::AuthError {
                status: status.as_u16(),
            };
        }

        ProviderError::RequestFailed {
            status: status.as_u16(),
            body: body.to_string(),
        }
    }
}

/// Extract reply text from a 2xx body, tolerating the shapes different
/// upstream models produce. Never fails: unusable shapes map to sentinel text.
pub fn parse_completion(body: &Value) -> String {
    let first_choice = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .filter(|choice| !choice.is_null());

    let Some(choice) = first_choice else {
        tracing::error!("Completion response has no choices: {}", body);
        return MALFORMED_RESPONSE_REPLY.to_string();
    };

    match choice.get("message") {
        Some(Value::Object(message)) => match message.get("content") {
            Some(Value::String(content)) if !content.is_empty() => content.clone(),
            // Some models put the reply elsewhere in the message object.
            None => Value::Object(message.clone()).to_string(),
            _ => {
                tracing::error!("Unrecognized message content: {}", body);
                UNRECOGNIZED_RESPONSE_REPLY.to_string()
            }
        },
        _ => {
            tracing::error!("Unrecognized completion response: {}", body);
            UNRECOGNIZED_RESPONSE_REPLY.to_string()
        }
    }
}

#[async_trait]
impl CompletionProvider for RequestyProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        if !self.config.has_api_key() {
            tracing::warn!("No API key configured, skipping completion request");
            return Ok(API_KEY_MISSING_REPLY.to_string());
        }

        let body = self.build_request(&request);
        let url = self.endpoint();

        tracing::debug!(
            model = %body.model,
            messages = body.messages.len(),
            max_tokens = body.max_tokens,
            contact = request.contact.as_ref().map(|c| c.name.as_str()).unwrap_or("-"),
            "Sending completion request to {}",
            url
        );
        if self.config.debug_mode {
            if let Ok(json) = serde_json::to_string_pretty(&body) {
                tracing::debug!("Completion request body: {}", json);
            }
        }

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.trim()),
            )
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if !status.is_success() {
            tracing::error!("Completion request failed: {}", status);
            return Err(Self::error_for_status(status, &text));
        }

        if self.config.debug_mode {
            tracing::debug!("Completion response body: {}", text);
        }

        let data: Value = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        Ok(parse_completion(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdvancedSettings, Contact, Persona, PromptMessage, PromptRole, SystemPrompt};
    use chrono::Utc;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn config(base_url: &str, api_key: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.to_string(),
            base_url: base_url.to_string(),
            ..ProviderConfig::default()
        }
    }

    fn provider(base_url: &str, api_key: &str) -> RequestyProvider {
        let client = Client::builder().no_proxy().build().unwrap();
        RequestyProvider::with_client(config(base_url, api_key), client)
    }

    fn contact(settings: Option<AdvancedSettings>) -> Contact {
        Contact {
            id: "c1".to_string(),
            name: "Alex".to_string(),
            model_id: "openai/gpt-4.1".to_string(),
            avatar: None,
            background_image: None,
            persona: Persona {
                description: "friend".to_string(),
                system_prompt: SystemPrompt::text("Be helpful"),
                advanced_settings: settings,
            },
            last_active: Utc::now(),
            is_online: true,
            unread_count: 0,
        }
    }

    fn request(model: Option<&str>, contact: Option<Contact>) -> CompletionRequest {
        CompletionRequest {
            model: model.map(str::to_string),
            contact,
            history: vec![PromptMessage {
                role: PromptRole::User,
                content: "hi".to_string(),
            }],
        }
    }

    /// Serve one canned HTTP response; the handle yields the raw request.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut data = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&buf[..n]);
                if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                    let headers = String::from_utf8_lossy(&data[..pos]).to_lowercase();
                    let content_length = headers
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if data.len() >= pos + 4 + content_length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&data).to_string()
        });

        (format!("http://{}/v1", addr), handle)
    }

    #[test]
    fn test_request_defaults() {
        let p = provider("http://localhost/v1", "sk-test");
        let body = p.build_request(&request(None, None));

        assert_eq!(body.model, crate::config::DEFAULT_MODEL);
        assert_eq!(body.max_tokens, 4096);
        assert_eq!(body.temperature, DEFAULT_TEMPERATURE);
        assert!(body.top_p.is_none());
        assert!(body.top_k.is_none());
        assert_eq!(body.messages.last().unwrap().content, "hi");

        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("top_p").is_none());
        assert!(json.get("top_k").is_none());
    }

    #[test]
    fn test_request_uses_persona_settings() {
        let p = provider("http://localhost/v1", "sk-test");
        let settings = AdvancedSettings {
            temperature: 0.95,
            top_k: Some(40),
            top_p: Some(0.98),
        };
        let body = p.build_request(&request(Some("xai/grok-3-mini-beta"), Some(contact(Some(settings)))));

        assert_eq!(body.model, "xai/grok-3-mini-beta");
        assert_eq!(body.max_tokens, 8192);
        assert_eq!(body.temperature, 0.95);
        assert_eq!(body.top_p, Some(0.98));
        assert_eq!(body.top_k, Some(40));
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[0].content, "당신은 Alex 입니다. Be helpful");
    }

    #[test]
    fn test_history_window_override() {
        let p = provider("http://localhost/v1", "sk-test").with_history_window(1);
        let mut req = request(None, None);
        req.history.insert(
            0,
            PromptMessage {
                role: PromptRole::Assistant,
                content: "older".to_string(),
            },
        );
        let body = p.build_request(&req);
        assert!(body.messages.iter().all(|m| m.content != "older"));
    }

    #[test]
    fn test_parse_content() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "Hello!"}}]});
        assert_eq!(parse_completion(&body), "Hello!");
    }

    #[test]
    fn test_parse_message_without_content_is_stringified() {
        let body = json!({"choices": [{"message": {}}]});
        assert_eq!(parse_completion(&body), "{}");

        let body = json!({"choices": [{"message": {"role": "assistant", "reasoning": "x"}}]});
        let reply = parse_completion(&body);
        let round: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(round["reasoning"], "x");
    }

    #[test]
    fn test_parse_missing_choices() {
        assert_eq!(parse_completion(&json!({})), MALFORMED_RESPONSE_REPLY);
        assert_eq!(parse_completion(&json!({"choices": []})), MALFORMED_RESPONSE_REPLY);
        assert_eq!(parse_completion(&json!({"choices": [null]})), MALFORMED_RESPONSE_REPLY);
    }

    #[test]
    fn test_parse_unrecognized_shapes() {
        assert_eq!(
            parse_completion(&json!({"choices": [{"message": "text"}]})),
            UNRECOGNIZED_RESPONSE_REPLY
        );
        assert_eq!(
            parse_completion(&json!({"choices": [{"message": {"content": ""}}]})),
            UNRECOGNIZED_RESPONSE_REPLY
        );
        assert_eq!(
            parse_completion(&json!({"choices": [{"text": "legacy"}]})),
            UNRECOGNIZED_RESPONSE_REPLY
        );
    }

    #[test]
    fn test_error_for_status() {
        let err = RequestyProvider::error_for_status(StatusCode::FORBIDDEN, "nope");
        assert!(matches!(err, ProviderError::AuthError { status: 403 }));
        assert!(err.to_string().contains("403"));

        let err = RequestyProvider::error_for_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":{"message":"boom"}}"#,
        );
        match err {
            ProviderError::RequestFailed { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("boom"));
            }
            other => panic!("Expected RequestFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_key_returns_sentinel_without_request() {
        // Nothing listens on port 9; a network attempt would fail.
        let p = provider("http://127.0.0.1:9/v1", "  ");
        let reply = p.complete(request(None, None)).await.unwrap();
        assert_eq!(reply, API_KEY_MISSING_REPLY);
    }

    #[tokio::test]
    async fn test_complete_success_over_http() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"안녕하세요"}}]}"#,
        )
        .await;
        let p = provider(&base_url, "  sk-trimmed-key  ");

        let reply = p.complete(request(None, Some(contact(None)))).await.unwrap();
        assert_eq!(reply, "안녕하세요");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /v1/chat/completions"));
        assert!(raw.to_lowercase().contains("authorization: bearer sk-trimmed-key\r\n"));
        assert!(raw.contains("\"max_tokens\":4096"));
    }

    #[tokio::test]
    async fn test_complete_unauthorized_over_http() {
        let (base_url, server) =
            serve_once("401 Unauthorized", r#"{"error":{"message":"bad key"}}"#).await;
        let p = provider(&base_url, "sk-bad");

        let err = p.complete(request(None, None)).await.unwrap_err();
        assert!(matches!(err, ProviderError::AuthError { status: 401 }));
        assert!(err.to_string().contains("401"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_complete_non_json_body_is_invalid_response() {
        let (base_url, server) = serve_once("200 OK", "not json").await;
        let p = provider(&base_url, "sk-test");

        let err = p.complete(request(None, None)).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
        server.await.unwrap();
    }
}
