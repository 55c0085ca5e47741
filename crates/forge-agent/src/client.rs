//! Text-generation backend.
//!
//! [`GenerationClient`] is the seam the pipeline and refiners talk to;
//! [`OpenAiClient`] speaks the chat-completions protocol over blocking HTTP.

use std::time::Duration;

use forge_core::config::GenerationSettings;
use forge_fastapi::PromptRequest;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// The system/user pair sent for an assembled prompt.
    pub fn for_request(request: &PromptRequest) -> [Message; 2] {
        [
            Message::system(request.system.as_str()),
            Message::user(request.user.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&GenerationSettings> for GenerationOptions {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

/// Blocking request/response text generation. No retries.
pub trait GenerationClient {
    fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, ClientError>;
}

/// Client for OpenAI-compatible `chat/completions` endpoints.
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(settings: &GenerationSettings) -> Result<Self, ClientError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(ClientError::MissingApiKey)?;

        let http = Client::builder()
            .timeout(settings.timeout_secs.map(Duration::from_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

impl GenerationClient for OpenAiClient {
    fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<String, ClientError> {
        let body = ChatRequest {
            model: &options.model,
            messages,
            max_tokens: options.max_tokens,
            temperature: options.temperature,
        };
        log::debug!(
            "POST {} model={} messages={}",
            self.endpoint,
            options.model,
            messages.len()
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = response.json()?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(ClientError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;

    /// Serve `app` on an ephemeral port from a background runtime.
    fn serve(app: Router) -> SocketAddr {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
                tx.send(listener.local_addr().unwrap()).unwrap();
                axum::serve(listener, app).await.unwrap();
            });
        });
        rx.recv().unwrap()
    }

    fn settings(addr: SocketAddr) -> GenerationSettings {
        GenerationSettings {
            api_key: Some("sk-test".to_string()),
            base_url: format!("http://{addr}/v1/"),
            timeout_secs: Some(10),
            ..GenerationSettings::default()
        }
    }

    #[test]
    fn test_complete_posts_chat_request() {
        let seen: Arc<Mutex<Option<(String, Value)>>> = Arc::default();
        let captured = seen.clone();
        let app = Router::new().route(
            "/v1/chat/completions",
            post(move |headers: HeaderMap, Json(body): Json<Value>| {
                let captured = captured.clone();
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *captured.lock().unwrap() = Some((auth, body));
                    Json(json!({
                        "choices": [{ "message": { "role": "assistant", "content": "print('ok')" } }]
                    }))
                }
            }),
        );
        let addr = serve(app);

        let client = OpenAiClient::new(&settings(addr)).unwrap();
        let options = GenerationOptions::from(&GenerationSettings::default());
        let messages = [Message::system("sys"), Message::user("write it")];
        let content = client.complete(&messages, &options).unwrap();
        assert_eq!(content, "print('ok')");

        let (auth, body) = seen.lock().unwrap().take().unwrap();
        assert_eq!(auth, "Bearer sk-test");
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "write it");
    }

    #[test]
    fn test_error_status_is_reported() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let addr = serve(app);

        let client = OpenAiClient::new(&settings(addr)).unwrap();
        let options = GenerationOptions::from(&GenerationSettings::default());
        let err = client
            .complete(&[Message::user("hi")], &options)
            .unwrap_err();
        match err {
            ClientError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_content_is_empty_response() {
        let app = Router::new().route(
            "/v1/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        );
        let addr = serve(app);

        let client = OpenAiClient::new(&settings(addr)).unwrap();
        let options = GenerationOptions::from(&GenerationSettings::default());
        let err = client
            .complete(&[Message::user("hi")], &options)
            .unwrap_err();
        assert!(matches!(err, ClientError::EmptyResponse));
    }

    #[test]
    fn test_api_key_is_required() {
        let err = OpenAiClient::new(&GenerationSettings::default()).err().unwrap();
        assert!(matches!(err, ClientError::MissingApiKey));
    }

    #[test]
    fn test_request_becomes_system_user_pair() {
        let request = PromptRequest {
            system: "sys".to_string(),
            user: "usr".to_string(),
        };
        let [system, user] = Message::for_request(&request);
        assert_eq!(system.role, Role::System);
        assert_eq!(user, Message::user("usr"));
    }
}
