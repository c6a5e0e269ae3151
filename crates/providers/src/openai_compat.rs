//! OpenAI-compatible provider implementation.
//!
//! Works with OpenAI itself and any endpoint exposing the
//! `/v1/chat/completions` shape (OpenRouter, vLLM, Ollama, llama.cpp...).
//!
//! Message parts map onto the multipart content array: text stays text,
//! images become `image_url` entries, and extracted documents are appended
//! to the message text between file markers.

use async_trait::async_trait;
use palaver_core::error::ProviderError;
use palaver_core::message::{ContentPart, Message, Role};
use palaver_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: match m.role() {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                },
                content: Self::to_api_content(m.parts()),
            })
            .collect()
    }

    /// The leading text part absorbs every text and document part; images
    /// follow it in order.
    fn to_api_content(parts: &[ContentPart]) -> Vec<ApiContent> {
        let mut text = String::new();
        let mut images = Vec::new();

        for part in parts {
            match part {
                ContentPart::Text { text: t } => {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(t);
                }
                ContentPart::DocumentExtract { text: t, .. } => {
                    text.push_str("\n<FILECONTENTSTART>:\n");
                    text.push_str(t);
                    text.push_str("\n<FILECONTENTEND>");
                }
                ContentPart::Image { url, .. } => images.push(ApiContent::ImageUrl {
                    image_url: ApiImageUrl { url: url.clone() },
                }),
            }
        }

        let mut content = Vec::with_capacity(images.len() + 1);
        content.push(ApiContent::Text { text });
        content.extend(images);
        content
    }

    fn request_body(request: &ProviderRequest) -> serde_json::Value {
        let params = &request.params;
        let mut body = serde_json::json!({
            "model": params.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": params.temperature,
            "top_p": params.top_p,
            "frequency_penalty": params.frequency_penalty,
            "presence_penalty": params.presence_penalty,
            "stream": false,
        });

        if let Some(max_tokens) = params.max_output_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        body
    }
}

#[async_trait]
impl palaver_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(
            provider = %self.name,
            model = %request.params.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status == 404 {
            return Err(ProviderError::ModelNotFound(request.params.model));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let message = Message::assistant(choice.message.content.unwrap_or_default());

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: Vec<ApiContent>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text { text: String },
    ImageUrl { image_url: ApiImageUrl },
}

#[derive(Debug, Serialize)]
struct ApiImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use palaver_core::Provider;

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("custom", "http://localhost:8000/v1/", "");
        assert_eq!(provider.base_url, "http://localhost:8000/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");

        let json = serde_json::to_value(&api_messages[1]).unwrap();
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][0]["text"], "Hello");
    }

    #[test]
    fn images_become_image_url_entries() {
        let msg = Message::new(
            Role::User,
            vec![
                ContentPart::text("what is this?"),
                ContentPart::image("https://cdn.example.com/cat.png"),
            ],
        );
        let json = serde_json::to_value(&OpenAiCompatProvider::to_api_messages(&[msg])[0]).unwrap();
        let content = json["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "https://cdn.example.com/cat.png");
    }

    #[test]
    fn documents_are_inlined_between_markers() {
        let msg = Message::new(
            Role::User,
            vec![
                ContentPart::text("review this"),
                ContentPart::document(Some("lib.rs".into()), "pub fn f() {}"),
            ],
        );
        let api = OpenAiCompatProvider::to_api_messages(&[msg]);
        let json = serde_json::to_value(&api[0]).unwrap();
        assert_eq!(json["content"].as_array().unwrap().len(), 1);
        assert_eq!(
            json["content"][0]["text"],
            "review this\n<FILECONTENTSTART>:\npub fn f() {}\n<FILECONTENTEND>"
        );
    }

    #[test]
    fn request_body_carries_all_sampling_params() {
        let mut params = GenerationParams::for_model("gpt-4");
        params.temperature = 0.5;
        params.presence_penalty = 1.5;
        params.max_output_tokens = Some(8192);
        let body = OpenAiCompatProvider::request_body(&ProviderRequest {
            params,
            messages: vec![Message::system("")],
        });

        assert_eq!(body["model"], "gpt-4");
        assert_eq!(body["top_p"], 1.0);
        assert_eq!(body["presence_penalty"], 1.5);
        assert_eq!(body["frequency_penalty"], 0.0);
        assert_eq!(body["max_tokens"], 8192);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn request_body_omits_unset_max_tokens() {
        let body = OpenAiCompatProvider::request_body(&ProviderRequest {
            params: GenerationParams::for_model("gpt-4o"),
            messages: vec![],
        });
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "model": "gpt-4o-2024-05-13",
            "choices": [{"message": {"role": "assistant", "content": "Hi!"}}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.model, "gpt-4o-2024-05-13");
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi!"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 11);
    }

    #[test]
    fn parse_response_with_null_content() {
        let data = r#"{"model":"m","choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
        assert!(parsed.usage.is_none());
    }
}
