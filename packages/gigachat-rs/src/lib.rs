// Gigachat completions client: fetch an access token once, then post chat
// completions with it. https://developers.sber.ru/docs/ru/gigachat/api/overview

pub mod models;

use reqwest::{header, Client, StatusCode};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::models::{
    AccessTokenResponse, ChatMessage, CompletionRequest, CompletionResponse,
};

const OAUTH_URL: &str = "https://api.gigachat.com/api/v2/oauth";
const COMPLETIONS_URL: &str = "https://api.gigachat.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gigachat-large";

#[derive(Debug, Error)]
pub enum GigachatError {
    #[error("token request failed with status {0}")]
    TokenRequest(StatusCode),

    #[error("completion request failed with status {0}")]
    CompletionRequest(StatusCode),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Clone)]
pub struct GigachatOptions {
    pub authorization_key: String,
    pub client_id: String,
    pub scope: String,
}

impl GigachatOptions {
    pub fn new(authorization_key: String, client_id: String) -> Self {
        Self {
            authorization_key,
            client_id,
            scope: "GIGACHAT_API_PERS".to_string(),
        }
    }
}

/// Gigachat chat client.
///
/// The access token is fetched lazily on the first call and reused for the
/// lifetime of the client. No expiry handling: a process restart gets a
/// fresh token. Calls are never retried.
pub struct GigachatClient {
    options: GigachatOptions,
    client: Client,
    access_token: Mutex<Option<String>>,
}

impl GigachatClient {
    pub fn new(options: GigachatOptions) -> Self {
        Self {
            options,
            client: Client::new(),
            access_token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, GigachatError> {
        let mut cached = self.access_token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }

        let body = serde_json::json!({
            "client_id": self.options.client_id,
            "scope": self.options.scope,
        });

        let response = self
            .client
            .post(OAUTH_URL)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, &self.options.authorization_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GigachatError::TokenRequest(status));
        }

        let token = response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| GigachatError::MalformedResponse(e.to_string()))?
            .access_token;

        *cached = Some(token.clone());
        Ok(token)
    }

    /// Send a single user prompt and return the assistant's reply text.
    pub async fn send_message(&self, prompt: &str) -> Result<String, GigachatError> {
        let token = self.access_token().await?;

        let request = CompletionRequest {
            model: DEFAULT_MODEL.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(COMPLETIONS_URL)
            .bearer_auth(&token)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GigachatError::CompletionRequest(status));
        }

        let completion = response
            .json::<CompletionResponse>()
            .await
            .map_err(|e| GigachatError::MalformedResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GigachatError::MalformedResponse("no choices in response".into()))
    }
}
