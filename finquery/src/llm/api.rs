use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse,
    },
    Client,
};

use crate::config::OpenAiConfig;
use crate::error::{FinqueryError, Result};

/// Knobs the caller can set per request.
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A chat completion with the usage numbers needed for cost accounting.
#[derive(Debug, Clone)]
pub struct Completion {
    pub content: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

#[derive(Clone)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    model: String,
    max_attempts: u32,
}

impl LlmApiClient {
    pub fn new(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| FinqueryError::Config("OPENAI_API_KEY is not set".to_string()))?;

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url.clone());
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| {
                FinqueryError::Llm(format!("Failed to create LLM HTTP client: {error}"))
            })?;

        // Cap async-openai's internal backoff at our timeout; its default
        // max_elapsed_time retries 500s for up to 15 minutes, independent
        // of the retry loop in complete().
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            model: config.model.clone(),
            max_attempts: config.max_attempts.max(1),
        })
    }

    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<Completion> {
        if prompt.trim().is_empty() {
            return Err(FinqueryError::Validation(
                "Prompt cannot be empty".to_string(),
            ));
        }

        let mut last_error: Option<FinqueryError> = None;

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay_ms = 100 * 2_u64.pow(attempt - 2);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let request = self.build_request(prompt, system_prompt, options)?;

            match self.client.chat().create(request).await {
                Ok(response) => return Self::extract_completion(response),
                Err(error) => {
                    if let Some(rate_limit_error) = Self::rate_limit_error(&error) {
                        return Err(rate_limit_error);
                    }
                    if let Some(auth_error) = Self::auth_error(&error) {
                        return Err(auth_error);
                    }

                    let retryable = Self::is_retryable(&error);
                    let mapped_error = Self::map_openai_error(error);

                    if retryable && attempt < self.max_attempts {
                        last_error = Some(mapped_error);
                        continue;
                    }

                    return Err(mapped_error);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| FinqueryError::Llm("Completion failed after retries".to_string())))
    }

    fn build_request(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<CreateChatCompletionRequest> {
        let mut messages = Vec::new();

        if let Some(system_prompt) = system_prompt.filter(|value| !value.trim().is_empty()) {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|error| {
                        FinqueryError::Validation(format!("Invalid system prompt: {error}"))
                    })?
                    .into(),
            );
        }

        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|error| {
                    FinqueryError::Validation(format!("Invalid user prompt: {error}"))
                })?
                .into(),
        );

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(self.model.clone()).messages(messages);

        if let Some(options) = options {
            if let Some(temperature) = options.temperature {
                request.temperature(temperature);
            }
            if let Some(max_tokens) = options.max_tokens {
                request.max_tokens(max_tokens);
            }
        }

        request
            .build()
            .map_err(|error| FinqueryError::Validation(format!("Invalid LLM request: {error}")))
    }

    fn extract_completion(response: CreateChatCompletionResponse) -> Result<Completion> {
        let usage = response.usage.as_ref();
        let prompt_tokens = usage.map(|u| u.prompt_tokens).unwrap_or_default();
        let completion_tokens = usage.map(|u| u.completion_tokens).unwrap_or_default();

        let content = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| FinqueryError::Llm("LLM response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(FinqueryError::Llm(
                "LLM response contained empty content".to_string(),
            ));
        }

        Ok(Completion {
            content,
            prompt_tokens,
            completion_tokens,
        })
    }

    fn is_retryable(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::ApiError(api_error) => {
                api_error.r#type.is_none() && api_error.code.is_none()
            }
            OpenAIError::Reqwest(reqwest_error) => reqwest_error
                .status()
                .map(|status| status.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }

    fn rate_limit_error(error: &OpenAIError) -> Option<FinqueryError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS) =>
            {
                Some(FinqueryError::ApiRateLimit { retry_after: None })
            }
            OpenAIError::ApiError(api_error) if Self::is_rate_limit_api_error(api_error) => {
                Some(FinqueryError::ApiRateLimit { retry_after: None })
            }
            _ => None,
        }
    }

    fn auth_error(error: &OpenAIError) -> Option<FinqueryError> {
        match error {
            OpenAIError::Reqwest(reqwest_error)
                if reqwest_error.status() == Some(reqwest::StatusCode::UNAUTHORIZED)
                    || reqwest_error.status() == Some(reqwest::StatusCode::FORBIDDEN) =>
            {
                Some(FinqueryError::ApiAuth(format!(
                    "LLM authentication failed: {reqwest_error}"
                )))
            }
            OpenAIError::ApiError(api_error) if Self::is_auth_api_error(api_error) => Some(
                FinqueryError::ApiAuth(format!("LLM authentication failed: {api_error}")),
            ),
            _ => None,
        }
    }

    fn is_rate_limit_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("rate limit")
            || message.contains("too many requests")
            || error_type.contains("rate_limit")
            || code.contains("rate_limit")
            || code == "insufficient_quota"
    }

    fn is_auth_api_error(api_error: &ApiError) -> bool {
        let message = api_error.message.to_lowercase();
        let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
        let code = api_error.code.clone().unwrap_or_default().to_lowercase();

        message.contains("unauthorized")
            || message.contains("forbidden")
            || message.contains("authentication")
            || message.contains("invalid api key")
            || code.contains("invalid_api_key")
            || code.contains("authentication")
            || error_type.contains("authentication")
    }

    fn map_openai_error(error: OpenAIError) -> FinqueryError {
        match error {
            OpenAIError::Reqwest(reqwest_error) => {
                FinqueryError::Llm(format!("LLM request failed: {reqwest_error}"))
            }
            OpenAIError::ApiError(api_error) => {
                FinqueryError::Llm(format!("LLM API error: {api_error}"))
            }
            OpenAIError::JSONDeserialize(err) => {
                FinqueryError::Llm(format!("Failed to parse LLM response: {err}"))
            }
            OpenAIError::InvalidArgument(message) => FinqueryError::Validation(message),
            other => FinqueryError::Llm(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OpenAiConfig {
        OpenAiConfig {
            api_key: Some("test-key".to_string()),
            model: "gpt-4-turbo-preview".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            base_url: Some("http://localhost:9".to_string()),
            timeout_secs: 5,
            max_attempts: 1,
        }
    }

    #[test]
    fn test_new_requires_api_key() {
        let mut config = test_config();
        config.api_key = None;
        let result = LlmApiClient::new(&config);
        assert!(matches!(result, Err(FinqueryError::Config(_))));
    }

    #[test]
    fn test_build_request_includes_system_and_options() {
        let client = LlmApiClient::new(&test_config()).unwrap();
        let options = CompletionOptions {
            temperature: Some(0.3),
            max_tokens: Some(256),
        };
        let request = client
            .build_request("What was revenue?", Some("You are an analyst."), Some(&options))
            .unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.temperature, Some(0.3));
    }

    #[test]
    fn test_build_request_skips_blank_system_prompt() {
        let client = LlmApiClient::new(&test_config()).unwrap();
        let request = client.build_request("question", Some("   "), None).unwrap();
        assert_eq!(request.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_rejects_empty_prompt() {
        let client = LlmApiClient::new(&test_config()).unwrap();
        let result = client.complete("   ", None, None).await;
        assert!(matches!(result, Err(FinqueryError::Validation(_))));
    }
}
