use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

use super::ModelClient;
use crate::config::GenerationConfig;
use crate::error::{EvalError, EvalResult};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    options: &'a Map<String, Value>,
    stream: bool,
}

/// Non-streaming client for Ollama's `/api/generate`
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> EvalResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EvalError::TransportFailure(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &GenerationConfig) -> EvalResult<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ModelClient for OllamaClient {
    async fn generate(
        &self,
        model: &str,
        prompt: &str,
        options: &Map<String, Value>,
    ) -> EvalResult<Map<String, Value>> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model,
            prompt,
            options,
            stream: false,
        };
        debug!("POST {} model={} prompt={} chars", url, model, prompt.len());

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EvalError::TransportFailure(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EvalError::TransportFailure(format!(
                "HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        response
            .json::<Map<String, Value>>()
            .await
            .map_err(|e| EvalError::TransportFailure(format!("Invalid response body: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_generate_posts_non_streaming_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(mockito::Matcher::PartialJson(json!({
                "model": "deepseek-coder:6.7b",
                "prompt": "hi",
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"response": "<?php echo 1;", "eval_count": 7}"#)
            .create_async()
            .await;

        let client = OllamaClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let body = client
            .generate("deepseek-coder:6.7b", "hi", &Map::new())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(body["response"], "<?php echo 1;");
        assert_eq!(body["eval_count"], 7);
    }

    #[tokio::test]
    async fn test_error_status_is_transport_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(500)
            .with_body("model not loaded")
            .create_async()
            .await;

        let client = OllamaClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.generate("m", "p", &Map::new()).await.unwrap_err();
        match err {
            EvalError::TransportFailure(msg) => assert!(msg.contains("model not loaded")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OllamaClient::new("http://localhost:11434/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }
}
