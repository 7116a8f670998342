use std::time::Duration;

use anyhow::anyhow;
use futures::{future::BoxFuture, FutureExt};
use reqwest::Client;
use tokio::time::sleep;

use crate::{config::ClassifierConfig, domain::Classification};

use super::{
    inference::{build_request, interpret_response, GenerateRequest, GenerateResponse},
    RelevanceClassifier,
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Talks to a local Ollama server. Every failure ends up as an
/// indeterminate classification; nothing is returned as an error.
#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    config: ClassifierConfig,
    topic: String,
}

enum AttemptError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

impl OllamaClient {
    pub fn new(http: Client, config: ClassifierConfig, topic: impl Into<String>) -> Self {
        Self {
            http,
            config,
            topic: topic.into(),
        }
    }

    pub async fn classify(&self, text: &str) -> Classification {
        match self.generate(text).await {
            Ok(raw) => interpret_response(&raw),
            Err(err) => {
                tracing::debug!(target: "classifier", error = %err, "classification failed");
                Classification::indeterminate(format!("{err:#}"))
            }
        }
    }

    /// True when the server behind the generate endpoint answers at all.
    pub async fn probe(&self) -> bool {
        let mut root = self.config.endpoint.clone();
        root.set_path("/");
        root.set_query(None);
        match self.http.get(root).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn generate(&self, text: &str) -> anyhow::Result<String> {
        let request = build_request(self.config.model.clone(), &self.topic, text);
        let mut attempt: u32 = 1;
        loop {
            match self.send_once(&request).await {
                Ok(raw) => return Ok(raw),
                Err(AttemptError::Retryable(err)) if attempt < self.config.max_attempts => {
                    let delay = self.config.retry_backoff * attempt;
                    tracing::warn!(
                        target: "classifier",
                        attempt,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "classifier request failed; retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(AttemptError::Retryable(err) | AttemptError::Fatal(err)) => return Err(err),
            }
        }
    }

    async fn send_once(&self, request: &GenerateRequest) -> Result<String, AttemptError> {
        let response = self
            .http
            .post(self.config.endpoint.clone())
            .timeout(self.config.timeout)
            .json(request)
            .send()
            .await
            .map_err(|err| {
                AttemptError::Retryable(anyhow::Error::new(err).context("classifier unreachable"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = anyhow!("classifier returned status {status}");
            return Err(if status.is_server_error() {
                AttemptError::Retryable(err)
            } else {
                AttemptError::Fatal(err)
            });
        }

        let body: GenerateResponse = response.json().await.map_err(|err| {
            AttemptError::Fatal(anyhow::Error::new(err).context("malformed classifier envelope"))
        })?;
        Ok(body.response)
    }
}

impl RelevanceClassifier for OllamaClient {
    fn classify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Classification> {
        OllamaClient::classify(self, text).boxed()
    }
}
