//! Generation backend abstraction and the gateway every prompt goes through.
//!
//! [`GenerationGateway`] is the only caller of a [`GenerationBackend`]. It owns
//! the default sampling parameters and the retry policy:
//!
//! - up to `max_attempts` calls (default 3),
//! - a fixed pause between attempts (default 1s),
//! - the last failure is returned as [`StudyError::GenerationFailure`].
//!
//! [`HttpCompletionBackend`] talks to a local OpenAI-compatible completion
//! server (for example `llama-server` hosting a GGUF model).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::config::{GenerationConfig, ModelConfig};
use crate::error::StudyError;

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub repeat_penalty: f32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
            top_k: 40,
            top_p: 0.4,
            repeat_penalty: 1.18,
        }
    }
}

impl From<&GenerationConfig> for GenerationOptions {
    fn from(c: &GenerationConfig) -> Self {
        Self {
            max_tokens: c.max_tokens,
            temperature: c.temperature,
            top_k: c.top_k,
            top_p: c.top_p,
            repeat_penalty: c.repeat_penalty,
        }
    }
}

/// The text-generation service. Implementations may fail or block.
pub trait GenerationBackend: Send + Sync {
    /// Returns the model identifier, for logs.
    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl From<&GenerationConfig> for RetryPolicy {
    fn from(c: &GenerationConfig) -> Self {
        Self {
            max_attempts: c.max_attempts.max(1),
            backoff: Duration::from_millis(c.backoff_ms),
        }
    }
}

pub struct GenerationGateway {
    backend: Box<dyn GenerationBackend>,
    defaults: GenerationOptions,
    policy: RetryPolicy,
}

impl GenerationGateway {
    pub fn new(backend: Box<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            defaults: GenerationOptions::default(),
            policy: RetryPolicy::default(),
        }
    }

    pub fn from_config(backend: Box<dyn GenerationBackend>, config: &GenerationConfig) -> Self {
        Self {
            backend,
            defaults: GenerationOptions::from(config),
            policy: RetryPolicy::from(config),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Generate with the default sampling parameters.
    pub fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_with(prompt, &self.defaults)
    }

    pub fn generate_with(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 1..=attempts {
            if attempt > 1 && !self.policy.backoff.is_zero() {
                std::thread::sleep(self.policy.backoff);
            }

            match self.backend.generate(prompt, options) {
                Ok(text) => {
                    tracing::debug!(
                        model = self.backend.model_name(),
                        attempt,
                        chars = text.len(),
                        "generation succeeded"
                    );
                    return Ok(text);
                }
                Err(e) => {
                    tracing::warn!(
                        model = self.backend.model_name(),
                        attempt,
                        max_attempts = attempts,
                        "generation attempt failed: {:#}",
                        e
                    );
                    last_err = Some(e);
                }
            }
        }

        let source = last_err.unwrap_or_else(|| anyhow!("generation failed"));
        Err(StudyError::GenerationFailure { attempts, source }.into())
    }
}

// ============ HTTP completion backend ============

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(flatten)]
    options: &'a GenerationOptions,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

/// Backend for a local server exposing `POST /v1/completions`.
pub struct HttpCompletionBackend {
    client: reqwest::blocking::Client,
    url: String,
    model: String,
}

impl HttpCompletionBackend {
    /// Builds the backend after checking the model file exists.
    ///
    /// A missing model file is reported as [`StudyError::ModelUnavailable`].
    pub fn new(config: &ModelConfig) -> Result<Self> {
        ensure_model_file(&config.model_path())?;

        let mut builder = reqwest::blocking::Client::builder();
        builder = if config.timeout_secs > 0 {
            builder.timeout(Duration::from_secs(config.timeout_secs))
        } else {
            builder.timeout(None)
        };
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: completions_url(&config.endpoint),
            model: config.file.clone(),
        })
    }
}

impl GenerationBackend for HttpCompletionBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let body = CompletionRequest {
            model: &self.model,
            prompt,
            options,
            stream: false,
        };

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .with_context(|| format!("Request to {} failed", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            anyhow::bail!("Completion server error ({}): {}", status, text);
        }

        let parsed: CompletionResponse =
            resp.json().context("Invalid completion response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_string())
            .ok_or_else(|| anyhow!("Completion response had no choices"))
    }
}

pub fn ensure_model_file(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(StudyError::ModelUnavailable(path.display().to_string()).into());
    }
    Ok(())
}

fn completions_url(endpoint: &str) -> String {
    format!("{}/v1/completions", endpoint.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FlakyBackend {
        calls: Arc<AtomicUsize>,
        fail_first: usize,
    }

    impl GenerationBackend for FlakyBackend {
        fn model_name(&self) -> &str {
            "flaky"
        }

        fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                anyhow::bail!("backend down");
            }
            Ok(format!("echo: {}", prompt))
        }
    }

    fn gateway(fail_first: usize) -> (GenerationGateway, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let backend = FlakyBackend {
            calls: calls.clone(),
            fail_first,
        };
        let gw = GenerationGateway::new(Box::new(backend)).with_policy(RetryPolicy {
            max_attempts: 3,
            backoff: Duration::ZERO,
        });
        (gw, calls)
    }

    #[test]
    fn first_success_calls_once() {
        let (gw, calls) = gateway(0);
        assert_eq!(gw.generate("hi").unwrap(), "echo: hi");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn recovers_within_attempts() {
        let (gw, calls) = gateway(2);
        assert_eq!(gw.generate("hi").unwrap(), "echo: hi");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn persistent_failure_tries_three_times_and_surfaces_last_error() {
        let (gw, calls) = gateway(usize::MAX);
        let err = gw.generate("hi").unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            classify(&err),
            Some(StudyError::GenerationFailure { attempts: 3, .. })
        ));
        assert!(err.chain().any(|e| e.to_string() == "backend down"));
    }

    #[test]
    fn defaults_match_documented_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff, Duration::from_secs(1));

        let opts = GenerationOptions::default();
        assert_eq!(opts.max_tokens, 2048);
        assert_eq!(opts.top_k, 40);
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert!((opts.top_p - 0.4).abs() < f32::EPSILON);
        assert!((opts.repeat_penalty - 1.18).abs() < f32::EPSILON);
    }

    #[test]
    fn request_body_flattens_sampling_options() {
        let opts = GenerationOptions::default();
        let body = CompletionRequest {
            model: "m.gguf",
            prompt: "p",
            options: &opts,
            stream: false,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["model"], "m.gguf");
        assert_eq!(v["max_tokens"], 2048);
        assert_eq!(v["top_k"], 40);
        assert_eq!(v["stream"], false);
    }

    #[test]
    fn missing_model_file_is_model_unavailable() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ensure_model_file(&dir.path().join("absent.gguf")).unwrap_err();
        assert!(matches!(classify(&err), Some(StudyError::ModelUnavailable(_))));
    }

    #[test]
    fn completions_url_strips_trailing_slash() {
        assert_eq!(
            completions_url("http://127.0.0.1:8080/"),
            "http://127.0.0.1:8080/v1/completions"
        );
    }
}
