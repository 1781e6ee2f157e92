use anyhow::Context;
use serde_json::Value;
use std::time::Duration;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF_MS: u64 = 10_000;

/// Outbound HTTP with a per-request timeout and retry/backoff on transient
/// failures (429, 408, 5xx, transport errors).
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    max_attempts: u32,
    base_backoff_ms: u64,
}

impl HttpClient {
    pub fn new(timeout: Duration, max_attempts: u32, base_backoff_ms: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tollgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            max_attempts: max_attempts.max(1),
            base_backoff_ms,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// GET `url` with `query` and decode the body as JSON.
    pub async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> anyhow::Result<Value> {
        let mut backoff_ms = self.base_backoff_ms;
        let mut failures = Vec::new();

        for attempt in 1..=self.max_attempts {
            let outcome = self.client.get(url).query(query).send().await;
            let error = match outcome {
                Ok(response) if response.status().is_success() => {
                    if attempt > 1 {
                        tracing::info!(url, attempt, "HTTP request recovered after retries");
                    }
                    return response
                        .json::<Value>()
                        .await
                        .with_context(|| format!("invalid JSON from {url}"));
                }
                Ok(response) => {
                    let status = response.status();
                    let code = status.as_u16();
                    if status.is_client_error() && code != 429 && code != 408 {
                        anyhow::bail!("request to {url} failed with status {status}");
                    }
                    format!("status {status}")
                }
                Err(e) => e.to_string(),
            };

            failures.push(format!("attempt {attempt}/{}: {error}", self.max_attempts));
            if attempt < self.max_attempts {
                tracing::warn!(
                    url,
                    attempt,
                    max_attempts = self.max_attempts,
                    error = %error,
                    "HTTP request failed, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = backoff_ms.saturating_mul(2).min(MAX_BACKOFF_MS);
            }
        }

        anyhow::bail!(
            "request to {url} failed after {} attempts:\n{}",
            self.max_attempts,
            failures.join("\n")
        )
    }
}
