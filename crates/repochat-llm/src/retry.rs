use std::future::Future;
use std::time::Duration;

use crate::error::LlmError;

/// How many times a provider request is attempted and how long to wait between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
        }
    }
}

fn backoff(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

/// Parse the `Retry-After` header value as seconds, falling back to exponential backoff.
pub(crate) fn retry_delay(response: &reqwest::Response, attempt: u32, base: Duration) -> Duration {
    if let Some(val) = response.headers().get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.parse::<u64>()
    {
        return Duration::from_secs(secs);
    }
    backoff(base, attempt)
}

/// Send an HTTP request, retrying on throttling, server errors, timeouts and
/// connection failures until `policy.max_attempts` is reached.
///
/// `f` must build and send a fresh request on every call. Non-transient
/// responses (including 4xx) are returned untouched for the caller to inspect.
///
/// # Errors
///
/// Returns `LlmError::RetriesExhausted` once every attempt failed transiently,
/// or `LlmError::Http` for non-transient transport failures.
pub(crate) async fn send_with_retry<F, Fut>(
    provider_name: &'static str,
    policy: RetryPolicy,
    mut f: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_failure = String::new();

    for attempt in 0..attempts {
        let is_last = attempt + 1 == attempts;
        let delay = match f().await {
            Ok(response) => {
                let status = response.status();
                if status != reqwest::StatusCode::TOO_MANY_REQUESTS && !status.is_server_error() {
                    return Ok(response);
                }
                last_failure = format!("status {status}");
                retry_delay(&response, attempt, policy.base_backoff)
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                last_failure = e.to_string();
                backoff(policy.base_backoff, attempt)
            }
            Err(e) => return Err(LlmError::Http(e)),
        };

        if is_last {
            break;
        }
        tracing::warn!(
            provider = provider_name,
            attempt = attempt + 1,
            max_attempts = attempts,
            "{last_failure}, retrying in {}ms",
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }

    Err(LlmError::RetriesExhausted {
        provider: provider_name,
        attempts,
        message: last_failure,
    })
}

/// Turn a non-success response into a typed error, keeping the upstream message.
///
/// # Errors
///
/// Returns `Unauthorized` for 401/403 and `Upstream` for every other non-2xx status.
pub(crate) async fn ensure_success(
    provider_name: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = upstream_message(&body);
    tracing::error!("{provider_name} API error {status}: {body}");
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(LlmError::Unauthorized {
            provider: provider_name,
            message,
        });
    }
    Err(LlmError::Upstream {
        provider: provider_name,
        status: status.as_u16(),
        message,
    })
}

/// Extract `error.message` from an OpenAI-style error body, or fall back to the raw text.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| body.trim().to_owned())
}
