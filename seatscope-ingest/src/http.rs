// Copyright 2024-2025 Aprio One AB, Sweden
// Author: Kenneth Pernyer, kenneth@aprio.one
// SPDX-License-Identifier: MIT
// See LICENSE file in the project root for full license information.

//! HTTP Client Core: a shared `reqwest` client with retry, exponential
//! backoff, and `nextLink`-style pagination, used by both the directory and
//! commerce clients.

use rand::Rng;
use reqwest::{Client, Response, StatusCode};
use seatscope_core::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

/// Hardcoded backoff ceilings for the first few retries; further attempts
/// fall back to `1000 * 5^attempt` milliseconds, capped at five minutes.
const RETRY_DELAYS_MS: [u64; 3] = [1_000, 5_000, 25_000];

fn backoff_ceiling_ms(attempt: usize) -> u64 {
    if attempt < RETRY_DELAYS_MS.len() {
        RETRY_DELAYS_MS[attempt]
    } else {
        1_000u64.saturating_mul(5u64.saturating_pow(attempt as u32)).min(300_000)
    }
}

/// Full-jitter backoff: a random delay in `[0, ceiling]`, so concurrent
/// retries after a shared failure don't all wake up at once.
fn backoff_delay(attempt: usize) -> Duration {
    let ceiling_ms = backoff_ceiling_ms(attempt);
    let delay_ms = rand::thread_rng().gen_range(0..=ceiling_ms);
    Duration::from_millis(delay_ms)
}

/// Thin wrapper over a `reqwest::Client` implementing the retry policy
/// shared by every external-API call in this crate: retry on transient
/// network failure and 5xx, honor `Retry-After` on 429, never retry other
/// 4xx.
#[derive(Clone)]
pub struct HttpClientCore {
    client: Client,
    max_attempts: usize,
}

impl HttpClientCore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client, max_attempts: 4 }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    #[must_use]
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Sends `build_request` (called once per attempt since a
    /// `reqwest::RequestBuilder` cannot be cloned after being consumed) up
    /// to `max_attempts` times, retrying on transient failures.
    pub async fn send_with_retry<F>(&self, mut build_request: F) -> Result<Response>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = backoff_delay(attempt - 1);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying http request");
                tokio::time::sleep(delay).await;
            }

            let outcome = build_request().send().await;
            attempt += 1;

            match outcome {
                Ok(response) => match classify(&response) {
                    Classification::Success => return Ok(response),
                    Classification::RateLimited => {
                        let retry_after = retry_after_duration(&response);
                        if attempt >= self.max_attempts {
                            return Err(Error::RateLimited { retry_after });
                        }
                        if let Some(wait) = retry_after {
                            tokio::time::sleep(wait).await;
                        }
                        warn!(attempt, "rate limited, retrying");
                        continue;
                    }
                    Classification::Unauthorized => return Err(Error::Unauthorized),
                    Classification::RetryableServerError(status) => {
                        if attempt >= self.max_attempts {
                            return Err(Error::Transient(format!("server error {status} after {attempt} attempts")));
                        }
                        warn!(attempt, %status, "transient server error, retrying");
                        continue;
                    }
                    Classification::ClientError(status) => {
                        let body = response.text().await.unwrap_or_default();
                        return Err(Error::BadRequest(format!("{status}: {}", seatscope_core::redact::redact_body(&body))));
                    }
                },
                Err(err) => {
                    if attempt >= self.max_attempts {
                        return Err(Error::Transient(err.to_string()));
                    }
                    warn!(attempt, error = %err, "transient network error, retrying");
                }
            }
        }
    }

    /// Sends the request and deserializes a successful JSON body.
    pub async fn send_json<T, F>(&self, build_request: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(build_request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::BadData(format!("response body did not match expected shape: {e}")))
    }
}

enum Classification {
    Success,
    RateLimited,
    Unauthorized,
    RetryableServerError(StatusCode),
    ClientError(StatusCode),
}

fn classify(response: &Response) -> Classification {
    let status = response.status();
    if status.is_success() {
        Classification::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Classification::RateLimited
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        Classification::Unauthorized
    } else if status.is_server_error() {
        Classification::RetryableServerError(status)
    } else {
        Classification::ClientError(status)
    }
}

fn retry_after_duration(response: &Response) -> Option<Duration> {
    let raw = response.headers().get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    parse_retry_after(raw)
}

/// Parses a `Retry-After` header value in either of the two forms RFC 7231
/// allows: a delay in seconds, or an HTTP-date to wait until.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let target = chrono::DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&chrono::Utc);
    let remaining = (target - chrono::Utc::now()).num_seconds().max(0);
    Some(Duration::from_secs(remaining as u64))
}

/// A page of items plus an optional opaque cursor for the next page,
/// modeling the directory API's `nextLink` convention.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_ceiling_matches_the_hardcoded_schedule_for_early_attempts() {
        assert_eq!(backoff_ceiling_ms(0), 1_000);
        assert_eq!(backoff_ceiling_ms(1), 5_000);
        assert_eq!(backoff_ceiling_ms(2), 25_000);
    }

    #[test]
    fn backoff_ceiling_falls_back_to_exponential_formula_and_caps() {
        assert_eq!(backoff_ceiling_ms(3), 1_000 * 5u64.pow(3));
        assert_eq!(backoff_ceiling_ms(20), 300_000);
    }

    #[test]
    fn backoff_delay_never_exceeds_its_ceiling() {
        for attempt in 0..6 {
            let ceiling = backoff_ceiling_ms(attempt);
            for _ in 0..50 {
                assert!(backoff_delay(attempt).as_millis() as u64 <= ceiling);
            }
        }
    }

    #[test]
    fn retry_after_parses_a_plain_seconds_value() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
    }

    #[test]
    fn retry_after_parses_an_http_date_value() {
        let target = chrono::Utc::now() + chrono::Duration::seconds(90);
        let header = target.to_rfc2822();
        let parsed = parse_retry_after(&header).unwrap();
        // Allow slack for the wall-clock time spent formatting/parsing above.
        assert!(parsed.as_secs() >= 85 && parsed.as_secs() <= 90);
    }

    #[test]
    fn retry_after_rejects_garbage() {
        assert_eq!(parse_retry_after("not a date or a number"), None);
    }
}
