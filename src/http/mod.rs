// Blocking HTTP transport shared by the provider clients


use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::{debug, error, warn};
use url::Url;

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;

/// When and how often a failed request is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles for every later attempt
    pub base_delay: Duration,
    /// Whether 5xx responses are retried in addition to transport failures
    pub retry_server_errors: bool,
}

impl RetryPolicy {
    /// Exponential backoff over transport failures and server errors
    #[inline]
    pub fn backoff(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            retry_server_errors: true,
        }
    }

    /// One extra attempt, and only when the request never reached the server
    #[inline]
    pub fn single_transport_retry(delay: Duration) -> Self {
        Self {
            max_attempts: 2,
            base_delay: delay,
            retry_server_errors: false,
        }
    }

    fn delay_before(&self, next_attempt: u32) -> Duration {
        self.base_delay * EXPONENTIAL_BACKOFF_BASE.pow(next_attempt.saturating_sub(2))
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    /// Bounds connecting and waiting for headers, but not reading the body
    streaming_agent: ureq::Agent,
    retry: RetryPolicy,
}

impl HttpClient {
    #[inline]
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        let streaming_agent = ureq::Agent::config_builder()
            .timeout_connect(Some(timeout))
            .timeout_send_request(Some(timeout))
            .timeout_send_body(Some(timeout))
            .timeout_recv_response(Some(timeout))
            .build()
            .into();

        Self {
            agent,
            streaming_agent,
            retry,
        }
    }

    #[inline]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    #[inline]
    pub fn get_text(&self, url: &Url) -> Result<String> {
        self.with_retry(url, || {
            self.agent
                .get(url.as_str())
                .call()
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// POST a JSON body and read the whole response as text
    #[inline]
    pub fn post_json(&self, url: &Url, headers: &[(&str, &str)], body: &str) -> Result<String> {
        self.with_retry(url, || {
            self.post_request(&self.agent, url, headers)
                .send(body)
                .and_then(|mut resp| resp.body_mut().read_to_string())
        })
    }

    /// POST a JSON body and hand back the unread response body
    ///
    /// Only establishing the response is retried; reading the body is left to
    /// the caller. The timeout covers the response headers, so a long answer
    /// may keep streaming past it.
    #[inline]
    pub fn post_json_streaming(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<ureq::BodyReader<'static>> {
        self.with_retry(url, || {
            self.post_request(&self.streaming_agent, url, headers)
                .send(body)
                .map(|resp| resp.into_body().into_reader())
        })
    }

    fn post_request(
        &self,
        agent: &ureq::Agent,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> ureq::RequestBuilder<ureq::typestate::WithBody> {
        let mut request = agent
            .post(url.as_str())
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request
    }

    fn with_retry<T, F>(&self, url: &Url, mut request_fn: F) -> Result<T>
    where
        F: FnMut() -> Result<T, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts {
            debug!(
                "HTTP request attempt {}/{} to {}",
                attempt,
                self.retry.max_attempts,
                url.path()
            );

            match request_fn() {
                Ok(response) => {
                    debug!("Request succeeded on attempt {}", attempt);
                    return Ok(response);
                }
                Err(error) => {
                    let should_retry = match &error {
                        ureq::Error::StatusCode(status) => {
                            if *status >= 500 && self.retry.retry_server_errors {
                                warn!(
                                    "Server error (status {}), attempt {}/{}",
                                    status, attempt, self.retry.max_attempts
                                );
                                true
                            } else {
                                warn!("HTTP error (status {}), not retrying", status);
                                return Err(anyhow!("HTTP error: status {}", status));
                            }
                        }
                        ureq::Error::ConnectionFailed
                        | ureq::Error::HostNotFound
                        | ureq::Error::Timeout(_)
                        | ureq::Error::Io(_) => {
                            warn!(
                                "Transport error: {}, attempt {}/{}",
                                error, attempt, self.retry.max_attempts
                            );
                            true
                        }
                        _ => false,
                    };

                    if !should_retry {
                        warn!("Non-retryable error: {}", error);
                        return Err(anyhow!("Non-retryable error: {}", error));
                    }

                    last_error = Some(anyhow!("Request error: {}", error));

                    if attempt < self.retry.max_attempts {
                        let delay = self.retry.delay_before(attempt + 1);
                        debug!("Waiting {:?} before retry", delay);
                        std::thread::sleep(delay);
                    }
                }
            }
        }

        error!("All retry attempts failed for request to {}", url.path());

        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }
}
