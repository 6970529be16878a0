use http::StatusCode;
use reqwest::{blocking::Response, Result};
use std::{thread::sleep, time::Duration};

/// Retry settings for idempotent requests, such as object uploads during a deploy.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_retry_count: u8,
    /// Amount of time to wait before the first retry.
    pub base_wait: Duration,
    /// The wait before retry N is `base_wait * backoff_factor^N`.
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry_count: 3,
            base_wait: Duration::from_millis(500),
            backoff_factor: 2.0,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Retrier {
    config: RetryConfig,
}

enum Outcome {
    Done,
    Retry(String),
}

impl Retrier {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    fn classify(result: &Result<Response>) -> Outcome {
        match result {
            Ok(response)
                if response.status().is_server_error()
                    || response.status() == StatusCode::TOO_MANY_REQUESTS =>
            {
                Outcome::Retry(format!("{} for {}", response.status(), response.url()))
            }
            Err(error) if error.is_timeout() || error.is_connect() => {
                Outcome::Retry(error.to_string())
            }
            _ => Outcome::Done,
        }
    }

    fn wait_before(&self, i_retry: u8) -> Duration {
        let factor = self.config.backoff_factor.powi(i_retry.into());
        self.config.base_wait.mul_f64(factor)
    }

    pub fn with_retries(&self, send_request: impl Fn() -> Result<Response>) -> Result<Response> {
        for i_retry in 0..self.config.max_retry_count {
            let result = send_request();
            match Self::classify(&result) {
                Outcome::Done => return result,
                Outcome::Retry(reason) => {
                    let wait = self.wait_before(i_retry);
                    log::warn!("{} - retrying after {:?}.", reason, wait);
                    sleep(wait);
                }
            }
        }

        // The last attempt is returned as is.
        send_request()
    }
}
