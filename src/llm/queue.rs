//! Single-worker request queue with fixed pacing and bounded retry.
//!
//! Collaborator calls are strictly sequential. Before each request the queue
//! waits until `request_delay` has passed since the previous one. A failed
//! attempt that the caller's [`RetryOn`] policy admits is retried after
//! `attempt × backoff_step`, up to `max_attempts` attempts in total; the last
//! error is then handed back to the caller, which decides how to degrade.

use std::time::{Duration, Instant};

use crate::config::QueueConfig;

use super::{LlmError, LlmResult};

/// Which failures are worth another attempt with the same payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOn {
    /// Only rate-limit responses.
    RateLimit,
    /// Rate limits and replies that failed to parse.
    RateLimitOrMalformed,
}

impl RetryOn {
    pub fn admits(&self, err: &LlmError) -> bool {
        match self {
            Self::RateLimit => err.is_rate_limited(),
            Self::RateLimitOrMalformed => err.is_rate_limited() || err.is_malformed(),
        }
    }
}

/// Sequential, paced executor for collaborator calls.
#[derive(Debug)]
pub struct RequestQueue {
    request_delay: Duration,
    max_attempts: u32,
    backoff_step: Duration,
    last_request: Option<Instant>,
    requests_sent: u64,
}

impl RequestQueue {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            request_delay: config.request_delay(),
            max_attempts: config.max_attempts.max(1),
            backoff_step: config.backoff_step(),
            last_request: None,
            requests_sent: 0,
        }
    }

    /// Run `call` to completion under the pacing and retry rules.
    pub fn submit<T>(
        &mut self,
        unit: &str,
        retry: RetryOn,
        mut call: impl FnMut() -> LlmResult<T>,
    ) -> LlmResult<T> {
        let mut attempt = 1u32;
        loop {
            self.pace();
            let result = call();
            self.last_request = Some(Instant::now());
            self.requests_sent += 1;

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && retry.admits(&e) => {
                    let wait = self.backoff_step * attempt;
                    tracing::warn!(
                        unit,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %e,
                        "collaborator call failed, retrying"
                    );
                    std::thread::sleep(wait);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Number of requests issued so far, retries included.
    pub fn requests_sent(&self) -> u64 {
        self.requests_sent
    }

    fn pace(&self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.request_delay {
                std::thread::sleep(self.request_delay - elapsed);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ParseError;

    fn rate_limited() -> LlmError {
        LlmError::RateLimited {
            message: "429".into(),
        }
    }

    fn malformed() -> LlmError {
        LlmError::Malformed(ParseError::Shape {
            message: "x".into(),
        })
    }

    #[test]
    fn success_is_a_single_request() {
        let mut queue = RequestQueue::new(&QueueConfig::immediate(3));
        let value = queue.submit("u", RetryOn::RateLimit, || Ok(7)).unwrap();
        assert_eq!(value, 7);
        assert_eq!(queue.requests_sent(), 1);
    }

    #[test]
    fn rate_limit_retried_until_success() {
        let mut queue = RequestQueue::new(&QueueConfig::immediate(3));
        let mut calls = 0;
        let value = queue
            .submit("u", RetryOn::RateLimit, || {
                calls += 1;
                if calls < 3 { Err(rate_limited()) } else { Ok("done") }
            })
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(queue.requests_sent(), 3);
    }

    #[test]
    fn retries_are_bounded() {
        let mut queue = RequestQueue::new(&QueueConfig::immediate(3));
        let mut calls = 0;
        let err = queue
            .submit::<()>("u", RetryOn::RateLimit, || {
                calls += 1;
                Err(rate_limited())
            })
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(calls, 3);
    }

    #[test]
    fn malformed_not_retried_under_rate_limit_policy() {
        let mut queue = RequestQueue::new(&QueueConfig::immediate(3));
        let mut calls = 0;
        let err = queue
            .submit::<()>("u", RetryOn::RateLimit, || {
                calls += 1;
                Err(malformed())
            })
            .unwrap_err();
        assert!(err.is_malformed());
        assert_eq!(calls, 1);
    }

    #[test]
    fn malformed_retried_under_merge_policy() {
        let mut queue = RequestQueue::new(&QueueConfig::immediate(3));
        let mut calls = 0;
        let _ = queue.submit::<()>("u", RetryOn::RateLimitOrMalformed, || {
            calls += 1;
            Err(malformed())
        });
        assert_eq!(calls, 3);
    }

    #[test]
    fn request_failures_are_never_retried() {
        let mut queue = RequestQueue::new(&QueueConfig::immediate(5));
        let mut calls = 0;
        let _ = queue.submit::<()>("u", RetryOn::RateLimitOrMalformed, || {
            calls += 1;
            Err(LlmError::RequestFailed {
                message: "HTTP 500".into(),
            })
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn zero_attempts_still_calls_once() {
        let mut queue = RequestQueue::new(&QueueConfig::immediate(0));
        let mut calls = 0;
        let _ = queue.submit::<()>("u", RetryOn::RateLimit, || {
            calls += 1;
            Err(rate_limited())
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn consecutive_requests_are_paced() {
        let config = QueueConfig {
            request_delay_ms: 30,
            max_attempts: 1,
            backoff_step_ms: 0,
        };
        let mut queue = RequestQueue::new(&config);
        let start = Instant::now();
        queue.submit("a", RetryOn::RateLimit, || Ok(())).unwrap();
        queue.submit("b", RetryOn::RateLimit, || Ok(())).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
