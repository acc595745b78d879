// Turbine Rust Library for Amazon S3 Compatible Cloud Storage
// Copyright 2024 MinIO, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Retry-strategy collaborator

use crate::s3::error::Error;
use rand::Rng;
use std::time::Duration;

/// Verdict of the retry strategy for one failed request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-queue the request after the given backoff.
    Retry(Duration),
    /// Surface the failure to the meta-request.
    Fail,
}

/// Per-request retry accounting. Acquired when a request first goes on the
/// wire and carried on its connection across attempts.
#[derive(Clone, Debug, Default)]
pub struct RetryToken {
    pub attempt: u32,
}

/// Decides whether failed requests are retried and how long to back off.
pub trait RetryStrategy: Send + Sync {
    fn acquire_token(&self) -> RetryToken;

    fn on_request_failed(&self, token: &mut RetryToken, error: &Error) -> RetryDecision;

    fn on_request_succeeded(&self, token: &mut RetryToken) {
        let _ = token;
    }
}

/// Exponential backoff with full jitter, capped attempts.
pub struct ExponentialBackoffRetry {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl ExponentialBackoffRetry {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
        }
    }
}

impl Default for ExponentialBackoffRetry {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(100), Duration::from_secs(20))
    }
}

impl RetryStrategy for ExponentialBackoffRetry {
    fn acquire_token(&self) -> RetryToken {
        RetryToken::default()
    }

    fn on_request_failed(&self, token: &mut RetryToken, error: &Error) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Fail;
        }

        token.attempt += 1;
        if token.attempt >= self.max_attempts {
            return RetryDecision::Fail;
        }

        let exp = self
            .base_delay
            .saturating_mul(1u32 << (token.attempt - 1).min(16))
            .min(self.max_delay);
        let jittered = rand::thread_rng().gen_range(0..=exp.as_millis() as u64);
        RetryDecision::Retry(Duration::from_millis(jittered))
    }
}

/// Never retries; useful in tests and for callers that layer their own
/// retry handling above the engine.
pub struct NoRetry;

impl RetryStrategy for NoRetry {
    fn acquire_token(&self) -> RetryToken {
        RetryToken::default()
    }

    fn on_request_failed(&self, _token: &mut RetryToken, _error: &Error) -> RetryDecision {
        RetryDecision::Fail
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_errors_are_never_retried() {
        let strategy = ExponentialBackoffRetry::default();
        let mut token = strategy.acquire_token();
        assert_eq!(
            strategy.on_request_failed(&mut token, &Error::MissingUploadId),
            RetryDecision::Fail
        );
        assert_eq!(token.attempt, 0);
    }

    #[test]
    fn retryable_errors_exhaust_after_max_attempts() {
        let strategy =
            ExponentialBackoffRetry::new(3, Duration::from_millis(1), Duration::from_millis(8));
        let mut token = strategy.acquire_token();

        let error = Error::ServerError(503);
        assert!(matches!(
            strategy.on_request_failed(&mut token, &error),
            RetryDecision::Retry(_)
        ));
        assert!(matches!(
            strategy.on_request_failed(&mut token, &error),
            RetryDecision::Retry(_)
        ));
        assert_eq!(
            strategy.on_request_failed(&mut token, &error),
            RetryDecision::Fail
        );
    }

    #[test]
    fn backoff_stays_under_cap() {
        let strategy =
            ExponentialBackoffRetry::new(30, Duration::from_millis(100), Duration::from_secs(2));
        let mut token = RetryToken { attempt: 20 };
        match strategy.on_request_failed(&mut token, &Error::ServerError(500)) {
            RetryDecision::Retry(delay) => assert!(delay <= Duration::from_secs(2)),
            RetryDecision::Fail => panic!("expected retry"),
        }
    }
}
