use std::time::Duration;

use crate::{NetError, RetryPolicy};

#[cfg_attr(test, unimock::unimock(api = RetryClassifierMock))]
pub trait RetryClassifier: Send + Sync {
    fn should_retry(&self, error: &NetError) -> bool;

    fn is_offline(&self, error: &NetError) -> bool;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryClassifier;

impl RetryClassifier for DefaultRetryClassifier {
    fn should_retry(&self, error: &NetError) -> bool {
        error.is_retryable()
    }

    fn is_offline(&self, error: &NetError) -> bool {
        error.is_offline()
    }
}

/// Retry state of one fetch.
///
/// Offline errors and other errors are counted separately, each against its
/// own budget.
#[derive(Debug)]
pub struct Backoff<C = DefaultRetryClassifier> {
    policy: RetryPolicy,
    classifier: C,
    retries: u32,
    offline_retries: u32,
}

impl Backoff<DefaultRetryClassifier> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_classifier(policy, DefaultRetryClassifier)
    }
}

impl<C: RetryClassifier> Backoff<C> {
    pub fn with_classifier(policy: RetryPolicy, classifier: C) -> Self {
        Self {
            policy,
            classifier,
            retries: 0,
            offline_retries: 0,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn offline_retries(&self) -> u32 {
        self.offline_retries
    }

    /// Delay before the next attempt, or `None` when `error` must be given up on.
    pub fn next_delay(&mut self, error: &NetError) -> Option<Duration> {
        if !self.classifier.should_retry(error) {
            return None;
        }
        let (count, max) = if self.classifier.is_offline(error) {
            (&mut self.offline_retries, self.policy.max_retries_offline)
        } else {
            (&mut self.retries, self.policy.max_retries)
        };
        if *count >= max {
            return None;
        }
        *count += 1;
        Some(self.policy.delay_for_attempt(*count))
    }

    /// Final error once [`next_delay`](Self::next_delay) refused `error`.
    pub fn give_up(&self, error: NetError) -> NetError {
        if !self.classifier.should_retry(&error) {
            return error;
        }
        let max_retries = if self.classifier.is_offline(&error) {
            self.policy.max_retries_offline
        } else {
            self.policy.max_retries
        };
        NetError::RetryExhausted {
            max_retries,
            source: Box::new(error),
        }
    }
}
