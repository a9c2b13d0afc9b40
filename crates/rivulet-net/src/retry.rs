use std::{future::Future, time::Duration};

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::debug;
use url::Url;

use crate::{
    error::NetError,
    traits::{ByteResponse, Net},
    types::{Headers, RangeSpec, RetryPolicy},
};

pub trait RetryPolicyTrait: Send + Sync {
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool;
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
}

/// Retries errors that [`NetError::is_retryable`] accepts, up to `max_retries`.
pub struct DefaultRetryPolicy {
    policy: RetryPolicy,
}

impl DefaultRetryPolicy {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

impl RetryPolicyTrait for DefaultRetryPolicy {
    fn should_retry(&self, error: &NetError, attempt: u32) -> bool {
        attempt < self.policy.max_retries && error.is_retryable()
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.policy.delay_for_attempt(attempt)
    }
}

/// Retry decorator for Net implementations.
///
/// Only the request phase is retried; a body stream that fails midway is
/// surfaced to the caller as is.
pub struct RetryNet<N, P> {
    inner: N,
    retry_policy: P,
}

impl<N: Net, P: RetryPolicyTrait> RetryNet<N, P> {
    pub fn new(inner: N, retry_policy: P) -> Self {
        Self {
            inner,
            retry_policy,
        }
    }

    async fn run<T, F, Fut>(&self, op: &'static str, mut call: F) -> Result<T, NetError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, NetError>> + Send,
        T: Send,
    {
        let mut attempt: u32 = 0;
        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.retry_policy.should_retry(&error, attempt) {
                if attempt == 0 || !error.is_retryable() {
                    return Err(error);
                }
                return Err(NetError::RetryExhausted {
                    max_retries: attempt,
                    source: Box::new(error),
                });
            }

            attempt += 1;
            let delay = self.retry_policy.delay_for_attempt(attempt);
            debug!(op, attempt, ?delay, %error, "retrying request");
            sleep(delay).await;
        }
    }
}

#[async_trait]
impl<N: Net, P: RetryPolicyTrait> Net for RetryNet<N, P> {
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteResponse, NetError> {
        self.run("get_range", || {
            self.inner
                .get_range(url.clone(), range.clone(), headers.clone())
        })
        .await
    }
}
