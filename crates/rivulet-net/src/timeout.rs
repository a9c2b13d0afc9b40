use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use crate::{
    error::NetError,
    traits::{ByteResponse, Net},
    types::{Headers, RangeSpec},
};

/// Timeout decorator for Net implementations.
///
/// Only the response head is bounded; the body may take as long as it needs.
pub struct TimeoutNet<N> {
    inner: N,
    timeout: Duration,
}

impl<N: Net> TimeoutNet<N> {
    pub fn new(inner: N, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl<N: Net> Net for TimeoutNet<N> {
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteResponse, NetError> {
        tokio::time::timeout(self.timeout, self.inner.get_range(url, range, headers))
            .await
            .map_err(|_| NetError::timeout())?
    }
}
