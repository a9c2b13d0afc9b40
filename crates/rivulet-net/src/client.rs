use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::{Client, RequestBuilder, Response};
use tracing::trace;
use url::Url;

use crate::{
    error::{NetError, NetResult},
    traits::{ByteResponse, Net},
    types::{Headers, NetOptions, RangeSpec},
};

#[derive(Clone, Debug)]
pub struct HttpClient {
    inner: Client,
    options: NetOptions,
}

impl HttpClient {
    /// Falls back to a default `reqwest::Client` if the tuned builder fails.
    #[must_use]
    pub fn new(options: NetOptions) -> Self {
        let inner = Client::builder()
            .pool_max_idle_per_host(options.pool_max_idle_per_host)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { inner, options }
    }

    pub fn options(&self) -> &NetOptions {
        &self.options
    }

    fn apply_headers(mut req: RequestBuilder, headers: Option<Headers>) -> RequestBuilder {
        if let Some(headers) = headers {
            for (k, v) in headers.iter() {
                req = req.header(k, v);
            }
        }
        req
    }

    async fn check_status(url: Url, resp: Response) -> NetResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.ok().filter(|b| !b.is_empty());
        Err(NetError::http_error(status.as_u16(), url, body))
    }

    fn into_byte_response(resp: Response) -> ByteResponse {
        let status = resp.status().as_u16();
        let content_length = resp.content_length();
        trace!(status, ?content_length, "response head received");
        ByteResponse {
            status,
            content_length,
            body: Box::pin(resp.bytes_stream().map_err(NetError::from)),
        }
    }
}

#[async_trait]
impl Net for HttpClient {
    async fn get_range(
        &self,
        url: Url,
        range: RangeSpec,
        headers: Option<Headers>,
    ) -> Result<ByteResponse, NetError> {
        let mut req = self.inner.get(url.clone());
        if !range.is_full() {
            req = req.header(reqwest::header::RANGE, range.to_header_value());
        }
        let req = Self::apply_headers(req, headers);

        let resp = req.send().await?;
        let resp = Self::check_status(url, resp).await?;
        Ok(Self::into_byte_response(resp))
    }
}
