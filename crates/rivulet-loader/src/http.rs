//! Conventional HTTP backend, usually the target of a rollback.
//!
//! Each session streams one range request on the current tokio runtime.
//! Destroying the transport cancels the request.

use std::sync::Arc;

use bytes::{Buf, Bytes};
use futures::StreamExt;
use rivulet_core::LoaderErrorKind;
use rivulet_net::{Headers, HttpClient, Net, NetError, NetExt, NetOptions, RangeSpec};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use url::Url;

use crate::{
    error::TransportError,
    source::SourceDescriptor,
    transport::{EventListener, Payload, Transport, TransportEvent, TransportFactory},
};

pub const HEADERS_KEY: &str = "headers";

/// Options for [`HttpTransportFactory`].
#[derive(Clone, Debug, Default)]
pub struct HttpTransportOptions {
    /// Network configuration.
    pub net: NetOptions,
    /// Additional HTTP headers to include in all requests.
    pub headers: Option<Headers>,
}

impl HttpTransportOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = Some(headers);
        self
    }

    /// Headers from `options["headers"]` layered over the configured ones.
    fn headers_for(&self, options: &Value) -> Option<Headers> {
        let extra = options.get(HEADERS_KEY).and_then(Value::as_object);
        let Some(extra) = extra else {
            return self.headers.clone();
        };
        let mut headers = self.headers.clone().unwrap_or_default();
        for (name, value) in extra {
            match value.as_str() {
                Some(value) => headers.insert(name.as_str(), value),
                None => warn!(header = %name, "ignoring non-string header value"),
            }
        }
        Some(headers)
    }
}

#[derive(Clone, Debug, Default)]
pub struct HttpTransportFactory {
    options: HttpTransportOptions,
}

impl HttpTransportFactory {
    pub fn new(options: HttpTransportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &HttpTransportOptions {
        &self.options
    }
}

impl TransportFactory for HttpTransportFactory {
    type Transport = HttpTransport;

    fn kind(&self) -> &'static str {
        "http"
    }

    fn is_supported(&self) -> bool {
        Handle::try_current().is_ok()
    }

    fn needs_stash_buffer(&self) -> bool {
        true
    }

    fn create(&self, options: &Value) -> Result<HttpTransport, TransportError> {
        let runtime = Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let net = &self.options.net;
        let client = HttpClient::new(net.clone())
            .with_timeout(net.request_timeout)
            .with_retry(net.retry_policy.clone());
        Ok(HttpTransport::new(
            Arc::new(client),
            self.options.headers_for(options),
            runtime,
        ))
    }
}

pub struct HttpTransport {
    net: Arc<dyn Net>,
    headers: Option<Headers>,
    runtime: Handle,
    listener: Option<EventListener>,
    cancel: CancellationToken,
}

impl HttpTransport {
    /// Build over any [`Net`] implementation.
    pub fn new(net: Arc<dyn Net>, headers: Option<Headers>, runtime: Handle) -> Self {
        Self {
            net,
            headers,
            runtime,
            listener: None,
            cancel: CancellationToken::new(),
        }
    }
}

impl Transport for HttpTransport {
    fn load_source(&mut self, source: SourceDescriptor) -> Result<(), TransportError> {
        let url = Url::parse(&source.src).map_err(|e| TransportError::InvalidSource {
            src: source.src.clone(),
            reason: e.to_string(),
        })?;
        let listener = self
            .listener
            .clone()
            .ok_or_else(|| TransportError::Rejected("no listener bound".to_owned()))?;
        let range = source
            .range
            .map_or(RangeSpec::from_start(0), |r| RangeSpec::new(r.from, r.to));

        let fetch = Fetch {
            net: Arc::clone(&self.net),
            url,
            range,
            headers: self.headers.clone(),
            listener,
            cancel: self.cancel.child_token(),
        };
        self.runtime.spawn(async move { fetch.run().await });
        Ok(())
    }

    fn listen(&mut self, listener: EventListener) {
        self.listener = Some(listener);
    }

    fn destroy(&mut self) {
        self.cancel.cancel();
        self.listener = None;
    }
}

impl Drop for HttpTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("headers", &self.headers)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Maps a response body onto the requested range.
///
/// `206` bodies already match. A `200` answer to a partial request carries
/// the whole resource, so the prefix before `range.start` is dropped and the
/// tail past `range.end` cut.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct BodyWindow {
    skip: u64,
    remaining: Option<u64>,
}

impl BodyWindow {
    fn for_response(range: &RangeSpec, status: u16) -> Self {
        if status != 200 || range.is_full() {
            return Self {
                skip: 0,
                remaining: None,
            };
        }
        Self {
            skip: range.start,
            remaining: range
                .end
                .map(|end| end.saturating_sub(range.start).saturating_add(1)),
        }
    }

    /// Bytes this window will deliver from a body of `total` bytes, or
    /// `None` when the range starts past the end.
    fn expected(&self, total: u64) -> Option<u64> {
        if self.skip > 0 && total <= self.skip {
            return None;
        }
        let available = total - self.skip;
        Some(self.remaining.map_or(available, |limit| limit.min(available)))
    }

    fn clip(&mut self, mut bytes: Bytes) -> Option<Bytes> {
        if self.skip > 0 {
            let dropped = bytes.len().min(usize::try_from(self.skip).unwrap_or(usize::MAX));
            bytes.advance(dropped);
            self.skip -= dropped as u64;
        }
        if let Some(remaining) = self.remaining.as_mut() {
            let keep = bytes.len().min(usize::try_from(*remaining).unwrap_or(usize::MAX));
            bytes.truncate(keep);
            *remaining -= keep as u64;
        }
        (!bytes.is_empty()).then_some(bytes)
    }

    fn is_filled(&self) -> bool {
        self.remaining == Some(0)
    }
}

struct Fetch {
    net: Arc<dyn Net>,
    url: Url,
    range: RangeSpec,
    headers: Option<Headers>,
    listener: EventListener,
    cancel: CancellationToken,
}

impl Fetch {
    async fn run(self) {
        let response = tokio::select! {
            () = self.cancel.cancelled() => {
                debug!(url = %self.url, "fetch cancelled before response");
                return;
            }
            response = self.net.get_range(self.url.clone(), self.range.clone(), self.headers.clone()) => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(error) => {
                self.emit(Self::request_failure(&error));
                return;
            }
        };

        let mut window = BodyWindow::for_response(&self.range, response.status);
        if window.skip > 0 {
            debug!(url = %self.url, start = window.skip, "server ignored range; skipping prefix");
        }
        let expected = match response.content_length.map(|total| window.expected(total)) {
            Some(None) => {
                self.emit(Self::unsatisfiable());
                return;
            }
            Some(Some(length)) => Some(length),
            None => None,
        };
        if let Some(length) = expected
            && !self.emit(TransportEvent::SizeHint(length))
        {
            return;
        }

        let mut body = response.body;
        let mut received: u64 = 0;
        while !window.is_filled() {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!(received, "fetch cancelled");
                    return;
                }

                next = body.next() => {
                    let Some(next) = next else { break; };
                    let bytes = match next {
                        Ok(bytes) => bytes,
                        Err(error) => {
                            self.emit(TransportEvent::Failure {
                                kind: LoaderErrorKind::EarlyEof,
                                message: error.to_string(),
                            });
                            return;
                        }
                    };
                    let Some(bytes) = window.clip(bytes) else {
                        continue;
                    };
                    received += bytes.len() as u64;
                    if !self.emit(TransportEvent::ReceiveBuffer(Payload::Binary(bytes))) {
                        return;
                    }
                }
            }
        }

        if window.skip > 0 {
            self.emit(Self::unsatisfiable());
            return;
        }
        if let Some(expected) = expected
            && received < expected
        {
            self.emit(TransportEvent::Failure {
                kind: LoaderErrorKind::EarlyEof,
                message: format!("stream ended after {received} of {expected} bytes"),
            });
            return;
        }
        trace!(received, "fetch finished");
        self.emit(TransportEvent::BufferEof);
    }

    fn unsatisfiable() -> TransportEvent {
        TransportEvent::HttpStatusInvalid {
            status: 416,
            status_text: "Range Not Satisfiable".to_owned(),
        }
    }

    fn request_failure(error: &NetError) -> TransportEvent {
        match error.status_code() {
            Some(status) => TransportEvent::HttpStatusInvalid {
                status,
                status_text: error.status_text().unwrap_or_default().to_owned(),
            },
            None if error.is_timeout() => TransportEvent::Failure {
                kind: LoaderErrorKind::ConnectingTimeout,
                message: error.to_string(),
            },
            None => TransportEvent::Failure {
                kind: LoaderErrorKind::Exception,
                message: error.to_string(),
            },
        }
    }

    /// Returns whether the fetch should keep going.
    fn emit(&self, event: TransportEvent) -> bool {
        if let Err(error) = self.listener.emit(event) {
            warn!(url = %self.url, %error, "loader error left unhandled; stopping fetch");
            return false;
        }
        self.listener.is_live()
    }
}
