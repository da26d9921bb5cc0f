//! HTTP client decorator that feeds the interceptor
//!
//! `CapturingClient` wraps the host's client and reports each request to the
//! installed [`Interceptor`]. Response bodies are wrapped in [`CapturedBody`],
//! which copies every data frame into the exchange while passing the original
//! bytes through untouched.

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use http::{Request, Response};
use http_body_util::Full;
use hyper::body::{Body, Frame, SizeHint};
use hyper_util::client::legacy::connect::Connect;
use once_cell::sync::OnceCell;
use std::pin::Pin;
use std::task::{Context, Poll};

use super::exchange::{Exchange, TransportError};
use super::interceptor::{Interceptor, NetworkStack};
use crate::models::{HeaderFields, RequestParts, ResponseParts};

/// The host application's HTTP client
pub trait HttpClient: Send + Sync {
    type Body: Body<Data = Bytes> + Send + Unpin + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    fn send(
        &self,
        request: Request<Bytes>,
    ) -> BoxFuture<'static, Result<Response<Self::Body>, Self::Error>>;
}

impl<C> HttpClient for hyper_util::client::legacy::Client<C, Full<Bytes>>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    type Body = hyper::body::Incoming;
    type Error = hyper_util::client::legacy::Error;

    fn send(
        &self,
        request: Request<Bytes>,
    ) -> BoxFuture<'static, Result<Response<Self::Body>, Self::Error>> {
        self.request(request.map(Full::new)).boxed()
    }
}

/// Decorates an [`HttpClient`] so every exchange is observed once capture has
/// been activated. Before activation requests pass straight through.
pub struct CapturingClient<C> {
    inner: C,
    hook: OnceCell<Interceptor>,
}

impl<C: HttpClient> NetworkStack for CapturingClient<C> {
    fn install(&self, hook: Interceptor) {
        if self.hook.set(hook).is_err() {
            tracing::debug!("capture hook already installed on client");
        }
    }
}

impl<C: HttpClient> CapturingClient<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            hook: OnceCell::new(),
        }
    }

    pub fn is_capturing(&self) -> bool {
        self.hook.get().is_some()
    }

    /// Send `request` through the wrapped client.
    ///
    /// Dropping the returned future or the response body before the body is
    /// fully read records the exchange as cancelled.
    pub async fn send(
        &self,
        request: Request<Bytes>,
    ) -> Result<Response<CapturedBody<C::Body>>, C::Error> {
        let exchange = self
            .hook
            .get()
            .and_then(|hook| hook.begin(request_parts(&request)));

        match self.inner.send(request).await {
            Ok(response) => {
                if let Some(exchange) = &exchange {
                    exchange.response_received(response_parts(&response));
                }
                Ok(response.map(|body| CapturedBody::new(body, exchange)))
            }
            Err(err) => {
                if let Some(exchange) = exchange {
                    exchange.fail(TransportError::from_error(&err));
                }
                Err(err)
            }
        }
    }
}

fn request_parts(request: &Request<Bytes>) -> RequestParts {
    let body = request.body();
    RequestParts {
        url: request.uri().to_string(),
        method: request.method().as_str().to_string(),
        headers: HeaderFields::from_header_map(request.headers()),
        body: (!body.is_empty()).then(|| body.to_vec()),
    }
}

fn response_parts<B>(response: &Response<B>) -> ResponseParts {
    ResponseParts {
        status: response.status().as_u16(),
        headers: HeaderFields::from_header_map(response.headers()),
    }
}

/// Response body that tees data frames into an [`Exchange`].
///
/// The exchange finishes at end of stream, fails on a body error and is
/// cancelled if the body is dropped early.
pub struct CapturedBody<B> {
    inner: B,
    exchange: Option<Exchange>,
}

impl<B: std::fmt::Debug> std::fmt::Debug for CapturedBody<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturedBody")
            .field("inner", &self.inner)
            .field("captured", &self.exchange.is_some())
            .finish()
    }
}

impl<B> CapturedBody<B>
where
    B: Body<Data = Bytes> + Unpin,
{
    fn new(inner: B, exchange: Option<Exchange>) -> Self {
        let mut body = Self { inner, exchange };
        if body.inner.is_end_stream() {
            body.complete();
        }
        body
    }

    fn complete(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            exchange.finish();
        }
    }
}

impl<B> Body for CapturedBody<B>
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: std::error::Error + 'static,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(Some(Ok(frame))) => {
                if let (Some(exchange), Some(data)) = (&this.exchange, frame.data_ref()) {
                    exchange.data_received(data);
                }
                if this.inner.is_end_stream() {
                    this.complete();
                }
            }
            Poll::Ready(Some(Err(err))) => {
                if let Some(exchange) = this.exchange.take() {
                    exchange.fail(TransportError::from_error(err));
                }
            }
            Poll::Ready(None) => this.complete(),
            Poll::Pending => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
