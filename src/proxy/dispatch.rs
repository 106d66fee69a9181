//! Dispatch Coordinator.
//!
//! # Data Flow
//! ```text
//! ProxyRequest
//!     → EndpointPool::select (exactly once per inbound request)
//!     → framing decision for the request body
//!     → RedirectFollower::resolve (one or more UpstreamConnector calls)
//!     → framing decision for the response body
//!     → Response relayed while the Exchange rides along in the body stream
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use axum::http::{response, HeaderMap, Method, Response};
use axum::response::IntoResponse;
use futures_util::{stream, StreamExt};
use tracing::Instrument;

use crate::config::ApiConfig;
use crate::error::{DispatchError, FailureKind};
use crate::load_balancer::EndpointPool;
use crate::observability::OutcomeSink;
use crate::proxy::body::{BodyError, ProxyBody};
use crate::proxy::connector::UpstreamConnector;
use crate::proxy::exchange::Exchange;
use crate::proxy::framing::{is_bodyless, FORWARDED_TRANSFER_ENCODING};
use crate::proxy::headers::{forwardable_request_headers, strip_hop_by_hop};
use crate::proxy::redirect::{OutboundRequest, RedirectFollower, RedirectPolicy};

/// An inbound request already matched to an API.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path remainder (and query) appended to the endpoint base URL.
    pub target_path: String,
    pub headers: HeaderMap,
    pub body: ProxyBody,
}

impl ProxyRequest {
    pub fn new(method: Method, target_path: impl Into<String>, headers: HeaderMap, body: ProxyBody) -> Self {
        Self {
            method,
            target_path: target_path.into(),
            headers,
            body,
        }
    }
}

/// Response head and body ready to be relayed to the caller.
struct Relay {
    parts: response::Parts,
    body: ProxyBody,
}

/// Per-API request dispatcher.
#[derive(Debug)]
pub struct Dispatcher {
    pool: Arc<EndpointPool>,
    connector: UpstreamConnector,
    redirects: RedirectPolicy,
    sink: Arc<dyn OutcomeSink>,
}

impl Dispatcher {
    pub fn new(
        pool: Arc<EndpointPool>,
        connector: UpstreamConnector,
        redirects: RedirectPolicy,
        sink: Arc<dyn OutcomeSink>,
    ) -> Self {
        Self {
            pool,
            connector,
            redirects,
            sink,
        }
    }

    pub fn from_config(config: &ApiConfig, pool: Arc<EndpointPool>, sink: Arc<dyn OutcomeSink>) -> Self {
        let redirects = RedirectPolicy {
            enabled: config.follow_redirects,
            max_hops: config.max_redirect_hops,
        };
        Self::new(pool, UpstreamConnector::from_config(config), redirects, sink)
    }

    pub fn pool(&self) -> &Arc<EndpointPool> {
        &self.pool
    }

    /// Run one exchange to completion of its response head.
    ///
    /// Failures become error responses here; the exchange record is emitted
    /// once the relayed body finishes, fails or is dropped.
    pub async fn handle(&self, request: ProxyRequest) -> Response<Body> {
        let mut exchange = Exchange::begin(self.pool.api(), self.sink.clone());
        let span = tracing::info_span!("exchange", id = %exchange.id(), api = %self.pool.api());

        match self.dispatch(request, &mut exchange).instrument(span.clone()).await {
            Ok(relay) => relay_response(relay, exchange, span),
            Err(err) => {
                span.in_scope(|| tracing::warn!(error = %err, "Dispatch failed"));
                exchange.set_status(err.status().as_u16());
                exchange.fail(err.kind());
                err.into_response()
            }
        }
    }

    async fn dispatch(&self, request: ProxyRequest, exchange: &mut Exchange) -> Result<Relay, DispatchError> {
        let endpoint = self.pool.select()?;
        exchange.set_endpoint(&endpoint.id);

        let url = endpoint.target_url(&request.target_path);
        tracing::debug!(endpoint = %endpoint.id, upstream = %url, method = %request.method, "Endpoint selected");

        let ProxyRequest {
            method,
            headers,
            body,
            ..
        } = request;
        let read_timeout = self.connector.read_timeout();
        let (framing, body) = body
            .with_read_timeout(read_timeout)
            .counted(exchange.bytes_in())
            .prepare()
            .await
            .map_err(|e| DispatchError::CallerDisconnected(e.to_string()))?;

        let outbound = OutboundRequest {
            method: method.clone(),
            headers: forwardable_request_headers(headers),
            framing,
            body,
        };
        let resolved = RedirectFollower::new(&self.connector, self.redirects)
            .resolve(url, outbound)
            .await?;
        exchange.set_redirects(resolved.hops);

        let (mut parts, incoming) = resolved.response.into_parts();
        exchange.set_status(parts.status.as_u16());
        strip_hop_by_hop(&mut parts.headers);
        parts.headers.remove(FORWARDED_TRANSFER_ENCODING);

        if is_bodyless(&method, parts.status) {
            parts.headers.remove(TRANSFER_ENCODING);
            if method != Method::HEAD && parts.status != axum::http::StatusCode::NOT_MODIFIED {
                parts.headers.remove(CONTENT_LENGTH);
            }
            return Ok(Relay {
                parts,
                body: ProxyBody::empty(),
            });
        }

        let (framing, body) = ProxyBody::from_http(incoming)
            .with_read_timeout(read_timeout)
            .counted(exchange.bytes_out())
            .prepare()
            .await
            .map_err(|e| body_failure(&resolved.url, read_timeout, e))?;
        framing.apply(&mut parts.headers);

        Ok(Relay { parts, body })
    }
}

fn body_failure(url: &url::Url, read_timeout: Duration, err: BodyError) -> DispatchError {
    match err {
        BodyError::Stalled(_) => DispatchError::UpstreamTimeout {
            target: url.to_string(),
            timeout: read_timeout,
        },
        BodyError::Read(e) => DispatchError::UpstreamProtocolError {
            target: url.to_string(),
            reason: e.to_string(),
        },
    }
}

/// Hand the response to the caller; the exchange completes with its body.
fn relay_response(relay: Relay, mut exchange: Exchange, span: tracing::Span) -> Response<Body> {
    let Relay { parts, body } = relay;
    if body.declared_len() == Some(0) {
        exchange.succeed();
        return Response::from_parts(parts, Body::empty());
    }

    let chunks = body.into_chunks();
    let relayed = stream::unfold((chunks, Some(exchange)), move |(mut chunks, exchange)| {
        let span = span.clone();
        async move {
            let mut exchange = exchange?;
            match chunks.next().await {
                Some(Ok(bytes)) => Some((Ok(bytes), (chunks, Some(exchange)))),
                Some(Err(err)) => {
                    // Head already sent: erroring the body makes hyper cut
                    // the connection instead of ending the message cleanly.
                    span.in_scope(|| tracing::warn!(error = %err, "Upstream body failed mid-relay"));
                    let kind = match err {
                        BodyError::Stalled(_) => FailureKind::UpstreamTimeout,
                        BodyError::Read(_) => FailureKind::UpstreamProtocolError,
                    };
                    exchange.fail(kind);
                    Some((Err(err), (chunks, None)))
                }
                None => {
                    exchange.succeed();
                    None
                }
            }
        }
    });

    Response::from_parts(parts, Body::from_stream(relayed))
}
