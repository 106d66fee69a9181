//! Upstream Connector.
//!
//! # Responsibilities
//! - Issue one outbound request to an absolute upstream URL
//! - Apply the framing decision to the outbound headers
//! - Stream the request body without buffering it
//! - Classify transport failures (unreachable, timeout, protocol)
//!
//! # Design Decisions
//! - No retries and no redirect handling here
//! - The response is handed back as soon as its head arrives
//! - Connect timeout lives in the connector; the wait for the response head
//!   is bounded by the read timeout and starts once the body is fully sent

use std::error::Error as _;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::sync::oneshot;
use url::Url;

use crate::config::ApiConfig;
use crate::error::DispatchError;
use crate::proxy::body::{BodyError, ProxyBody};
use crate::proxy::framing::Framing;

/// HTTP client bound to one API's timeouts.
#[derive(Debug, Clone)]
pub struct UpstreamConnector {
    client: Client<HttpConnector, Body>,
    read_timeout: Duration,
}

impl UpstreamConnector {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let mut http = HttpConnector::new();
        http.set_connect_timeout(Some(connect_timeout));
        http.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new()).build(http);

        Self {
            client,
            read_timeout,
        }
    }

    pub fn from_config(config: &ApiConfig) -> Self {
        Self::new(
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.read_timeout_ms),
        )
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Send one request and wait for the response head.
    ///
    /// `headers` must already be free of hop-by-hop headers; framing headers
    /// are rewritten from `framing`.
    pub async fn forward(
        &self,
        method: Method,
        url: &Url,
        headers: &HeaderMap,
        framing: Framing,
        body: ProxyBody,
    ) -> Result<Response<Incoming>, DispatchError> {
        let target = url.to_string();
        let uri: Uri = target
            .parse()
            .map_err(|_| DispatchError::InvalidTarget(target.clone()))?;

        let mut outbound = headers.clone();
        framing.apply(&mut outbound);

        // Fires (or drops) once hyper has pulled the whole body.
        let (sent_tx, sent_rx) = oneshot::channel();
        let mut request = Request::builder()
            .method(method.clone())
            .uri(uri)
            .body(body.notify_end(sent_tx).into_body())
            .map_err(|_| DispatchError::InvalidTarget(target.clone()))?;
        *request.headers_mut() = outbound;

        tracing::debug!(method = %method, upstream = %target, framing = ?framing, "Forwarding upstream");

        let response = self.client.request(request);
        tokio::pin!(response);

        // Connecting is bounded by the connector and the upload by the
        // per-chunk read timeout of the body; the head wait starts after both.
        let sent = tokio::select! {
            result = &mut response => Some(result),
            _ = sent_rx => None,
        };
        let result = match sent {
            Some(result) => result,
            None => match tokio::time::timeout(self.read_timeout, &mut response).await {
                Ok(result) => result,
                Err(_) => {
                    return Err(DispatchError::UpstreamTimeout {
                        target,
                        timeout: self.read_timeout,
                    })
                }
            },
        };

        match result {
            Ok(response) => {
                tracing::debug!(upstream = %target, status = %response.status(), "Upstream responded");
                Ok(response)
            }
            Err(err) => Err(classify(target, err)),
        }
    }
}

fn classify(target: String, err: hyper_util::client::legacy::Error) -> DispatchError {
    if let Some(body_err) = find_body_error(&err) {
        return DispatchError::CallerDisconnected(body_err.to_string());
    }
    if err.is_connect() {
        return DispatchError::UpstreamUnreachable {
            target,
            source: Box::new(err),
        };
    }
    DispatchError::UpstreamProtocolError {
        target,
        reason: error_chain(&err),
    }
}

/// A failing request body surfaces inside the client error chain.
fn find_body_error<'a>(err: &'a (dyn std::error::Error + 'static)) -> Option<&'a BodyError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(body_err) = e.downcast_ref::<BodyError>() {
            return Some(body_err);
        }
        current = e.source();
    }
    None
}

fn error_chain(err: &hyper_util::client::legacy::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(e) = source {
        message.push_str(": ");
        message.push_str(&e.to_string());
        source = e.source();
    }
    message
}
