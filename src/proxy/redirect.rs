//! Redirect Follower.
//!
//! # State Machine
//! ```text
//! Initial   → Following: followable 3xx with Location, following enabled
//! Following → Following: another followable 3xx, hop budget left
//! Following → Failed:    hop budget exhausted (TooManyRedirects)
//! Initial/Following → Done: any other response, relayed to the caller
//! any       → Failed:    upstream unreachable/protocol error at a hop
//! ```
//!
//! Intermediate responses are discarded; every hop is a real request to
//! the `Location` target, never a re-selection from the pool.

use axum::http::header::{self, HeaderMap};
use axum::http::{Method, Response, StatusCode};
use hyper::body::Incoming;
use url::Url;

use crate::error::DispatchError;
use crate::proxy::body::ProxyBody;
use crate::proxy::connector::UpstreamConnector;
use crate::proxy::framing::Framing;
use crate::proxy::headers::strip_origin_bound;

/// Per-API redirect settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedirectPolicy {
    pub enabled: bool,
    pub max_hops: u32,
}

impl RedirectPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_hops: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectState {
    Initial,
    Following { hops: u32 },
    Done,
    Failed,
}

impl RedirectState {
    /// Transition after a response; `followable` means a 3xx with a usable
    /// `Location` while following is enabled.
    pub fn on_response(self, followable: bool, max_hops: u32) -> Self {
        match (self, followable) {
            (RedirectState::Done | RedirectState::Failed, _) => self,
            (_, false) => RedirectState::Done,
            (RedirectState::Initial, true) if max_hops > 0 => RedirectState::Following { hops: 1 },
            (RedirectState::Following { hops }, true) if hops < max_hops => {
                RedirectState::Following { hops: hops + 1 }
            }
            (_, true) => RedirectState::Failed,
        }
    }

    pub fn hops(&self) -> u32 {
        match self {
            RedirectState::Following { hops } => *hops,
            _ => 0,
        }
    }
}

/// The request as it leaves the gateway.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub framing: Framing,
    pub body: ProxyBody,
}

/// Final upstream response of a redirect chain.
#[derive(Debug)]
pub struct Resolved {
    pub response: Response<Incoming>,
    pub url: Url,
    pub hops: u32,
}

pub struct RedirectFollower<'a> {
    connector: &'a UpstreamConnector,
    policy: RedirectPolicy,
}

impl<'a> RedirectFollower<'a> {
    pub fn new(connector: &'a UpstreamConnector, policy: RedirectPolicy) -> Self {
        Self { connector, policy }
    }

    pub async fn resolve(&self, url: Url, request: OutboundRequest) -> Result<Resolved, DispatchError> {
        let OutboundRequest {
            mut method,
            mut headers,
            mut framing,
            body,
        } = request;
        let mut body = Some(body);
        let mut url = url;
        let mut state = RedirectState::Initial;

        loop {
            let hop_body = body.take().unwrap_or_else(ProxyBody::empty);
            let response = self
                .connector
                .forward(method.clone(), &url, &headers, framing, hop_body)
                .await?;

            let location = if self.policy.enabled {
                redirect_location(&response)
            } else {
                None
            };
            let hops = state.hops();
            state = state.on_response(location.is_some(), self.policy.max_hops);

            let location = match (state, location) {
                (RedirectState::Following { .. }, Some(location)) => location,
                (RedirectState::Failed, _) => {
                    tracing::warn!(upstream = %url, hops, max_hops = self.policy.max_hops, "Redirect limit exceeded");
                    return Err(DispatchError::TooManyRedirects {
                        max_hops: self.policy.max_hops,
                    });
                }
                _ => return Ok(Resolved { response, url, hops }),
            };

            let next = url
                .join(&location)
                .map_err(|e| DispatchError::UpstreamProtocolError {
                    target: url.to_string(),
                    reason: format!("invalid Location `{location}`: {e}"),
                })?;
            let status = response.status();
            drop(response);

            if rewrites_to_get(status, &method) {
                if method != Method::HEAD {
                    method = Method::GET;
                }
                framing = Framing::Empty;
                headers.remove(header::CONTENT_TYPE);
                headers.remove(header::CONTENT_ENCODING);
            } else if !framing.is_empty() {
                return Err(DispatchError::BodyNotReplayable {
                    method: method.to_string(),
                    location: next.to_string(),
                });
            }

            if url.origin() != next.origin() {
                strip_origin_bound(&mut headers);
            }

            tracing::debug!(status = %status, from = %url, to = %next, hop = state.hops(), "Following redirect");
            url = next;
        }
    }
}

/// `Location` of a followable redirect response, if any.
pub fn redirect_location<B>(response: &Response<B>) -> Option<String> {
    match response.status() {
        StatusCode::MOVED_PERMANENTLY
        | StatusCode::FOUND
        | StatusCode::SEE_OTHER
        | StatusCode::TEMPORARY_REDIRECT
        | StatusCode::PERMANENT_REDIRECT => response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// 303 always, and 301/302 after a POST, re-issue as a bodyless GET.
fn rewrites_to_get(status: StatusCode, method: &Method) -> bool {
    match status {
        StatusCode::SEE_OTHER => true,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => *method == Method::POST,
        _ => false,
    }
}
