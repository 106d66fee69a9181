//! Streaming body model.
//!
//! A [`ProxyBody`] is a lazy, single-pass, finite sequence of byte chunks
//! with an optional declared total length. It is never rewound: once a
//! chunk has been pulled it belongs to whoever pulled it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::Poll;
use std::time::Duration;

use axum::body::{Body, Bytes, HttpBody};
use futures_util::stream::{self, BoxStream};
use futures_util::{future, Stream, StreamExt, TryStreamExt};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::error::BoxError;
use crate::proxy::framing::Framing;

/// Failure while pulling body chunks.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("Body read failed: {0}")]
    Read(#[source] BoxError),
    #[error("No body bytes received within {0:?}")]
    Stalled(Duration),
}

/// A lazily produced message body.
pub struct ProxyBody {
    chunks: BoxStream<'static, Result<Bytes, BodyError>>,
    declared_len: Option<u64>,
}

impl ProxyBody {
    /// A body known to be empty.
    pub fn empty() -> Self {
        Self {
            chunks: stream::empty().boxed(),
            declared_len: Some(0),
        }
    }

    /// An in-memory body; its length is declared.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        let declared_len = Some(bytes.len() as u64);
        let chunk = (!bytes.is_empty()).then_some(Ok(bytes));
        Self {
            chunks: stream::iter(chunk).boxed(),
            declared_len,
        }
    }

    /// Wrap an arbitrary chunk stream.
    pub fn from_stream<S, E>(chunks: S, declared_len: Option<u64>) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            chunks: chunks.map_err(|e| BodyError::Read(e.into())).boxed(),
            declared_len,
        }
    }

    /// Wrap an HTTP body; the length is declared when its size hint is exact.
    pub fn from_http<B>(body: B) -> Self
    where
        B: HttpBody<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let declared_len = body.size_hint().exact();
        Self::from_stream(Body::new(body).into_data_stream(), declared_len)
    }

    pub fn declared_len(&self) -> Option<u64> {
        self.declared_len
    }

    /// Fail with [`BodyError::Stalled`] when no chunk arrives within `timeout`.
    pub fn with_read_timeout(self, timeout: Duration) -> Self {
        let chunks = stream::unfold(Some(self.chunks), move |state| async move {
            let mut chunks = state?;
            match tokio::time::timeout(timeout, chunks.next()).await {
                Ok(Some(item)) => Some((item, Some(chunks))),
                Ok(None) => None,
                Err(_) => Some((Err(BodyError::Stalled(timeout)), None)),
            }
        });
        Self {
            chunks: chunks.boxed(),
            declared_len: self.declared_len,
        }
    }

    /// Add the size of every chunk pulled through this body to `counter`.
    pub fn counted(self, counter: Arc<AtomicU64>) -> Self {
        let chunks = self.chunks.inspect_ok(move |bytes| {
            counter.fetch_add(bytes.len() as u64, Ordering::Relaxed);
        });
        Self {
            chunks: chunks.boxed(),
            declared_len: self.declared_len,
        }
    }

    /// Signal `done` once the last chunk has been pulled. Dropping the body
    /// early drops the sender, which the receiver also observes.
    pub fn notify_end(self, done: oneshot::Sender<()>) -> Self {
        let mut done = Some(done);
        let tail = stream::poll_fn(move |_| -> Poll<Option<Result<Bytes, BodyError>>> {
            if let Some(tx) = done.take() {
                let _ = tx.send(());
            }
            Poll::Ready(None)
        });
        Self {
            chunks: self.chunks.chain(tail).boxed(),
            declared_len: self.declared_len,
        }
    }

    /// Decide the framing for this body.
    ///
    /// A declared length is authoritative. Without one, the first non-empty
    /// chunk is pulled ahead: a stream that ends before yielding data is
    /// known-empty, anything else is chunked. The pulled chunk stays at the
    /// head of the returned body.
    pub async fn prepare(self) -> Result<(Framing, ProxyBody), BodyError> {
        match self.declared_len {
            Some(0) => Ok((Framing::Empty, ProxyBody::empty())),
            Some(len) => Ok((Framing::Length(len), self)),
            None => {
                let mut chunks = self.chunks;
                loop {
                    match chunks.next().await {
                        None => return Ok((Framing::Empty, ProxyBody::empty())),
                        Some(Err(err)) => return Err(err),
                        Some(Ok(bytes)) if bytes.is_empty() => continue,
                        Some(Ok(first)) => {
                            let chunks = stream::once(future::ready(Ok(first))).chain(chunks);
                            let body = ProxyBody {
                                chunks: chunks.boxed(),
                                declared_len: None,
                            };
                            return Ok((Framing::Chunked, body));
                        }
                    }
                }
            }
        }
    }

    pub fn into_chunks(self) -> BoxStream<'static, Result<Bytes, BodyError>> {
        self.chunks
    }

    /// Convert into an Axum/hyper body.
    pub fn into_body(self) -> Body {
        if self.declared_len == Some(0) {
            Body::empty()
        } else {
            Body::from_stream(self.chunks)
        }
    }
}

impl std::fmt::Debug for ProxyBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyBody")
            .field("declared_len", &self.declared_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(body: ProxyBody) -> Vec<u8> {
        let chunks: Vec<Bytes> = body.into_chunks().try_collect().await.unwrap();
        chunks.concat()
    }

    fn chunked(parts: &[&'static str]) -> ProxyBody {
        let items: Vec<Result<Bytes, BoxError>> =
            parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect();
        ProxyBody::from_stream(stream::iter(items), None)
    }

    #[tokio::test]
    async fn test_declared_length_wins() {
        let (framing, body) = ProxyBody::from_bytes("hello").prepare().await.unwrap();
        assert_eq!(framing, Framing::Length(5));
        assert_eq!(collect(body).await, b"hello");
    }

    #[tokio::test]
    async fn test_declared_zero_is_empty() {
        let (framing, body) = ProxyBody::from_bytes(Bytes::new()).prepare().await.unwrap();
        assert_eq!(framing, Framing::Empty);
        assert_eq!(body.declared_len(), Some(0));
    }

    #[tokio::test]
    async fn test_unknown_length_that_ends_immediately_is_empty() {
        let (framing, _) = chunked(&[]).prepare().await.unwrap();
        assert_eq!(framing, Framing::Empty);

        let (framing, _) = chunked(&["", ""]).prepare().await.unwrap();
        assert_eq!(framing, Framing::Empty);
    }

    #[tokio::test]
    async fn test_unknown_length_is_chunked_and_keeps_first_chunk() {
        let (framing, body) = chunked(&["", "ab", "cd", "e"]).prepare().await.unwrap();
        assert_eq!(framing, Framing::Chunked);
        assert_eq!(collect(body).await, b"abcde");
    }

    #[tokio::test]
    async fn test_counted() {
        let counter = Arc::new(AtomicU64::new(0));
        let body = chunked(&["abc", "defg"]).counted(counter.clone());
        let (_, body) = body.prepare().await.unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 3);
        collect(body).await;
        assert_eq!(counter.load(Ordering::Relaxed), 7);
    }

    #[tokio::test]
    async fn test_read_timeout_stalls() {
        let stalled = stream::once(future::ready(Ok::<_, BoxError>(Bytes::from_static(b"x"))))
            .chain(stream::pending());
        let body = ProxyBody::from_stream(stalled, None).with_read_timeout(Duration::from_millis(20));
        let mut chunks = body.into_chunks();

        assert_eq!(chunks.next().await.unwrap().unwrap(), Bytes::from_static(b"x"));
        assert!(matches!(chunks.next().await, Some(Err(BodyError::Stalled(_)))));
        assert!(chunks.next().await.is_none());
    }

    #[tokio::test]
    async fn test_notify_end_fires_after_last_chunk() {
        let (tx, mut rx) = oneshot::channel();
        let mut chunks = chunked(&["ab", "c"]).notify_end(tx).into_chunks();

        chunks.next().await.unwrap().unwrap();
        chunks.next().await.unwrap().unwrap();
        assert!(rx.try_recv().is_err());
        assert!(chunks.next().await.is_none());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_notify_end_resolves_when_dropped() {
        let (tx, rx) = oneshot::channel();
        let body = chunked(&["ab"]).notify_end(tx);
        drop(body);
        assert!(rx.await.is_err());
    }

    #[tokio::test]
    async fn test_read_error_surfaces() {
        let failing = stream::iter(vec![Err::<Bytes, BoxError>("boom".into())]);
        let err = ProxyBody::from_stream(failing, None).prepare().await.unwrap_err();
        assert!(matches!(err, BodyError::Read(_)));
    }
}
