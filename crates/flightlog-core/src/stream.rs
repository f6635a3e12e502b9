// ── Record streams ──
//
// Subscription types for the always-on publish channel. Every translated
// entry and chunk is broadcast here, whether or not a goal claims it.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::model::LogRecord;

/// A subscription to published log records.
///
/// A subscriber that falls more than the channel capacity behind skips the
/// oldest records; a warning is logged with the number skipped.
pub struct RecordStream {
    receiver: broadcast::Receiver<LogRecord>,
}

impl RecordStream {
    pub(crate) fn new(receiver: broadcast::Receiver<LogRecord>) -> Self {
        Self { receiver }
    }

    /// Next record. `None` once the publisher has shut down.
    pub async fn recv(&mut self) -> Option<LogRecord> {
        loop {
            match self.receiver.recv().await {
                Ok(record) => return Some(record),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "record subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> RecordWatchStream {
        RecordWatchStream {
            inner: BroadcastStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `broadcast::Receiver`.
pub struct RecordWatchStream {
    inner: BroadcastStream<LogRecord>,
}

impl Stream for RecordWatchStream {
    type Item = LogRecord;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(record))) => return Poll::Ready(Some(record)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(skipped, "record stream lagged");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
