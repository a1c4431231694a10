// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

use futures_util::stream::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::decoder::StreamDecoder;
use super::types::{StreamChunk, StreamError};
use crate::transport::TransportError;

/// Decode an upstream byte stream on a spawned task.
///
/// Chunks are delivered through a channel of `capacity` slots, so decoding
/// never runs ahead of the consumer by more than that. The first error is
/// delivered as the last item. Dropping the returned stream stops the task
/// and drops `input`, which releases the upstream connection.
pub fn decode_stream<S>(
    input: S,
    capacity: usize,
) -> ReceiverStream<Result<StreamChunk, StreamError>>
where
    S: Stream<Item = Result<bytes::Bytes, TransportError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        let mut input = Box::pin(input);
        let mut decoder = StreamDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = tx.closed() => {
                    tracing::debug!("stream consumer dropped; releasing upstream");
                    return;
                }
                next = input.next() => next,
            };

            let bytes = match next {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    decoder.fail();
                    let _ = tx.send(Err(StreamError::Transport(e))).await;
                    return;
                }
                None => break,
            };

            match decoder.feed(&bytes) {
                Ok(chunks) => {
                    for chunk in chunks {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(StreamError::Decode(e))).await;
                    return;
                }
            }
        }

        match decoder.finish() {
            Ok(Some(chunk)) => {
                let _ = tx.send(Ok(chunk)).await;
            }
            Ok(None) => {}
            Err(e) => {
                let _ = tx.send(Err(StreamError::Decode(e))).await;
            }
        }
    });

    ReceiverStream::new(rx)
}
