// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

use crate::message::Role;
use crate::transport::TransportError;

/// Maximum bytes buffered for a single record still waiting for its newline.
pub const MAX_RECORD_BYTES: usize = 1024 * 1024;

/// One decoded provider record. Lives only for the duration of a `send`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamChunk {
    /// Role announced by the record, if any.
    pub role: Option<Role>,
    /// Non-empty text fragment, if any.
    pub delta: Option<String>,
}

impl StreamChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            role: None,
            delta: Some(text.into()),
        }
    }
}

/// Decoder position in the record grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Buffer empty, next byte starts a new line.
    AwaitingRecord,
    /// Bytes of an unterminated line are buffered.
    HavePartialLine,
    /// The last feed produced at least one record and left nothing buffered.
    HaveRecord,
    /// Input closed; residual line flushed.
    Ended,
    /// Upstream or decode failure. Terminal.
    Errored,
}

impl DecoderState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DecoderState::Ended | DecoderState::Errored)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("stream record exceeds {limit} bytes without a line terminator")]
    RecordTooLarge { limit: usize },
    #[error("decoder fed after reaching terminal state {0:?}")]
    Terminated(DecoderState),
}

/// Failure surfaced by the decode pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
