// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

use super::types::{DecodeError, DecoderState, StreamChunk, MAX_RECORD_BYTES};
use crate::message::Role;

const RECORD_MARKER: &[u8] = b"data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Incremental decoder for `data: <json>` line records.
///
/// Buffers raw bytes, not text, so a multi-byte character split across two
/// chunks is decoded once both halves have arrived. Feeding the same bytes in
/// any chunking produces the same chunk sequence.
#[derive(Debug)]
pub struct StreamDecoder {
    buffer: Vec<u8>,
    state: DecoderState,
    max_record_bytes: usize,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::with_limit(MAX_RECORD_BYTES)
    }

    pub fn with_limit(max_record_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            state: DecoderState::AwaitingRecord,
            max_record_bytes,
        }
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Feed one upstream chunk and return every record it completes.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<StreamChunk>, DecodeError> {
        if self.state.is_terminal() {
            return Err(DecodeError::Terminated(self.state));
        }

        self.buffer.extend_from_slice(bytes);

        let mut chunks = Vec::new();
        let mut line_start = 0;
        while let Some(offset) = self.buffer[line_start..].iter().position(|&b| b == b'\n') {
            let line_end = line_start + offset;
            if let Some(chunk) = decode_line(&self.buffer[line_start..line_end]) {
                chunks.push(chunk);
            }
            line_start = line_end + 1;
        }
        self.buffer.drain(..line_start);

        if self.buffer.len() > self.max_record_bytes {
            self.fail();
            return Err(DecodeError::RecordTooLarge {
                limit: self.max_record_bytes,
            });
        }

        self.state = if !self.buffer.is_empty() {
            DecoderState::HavePartialLine
        } else if !chunks.is_empty() {
            DecoderState::HaveRecord
        } else {
            DecoderState::AwaitingRecord
        };
        Ok(chunks)
    }

    /// Input closed: process a final record that lacked its newline.
    pub fn finish(&mut self) -> Result<Option<StreamChunk>, DecodeError> {
        if self.state.is_terminal() {
            return Err(DecodeError::Terminated(self.state));
        }
        let residual = std::mem::take(&mut self.buffer);
        self.state = DecoderState::Ended;
        Ok(decode_line(&residual))
    }

    /// Upstream failed. Drops any buffered bytes.
    pub fn fail(&mut self) {
        self.buffer.clear();
        self.state = DecoderState::Errored;
    }
}

/// Decode one line. Anything that is not a well-formed record yields `None`.
fn decode_line(line: &[u8]) -> Option<StreamChunk> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let payload = line.strip_prefix(RECORD_MARKER)?;
    let payload = std::str::from_utf8(payload).ok()?.trim();
    if payload.is_empty() || payload == DONE_SENTINEL {
        return None;
    }

    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let record = value.as_object()?;

    let delta = record
        .get("delta")
        .and_then(|d| d.as_str())
        .filter(|d| !d.is_empty())
        .map(str::to_string);
    let role = record
        .get("role")
        .and_then(|r| r.as_str())
        .map(|r| Role::from_provider(Some(r)));

    if delta.is_none() && role.is_none() {
        return None;
    }
    Some(StreamChunk { role, delta })
}
