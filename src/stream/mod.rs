// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// Provider event-stream decoding
//
// Responsibilities:
// - Reassemble `data:` records from arbitrarily split byte chunks
// - Keep split multi-byte UTF-8 sequences intact across chunk boundaries
// - Skip malformed records and `[DONE]` sentinels without failing the stream
// - Memory-bounded: 1 MiB max per unterminated record
// - Pump decoded chunks through a bounded channel; stop reading upstream as
//   soon as the consumer goes away

mod decoder;
mod pump;
mod types;

pub use decoder::StreamDecoder;
pub use pump::decode_stream;
pub use types::{DecodeError, DecoderState, StreamChunk, StreamError, MAX_RECORD_BYTES};
