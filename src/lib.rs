// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

pub mod config;
pub mod error;
pub mod filter;
pub mod gateway;
pub mod message;
pub mod proxy;
pub mod session;
pub mod stream;
pub mod transport;
