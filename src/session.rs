// Copyright 2026 The Chatgate Project
// SPDX-License-Identifier: Apache-2.0

// Local conversation bookkeeping
//
// The provider owns the transcript; this store only remembers which caller
// a conversation id belongs to, its phase and a turn counter. Entries expire
// after an idle TTL and are swept by the service binary.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::message::{id_prefix, CallerId};

// ---------------------------------------------------------------------------
// Session state types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Created, no message sent yet.
    Created,
    /// At least one successful send.
    Active,
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub conversation_id: String,
    pub owner: CallerId,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Successful sends on this conversation.
    pub turn_count: u64,
}

impl SessionState {
    pub fn new(conversation_id: impl Into<String>, owner: CallerId) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            owner,
            phase: SessionPhase::Created,
            created_at: now,
            last_seen: now,
            turn_count: 0,
        }
    }

    pub fn is_owned_by(&self, caller: &CallerId) -> bool {
        &self.owner == caller
    }

    /// Mark a completed send.
    pub fn record_turn(&mut self) {
        self.phase = SessionPhase::Active;
        self.turn_count += 1;
        self.last_seen = Utc::now();
    }

    fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.last_seen)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// A conversation id is already held by another caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("conversation belongs to another caller")]
pub struct OwnershipConflict;

// ---------------------------------------------------------------------------
// SessionStore trait
// ---------------------------------------------------------------------------

/// Conversation ownership store. Shared across handlers via `Arc`.
pub trait SessionStore: Send + Sync {
    /// Session for `conversation_id`, or `None` if unknown or expired.
    fn get(&self, conversation_id: &str) -> Option<SessionState>;

    /// Insert or replace a session.
    fn update(&self, state: SessionState);

    /// Resolve ownership in one step: an unknown id is registered to
    /// `caller`, a known id must already belong to `caller`.
    fn claim(
        &self,
        conversation_id: &str,
        caller: &CallerId,
    ) -> Result<SessionState, OwnershipConflict>;

    /// Record a successful send. No-op for unknown ids.
    fn record_turn(&self, conversation_id: &str);

    /// Drop sessions idle longer than `max_age`.
    fn cleanup(&self, max_age: Duration);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// InMemorySessionStore
// ---------------------------------------------------------------------------

/// `DashMap`-backed store for single-instance deployments.
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionState>,
    ttl: Duration,
}

impl InMemorySessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get(&self, conversation_id: &str) -> Option<SessionState> {
        let entry = self.sessions.get(conversation_id)?;
        if entry.value().idle_for(Utc::now()) > self.ttl {
            drop(entry); // release the read guard before removing
            self.sessions.remove(conversation_id);
            return None;
        }
        Some(entry.value().clone())
    }

    fn update(&self, state: SessionState) {
        self.sessions.insert(state.conversation_id.clone(), state);
    }

    fn claim(
        &self,
        conversation_id: &str,
        caller: &CallerId,
    ) -> Result<SessionState, OwnershipConflict> {
        let now = Utc::now();
        match self.sessions.entry(conversation_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let state = occupied.get_mut();
                if state.idle_for(now) > self.ttl {
                    *state = SessionState::new(conversation_id, caller.clone());
                    return Ok(state.clone());
                }
                if !state.is_owned_by(caller) {
                    tracing::warn!(
                        conversation = %id_prefix(conversation_id),
                        "conversation used by a caller that does not own it"
                    );
                    return Err(OwnershipConflict);
                }
                state.last_seen = now;
                Ok(state.clone())
            }
            Entry::Vacant(vacant) => {
                tracing::debug!(
                    conversation = %id_prefix(conversation_id),
                    "claiming unknown conversation for caller"
                );
                let state = SessionState::new(conversation_id, caller.clone());
                vacant.insert(state.clone());
                Ok(state)
            }
        }
    }

    fn record_turn(&self, conversation_id: &str) {
        if let Some(mut entry) = self.sessions.get_mut(conversation_id) {
            entry.value_mut().record_turn();
        }
    }

    fn cleanup(&self, max_age: Duration) {
        let now = Utc::now();
        self.sessions
            .retain(|_, state| state.idle_for(now) <= max_age);
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
