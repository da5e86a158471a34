// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Persistence seams for the engagement core.
//!
//! The durable store is an external collaborator. The core only relies on
//! document-collection primitives (find-one, find-many, insert-one,
//! update-one, delete-one, count), expressed here as typed traits so any
//! document or relational store exposing those primitives can back them.
//! In-memory implementations live next to their domain modules.

use crate::engagement::{EngageableEntity, ReactionChange, UnreactChange, VoteChange};
use crate::limiter::EndpointClass;
use crate::notify::Notification;
use crate::session::Session;
use async_trait::async_trait;
use thiserror::Error;

/// Failure of the underlying document store.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed document for key {0}")]
    Corrupt(String),
}

/// Epoch-seconds time source, injectable for tests.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> u64;
}

/// System clock implementation.
#[derive(Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Session documents keyed by opaque token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), StoreError>;

    async fn find(&self, token: &str) -> Result<Option<Session>, StoreError>;

    /// Deletes the session, returning whether one existed.
    async fn delete(&self, token: &str) -> Result<bool, StoreError>;
}

/// Engageable-entity documents (posts and polls) with their reaction slots,
/// derived counters, and poll voter sets.
///
/// The mutation methods apply the slot transition and the matching counter
/// deltas as one indivisible update per `(entity, user)` pair. An
/// implementation must not split them into a read followed by a separate
/// write; the in-memory store holds a single exclusive guard for the whole
/// transition, and a document store would express it as one conditional
/// update.
#[async_trait]
pub trait EngagementStore: Send + Sync {
    async fn put_entity(&self, entity: EngageableEntity) -> Result<(), StoreError>;

    async fn find_entity(&self, entity_id: &str) -> Result<Option<EngageableEntity>, StoreError>;

    /// Upserts the caller's reaction slot: create on first reaction, remove
    /// on repeat of the identical type, retype otherwise. Counters move in
    /// the same update.
    async fn apply_reaction(
        &self,
        entity_id: &str,
        user_id: &str,
        reaction_type: &str,
    ) -> Result<ReactionChange, StoreError>;

    /// Removes the caller's reaction slot if present, decrementing its
    /// counter in the same update.
    async fn remove_reaction(
        &self,
        entity_id: &str,
        user_id: &str,
    ) -> Result<UnreactChange, StoreError>;

    /// Moves the caller's poll membership to `option_index`, removing it
    /// from any previously chosen option in the same update. Option range
    /// and expiry are evaluated inside the update.
    async fn apply_vote(
        &self,
        poll_id: &str,
        option_index: usize,
        user_id: &str,
    ) -> Result<VoteChange, StoreError>;
}

/// Notification documents owned by their recipient.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: Notification) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError>;

    /// Flips `read` only when the notification belongs to `user_id`;
    /// returns whether anything was flipped.
    async fn mark_read(&self, notification_id: &str, user_id: &str) -> Result<bool, StoreError>;

    /// Returns the number of notifications changed.
    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError>;

    async fn count_unread(&self, user_id: &str) -> Result<u64, StoreError>;
}

/// Key of one fixed rate window.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub client_key: String,
    pub class: EndpointClass,
    pub window_start: u64,
}

/// Rate-window counters. The in-process implementation backs a single
/// deployment; a shared counter store implementing the same trait (and the
/// same key schema) backs multi-process deployments.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments the counter for `key`, returning the
    /// post-increment count.
    async fn increment(&self, key: &WindowKey) -> Result<u64, StoreError>;

    /// Drops windows that started before `horizon`.
    async fn prune(&self, horizon: u64);
}

/// Serde helper for stored timestamps.
///
/// Stored documents are not guaranteed to carry an offset; an offset-less
/// timestamp is interpreted as UTC. Serialization always writes RFC 3339.
pub mod ts_utc {
    use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_stored(&raw).map_err(serde::de::Error::custom)
    }

    fn parse_stored(raw: &str) -> Result<DateTime<Utc>, String> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|err| format!("unparseable timestamp {raw:?}: {err}"))
    }

}
