// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Notification fan-out.
//!
//! A durable notification record is created whenever an engagement or
//! social event targets a user. Creation is best-effort relative to the
//! triggering action: a persistence failure is logged and swallowed, never
//! propagated. Records are immutable except for the `read` flag.

use crate::config::NotificationConfig;
use crate::error::CoreError;
use crate::store::{ts_utc, NotificationStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

/// Event category a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reaction,
    Mention,
    Follow,
    Message,
    Sale,
}

/// A durable notification owned by its recipient.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub notification_id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub content: String,
    pub related_id: Option<String>,
    pub read: bool,
    #[serde(with = "ts_utc")]
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        content: impl Into<String>,
        related_id: Option<String>,
    ) -> Self {
        Self {
            notification_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind,
            content: content.into(),
            related_id,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Creates and queries notification records.
#[derive(Clone)]
pub struct Notifier {
    store: Arc<dyn NotificationStore>,
    config: NotificationConfig,
}

impl Notifier {
    pub fn new(store: Arc<dyn NotificationStore>, config: NotificationConfig) -> Self {
        Self { store, config }
    }

    /// Create a notification for `recipient`. Best-effort: returns the
    /// record when persisted, `None` when the store failed (logged).
    pub async fn notify(
        &self,
        recipient: &str,
        kind: NotificationKind,
        content: &str,
        related_id: Option<&str>,
    ) -> Option<Notification> {
        let notification =
            Notification::new(recipient, kind, content, related_id.map(String::from));
        match self.store.insert(notification.clone()).await {
            Ok(()) => Some(notification),
            Err(err) => {
                error!(
                    recipient = %recipient,
                    kind = ?kind,
                    error = %err,
                    "failed to persist notification"
                );
                None
            }
        }
    }

    /// Fan out an event from `actor` to `recipient`, suppressing
    /// self-notification.
    pub async fn fan_out(
        &self,
        actor: &str,
        recipient: &str,
        kind: NotificationKind,
        content: &str,
        related_id: Option<&str>,
    ) -> Option<Notification> {
        if actor == recipient {
            debug!(user_id = %actor, kind = ?kind, "self-notification suppressed");
            return None;
        }
        self.notify(recipient, kind, content, related_id).await
    }

    /// Page through a user's notifications, newest first. `limit` is
    /// clamped to [1, max_page_size].
    pub async fn list_for_user(
        &self,
        user_id: &str,
        skip: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>, CoreError> {
        let limit = limit
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size);
        Ok(self.store.list_for_user(user_id, skip, limit).await?)
    }

    /// Flip `read` on one notification. `false` means not found, which
    /// includes notifications owned by someone else.
    pub async fn mark_read(&self, notification_id: &str, user_id: &str) -> Result<bool, CoreError> {
        Ok(self.store.mark_read(notification_id, user_id).await?)
    }

    /// Returns the number of notifications changed.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64, CoreError> {
        Ok(self.store.mark_all_read(user_id).await?)
    }

    pub async fn count_unread(&self, user_id: &str) -> Result<u64, CoreError> {
        Ok(self.store.count_unread(user_id).await?)
    }
}

/// In-memory notification store, per-recipient insertion order.
#[derive(Default)]
pub struct MemNotificationStore {
    by_user: RwLock<HashMap<String, Vec<Notification>>>,
}

impl MemNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NotificationStore for MemNotificationStore {
    async fn insert(&self, notification: Notification) -> Result<(), StoreError> {
        self.by_user
            .write()
            .await
            .entry(notification.user_id.clone())
            .or_default()
            .push(notification);
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Notification>, StoreError> {
        let by_user = self.by_user.read().await;
        let page = by_user
            .get(user_id)
            .map(|rows| {
                rows.iter()
                    .rev()
                    .skip(skip)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(page)
    }

    async fn mark_read(&self, notification_id: &str, user_id: &str) -> Result<bool, StoreError> {
        let mut by_user = self.by_user.write().await;
        let Some(rows) = by_user.get_mut(user_id) else {
            return Ok(false);
        };
        match rows
            .iter_mut()
            .find(|n| n.notification_id == notification_id)
        {
            Some(notification) => {
                notification.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: &str) -> Result<u64, StoreError> {
        let mut by_user = self.by_user.write().await;
        let Some(rows) = by_user.get_mut(user_id) else {
            return Ok(0);
        };
        let mut changed = 0;
        for notification in rows.iter_mut().filter(|n| !n.read) {
            notification.read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn count_unread(&self, user_id: &str) -> Result<u64, StoreError> {
        let by_user = self.by_user.read().await;
        Ok(by_user
            .get(user_id)
            .map(|rows| rows.iter().filter(|n| !n.read).count() as u64)
            .unwrap_or(0))
    }
}
