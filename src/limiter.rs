// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Fixed-window admission control.
//!
//! The timeline is divided into non-overlapping windows of fixed length
//! aligned to epoch time. A counter keyed by
//! (client key, endpoint class, window start) is incremented on every
//! admission attempt; exceeding the class quota rejects the request with
//! the remaining window time as a retry hint.
//!
//! Known limitation: a client can land up to 2x its quota across a window
//! boundary. This is the accepted cost of O(1) memory and computation per
//! key versus a sliding window.

use crate::config::RateLimitConfig;
use crate::store::{CounterStore, StoreError, TimeSource, WindowKey};
use async_trait::async_trait;
use axum::http::Method;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

/// Endpoint category governing which quota applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointClass {
    Auth,
    MediaUpload,
    Messaging,
    ReadOnly,
    General,
}

impl EndpointClass {
    /// Static request-to-class mapping.
    pub fn classify(method: &Method, path: &str) -> Self {
        if path.starts_with("/sessions") {
            Self::Auth
        } else if path.starts_with("/media") {
            Self::MediaUpload
        } else if path.starts_with("/messages") {
            Self::Messaging
        } else if method == Method::GET {
            Self::ReadOnly
        } else {
            Self::General
        }
    }

    /// Counter-store failure degrades closed only for security-sensitive
    /// classes.
    pub fn fails_closed(self) -> bool {
        matches!(self, Self::Auth)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::MediaUpload => "media_upload",
            Self::Messaging => "messaging",
            Self::ReadOnly => "read_only",
            Self::General => "general",
        }
    }
}

impl fmt::Display for EndpointClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of an admission attempt.
#[derive(Debug, Clone)]
pub enum Admission {
    /// Request is allowed
    Admitted {
        /// Remaining requests in the current window
        remaining: u32,
    },
    /// Request is over quota
    Rejected {
        /// Time until the current window ends
        retry_after: Duration,
    },
}

/// Fixed-window admission controller over a pluggable counter store.
pub struct AdmissionController {
    counters: Arc<dyn CounterStore>,
    clock: Arc<dyn TimeSource>,
    config: RateLimitConfig,
}

impl AdmissionController {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        clock: Arc<dyn TimeSource>,
        config: RateLimitConfig,
    ) -> Self {
        Self {
            counters,
            clock,
            config,
        }
    }

    /// Admit or reject one request from `client_key` against `class`.
    pub async fn admit(&self, client_key: &str, class: EndpointClass) -> Admission {
        let now = self.clock.now();
        let window = self.config.window_secs.max(1);
        let window_start = now - (now % window);
        let retry_after = Duration::from_secs(window_start + window - now);

        let key = WindowKey {
            client_key: client_key.to_string(),
            class,
            window_start,
        };
        let quota = u64::from(self.config.quota(class));

        match self.counters.increment(&key).await {
            Ok(count) if count <= quota => Admission::Admitted {
                remaining: (quota - count) as u32,
            },
            Ok(count) => {
                debug!(
                    client_key = %client_key,
                    class = %class,
                    count,
                    quota,
                    retry_after_secs = retry_after.as_secs(),
                    "request over quota"
                );
                Admission::Rejected { retry_after }
            }
            Err(err) => {
                error!(
                    client_key = %client_key,
                    class = %class,
                    error = %err,
                    "counter store unavailable"
                );
                if class.fails_closed() {
                    Admission::Rejected { retry_after }
                } else {
                    Admission::Admitted { remaining: 0 }
                }
            }
        }
    }

    /// Drop windows that ended before the current one (call periodically).
    pub async fn prune_stale(&self) {
        let now = self.clock.now();
        let window = self.config.window_secs.max(1);
        self.counters.prune(now - (now % window)).await;
    }
}

/// In-process counter store over per-key atomic increments.
#[derive(Default)]
pub struct MemCounterStore {
    windows: DashMap<WindowKey, u64>,
}

impl MemCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked windows.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl CounterStore for MemCounterStore {
    async fn increment(&self, key: &WindowKey) -> Result<u64, StoreError> {
        let mut entry = self.windows.entry(key.clone()).or_insert(0);
        *entry += 1;
        Ok(*entry)
    }

    async fn prune(&self, horizon: u64) {
        self.windows.retain(|key, _| key.window_start >= horizon);
    }
}
