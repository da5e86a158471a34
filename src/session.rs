// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Session store and access guard.
//!
//! Sessions are opaque tokens with a UTC expiry. Resolution is soft: a
//! missing, unknown, or expired token yields `Unauthenticated`, and a store
//! fault is logged and collapsed to `Unauthenticated` rather than failing
//! the caller's request path. `require_auth` is the hard gate protected
//! operations pass.

use crate::error::CoreError;
use crate::store::{ts_utc, SessionStore, StoreError};
use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error};
use uuid::Uuid;

/// A time-bounded proof of identity keyed by an opaque token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    #[serde(with = "ts_utc")]
    pub issued_at: DateTime<Utc>,
    #[serde(with = "ts_utc")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Issue a new session expiring `ttl` from now.
    pub fn new(user_id: impl Into<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        // An oversized ttl yields an already-expired session.
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            token: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            issued_at: now,
            expires_at: now + ttl,
        }
    }

    /// A session is valid iff `now < expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Authenticated identity resolved from a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: String,
}

/// Outcome of a token lookup, fault kept distinct from absence.
#[derive(Debug)]
pub enum Resolution {
    Authenticated(Identity),
    Unauthenticated,
    StoreFault(StoreError),
}

/// Outcome of soft resolution, as callers that tolerate anonymous access
/// see it.
#[derive(Debug)]
pub enum AuthState {
    Authenticated(Identity),
    Unauthenticated,
}

/// Extract the bearer token from request headers, stripping the literal
/// `"Bearer "` prefix.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolves bearer tokens to identities and issues/invalidates sessions.
#[derive(Clone)]
pub struct AccessGuard {
    store: Arc<dyn SessionStore>,
}

impl AccessGuard {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Look up a token, keeping store faults distinct from absence.
    pub async fn lookup(&self, token: Option<&str>) -> Resolution {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Resolution::Unauthenticated;
        };

        match self.store.find(token).await {
            Ok(Some(session)) if session.is_valid_at(Utc::now()) => {
                Resolution::Authenticated(Identity {
                    user_id: session.user_id,
                })
            }
            Ok(Some(session)) => {
                debug!(user_id = %session.user_id, expired_at = %session.expires_at, "session expired");
                Resolution::Unauthenticated
            }
            Ok(None) => Resolution::Unauthenticated,
            Err(err) => Resolution::StoreFault(err),
        }
    }

    /// Soft resolution: never errors. A lookup fault is logged and treated
    /// as absent auth, never as success.
    pub async fn resolve(&self, token: Option<&str>) -> AuthState {
        match self.lookup(token).await {
            Resolution::Authenticated(identity) => AuthState::Authenticated(identity),
            Resolution::Unauthenticated => AuthState::Unauthenticated,
            Resolution::StoreFault(err) => {
                error!(error = %err, "session lookup failed, treating caller as unauthenticated");
                AuthState::Unauthenticated
            }
        }
    }

    /// Hard gate for protected operations.
    pub async fn require_auth(&self, token: Option<&str>) -> Result<Identity, CoreError> {
        match self.resolve(token).await {
            AuthState::Authenticated(identity) => Ok(identity),
            AuthState::Unauthenticated => Err(CoreError::Unauthorized),
        }
    }

    /// Issue and persist a new session.
    pub async fn create_session(&self, user_id: &str, ttl: Duration) -> Result<Session, CoreError> {
        let session = Session::new(user_id, ttl);
        self.store.insert(session.clone()).await?;
        debug!(user_id = %user_id, ttl_secs = ttl.as_secs(), "session issued");
        Ok(session)
    }

    /// Logically destroy a session; returns whether one existed.
    pub async fn invalidate(&self, token: Option<&str>) -> Result<bool, CoreError> {
        match token {
            Some(token) if !token.is_empty() => Ok(self.store.delete(token).await?),
            _ => Ok(false),
        }
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct MemSessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl MemSessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemSessionStore {
    async fn insert(&self, session: Session) -> Result<(), StoreError> {
        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session);
        Ok(())
    }

    async fn find(&self, token: &str) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().await.get(token).cloned())
    }

    async fn delete(&self, token: &str) -> Result<bool, StoreError> {
        Ok(self.sessions.write().await.remove(token).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guard() -> (AccessGuard, Arc<MemSessionStore>) {
        let store = Arc::new(MemSessionStore::new());
        (AccessGuard::new(store.clone()), store)
    }

    #[tokio::test]
    async fn created_session_resolves() {
        let (guard, _) = guard();
        let session = guard
            .create_session("alice", Duration::from_secs(60))
            .await
            .unwrap();

        match guard.resolve(Some(&session.token)).await {
            AuthState::Authenticated(identity) => assert_eq!(identity.user_id, "alice"),
            AuthState::Unauthenticated => panic!("fresh session should authenticate"),
        }
    }

    #[tokio::test]
    async fn expired_session_is_unauthenticated() {
        let (guard, store) = guard();
        let mut session = Session::new("alice", Duration::from_secs(60));
        session.expires_at = Utc::now() - chrono::Duration::seconds(1);
        store.insert(session.clone()).await.unwrap();

        assert!(matches!(
            guard.resolve(Some(&session.token)).await,
            AuthState::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn unknown_and_missing_tokens_are_unauthenticated() {
        let (guard, _) = guard();
        assert!(matches!(
            guard.resolve(Some("no-such-token")).await,
            AuthState::Unauthenticated
        ));
        assert!(matches!(
            guard.resolve(None).await,
            AuthState::Unauthenticated
        ));
        assert!(guard.require_auth(None).await.is_err());
    }

    #[tokio::test]
    async fn invalidate_reports_existence() {
        let (guard, _) = guard();
        let session = guard
            .create_session("alice", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(guard.invalidate(Some(&session.token)).await.unwrap());
        assert!(!guard.invalidate(Some(&session.token)).await.unwrap());
        assert!(matches!(
            guard.resolve(Some(&session.token)).await,
            AuthState::Unauthenticated
        ));
    }

    #[tokio::test]
    async fn stored_naive_expiry_reads_as_utc() {
        let (guard, store) = guard();

        // A document written without an offset still expires on the UTC
        // timeline.
        let session: Session = serde_json::from_str(
            r#"{
                "token": "t-naive",
                "user_id": "alice",
                "issued_at": "2020-01-01T00:00:00",
                "expires_at": "2020-01-01T00:00:01"
            }"#,
        )
        .unwrap();
        store.insert(session).await.unwrap();

        assert!(matches!(
            guard.resolve(Some("t-naive")).await,
            AuthState::Unauthenticated
        ));

        let future: Session = serde_json::from_str(
            r#"{
                "token": "t-future",
                "user_id": "alice",
                "issued_at": "2020-01-01T00:00:00",
                "expires_at": "2999-01-01T00:00:00"
            }"#,
        )
        .unwrap();
        store.insert(future).await.unwrap();

        assert!(matches!(
            guard.resolve(Some("t-future")).await,
            AuthState::Authenticated(_)
        ));
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));

        let mut bare = HeaderMap::new();
        bare.insert(header::AUTHORIZATION, "abc123".parse().unwrap());
        assert_eq!(bearer_token(&bare), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
