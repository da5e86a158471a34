// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the engagement core.

use async_trait::async_trait;
use chrono::Utc;
use engagement_core::{
    config::{NotificationConfig, RateLimitConfig},
    store::{CounterStore, SessionStore, StoreError, TimeSource, WindowKey},
    AccessGuard, Admission, AdmissionController, AuthState, CoreError, EndpointClass,
    EngageableEntity, EngagementLedger, MemCounterStore, MemEngagementStore, MemNotificationStore,
    MemSessionStore, Notifier, ReactionResult, Session,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct ManualClock(AtomicU64);

impl ManualClock {
    fn at(secs: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(secs)))
    }

    fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::Relaxed);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn insert(&self, _session: Session) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("injected".to_string()))
    }

    async fn find(&self, _token: &str) -> Result<Option<Session>, StoreError> {
        Err(StoreError::Unavailable("injected".to_string()))
    }

    async fn delete(&self, _token: &str) -> Result<bool, StoreError> {
        Err(StoreError::Unavailable("injected".to_string()))
    }
}

fn core() -> (AccessGuard, EngagementLedger, Notifier, Arc<MemSessionStore>) {
    let sessions = Arc::new(MemSessionStore::new());
    let guard = AccessGuard::new(sessions.clone());
    let notifier = Notifier::new(
        Arc::new(MemNotificationStore::new()),
        NotificationConfig::default(),
    );
    let ledger = EngagementLedger::new(Arc::new(MemEngagementStore::new()), notifier.clone());
    (guard, ledger, notifier, sessions)
}

#[tokio::test]
async fn full_engagement_flow() {
    let (guard, ledger, notifier, _) = core();

    // Alice owns a post; Bob logs in and engages with it.
    ledger
        .put_entity(EngageableEntity::new_post("post_1", "alice"))
        .await
        .unwrap();
    let session = guard
        .create_session("bob", Duration::from_secs(3600))
        .await
        .unwrap();
    let identity = match guard.resolve(Some(&session.token)).await {
        AuthState::Authenticated(identity) => identity,
        AuthState::Unauthenticated => panic!("fresh session should authenticate"),
    };

    let outcome = ledger
        .react("post_1", &identity.user_id, "like")
        .await
        .unwrap();
    assert!(matches!(outcome, ReactionResult::Added { .. }));

    let summary = ledger
        .reactions("post_1", Some(&identity.user_id))
        .await
        .unwrap();
    assert_eq!(summary.counts.get("like"), Some(&1));
    assert_eq!(summary.own.as_deref(), Some("like"));

    // The fan-out reached the post owner, and only the post owner.
    assert_eq!(notifier.count_unread("alice").await.unwrap(), 1);
    assert_eq!(notifier.count_unread("bob").await.unwrap(), 0);
    let page = notifier.list_for_user("alice", 0, None).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].related_id.as_deref(), Some("post_1"));

    // Logout closes the gate.
    assert!(guard.invalidate(Some(&session.token)).await.unwrap());
    assert!(matches!(
        guard.require_auth(Some(&session.token)).await,
        Err(CoreError::Unauthorized)
    ));
}

#[tokio::test]
async fn toggle_and_switch_scenarios() {
    let (_, ledger, _, _) = core();
    ledger
        .put_entity(EngageableEntity::new_post("post_1", "owner"))
        .await
        .unwrap();

    // react twice with the same type: toggle-off
    ledger.react("post_1", "alice", "like").await.unwrap();
    let summary = ledger.reactions("post_1", None).await.unwrap();
    assert_eq!(summary.counts.get("like"), Some(&1));

    ledger.react("post_1", "alice", "like").await.unwrap();
    let summary = ledger.reactions("post_1", None).await.unwrap();
    assert_eq!(summary.counts.get("like"), None);

    // react then react with a different type: switch
    ledger.react("post_1", "alice", "like").await.unwrap();
    ledger.react("post_1", "alice", "love").await.unwrap();
    let summary = ledger.reactions("post_1", Some("alice")).await.unwrap();
    assert_eq!(summary.counts.get("like"), None);
    assert_eq!(summary.counts.get("love"), Some(&1));
    assert_eq!(summary.own.as_deref(), Some("love"));
}

#[tokio::test]
async fn expired_session_is_rejected_at_the_gate() {
    let (guard, _, _, sessions) = core();

    let mut session = Session::new("alice", Duration::from_secs(3600));
    session.expires_at = Utc::now() - chrono::Duration::seconds(1);
    sessions.insert(session.clone()).await.unwrap();

    assert!(matches!(
        guard.resolve(Some(&session.token)).await,
        AuthState::Unauthenticated
    ));
    assert!(matches!(
        guard.require_auth(Some(&session.token)).await,
        Err(CoreError::Unauthorized)
    ));
}

#[tokio::test]
async fn session_store_fault_never_authenticates() {
    let guard = AccessGuard::new(Arc::new(FailingSessionStore));

    // Soft resolution fails open to anonymous; the hard gate fails closed.
    assert!(matches!(
        guard.resolve(Some("any-token")).await,
        AuthState::Unauthenticated
    ));
    assert!(matches!(
        guard.require_auth(Some("any-token")).await,
        Err(CoreError::Unauthorized)
    ));
}

#[tokio::test]
async fn login_rate_limit_scenario() {
    let clock = ManualClock::at(1_700_000_000);
    let admission = AdmissionController::new(
        Arc::new(MemCounterStore::new()),
        clock.clone(),
        RateLimitConfig::default(),
    );

    // Quota 5/min on the auth class: five attempts pass, the sixth is
    // rejected with a retry hint inside the window.
    for attempt in 0..5 {
        let result = admission.admit("203.0.113.7", EndpointClass::Auth).await;
        assert!(
            matches!(result, Admission::Admitted { .. }),
            "attempt {} should be admitted",
            attempt + 1
        );
    }
    match admission.admit("203.0.113.7", EndpointClass::Auth).await {
        Admission::Rejected { retry_after } => {
            assert!(retry_after <= Duration::from_secs(60));
        }
        Admission::Admitted { .. } => panic!("6th login attempt should be rejected"),
    }

    // Other classes and other clients are unaffected.
    assert!(matches!(
        admission.admit("203.0.113.7", EndpointClass::ReadOnly).await,
        Admission::Admitted { .. }
    ));
    assert!(matches!(
        admission.admit("203.0.113.8", EndpointClass::Auth).await,
        Admission::Admitted { .. }
    ));

    // The next window starts fresh.
    clock.advance(60);
    assert!(matches!(
        admission.admit("203.0.113.7", EndpointClass::Auth).await,
        Admission::Admitted { .. }
    ));
}

#[tokio::test]
async fn counter_store_fault_degrades_per_class() {
    struct FailingCounterStore;

    #[async_trait]
    impl CounterStore for FailingCounterStore {
        async fn increment(&self, _key: &WindowKey) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("injected".to_string()))
        }

        async fn prune(&self, _horizon: u64) {}
    }

    let admission = AdmissionController::new(
        Arc::new(FailingCounterStore),
        ManualClock::at(1_700_000_000),
        RateLimitConfig::default(),
    );

    assert!(matches!(
        admission.admit("203.0.113.7", EndpointClass::Auth).await,
        Admission::Rejected { .. }
    ));
    assert!(matches!(
        admission.admit("203.0.113.7", EndpointClass::Messaging).await,
        Admission::Admitted { .. }
    ));
}

#[tokio::test]
async fn self_reaction_produces_no_notification() {
    let (_, ledger, notifier, _) = core();
    ledger
        .put_entity(EngageableEntity::new_post("post_1", "alice"))
        .await
        .unwrap();

    ledger.react("post_1", "alice", "like").await.unwrap();
    assert_eq!(notifier.count_unread("alice").await.unwrap(), 0);
    assert!(notifier
        .list_for_user("alice", 0, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn poll_voting_flow() {
    let (_, ledger, _, _) = core();
    let poll = EngageableEntity::new_poll(
        "poll_1",
        "alice",
        vec!["yes".into(), "no".into()],
        Utc::now() + chrono::Duration::hours(1),
    )
    .unwrap();
    ledger.put_entity(poll).await.unwrap();

    ledger.vote("poll_1", 0, "bob").await.unwrap();
    ledger.vote("poll_1", 0, "carol").await.unwrap();
    ledger.vote("poll_1", 1, "bob").await.unwrap();

    // Bob switched; the totals still cover two distinct voters.
    assert_eq!(ledger.count_votes("poll_1").await.unwrap(), vec![1, 1]);

    assert!(matches!(
        ledger.vote("poll_1", 5, "bob").await,
        Err(CoreError::InvalidOption(5))
    ));
}
