// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Consistency tests for the engagement ledger.
//!
//! Aggregate counters are a cache over the reaction/vote sets. These
//! tests drive long deterministic sequences of engagement calls and, after
//! every step, reconstruct the counts from the underlying sets to check
//! the cache never drifts.

mod harness;

use chrono::Utc;
use engagement_core::{
    config::NotificationConfig,
    engagement::EngageableEntity,
    store::EngagementStore,
    EngagementLedger, MemEngagementStore, MemNotificationStore, Notifier,
};
use harness::generators;
use std::collections::HashMap;
use std::sync::Arc;

fn ledger() -> (EngagementLedger, Arc<MemEngagementStore>) {
    let store = Arc::new(MemEngagementStore::new());
    let notifier = Notifier::new(
        Arc::new(MemNotificationStore::new()),
        NotificationConfig::default(),
    );
    (EngagementLedger::new(store.clone(), notifier), store)
}

/// Counts per reaction type recomputed from a full scan of the slots.
fn reconstruct(entity: &EngageableEntity) -> HashMap<String, i64> {
    let mut counts = HashMap::new();
    for reaction in entity.reactions.values() {
        *counts.entry(reaction.reaction_type.clone()).or_insert(0) += 1;
    }
    counts
}

#[tokio::test]
async fn counters_always_match_reaction_sets() {
    let (ledger, store) = ledger();
    ledger
        .put_entity(EngageableEntity::new_post("post_1", "owner"))
        .await
        .unwrap();

    let users = generators::user_ids(8);
    let types = generators::reaction_types();

    for step in 0..400 {
        let user = &users[generators::pick(step, users.len())];
        let reaction_type = types[generators::pick(step * 3 + 1, types.len())];

        // Mix in removals so the sequence shrinks as well as grows.
        if generators::pick(step * 7 + 2, 10) < 7 {
            ledger.react("post_1", user, reaction_type).await.unwrap();
        } else {
            ledger.unreact("post_1", user).await.unwrap();
        }

        let entity = store.find_entity("post_1").await.unwrap().unwrap();
        assert_eq!(
            entity.counters,
            reconstruct(&entity),
            "counter drift at step {step}"
        );
    }
}

#[tokio::test]
async fn poll_membership_stays_single_choice() {
    let (ledger, store) = ledger();
    let options: Vec<String> = (0..5).map(|i| format!("option_{i}")).collect();
    let poll = EngageableEntity::new_poll(
        "poll_1",
        "owner",
        options,
        Utc::now() + chrono::Duration::hours(1),
    )
    .unwrap();
    ledger.put_entity(poll).await.unwrap();

    let users = generators::user_ids(8);

    for step in 0..300 {
        let user = &users[generators::pick(step, users.len())];
        let option = generators::pick(step * 5 + 3, 5);
        ledger.vote("poll_1", option, user).await.unwrap();

        let entity = store.find_entity("poll_1").await.unwrap().unwrap();
        let poll = entity.poll.as_ref().unwrap();

        for user in &users {
            let memberships = poll
                .voters
                .iter()
                .filter(|voters| voters.contains(user.as_str()))
                .count();
            assert!(
                memberships <= 1,
                "{user} counted under {memberships} options at step {step}"
            );
        }

        // Switching never inflates the electorate.
        let total: usize = poll.voters.iter().map(|voters| voters.len()).sum();
        assert!(total <= users.len(), "total {total} exceeds population");
    }
}

#[tokio::test]
async fn tallies_equal_distinct_voters() {
    let (ledger, _) = ledger();
    let poll = EngageableEntity::new_poll(
        "poll_1",
        "owner",
        vec!["a".into(), "b".into(), "c".into()],
        Utc::now() + chrono::Duration::hours(1),
    )
    .unwrap();
    ledger.put_entity(poll).await.unwrap();

    let users = generators::user_ids(10);
    for step in 0..100 {
        let user = &users[generators::pick(step, users.len())];
        let option = generators::pick(step * 11 + 5, 3);
        ledger.vote("poll_1", option, user).await.unwrap();
    }

    // Every generated user voted at least once over 100 steps; each one
    // must be tallied exactly once.
    let counts = ledger.count_votes("poll_1").await.unwrap();
    assert_eq!(counts.iter().sum::<usize>(), users.len());
}

#[tokio::test]
async fn concurrent_writers_do_not_drift_counters() {
    let (ledger, store) = ledger();
    ledger
        .put_entity(EngageableEntity::new_post("post_1", "owner"))
        .await
        .unwrap();

    let users = generators::user_ids(20);
    let mut handles = Vec::new();
    for user in &users {
        let ledger = ledger.clone();
        let user = user.clone();
        handles.push(tokio::spawn(async move {
            ledger.react("post_1", &user, "like").await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let entity = store.find_entity("post_1").await.unwrap().unwrap();
    assert_eq!(entity.counters.get("like"), Some(&(users.len() as i64)));
    assert_eq!(entity.counters, reconstruct(&entity));
}
