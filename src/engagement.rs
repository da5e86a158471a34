// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Engagement ledger: reactions and poll votes with derived counters.
//!
//! Each user holds at most one reaction slot per entity (last write wins)
//! and membership in at most one option's voter set per poll. Aggregate
//! counters are strictly a cache over those sets: every count must be
//! reconstructible from a full scan of the underlying slots. Repeating the
//! identical reaction type toggles the reaction off.

use crate::error::CoreError;
use crate::notify::{NotificationKind, Notifier};
use crate::store::{ts_utc, EngagementStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// A user's reaction slot on an entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: String,
    pub reaction_type: String,
    #[serde(with = "ts_utc")]
    pub created_at: DateTime<Utc>,
}

impl Reaction {
    fn new(user_id: &str, reaction_type: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            reaction_type: reaction_type.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Voting state of a poll: declared options and one voter set per option.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollState {
    pub options: Vec<String>,
    #[serde(with = "ts_utc")]
    pub expires_at: DateTime<Utc>,
    pub voters: Vec<HashSet<String>>,
}

/// A post or poll subject to reactions/votes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngageableEntity {
    pub entity_id: String,
    pub owner_id: String,
    /// Derived counts per reaction type; the ledger is the only writer.
    pub counters: HashMap<String, i64>,
    /// Reaction slots keyed by user.
    pub reactions: HashMap<String, Reaction>,
    pub poll: Option<PollState>,
}

impl EngageableEntity {
    /// A plain post.
    pub fn new_post(entity_id: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            owner_id: owner_id.into(),
            counters: HashMap::new(),
            reactions: HashMap::new(),
            poll: None,
        }
    }

    /// A poll with its declared options.
    pub fn new_poll(
        entity_id: impl Into<String>,
        owner_id: impl Into<String>,
        options: Vec<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        if options.is_empty() {
            return Err(CoreError::InvalidEntity("poll has no options".to_string()));
        }
        let voters = vec![HashSet::new(); options.len()];
        Ok(Self {
            poll: Some(PollState {
                options,
                expires_at,
                voters,
            }),
            ..Self::new_post(entity_id, owner_id)
        })
    }
}

/// Outcome of a reaction call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReactionResult {
    Added { reaction_type: String },
    Removed { reaction_type: String },
    Switched { from: String, to: String },
}

/// Outcome of a vote call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteResult {
    Recorded,
    Changed { from: usize },
}

/// Store-level result of a reaction upsert.
#[derive(Debug)]
pub enum ReactionChange {
    Missing,
    Applied {
        outcome: ReactionResult,
        owner_id: String,
    },
}

/// Store-level result of a reaction removal.
#[derive(Debug)]
pub enum UnreactChange {
    Missing,
    NoReaction,
    Removed { reaction_type: String },
}

/// Store-level result of a vote, with range and expiry evaluated inside
/// the update.
#[derive(Debug)]
pub enum VoteChange {
    Missing,
    OutOfRange { options: usize },
    Expired { at: DateTime<Utc> },
    Recorded { previous: Option<usize> },
}

/// Counts per reaction type, plus the viewer's own reaction when known.
#[derive(Debug, Clone, Serialize)]
pub struct ReactionSummary {
    pub counts: HashMap<String, i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own: Option<String>,
}

/// Applies engagement rules and fans out notifications.
#[derive(Clone)]
pub struct EngagementLedger {
    store: Arc<dyn EngagementStore>,
    notifier: Notifier,
}

impl EngagementLedger {
    pub fn new(store: Arc<dyn EngagementStore>, notifier: Notifier) -> Self {
        Self { store, notifier }
    }

    /// Register an engageable entity, replacing any previous document with
    /// the same id.
    pub async fn put_entity(&self, entity: EngageableEntity) -> Result<(), CoreError> {
        Ok(self.store.put_entity(entity).await?)
    }

    /// Idempotent reaction upsert. First reaction creates the slot,
    /// repeating the identical type toggles it off, a different type
    /// switches the slot and moves both counters.
    pub async fn react(
        &self,
        entity_id: &str,
        user_id: &str,
        reaction_type: &str,
    ) -> Result<ReactionResult, CoreError> {
        match self
            .store
            .apply_reaction(entity_id, user_id, reaction_type)
            .await?
        {
            ReactionChange::Missing => Err(CoreError::EntityNotFound(entity_id.to_string())),
            ReactionChange::Applied { outcome, owner_id } => {
                debug!(entity_id = %entity_id, user_id = %user_id, outcome = ?outcome, "reaction applied");
                if !matches!(outcome, ReactionResult::Removed { .. }) {
                    self.notifier
                        .fan_out(
                            user_id,
                            &owner_id,
                            NotificationKind::Reaction,
                            &format!("{user_id} reacted with {reaction_type}"),
                            Some(entity_id),
                        )
                        .await;
                }
                Ok(outcome)
            }
        }
    }

    /// Remove the caller's reaction if present; `false` when there was
    /// none.
    pub async fn unreact(&self, entity_id: &str, user_id: &str) -> Result<bool, CoreError> {
        match self.store.remove_reaction(entity_id, user_id).await? {
            UnreactChange::Missing => Err(CoreError::EntityNotFound(entity_id.to_string())),
            UnreactChange::NoReaction => Ok(false),
            UnreactChange::Removed { reaction_type } => {
                debug!(entity_id = %entity_id, user_id = %user_id, reaction_type = %reaction_type, "reaction removed");
                Ok(true)
            }
        }
    }

    /// Current counts per reaction type, plus the viewer's own reaction.
    pub async fn reactions(
        &self,
        entity_id: &str,
        viewer: Option<&str>,
    ) -> Result<ReactionSummary, CoreError> {
        let entity = self
            .store
            .find_entity(entity_id)
            .await?
            .ok_or_else(|| CoreError::EntityNotFound(entity_id.to_string()))?;
        let own = viewer.and_then(|user_id| {
            entity
                .reactions
                .get(user_id)
                .map(|r| r.reaction_type.clone())
        });
        Ok(ReactionSummary {
            counts: entity.counters,
            own,
        })
    }

    /// Single-choice vote: joining one option's voter set leaves any other.
    pub async fn vote(
        &self,
        poll_id: &str,
        option_index: usize,
        user_id: &str,
    ) -> Result<VoteResult, CoreError> {
        match self.store.apply_vote(poll_id, option_index, user_id).await? {
            VoteChange::Missing => Err(CoreError::EntityNotFound(poll_id.to_string())),
            VoteChange::OutOfRange { options } => {
                debug!(poll_id = %poll_id, option_index, options, "vote for unknown option");
                Err(CoreError::InvalidOption(option_index))
            }
            VoteChange::Expired { at } => Err(CoreError::PollExpired(at)),
            VoteChange::Recorded { previous } => {
                debug!(poll_id = %poll_id, user_id = %user_id, option_index, ?previous, "vote recorded");
                Ok(match previous {
                    Some(from) => VoteResult::Changed { from },
                    None => VoteResult::Recorded,
                })
            }
        }
    }

    /// Tallies derived from voter-set cardinality, indexed by option.
    pub async fn count_votes(&self, poll_id: &str) -> Result<Vec<usize>, CoreError> {
        let entity = self
            .store
            .find_entity(poll_id)
            .await?
            .ok_or_else(|| CoreError::EntityNotFound(poll_id.to_string()))?;
        let poll = entity
            .poll
            .ok_or_else(|| CoreError::EntityNotFound(poll_id.to_string()))?;
        Ok(poll.voters.iter().map(HashSet::len).collect())
    }
}

fn bump(counters: &mut HashMap<String, i64>, reaction_type: &str, delta: i64) {
    let next = counters.get(reaction_type).copied().unwrap_or(0) + delta;
    if next <= 0 {
        counters.remove(reaction_type);
    } else {
        counters.insert(reaction_type.to_string(), next);
    }
}

/// In-memory engagement store.
///
/// Every mutation runs under one exclusive guard, so the slot transition
/// and its counter deltas land together and concurrent calls for the same
/// `(entity, user)` pair are serialized.
#[derive(Default)]
pub struct MemEngagementStore {
    entities: RwLock<HashMap<String, EngageableEntity>>,
}

impl MemEngagementStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EngagementStore for MemEngagementStore {
    async fn put_entity(&self, entity: EngageableEntity) -> Result<(), StoreError> {
        self.entities
            .write()
            .await
            .insert(entity.entity_id.clone(), entity);
        Ok(())
    }

    async fn find_entity(&self, entity_id: &str) -> Result<Option<EngageableEntity>, StoreError> {
        Ok(self.entities.read().await.get(entity_id).cloned())
    }

    async fn apply_reaction(
        &self,
        entity_id: &str,
        user_id: &str,
        reaction_type: &str,
    ) -> Result<ReactionChange, StoreError> {
        let mut entities = self.entities.write().await;
        let Some(entity) = entities.get_mut(entity_id) else {
            return Ok(ReactionChange::Missing);
        };

        let current = entity
            .reactions
            .get(user_id)
            .map(|r| r.reaction_type.clone());
        let outcome = match current {
            None => {
                entity
                    .reactions
                    .insert(user_id.to_string(), Reaction::new(user_id, reaction_type));
                bump(&mut entity.counters, reaction_type, 1);
                ReactionResult::Added {
                    reaction_type: reaction_type.to_string(),
                }
            }
            Some(current) if current == reaction_type => {
                entity.reactions.remove(user_id);
                bump(&mut entity.counters, reaction_type, -1);
                ReactionResult::Removed {
                    reaction_type: reaction_type.to_string(),
                }
            }
            Some(current) => {
                entity
                    .reactions
                    .insert(user_id.to_string(), Reaction::new(user_id, reaction_type));
                bump(&mut entity.counters, &current, -1);
                bump(&mut entity.counters, reaction_type, 1);
                ReactionResult::Switched {
                    from: current,
                    to: reaction_type.to_string(),
                }
            }
        };

        Ok(ReactionChange::Applied {
            outcome,
            owner_id: entity.owner_id.clone(),
        })
    }

    async fn remove_reaction(
        &self,
        entity_id: &str,
        user_id: &str,
    ) -> Result<UnreactChange, StoreError> {
        let mut entities = self.entities.write().await;
        let Some(entity) = entities.get_mut(entity_id) else {
            return Ok(UnreactChange::Missing);
        };

        match entity.reactions.remove(user_id) {
            Some(reaction) => {
                bump(&mut entity.counters, &reaction.reaction_type, -1);
                Ok(UnreactChange::Removed {
                    reaction_type: reaction.reaction_type,
                })
            }
            None => Ok(UnreactChange::NoReaction),
        }
    }

    async fn apply_vote(
        &self,
        poll_id: &str,
        option_index: usize,
        user_id: &str,
    ) -> Result<VoteChange, StoreError> {
        let mut entities = self.entities.write().await;
        let Some(poll) = entities.get_mut(poll_id).and_then(|e| e.poll.as_mut()) else {
            return Ok(VoteChange::Missing);
        };

        if option_index >= poll.options.len() {
            return Ok(VoteChange::OutOfRange {
                options: poll.options.len(),
            });
        }
        if Utc::now() >= poll.expires_at {
            return Ok(VoteChange::Expired {
                at: poll.expires_at,
            });
        }

        // Leave any previously chosen option before joining the target,
        // so the user never counts under two options.
        let mut previous = None;
        for (index, voters) in poll.voters.iter_mut().enumerate() {
            if index != option_index && voters.remove(user_id) {
                previous = Some(index);
            }
        }
        poll.voters[option_index].insert(user_id.to_string());

        Ok(VoteChange::Recorded { previous })
    }
}
