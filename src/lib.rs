// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Engagement & Access-Control Core
//!
//! This crate provides the engagement and access-control subsystem of a
//! social networking backend:
//!
//! - Session-based authentication with UTC expiry semantics
//! - Per-endpoint-class fixed-window rate limiting
//! - Idempotent reaction and poll-vote counters with consistent aggregates
//! - Durable notification fan-out with unread tracking
//!
//! Every inbound request passes the admission controller, then the access
//! guard, then the handler invokes the engagement ledger, which updates
//! aggregate counters and fans out notifications to the affected
//! recipient. The durable store is abstracted behind the traits in
//! [`store`]; in-memory implementations ship with the crate.

pub mod config;
pub mod engagement;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod notify;
pub mod session;
pub mod store;

pub use config::Config;
pub use engagement::{
    EngageableEntity, EngagementLedger, MemEngagementStore, ReactionResult, ReactionSummary,
    VoteResult,
};
pub use error::CoreError;
pub use limiter::{Admission, AdmissionController, EndpointClass, MemCounterStore};
pub use notify::{MemNotificationStore, Notification, NotificationKind, Notifier};
pub use session::{AccessGuard, AuthState, Identity, MemSessionStore, Session};
