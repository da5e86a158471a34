// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the engagement core service.

use crate::limiter::EndpointClass;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the engagement core service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Notification configuration
    #[serde(default)]
    pub notification: NotificationConfig,
}

/// Session issuance configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session time-to-live in seconds (default: 86400)
    #[serde(default = "default_session_ttl_secs")]
    pub ttl_secs: u64,
}

/// Per-class fixed-window quotas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Window length in seconds, aligned to epoch time (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Quota for auth endpoints (default: 5)
    #[serde(default = "default_auth_quota")]
    pub auth_per_window: u32,

    /// Quota for media upload endpoints (default: 10)
    #[serde(default = "default_media_upload_quota")]
    pub media_upload_per_window: u32,

    /// Quota for messaging endpoints (default: 30)
    #[serde(default = "default_messaging_quota")]
    pub messaging_per_window: u32,

    /// Quota for read-only endpoints (default: 200)
    #[serde(default = "default_read_only_quota")]
    pub read_only_per_window: u32,

    /// Quota for everything else (default: 100)
    #[serde(default = "default_general_quota")]
    pub general_per_window: u32,
}

/// Notification listing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Largest page a caller may request (default: 100)
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// Page size when the caller names none (default: 20)
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_session_ttl_secs() -> u64 {
    86_400
}

fn default_window_secs() -> u64 {
    60
}

fn default_auth_quota() -> u32 {
    5
}

fn default_media_upload_quota() -> u32 {
    10
}

fn default_messaging_quota() -> u32 {
    30
}

fn default_read_only_quota() -> u32 {
    200
}

fn default_general_quota() -> u32 {
    100
}

fn default_max_page_size() -> usize {
    100
}

fn default_page_size() -> usize {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            session: SessionConfig::default(),
            rate_limit: RateLimitConfig::default(),
            notification: NotificationConfig::default(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl_secs(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            auth_per_window: default_auth_quota(),
            media_upload_per_window: default_media_upload_quota(),
            messaging_per_window: default_messaging_quota(),
            read_only_per_window: default_read_only_quota(),
            general_per_window: default_general_quota(),
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_page_size: default_max_page_size(),
            default_page_size: default_page_size(),
        }
    }
}

impl SessionConfig {
    /// Get the session time-to-live
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl RateLimitConfig {
    /// Get the quota configured for an endpoint class
    pub fn quota(&self, class: EndpointClass) -> u32 {
        match class {
            EndpointClass::Auth => self.auth_per_window,
            EndpointClass::MediaUpload => self.media_upload_per_window,
            EndpointClass::Messaging => self.messaging_per_window,
            EndpointClass::ReadOnly => self.read_only_per_window,
            EndpointClass::General => self.general_per_window,
        }
    }

    /// Get the window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}
