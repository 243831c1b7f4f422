//! Shared instance connection settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::packet::DEFAULT_MTU;

/// Default control address of the local shared instance.
const DEFAULT_SHARED_ADDR: &str = "127.0.0.1:37428";

/// Default local bind address (ephemeral port on loopback).
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:0";

/// Default per-request timeout.
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2000;

/// Shared instance client configuration (`shared_instance.*`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedInstanceConfig {
    /// Control address of the shared instance (`addr`). Defaults to "127.0.0.1:37428".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,

    /// Local bind address (`bind_addr`). Defaults to "127.0.0.1:0".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_addr: Option<String>,

    /// Network MTU the shared instance forwards (`mtu`). Defaults to 500.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtu: Option<usize>,

    /// Control request timeout in milliseconds (`request_timeout_ms`). Defaults to 2000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,
}

impl SharedInstanceConfig {
    /// Get the shared instance address, using default if not configured.
    pub fn addr(&self) -> &str {
        self.addr.as_deref().unwrap_or(DEFAULT_SHARED_ADDR)
    }

    /// Get the bind address, using default if not configured.
    pub fn bind_addr(&self) -> &str {
        self.bind_addr.as_deref().unwrap_or(DEFAULT_BIND_ADDR)
    }

    /// Get the MTU, using default if not configured.
    pub fn mtu(&self) -> usize {
        self.mtu.unwrap_or(DEFAULT_MTU)
    }

    /// Get the request timeout, using default if not configured.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms.unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS))
    }

    pub(super) fn merge(&mut self, other: SharedInstanceConfig) {
        if other.addr.is_some() {
            self.addr = other.addr;
        }
        if other.bind_addr.is_some() {
            self.bind_addr = other.bind_addr;
        }
        if other.mtu.is_some() {
            self.mtu = other.mtu;
        }
        if other.request_timeout_ms.is_some() {
            self.request_timeout_ms = other.request_timeout_ms;
        }
    }
}
