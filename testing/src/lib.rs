//! # Leadmarket Testing
//!
//! Testing utilities and deterministic doubles shared by the workspace's
//! test suites:
//!
//! - A fixed clock so grant timestamps and signature tolerance windows are
//!   reproducible
//! - A helper that produces valid webhook signature headers without going
//!   through a real gateway

use chrono::{DateTime, Utc};
use leadmarket_core::clock::Clock;

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    #[derive(Debug, Clone, Copy)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse, which should never
    /// happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use super::{DateTime, Utc};
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    /// Produce a valid `t=...,v1=...` signature header for `payload`,
    /// signed with `secret` at `timestamp`.
    ///
    /// Mirrors the gateway's signing scheme so tests can exercise the
    /// webhook surface end to end.
    ///
    /// # Panics
    ///
    /// Panics if HMAC key setup fails, which cannot happen for HMAC-SHA256
    /// (it accepts keys of any length).
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn signed_header(secret: &str, timestamp: DateTime<Utc>, payload: &[u8]) -> String {
        let ts = timestamp.timestamp();
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(ts.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }
}

// Re-export commonly used items
pub use mocks::{test_clock, FixedClock};
