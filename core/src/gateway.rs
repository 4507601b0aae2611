//! Payment gateway webhook authentication.
//!
//! Confirmation deliveries carry a signature header of the form
//! `t=<unix-seconds>,v1=<hex hmac>` where the HMAC-SHA256 is computed over
//! `"<timestamp>.<body>"` with a secret shared with the gateway. The
//! verifier checks the signature and bounds the timestamp skew before any
//! payload byte is trusted; everything fails closed.

use crate::clock::Clock;
use chrono::Duration;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Signature verification failures.
///
/// All variants are terminal for the delivery: an unverifiable event is
/// never processed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// The header is missing a timestamp or signature component
    #[error("malformed signature header")]
    MalformedHeader,
    /// The signed timestamp falls outside the accepted skew window
    #[error("signature timestamp outside tolerance")]
    StaleTimestamp,
    /// The signature does not match the payload
    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies the authenticity of webhook deliveries.
///
/// Abstracted behind a trait so tests can substitute a permissive or
/// always-failing verifier without computing real signatures.
pub trait WebhookVerifier: Send + Sync {
    /// Verify `signature_header` against `payload`.
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureError`] when the header is malformed, stale or
    /// does not match the payload.
    fn verify(&self, payload: &[u8], signature_header: &str) -> Result<(), SignatureError>;
}

/// Shared-secret HMAC-SHA256 verifier with timestamp-skew bounding.
pub struct HmacSha256Verifier {
    secret: String,
    tolerance: Duration,
    clock: Arc<dyn Clock>,
}

impl HmacSha256Verifier {
    /// Creates a verifier for `secret` accepting timestamps within
    /// `tolerance` of the clock's current time.
    #[must_use]
    pub fn new(secret: impl Into<String>, tolerance: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
            clock,
        }
    }
}

impl WebhookVerifier for HmacSha256Verifier {
    fn verify(&self, payload: &[u8], signature_header: &str) -> Result<(), SignatureError> {
        let mut timestamp: Option<i64> = None;
        let mut provided: Option<&str> = None;

        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => provided = Some(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
        let provided = provided.ok_or(SignatureError::MalformedHeader)?;
        let provided = hex::decode(provided).map_err(|_| SignatureError::MalformedHeader)?;

        let now = self.clock.now().timestamp();
        if (now - timestamp).abs() > self.tolerance.num_seconds() {
            return Err(SignatureError::StaleTimestamp);
        }

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| SignatureError::Mismatch)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(&provided)
            .map_err(|_| SignatureError::Mismatch)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::Clock as _;
    use leadmarket_testing::helpers::signed_header;
    use leadmarket_testing::mocks::test_clock;

    const SECRET: &str = "whsec_test";

    fn verifier() -> HmacSha256Verifier {
        HmacSha256Verifier::new(SECRET, Duration::minutes(5), Arc::new(test_clock()))
    }

    #[test]
    fn accepts_a_correctly_signed_payload() {
        let payload = br#"{"hello":"world"}"#;
        let header = signed_header(SECRET, test_clock().now(), payload);
        assert_eq!(verifier().verify(payload, &header), Ok(()));
    }

    #[test]
    fn rejects_a_tampered_payload() {
        let header = signed_header(SECRET, test_clock().now(), b"original");
        assert_eq!(
            verifier().verify(b"tampered", &header),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_the_wrong_secret() {
        let payload = b"payload";
        let header = signed_header("other-secret", test_clock().now(), payload);
        assert_eq!(
            verifier().verify(payload, &header),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_a_stale_timestamp() {
        let payload = b"payload";
        let stale = test_clock().now() - Duration::minutes(10);
        let header = signed_header(SECRET, stale, payload);
        assert_eq!(
            verifier().verify(payload, &header),
            Err(SignatureError::StaleTimestamp)
        );
    }

    #[test]
    fn rejects_malformed_headers() {
        let v = verifier();
        assert_eq!(v.verify(b"x", ""), Err(SignatureError::MalformedHeader));
        assert_eq!(
            v.verify(b"x", "t=123"),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            v.verify(b"x", "v1=abcd"),
            Err(SignatureError::MalformedHeader)
        );
        assert_eq!(
            v.verify(b"x", "t=123,v1=zz-not-hex"),
            Err(SignatureError::MalformedHeader)
        );
    }
}
