//! Slack request authentication.
//!
//! Every slash-command request carries `X-Slack-Request-Timestamp` and
//! `X-Slack-Signature`. Verification checks the timestamp against a ±5 minute
//! replay bound, then compares `v0=` + hex(HMAC-SHA256(secret,
//! `v0:{timestamp}:{body}`)) against the header under a constant-time
//! comparison.
//!
//! There is no nonce cache: an unaltered capture replayed inside the window
//! verifies again. The window is the only replay bound.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "X-Slack-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Slack-Request-Timestamp";

/// Maximum clock skew between Slack and us, in either direction (5 minutes).
pub const REPLAY_WINDOW_SECS: i64 = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing Slack signature headers")]
    MissingHeaders,
    #[error("request timestamp is not a unix epoch integer")]
    BadTimestamp,
    #[error("request timestamp outside the replay window")]
    Stale,
    #[error("signature mismatch")]
    Mismatch,
}

/// Authentication port for inbound commands. Production verifies Slack's
/// signing scheme over the body bytes exactly as received; tests substitute
/// an accept-all stub so handler logic can be exercised without re-signing
/// every request.
pub trait RequestVerifier: Send + Sync {
    fn verify(
        &self,
        body: &[u8],
        timestamp: Option<&str>,
        signature: Option<&str>,
    ) -> Result<(), AuthError>;
}

// ── Slack signing scheme ──────────────────────────────────────────────────────

pub struct SlackSignatureVerifier {
    signing_secret: String,
}

impl SlackSignatureVerifier {
    pub fn new(signing_secret: impl Into<String>) -> Self {
        Self {
            signing_secret: signing_secret.into(),
        }
    }
}

impl RequestVerifier for SlackSignatureVerifier {
    fn verify(
        &self,
        body: &[u8],
        timestamp: Option<&str>,
        signature: Option<&str>,
    ) -> Result<(), AuthError> {
        let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
            return Err(AuthError::MissingHeaders);
        };

        let claimed: i64 = timestamp.parse().map_err(|_| AuthError::BadTimestamp)?;
        // An extreme claimed timestamp must read as stale, not overflow the
        // subtraction.
        if unix_now().saturating_sub(claimed).saturating_abs() > REPLAY_WINDOW_SECS {
            return Err(AuthError::Stale);
        }

        let expected = compute_signature(&self.signing_secret, timestamp, body);
        if !constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
            return Err(AuthError::Mismatch);
        }
        Ok(())
    }
}

/// Signature over Slack's `v0:{timestamp}:{body}` base string, in the
/// `v0=<hex>` form the header carries. The body goes into the base string as
/// raw wire bytes, whether or not they are valid UTF-8.
pub fn compute_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

// ── Test doubles ──────────────────────────────────────────────────────────────

/// Verifier that accepts everything; for handler tests past the auth gate.
#[cfg(test)]
pub(crate) struct AcceptAll;

#[cfg(test)]
impl RequestVerifier for AcceptAll {
    fn verify(
        &self,
        _body: &[u8],
        _timestamp: Option<&str>,
        _signature: Option<&str>,
    ) -> Result<(), AuthError> {
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "8f742231b10e8888abcd99yyyzzz85a5";

    fn fresh_timestamp() -> String {
        unix_now().to_string()
    }

    fn verify(body: &[u8], timestamp: &str, signature: &str) -> Result<(), AuthError> {
        SlackSignatureVerifier::new(SECRET).verify(body, Some(timestamp), Some(signature))
    }

    #[test]
    fn signature_is_deterministic() {
        let a = compute_signature(SECRET, "1531420618", b"token=xyz&user_id=U1");
        let b = compute_signature(SECRET, "1531420618", b"token=xyz&user_id=U1");
        assert_eq!(a, b);
        assert!(a.starts_with("v0="));
    }

    #[test]
    fn tampered_body_changes_signature() {
        let ts = "1531420618";
        assert_ne!(
            compute_signature(SECRET, ts, b"user_id=U1&text=real win"),
            compute_signature(SECRET, ts, b"user_id=U1&text=fake win"),
        );
    }

    #[test]
    fn different_timestamp_changes_signature() {
        let body = b"user_id=U1&text=win";
        assert_ne!(
            compute_signature(SECRET, "1531420618", body),
            compute_signature(SECRET, "1531420619", body),
        );
    }

    #[test]
    fn different_secret_changes_signature() {
        assert_ne!(
            compute_signature("secret-a", "1531420618", b"body"),
            compute_signature("secret-b", "1531420618", b"body"),
        );
    }

    #[test]
    fn accepts_fresh_signed_request() {
        let body = b"user_id=U1&text=shipped";
        let ts = fresh_timestamp();
        let sig = compute_signature(SECRET, &ts, body);
        assert_eq!(verify(body, &ts, &sig), Ok(()));
    }

    #[test]
    fn accepts_body_bytes_that_are_not_utf8() {
        let body = b"user_id=U1&text=caf\xE9";
        let ts = fresh_timestamp();
        let sig = compute_signature(SECRET, &ts, body);
        assert_eq!(verify(body, &ts, &sig), Ok(()));
    }

    #[test]
    fn rejects_wrong_signature() {
        let ts = fresh_timestamp();
        assert_eq!(
            verify(b"body", &ts, "v0=deadbeef"),
            Err(AuthError::Mismatch)
        );
    }

    #[test]
    fn rejects_signature_for_different_body() {
        let ts = fresh_timestamp();
        let sig = compute_signature(SECRET, &ts, b"user_id=U1&text=original");
        assert_eq!(
            verify(b"user_id=U1&text=altered", &ts, &sig),
            Err(AuthError::Mismatch)
        );
    }

    #[test]
    fn rejects_missing_headers() {
        let verifier = SlackSignatureVerifier::new(SECRET);
        assert_eq!(
            verifier.verify(b"body", None, Some("v0=abc")),
            Err(AuthError::MissingHeaders)
        );
        assert_eq!(
            verifier.verify(b"body", Some("123"), None),
            Err(AuthError::MissingHeaders)
        );
        assert_eq!(
            verifier.verify(b"body", None, None),
            Err(AuthError::MissingHeaders)
        );
    }

    #[test]
    fn rejects_stale_timestamp_even_when_correctly_signed() {
        let body = b"user_id=U1&text=replayed";
        let ts = (unix_now() - REPLAY_WINDOW_SECS - 100).to_string();
        let sig = compute_signature(SECRET, &ts, body);
        assert_eq!(verify(body, &ts, &sig), Err(AuthError::Stale));
    }

    #[test]
    fn rejects_future_timestamp_beyond_window() {
        let body = b"user_id=U1&text=from the future";
        let ts = (unix_now() + REPLAY_WINDOW_SECS + 100).to_string();
        let sig = compute_signature(SECRET, &ts, body);
        assert_eq!(verify(body, &ts, &sig), Err(AuthError::Stale));
    }

    #[test]
    fn accepts_timestamp_just_inside_window() {
        let body = b"user_id=U1&text=slow proxy";
        let ts = (unix_now() - REPLAY_WINDOW_SECS + 5).to_string();
        let sig = compute_signature(SECRET, &ts, body);
        assert_eq!(verify(body, &ts, &sig), Ok(()));
    }

    #[test]
    fn rejects_non_numeric_timestamp() {
        assert_eq!(
            verify(b"body", "yesterday", "v0=abc"),
            Err(AuthError::BadTimestamp)
        );
    }

    #[test]
    fn rejects_extreme_timestamps_as_stale() {
        assert_eq!(
            verify(b"body", &i64::MIN.to_string(), "v0=abc"),
            Err(AuthError::Stale)
        );
        assert_eq!(
            verify(b"body", &i64::MAX.to_string(), "v0=abc"),
            Err(AuthError::Stale)
        );
    }

    #[test]
    fn constant_time_eq_matching() {
        assert!(constant_time_eq(b"abc", b"abc"));
    }

    #[test]
    fn constant_time_eq_different_length() {
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    #[test]
    fn constant_time_eq_different_content() {
        assert!(!constant_time_eq(b"abc", b"xyz"));
    }
}
