//! Request signing for the persistence callbacks.
//!
//! The signature is `hex(HMAC-SHA256(secret, "<timestamp>.<body>"))`, sent
//! with the timestamp (ms since epoch) in two headers. Receivers recompute
//! it and reject stale timestamps.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-mealforge-timestamp";
pub const SIGNATURE_HEADER: &str = "x-mealforge-signature";

/// Default tolerance between a request's timestamp and the receiver's clock.
pub const DEFAULT_MAX_SKEW_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing shared secret")]
    MissingSecret,

    #[error("signature is not valid hex: {0}")]
    InvalidFormat(String),

    #[error("timestamp {timestamp} is outside the accepted window")]
    Expired { timestamp: i64 },

    #[error("signature verification failed")]
    Mismatch,
}

/// The shared secret both sides of the persistence callback hold.
#[derive(Clone)]
pub struct SigningKey {
    secret: Vec<u8>,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningKey([redacted])")
    }
}

impl SigningKey {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, SignatureError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(SignatureError::MissingSecret);
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    fn mac(&self, timestamp: i64, body: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can take key of any size");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        mac
    }

    /// Hex signature of `body` sent at `timestamp`.
    pub fn sign(&self, timestamp: i64, body: &[u8]) -> String {
        hex::encode(self.mac(timestamp, body).finalize().into_bytes())
    }

    /// Constant-time check of `signature` against `body` and `timestamp`.
    pub fn verify(&self, timestamp: i64, body: &[u8], signature: &str) -> Result<(), SignatureError> {
        let provided =
            hex::decode(signature).map_err(|e| SignatureError::InvalidFormat(e.to_string()))?;
        self.mac(timestamp, body)
            .verify_slice(&provided)
            .map_err(|_| SignatureError::Mismatch)
    }

    /// [`verify`](Self::verify) plus a freshness check against `now`.
    pub fn verify_fresh(
        &self,
        timestamp: i64,
        now: i64,
        max_skew_ms: i64,
        body: &[u8],
        signature: &str,
    ) -> Result<(), SignatureError> {
        if (now - timestamp).abs() > max_skew_ms {
            return Err(SignatureError::Expired { timestamp });
        }
        self.verify(timestamp, body, signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> SigningKey {
        SigningKey::new("test-secret").unwrap()
    }

    #[test]
    fn signature_is_hex_sha256() {
        let sig = key().sign(1_700_000_000_000, b"{}");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn verifies_own_signature() {
        let k = key();
        let sig = k.sign(42, b"{\"jobId\":1}");
        assert_eq!(k.verify(42, b"{\"jobId\":1}", &sig), Ok(()));
    }

    #[test]
    fn tampering_is_detected() {
        let k = key();
        let sig = k.sign(42, b"body");
        assert_eq!(k.verify(43, b"body", &sig), Err(SignatureError::Mismatch));
        assert_eq!(k.verify(42, b"bodx", &sig), Err(SignatureError::Mismatch));
        let other = SigningKey::new("other").unwrap();
        assert_eq!(other.verify(42, b"body", &sig), Err(SignatureError::Mismatch));
    }

    #[test]
    fn rejects_malformed_and_stale() {
        let k = key();
        assert!(matches!(
            k.verify(1, b"x", "not-hex"),
            Err(SignatureError::InvalidFormat(_))
        ));
        let sig = k.sign(1_000, b"x");
        assert_eq!(
            k.verify_fresh(1_000, 1_000 + DEFAULT_MAX_SKEW_MS + 1, DEFAULT_MAX_SKEW_MS, b"x", &sig),
            Err(SignatureError::Expired { timestamp: 1_000 })
        );
        assert_eq!(
            k.verify_fresh(1_000, 2_000, DEFAULT_MAX_SKEW_MS, b"x", &sig),
            Ok(())
        );
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert_eq!(SigningKey::new("").unwrap_err(), SignatureError::MissingSecret);
    }

    #[test]
    fn debug_hides_secret() {
        assert!(!format!("{:?}", key()).contains("test-secret"));
    }
}
