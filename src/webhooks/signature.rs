//! Webhook signature verification (HMAC-SHA256).
//!
//! GitHub signs each delivery with the hook's shared secret and sends the
//! result in `X-Hub-Signature-256` as `sha256=<hex>`. Deliveries are
//! verified against the raw body before anything is parsed.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Why a signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    /// Not of the form `sha256=<hex>`.
    #[error("malformed signature header")]
    Malformed,

    /// Well-formed, but not the signature of this body under our secret.
    #[error("signature does not match payload")]
    Mismatch,
}

/// The shared webhook secret.
#[derive(Clone)]
pub struct WebhookSecret(Vec<u8>);

impl WebhookSecret {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self(secret.into())
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0).expect("HMAC can take key of any size")
    }

    /// Computes the `sha256=<hex>` header value for `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = self.mac();
        mac.update(payload);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    /// Checks a `X-Hub-Signature-256` header value against `payload`.
    ///
    /// The comparison is constant-time.
    ///
    /// ```
    /// use steward_bot::webhooks::WebhookSecret;
    ///
    /// let secret = WebhookSecret::new("It's a Secret to Everybody");
    /// let header = secret.sign(b"Hello, World!");
    /// assert!(secret.verify(b"Hello, World!", &header).is_ok());
    /// assert!(secret.verify(b"Hello, World?", &header).is_err());
    /// ```
    pub fn verify(&self, payload: &[u8], header: &str) -> Result<(), SignatureError> {
        let expected = parse_signature_header(header).ok_or(SignatureError::Malformed)?;

        let mut mac = self.mac();
        mac.update(payload);
        mac.verify_slice(&expected)
            .map_err(|_| SignatureError::Mismatch)
    }
}

impl fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WebhookSecret(..)")
    }
}

/// Decodes `sha256=<hex>` into raw bytes. Never panics.
fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.trim().strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}
