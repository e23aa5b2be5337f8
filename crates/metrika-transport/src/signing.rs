//! HMAC-SHA256 signatures carried in the `HashSHA256` header.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::TransportError;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size")
}

/// Hex-encoded HMAC-SHA256 of `data`.
pub fn sign(secret: &str, data: &[u8]) -> String {
    let mut mac = mac(secret);
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature over `data` in constant time.
pub fn verify(secret: &str, data: &[u8], signature: &str) -> Result<(), TransportError> {
    let expected = hex::decode(signature.trim())
        .map_err(|_| TransportError::Signature("signature is not valid hex".into()))?;
    let mut mac = mac(secret);
    mac.update(data);
    mac.verify_slice(&expected)
        .map_err(|_| TransportError::Signature("signature mismatch".into()))
}

/// Signature for a batch response: content type, path and query concatenated.
pub fn sign_response(secret: &str, content_type: &str, path: &str, query: &str) -> String {
    let mut mac = mac(secret);
    mac.update(content_type.as_bytes());
    mac.update(path.as_bytes());
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}
