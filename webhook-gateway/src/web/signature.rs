//! Deploy request signature verification.
//!
//! Callers sign the raw request body with HMAC-SHA256 using the shared
//! deploy secret and send the result as `X-Deploy-Signature: sha256=<hex>`.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Deploy-Signature";

/// Prefix of every signature value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Compute the signature header value for `body`.
///
/// Returns `None` only if the MAC rejects the key, which HMAC never does in
/// practice.
pub fn sign(body: &[u8], secret: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a deploy request signature.
///
/// # Arguments
///
/// * `body` - The raw request body, exactly as received
/// * `signature` - The `X-Deploy-Signature` header value, if present
/// * `secret` - The shared deploy secret
///
/// # Returns
///
/// `true` only if `signature` equals `sha256=` followed by the lowercase hex
/// HMAC-SHA256 of `body`. Missing or empty signatures and any internal
/// failure yield `false`.
pub fn verify(body: &[u8], signature: Option<&str>, secret: &[u8]) -> bool {
    let signature = match signature {
        Some(s) if !s.is_empty() => s,
        _ => return false,
    };

    let expected = match sign(body, secret) {
        Some(expected) => expected,
        None => {
            warn!("deploy_signature_invalid_key");
            return false;
        }
    };

    constant_time_compare(&expected, signature)
}

/// Constant-time string comparison.
///
/// Both inputs are padded to a common length with distinct fill bytes so the
/// work done depends on neither the position of the first mismatch nor which
/// input is shorter.
fn constant_time_compare(a: &str, b: &str) -> bool {
    let max_len = a.len().max(b.len());

    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}
