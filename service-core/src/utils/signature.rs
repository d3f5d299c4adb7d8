use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Compute a hex-encoded HMAC-SHA256 signature over a raw payload.
///
/// The payload must be the exact bytes that were signed by the peer. Webhook
/// bodies in particular must not be re-serialized before hashing: any
/// whitespace or key-ordering difference produces a different MAC.
pub fn compute_signature(secret: &str, payload: &[u8]) -> Result<String, anyhow::Error> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid key length: {}", e))?;

    mac.update(payload);
    let result = mac.finalize();

    Ok(hex::encode(result.into_bytes()))
}

/// Verify a hex-encoded HMAC-SHA256 signature using constant-time comparison.
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    signature: &str,
) -> Result<bool, anyhow::Error> {
    let expected_signature = compute_signature(secret, payload)?;

    let expected_bytes = expected_signature.as_bytes();
    let signature_bytes = signature.as_bytes();

    // Length is not secret (always 64 hex chars for SHA-256), so an early
    // length check leaks nothing.
    if expected_bytes.len() != signature_bytes.len() {
        return Ok(false);
    }

    Ok(expected_bytes.ct_eq(signature_bytes).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_generation_and_verification() {
        let secret = "my_secret_key";
        let body = br#"{"event":"payment.captured"}"#;

        let signature = compute_signature(secret, body).unwrap();
        assert_eq!(signature.len(), 64);

        assert!(verify_signature(secret, body, &signature).unwrap());
    }

    #[test]
    fn test_invalid_signature() {
        let secret = "my_secret_key";
        let body = br#"{"event":"payment.captured"}"#;

        let signature = compute_signature(secret, body).unwrap();
        let invalid_signature = format!("a{}", &signature[1..]);

        assert!(!verify_signature(secret, body, &invalid_signature).unwrap());
    }

    #[test]
    fn test_single_byte_mutation_invalidates() {
        let secret = "my_secret_key";
        let body = br#"{"event":"payment.captured","amount":50000}"#;

        let signature = compute_signature(secret, body).unwrap();

        let mut tampered = body.to_vec();
        tampered[30] ^= 0x01;
        assert!(!verify_signature(secret, &tampered, &signature).unwrap());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let body = br#"{"event":"payment.failed"}"#;

        let signature = compute_signature("secret_a", body).unwrap();
        assert!(!verify_signature("secret_b", body, &signature).unwrap());
    }
}
