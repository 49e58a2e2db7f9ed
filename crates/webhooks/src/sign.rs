//! HMAC-SHA256 payload signing, used for the `X-Tessera-Signature` header
//! and nowhere else.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Returns the lowercase hex digest of `HMAC-SHA256(secret, body)`.
pub fn sign_payload(secret: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_deterministic_for_same_inputs() {
        let a = sign_payload("secret", "{\"event\":\"contract_published\"}");
        let b = sign_payload("secret", "{\"event\":\"contract_published\"}");
        assert_eq!(a, b);
    }

    #[test]
    fn signature_changes_with_secret() {
        let a = sign_payload("secret-a", "body");
        let b = sign_payload("secret-b", "body");
        assert_ne!(a, b);
    }
}
