//! GitHub webhook signature checks (`X-Hub-Signature-256`).
//!
//! GitHub signs the exact bytes it sends, so verification should run against
//! [`Payload::Raw`] whenever the host hands those over. A body that arrives
//! already decoded is re-serialized compactly in the key order it was parsed
//! in, which only matches when the sender produced the same byte sequence.

use crate::request::Payload;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use log::warn;
use sha2::Sha256;
use std::borrow::Cow;
use subtle::ConstantTimeEq;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const SIGNATURE_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

/// Returns `sha256=<lowercase hex HMAC>` of `body` under `secret`.
pub fn sign(secret: &[u8], body: &[u8]) -> Result<String, InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(secret)?;
    mac.update(body);

    Ok(format!(
        "{SIGNATURE_PREFIX}{}",
        hex::encode(mac.finalize().into_bytes())
    ))
}

pub fn verify_signature(secret: &[u8], body: &[u8], claimed: Option<&str>) -> bool {
    let claimed = match claimed {
        Some(claimed) if !claimed.is_empty() => claimed,
        _ => return false,
    };

    match sign(secret, body) {
        Ok(expected) => expected.as_bytes().ct_eq(claimed.as_bytes()).into(),
        Err(e) => {
            warn!("Failed to initialize HMAC-SHA256: {e}");
            false
        }
    }
}

/// The byte sequence a signature is checked against.
pub fn signed_bytes(payload: &Payload) -> serde_json::Result<Cow<'_, [u8]>> {
    match payload {
        Payload::Empty => Ok(Cow::Borrowed(&[])),
        Payload::Raw(bytes) => Ok(Cow::Borrowed(bytes)),
        Payload::Json(value) => serde_json::to_vec(value).map(Cow::Owned),
    }
}

pub fn verify_payload(secret: &[u8], payload: &Payload, claimed: Option<&str>) -> bool {
    if claimed.is_none_or(str::is_empty) {
        return false;
    }

    match signed_bytes(payload) {
        Ok(bytes) => verify_signature(secret, &bytes, claimed),
        Err(e) => {
            warn!("Failed to re-serialize webhook payload: {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &[u8] = b"It's a Secret to Everybody";
    const BODY: &[u8] = b"Hello, World!";

    #[test]
    fn test_sign_matches_github_reference_vector() {
        // Example from GitHub's "Validating webhook deliveries" documentation.
        assert_eq!(
            sign(SECRET, BODY).unwrap(),
            "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17"
        );
    }

    #[test]
    fn test_verify_accepts_correct_signature() {
        let signature = sign(SECRET, BODY).unwrap();
        assert!(verify_signature(SECRET, BODY, Some(&signature)));
    }

    #[test]
    fn test_verify_rejects_any_single_byte_change() {
        let body = br#"{"action":"opened","issue":{"number":1}}"#;
        let signature = sign(SECRET, body).unwrap();

        for i in 0..body.len() {
            let mut tampered = body.to_vec();
            tampered[i] ^= 0x01;
            assert!(
                !verify_signature(SECRET, &tampered, Some(&signature)),
                "byte {i} flipped but signature still verified"
            );
        }
    }

    #[test]
    fn test_verify_rejects_missing_or_empty_signature() {
        assert!(!verify_signature(SECRET, BODY, None));
        assert!(!verify_signature(SECRET, BODY, Some("")));
        assert!(!verify_payload(SECRET, &Payload::from("Hello, World!"), None));
    }

    #[test]
    fn test_verify_rejects_wrong_secret_and_bare_digest() {
        let signature = sign(b"another secret", BODY).unwrap();
        assert!(!verify_signature(SECRET, BODY, Some(&signature)));

        let bare = sign(SECRET, BODY).unwrap().trim_start_matches(SIGNATURE_PREFIX).to_string();
        assert!(!verify_signature(SECRET, BODY, Some(&bare)));
    }

    #[test]
    fn test_verify_rejects_uppercase_hex() {
        let signature = sign(SECRET, BODY).unwrap().to_uppercase().replace("SHA256=", "sha256=");
        assert!(!verify_signature(SECRET, BODY, Some(&signature)));
    }

    #[test]
    fn test_verify_parsed_payload_uses_compact_form() {
        let signature = sign(SECRET, br#"{"action":"opened","number":1}"#).unwrap();
        let payload = Payload::Json(json!({"action": "opened", "number": 1}));
        assert!(verify_payload(SECRET, &payload, Some(&signature)));
    }

    #[test]
    fn test_verify_parsed_payload_keeps_sender_key_order() {
        let raw = br#"{"action":"opened","issue":{"url":"u","number":1},"repository":{"name":"r"}}"#;
        let signature = sign(SECRET, raw).unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(raw).unwrap();

        assert_eq!(&*signed_bytes(&Payload::Json(parsed.clone())).unwrap(), &raw[..]);
        assert!(verify_payload(SECRET, &Payload::Json(parsed), Some(&signature)));
    }

    #[test]
    fn test_verify_raw_payload_is_not_normalized() {
        let signature = sign(SECRET, br#"{"action":"opened","number":1}"#).unwrap();
        let payload = Payload::from(r#"{"action": "opened", "number": 1}"#);
        assert!(!verify_payload(SECRET, &payload, Some(&signature)));
    }
}
